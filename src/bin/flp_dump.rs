use anyhow::{Context, Result, bail, format_err};
use clap::{Arg, ArgAction, ArgMatches, Command};
use dialoguer::Confirm;
use encoding::all::encodings;
use encoding::types::Encoding;
use indoc::indoc;
use log::{LevelFilter, debug, info};
use serde::Serialize;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use flp::{FlpParser, ParseOutcome, ParserSettings, PluginRecord, RawEvent, format_version};

use std::cell::RefCell;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;
use std::process::exit;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
    JsonLines,
}

/// Plugin binary flavour, guessed from the path.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
enum PluginFormat {
    #[serde(rename = "VST2")]
    Vst2,
    #[serde(rename = "VST3")]
    Vst3,
    #[serde(rename = "AU")]
    Au,
}

impl PluginFormat {
    fn from_path(path: Option<&str>) -> Self {
        let lower = path.unwrap_or_default().to_lowercase();
        if lower.contains(".vst3") {
            PluginFormat::Vst3
        } else if lower.contains(".component") {
            PluginFormat::Au
        } else {
            PluginFormat::Vst2
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            PluginFormat::Vst2 => "VST2",
            PluginFormat::Vst3 => "VST3",
            PluginFormat::Au => "AU",
        }
    }
}

#[derive(Debug, Serialize)]
struct ProjectPlugin {
    name: String,
    path: Option<String>,
    vendor: Option<String>,
    format: PluginFormat,
}

impl ProjectPlugin {
    /// Records with neither a name nor a path are of no use to anyone, skip them.
    fn from_record(record: PluginRecord) -> Option<Self> {
        let name = match (&record.name, &record.path) {
            (Some(name), _) if !name.is_empty() => name.clone(),
            (_, Some(path)) if !path.is_empty() => base_name(path).to_owned(),
            _ => return None,
        };

        Some(ProjectPlugin {
            name,
            format: PluginFormat::from_path(record.path.as_deref()),
            path: record.path,
            vendor: record.vendor,
        })
    }
}

#[derive(Debug, Serialize)]
struct ProjectSummary {
    source: String,
    app_full_name: String,
    format_version: String,
    plugins: Vec<ProjectPlugin>,
}

impl ProjectSummary {
    fn new(source: &str, outcome: ParseOutcome) -> Self {
        ProjectSummary {
            source: source.to_owned(),
            app_full_name: format!("FL Studio {}", outcome.display_version()),
            format_version: outcome.format_version.to_string(),
            plugins: outcome
                .plugins
                .into_iter()
                .filter_map(ProjectPlugin::from_record)
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
struct EventLine<'a> {
    source: &'a str,
    offset: u64,
    id: u8,
    name: Option<&'static str>,
    framing: flp::Framing,
    length: usize,
    payload: String,
}

/// File name without directories and extension; handles both separators.
fn base_name(path: &str) -> &str {
    let file_name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    match file_name.rfind('.') {
        Some(0) | None => file_name,
        Some(dot) => &file_name[..dot],
    }
}

struct FlpDump {
    parser_settings: ParserSettings,
    inputs: Vec<String>,
    output_format: OutputFormat,
    dump_events: bool,
    num_threads: usize,
    // Only one code path ever writes to the output.
    output: RefCell<Box<dyn Write>>,
    verbosity_level: Option<LevelFilter>,
}

impl FlpDump {
    pub fn from_cli_matches(matches: &ArgMatches) -> Result<Self> {
        let inputs: Vec<String> = matches
            .get_many::<String>("INPUT")
            .expect("This is a required argument")
            .cloned()
            .collect();

        if inputs.iter().filter(|i| i.as_str() == "-").count() > 1 {
            bail!("stdin (`-`) can only be given once");
        }

        let output_format = match matches
            .get_one::<String>("output-format")
            .map(String::as_str)
            .unwrap_or("text")
        {
            "json" => OutputFormat::Json,
            "jsonl" => OutputFormat::JsonLines,
            _ => OutputFormat::Text,
        };

        let num_threads = *matches.get_one::<usize>("num-threads").expect("has default");
        let num_threads = match (cfg!(feature = "multithreading"), num_threads) {
            (true, number) => number,
            (false, 0 | 1) => 1,
            (false, _) => {
                eprintln!(
                    "turned on threads, but binary was compiled without `multithreading` feature! parsing inputs sequentially"
                );
                1
            }
        };

        let verbosity_level = match matches.get_count("verbose") {
            0 => None,
            1 => Some(LevelFilter::Info),
            2 => Some(LevelFilter::Debug),
            3 => Some(LevelFilter::Trace),
            _ => {
                eprintln!("using more than -vvv does not affect verbosity level");
                Some(LevelFilter::Trace)
            }
        };

        let codec_name = matches
            .get_one::<String>("ansi-codec")
            .expect("has set default");
        let ansi_codec = encodings()
            .iter()
            .find(|c| c.name() == codec_name.as_str())
            .ok_or_else(|| format_err!("unknown codec `{}`", codec_name))?;

        let output: Box<dyn Write> = match matches.get_one::<String>("output-target") {
            Some(path) => {
                let f = Self::create_output_file(path, !matches.get_flag("no-confirm-overwrite"))
                    .with_context(|| {
                        format!("An error occurred while creating output file at `{}`", path)
                    })?;
                Box::new(f)
            }
            None => Box::new(io::stdout()),
        };

        Ok(FlpDump {
            parser_settings: ParserSettings::new().ansi_codec(*ansi_codec),
            inputs,
            output_format,
            dump_events: matches.get_flag("events"),
            num_threads,
            output: RefCell::new(output),
            verbosity_level,
        })
    }

    /// Main entry point for `FlpDump`. Returns whether every input was parsed.
    pub fn run(&self) -> Result<bool> {
        self.try_to_initialize_logging();

        if self.dump_events {
            let mut all_ok = true;
            for input in &self.inputs {
                if let Err(e) = self.dump_events_of(input) {
                    eprintln!("{}: {:#}", input, e);
                    all_ok = false;
                }
            }
            return Ok(all_ok);
        }

        let results = self.parse_all()?;
        let mut all_ok = true;
        for (input, result) in self.inputs.iter().zip(results) {
            match result {
                Ok(summary) => self.write_summary(&summary)?,
                Err(e) => {
                    eprintln!("{}: {:#}", input, e);
                    all_ok = false;
                }
            }
        }
        self.output.borrow_mut().flush()?;

        Ok(all_ok)
    }

    #[cfg(feature = "multithreading")]
    fn parse_all(&self) -> Result<Vec<Result<ProjectSummary>>> {
        use rayon::prelude::*;

        let settings = &self.parser_settings;
        if self.num_threads == 1 || self.inputs.len() == 1 {
            return Ok(self.inputs.iter().map(|i| summarize(i, settings)).collect());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.num_threads)
            .build()
            .context("Failed to create thread pool")?;

        let inputs = &self.inputs;
        Ok(pool.install(|| {
            inputs
                .par_iter()
                .map(|input| summarize(input, settings))
                .collect()
        }))
    }

    #[cfg(not(feature = "multithreading"))]
    fn parse_all(&self) -> Result<Vec<Result<ProjectSummary>>> {
        let settings = &self.parser_settings;
        Ok(self.inputs.iter().map(|i| summarize(i, settings)).collect())
    }

    fn write_summary(&self, summary: &ProjectSummary) -> Result<()> {
        let mut out = self.output.borrow_mut();
        match self.output_format {
            OutputFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(summary)?)?,
            OutputFormat::JsonLines => writeln!(out, "{}", serde_json::to_string(summary)?)?,
            OutputFormat::Text => {
                writeln!(out, "{}", summary.source)?;
                writeln!(
                    out,
                    "{} (format version {})",
                    summary.app_full_name, summary.format_version
                )?;
                for plugin in &summary.plugins {
                    write!(out, "  {:<4} {}", plugin.format.as_str(), plugin.name)?;
                    if let Some(path) = &plugin.path {
                        write!(out, "  {}", path)?;
                    }
                    if let Some(vendor) = &plugin.vendor {
                        write!(out, "  [{}]", vendor)?;
                    }
                    writeln!(out)?;
                }
            }
        }
        Ok(())
    }

    fn dump_events_of(&self, input: &str) -> Result<()> {
        let parser = parser_for(input, &self.parser_settings)?;
        let mut out = self.output.borrow_mut();

        if self.output_format == OutputFormat::Text {
            let header = parser.header();
            writeln!(
                out,
                "{}: format version {} ({}), data chunk {} bytes",
                input,
                header.format_version,
                format_version(u32::from(header.format_version)),
                header.data_size
            )?;
        }

        for event in parser.events() {
            let event: RawEvent =
                event.with_context(|| format!("Failed to read events of {}", input))?;
            let line = EventLine {
                source: input,
                offset: event.offset,
                id: event.id,
                name: event.name(),
                framing: event.framing(),
                length: event.payload.len(),
                payload: flp::utils::hex_preview(&event.payload, 16),
            };
            match self.output_format {
                OutputFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(&line)?)?,
                OutputFormat::JsonLines => writeln!(out, "{}", serde_json::to_string(&line)?)?,
                OutputFormat::Text => writeln!(
                    out,
                    "{:08x}  0x{:02x}  {:<14}  {:<13}  {:>6}  {}",
                    line.offset,
                    line.id,
                    line.name.unwrap_or("-"),
                    format!("{:?}", line.framing),
                    line.length,
                    line.payload
                )?,
            }
        }
        out.flush()?;

        Ok(())
    }

    /// If `prompt` is passed, will display a confirmation prompt before overwriting files.
    fn create_output_file(path: impl AsRef<Path>, prompt: bool) -> Result<File> {
        let p = path.as_ref();

        if p.is_dir() {
            bail!(
                "There is a directory at {}, refusing to overwrite",
                p.display()
            );
        }

        if p.exists() && prompt {
            let confirmed = Confirm::new()
                .with_prompt(format!(
                    "Are you sure you want to override output file at {}",
                    p.display()
                ))
                .default(false)
                .interact()
                .context("Failed to write confirmation prompt to term")?;
            if !confirmed {
                bail!("Cancelled");
            }
        }

        // Ok to assume p is not an existing directory
        match p.parent() {
            Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
                fs::create_dir_all(parent)?;
            }
            Some(_) => {}
            None => bail!("Output file cannot be root."),
        }

        Ok(File::create(p)?)
    }

    fn try_to_initialize_logging(&self) {
        if let Some(level) = self.verbosity_level {
            if let Err(e) = TermLogger::init(
                level,
                Config::default(),
                TerminalMode::Stderr,
                ColorChoice::Auto,
            ) {
                eprintln!("Failed to initialize logging: {}", e);
            }
        }
    }
}

fn open_input(input: &str) -> Result<Box<dyn Read + Send>> {
    if input == "-" {
        return Ok(Box::new(io::stdin()));
    }
    let f = File::open(input).with_context(|| format!("Failed to open file {}", input))?;
    Ok(Box::new(io::BufReader::new(f)))
}

fn parser_for(input: &str, settings: &ParserSettings) -> Result<FlpParser<Box<dyn Read + Send>>> {
    let parser = FlpParser::from_read(open_input(input)?)
        .with_context(|| format!("Failed to read FLP headers of {}", input))?;
    Ok(parser.with_configuration(settings.clone()))
}

/// Parses a single input. Free standing so it can run on the worker threads,
/// `FlpDump` itself is not `Sync`.
fn summarize(input: &str, settings: &ParserSettings) -> Result<ProjectSummary> {
    debug!("Starting to parse {}", input);
    let outcome = parser_for(input, settings)?
        .parse()
        .with_context(|| format!("Failed to parse events of {}", input))?;

    let summary = ProjectSummary::new(input, outcome);
    info!(
        "Parsed {}: {} with {} plugins",
        input,
        summary.app_full_name,
        summary.plugins.len()
    );
    Ok(summary)
}

fn command() -> Command {
    Command::new("flp_dump")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Utility to list the plugins referenced by FL Studio projects")
        .long_about(indoc!(
            r#"
            Utility to list the plugins referenced by FL Studio projects (.flp).

            Prints the FL Studio version a project was saved with and every plugin
            reference found in it. Use `--events` to dump the raw event stream instead.
        "#
        ))
        .arg(
            Arg::new("INPUT")
                .required(true)
                .num_args(1..)
                .help("One or more .flp files, or `-` to read a single project from stdin."),
        )
        .arg(
            Arg::new("num-threads")
                .short('t')
                .long("threads")
                .default_value("0")
                .value_parser(clap::value_parser!(usize))
                .help("Sets the number of worker threads, defaults to number of CPU cores."),
        )
        .arg(
            Arg::new("output-format")
                .short('o')
                .long("format")
                .value_parser(["text", "json", "jsonl"])
                .default_value("text")
                .help("Sets the output format")
                .long_help(indoc!(
                    r#"
                    Sets the output format:
                        "text"  - human readable listing.
                        "json"  - one pretty printed JSON document per input.
                        "jsonl" - one JSON document per line.
                "#
                )),
        )
        .arg(
            Arg::new("output-target")
                .long("output")
                .short('f')
                .action(ArgAction::Set)
                .help(indoc!(
                    "Writes output to the file specified instead of stdout, errors will still be printed to stderr.
                     Will ask for confirmation before overwriting files, to allow overwriting, pass `--no-confirm-overwrite`
                     Will create parent directories if needed."
                )),
        )
        .arg(
            Arg::new("no-confirm-overwrite")
                .long("no-confirm-overwrite")
                .action(ArgAction::SetTrue)
                .help("When set, will not ask for confirmation before overwriting files, useful for automation"),
        )
        .arg(
            Arg::new("events")
                .long("events")
                .action(ArgAction::SetTrue)
                .help("Dump every event of the data chunk instead of the plugin listing."),
        )
        .arg(
            Arg::new("ansi-codec")
                .long("ansi-codec")
                .value_parser(
                    encodings()
                        .iter()
                        .filter(|&e| e.raw_decoder().is_ascii_compatible())
                        .map(|e| e.name())
                        .collect::<Vec<&'static str>>(),
                )
                .default_value(encoding::all::ASCII.name())
                .help("Codec used for strings that are neither valid UTF-16LE nor UTF-8."),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .action(ArgAction::Count)
                .help(indoc!(
                    "-v - info, -vv - debug, -vvv - trace.
                     trace output is only available in debug builds, as it is extremely verbose"
                )),
        )
}

fn main() {
    let matches = command().get_matches();

    let app = match FlpDump::from_cli_matches(&matches) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("{:#}", e);
            exit(1)
        }
    };

    match app.run() {
        Ok(true) => {}
        Ok(false) => exit(1),
        Err(e) => {
            eprintln!("{:#}", e);
            exit(1)
        }
    }
}
