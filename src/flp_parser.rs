use std::fmt::{self, Debug, Formatter};
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;

use encoding::EncodingRef;
use encoding::all::ASCII;
use log::{debug, trace, warn};
use serde::Serialize;

use crate::err::{FlpError, Result};
use crate::flp_event::{Framing, RawEvent};
use crate::flp_file_header::FlpFileHeader;
use crate::plugin::{PluginReconstructor, PluginRecord};
use crate::utils::hexdump;
use crate::utils::read_ext::{OffsetReader, ReadExt};
use crate::version::format_version;

/// Substrings marking internal channel/window labels rather than plugin names.
pub const DEFAULT_EXCLUDED_NAMES: &[&str] = &["pattern", "mixer", "master"];
/// Substrings marking a path as a plugin binary.
pub const DEFAULT_PLUGIN_EXTENSIONS: &[&str] = &[".dll", ".vst", ".vst3", ".so", ".component"];

#[derive(Clone)]
pub struct ParserSettings {
    /// Codec used for strings that are not valid in their sniffed encoding.
    ansi_codec: EncodingRef,
    excluded_names: Vec<String>,
    plugin_extensions: Vec<String>,
}

impl Debug for ParserSettings {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("ParserSettings")
            .field("ansi_codec", &self.ansi_codec.name())
            .field("excluded_names", &self.excluded_names)
            .field("plugin_extensions", &self.plugin_extensions)
            .finish()
    }
}

impl PartialEq for ParserSettings {
    fn eq(&self, other: &ParserSettings) -> bool {
        self.ansi_codec.name() == other.ansi_codec.name()
            && self.excluded_names == other.excluded_names
            && self.plugin_extensions == other.plugin_extensions
    }
}

impl Default for ParserSettings {
    fn default() -> Self {
        ParserSettings {
            ansi_codec: ASCII,
            excluded_names: DEFAULT_EXCLUDED_NAMES.iter().map(|s| s.to_string()).collect(),
            plugin_extensions: DEFAULT_PLUGIN_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl ParserSettings {
    pub fn new() -> Self {
        ParserSettings::default()
    }

    /// Sets the fallback codec for strings that fail to decode as UTF-16LE / UTF-8.
    pub fn ansi_codec(mut self, encoding: EncodingRef) -> Self {
        self.ansi_codec = encoding;
        self
    }

    /// Replaces the case-insensitive substrings that disqualify a plugin name.
    pub fn excluded_names(mut self, names: Vec<String>) -> Self {
        self.excluded_names = names.into_iter().map(|n| n.to_lowercase()).collect();
        self
    }

    /// Replaces the case-insensitive substrings a plugin path must contain.
    pub fn plugin_extensions(mut self, extensions: Vec<String>) -> Self {
        self.plugin_extensions = extensions.into_iter().map(|e| e.to_lowercase()).collect();
        self
    }

    pub fn get_ansi_codec(&self) -> EncodingRef {
        self.ansi_codec
    }

    pub fn get_excluded_names(&self) -> &[String] {
        &self.excluded_names
    }

    pub fn get_plugin_extensions(&self) -> &[String] {
        &self.plugin_extensions
    }
}

/// Everything extracted from a project file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseOutcome {
    pub format_version: u16,
    pub plugins: Vec<PluginRecord>,
}

impl ParseOutcome {
    /// Display form of the format version, see [`format_version`].
    pub fn display_version(&self) -> String {
        format_version(u32::from(self.format_version))
    }
}

/// Streaming parser over a single FLP file.
///
/// Construction validates the header chunk and the data chunk header, so the format
/// version is known before any event is read. The event stream is then consumed
/// strictly forward, one event at a time.
pub struct FlpParser<T: Read> {
    data: OffsetReader<T>,
    header: FlpFileHeader,
    config: ParserSettings,
}

impl<T: Read> Debug for FlpParser<T> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("FlpParser")
            .field("header", &self.header)
            .field("config", &self.config)
            .finish()
    }
}

impl FlpParser<BufReader<File>> {
    /// Opens the file at `path` and reads its headers.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|source| FlpError::FailedToOpenFile {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_read(BufReader::new(f))
    }
}

impl FlpParser<Cursor<Vec<u8>>> {
    pub fn from_buffer(buffer: Vec<u8>) -> Result<Self> {
        Self::from_read(Cursor::new(buffer))
    }
}

impl<T: Read> FlpParser<T> {
    /// Reads the headers from `read`, which must be positioned at the start of the file.
    pub fn from_read(read: T) -> Result<Self> {
        let mut data = OffsetReader::new(read);
        let header = FlpFileHeader::from_stream(&mut data)?;

        Ok(FlpParser {
            data,
            header,
            config: ParserSettings::default(),
        })
    }

    pub fn with_configuration(mut self, configuration: ParserSettings) -> Self {
        self.config = configuration;
        self
    }

    pub fn header(&self) -> &FlpFileHeader {
        &self.header
    }

    pub fn format_version(&self) -> u16 {
        self.header.format_version
    }

    /// Lazily tokenizes the data chunk.
    pub fn events(self) -> IterEvents<T> {
        IterEvents {
            data: self.data,
            data_size: u64::from(self.header.data_size),
            consumed: 0,
            exhausted: false,
        }
    }

    /// Reads the whole event stream, reconstructing the plugins it references.
    ///
    /// Ending before the declared data size is tolerated; a frame that cannot be read
    /// in full is not.
    pub fn parse(self) -> Result<ParseOutcome> {
        let format_version = self.header.format_version;
        let config = self.config.clone();
        let mut reconstructor = PluginReconstructor::new(&config);

        for event in self.events() {
            let event = event?;
            if !event.is_empty() {
                reconstructor.feed(&event);
            }
        }

        let plugins = reconstructor.into_plugins();
        debug!("Reconstructed {} plugins", plugins.len());

        Ok(ParseOutcome {
            format_version,
            plugins,
        })
    }
}

/// Iterator over the events of the data chunk.
///
/// Yields `Err` once, on the first frame that cannot be read in full, and ends after that.
pub struct IterEvents<T: Read> {
    data: OffsetReader<T>,
    data_size: u64,
    consumed: u64,
    exhausted: bool,
}

impl<T: Read> IterEvents<T> {
    /// Bytes of the data chunk consumed so far, including ids and length prefixes.
    pub fn bytes_consumed(&self) -> u64 {
        self.consumed
    }

    fn truncated(&self, event_id: u8, offset: u64, need: u64, have: u64) -> FlpError {
        FlpError::TruncatedEvent {
            event_id,
            offset,
            need,
            have,
        }
    }

    fn read_event(&mut self) -> Result<Option<RawEvent>> {
        let offset = self.data.offset();
        let id = match self.data.next_byte() {
            Ok(Some(id)) => id,
            Ok(None) => {
                warn!(
                    "Data chunk declares {} bytes, stream ended after {}",
                    self.data_size, self.consumed
                );
                return Ok(None);
            }
            Err(source) => {
                return Err(FlpError::FailedToRead {
                    what: "event id",
                    offset,
                    source,
                });
            }
        };
        self.consumed += 1;

        let framing = Framing::from_event_id(id);
        let len = match framing {
            Framing::Bare => 0,
            Framing::Dword => 4,
            Framing::ShortPrefixed => match self.data.next_byte() {
                Ok(Some(len)) => u64::from(len),
                Ok(None) => return Err(self.truncated(id, offset, 1, 0)),
                Err(source) => {
                    return Err(FlpError::FailedToRead {
                        what: "event length",
                        offset: offset + 1,
                        source,
                    });
                }
            },
            Framing::LongPrefixed => {
                let prefix = self
                    .data
                    .read_up_to(4)
                    .map_err(|source| FlpError::FailedToRead {
                        what: "event length",
                        offset: offset + 1,
                        source,
                    })?;
                match <[u8; 4]>::try_from(prefix.as_slice()) {
                    Ok(bytes) => u64::from(u32::from_le_bytes(bytes)),
                    Err(_) => return Err(self.truncated(id, offset, 4, prefix.len() as u64)),
                }
            }
        };
        self.consumed += framing.prefix_len();

        let payload = self
            .data
            .read_up_to(len)
            .map_err(|source| FlpError::FailedToRead {
                what: "event payload",
                offset: self.data.offset(),
                source,
            })?;
        if (payload.len() as u64) < len {
            return Err(self.truncated(id, offset, len, payload.len() as u64));
        }
        self.consumed += len;

        trace!(
            "Offset {}: event 0x{:02x} ({:?}), {} payload bytes\n{}",
            offset,
            id,
            framing,
            len,
            hexdump(&payload, offset + 1 + framing.prefix_len())
        );

        Ok(Some(RawEvent {
            id,
            offset,
            payload,
        }))
    }
}

impl<T: Read> Iterator for IterEvents<T> {
    type Item = Result<RawEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }

        if self.consumed >= self.data_size {
            if self.consumed > self.data_size {
                warn!(
                    "Last event overran the data chunk ({} bytes consumed, {} declared)",
                    self.consumed, self.data_size
                );
            }
            self.exhausted = true;
            return None;
        }

        match self.read_event() {
            Ok(Some(event)) => Some(Ok(event)),
            Ok(None) => {
                self.exhausted = true;
                None
            }
            Err(e) => {
                self.exhausted = true;
                Some(Err(e))
            }
        }
    }
}

/// Parses a whole project from `read` with the default settings.
pub fn parse_project<T: Read>(read: T) -> Result<ParseOutcome> {
    FlpParser::from_read(read)?.parse()
}
