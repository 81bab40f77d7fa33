#![deny(unused_must_use)]
#![forbid(unsafe_code)]
//! A streaming parser for FL Studio project files (`.flp`).
//!
//! An FLP file is a `FLhd` header chunk followed by a `FLdt` data chunk holding a flat stream
//! of events. This crate reads the project format version and reconstructs the plugins a
//! project references from the name, path and vendor events scattered through that stream.
//!
//! ```no_run
//! use flp::{FlpParser, format_version};
//!
//! let parser = FlpParser::from_path("project.flp").unwrap();
//! println!("FL Studio {}", format_version(u32::from(parser.format_version())));
//!
//! for plugin in parser.parse().unwrap().plugins {
//!     println!("{:?} {:?}", plugin.name, plugin.path);
//! }
//! ```
//!
//! The raw events are available as well:
//!
//! ```no_run
//! use flp::FlpParser;
//!
//! let parser = FlpParser::from_path("project.flp").unwrap();
//! for event in parser.events() {
//!     let event = event.unwrap();
//!     println!("0x{:02x} {:?} {} bytes", event.id, event.name(), event.payload.len());
//! }
//! ```

pub use flp_event::{Framing, RawEvent, event_id};
pub use flp_file_header::{FLP_DATA_MAGIC, FLP_HEADER_MAGIC, FlpFileHeader};
pub use flp_parser::{
    DEFAULT_EXCLUDED_NAMES, DEFAULT_PLUGIN_EXTENSIONS, FlpParser, IterEvents, ParseOutcome,
    ParserSettings, parse_project,
};
pub use plugin::{PluginEvent, PluginReconstructor, PluginRecord};
pub use version::format_version;

pub mod err;
pub mod plugin;
pub mod utils;

mod flp_event;
mod flp_file_header;
mod flp_parser;
mod version;

// For tests, we only initialize logging once.
#[cfg(test)]
use std::sync::Once;

#[cfg(test)]
static LOGGER_INIT: Once = Once::new();

// Rust runs the tests concurrently, so unless we synchronize logging access
// it will crash when attempting to run `cargo test` with some logging facilities.
#[cfg(test)]
pub fn ensure_env_logger_initialized() {
    use std::io::Write;

    LOGGER_INIT.call_once(|| {
        let mut builder = env_logger::Builder::from_default_env();
        builder
            .format(|buf, record| writeln!(buf, "[{}] - {}", record.level(), record.args()))
            .is_test(true)
            .init();
    });
}
