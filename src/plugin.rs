use log::debug;
use serde::Serialize;

use crate::ParserSettings;
use crate::err::{EventDecodeError, EventDecodeResult};
use crate::flp_event::{RawEvent, event_id};
use crate::utils::decode_string;

/// A plugin referenced by the project.
///
/// FLP files have no explicit plugin record: name, path and vendor arrive as separate
/// events, so any of the fields may be missing.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct PluginRecord {
    pub name: Option<String>,
    pub path: Option<String>,
    pub vendor: Option<String>,
}

impl PluginRecord {
    fn with_name(name: String) -> Self {
        PluginRecord {
            name: Some(name),
            ..Default::default()
        }
    }

    fn with_path(path: String) -> Self {
        PluginRecord {
            path: Some(path),
            ..Default::default()
        }
    }
}

/// The meaning of a string event, after decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginEvent {
    Name(String),
    Path(String),
    Vendor(String),
}

impl PluginEvent {
    /// Decodes the payload of `event` if its id is one of the plugin string events.
    ///
    /// Returns `Ok(None)` for every other id.
    pub fn from_raw(
        event: &RawEvent,
        settings: &ParserSettings,
    ) -> EventDecodeResult<Option<Self>> {
        let make: fn(String) -> PluginEvent = match event.id {
            event_id::TEXT | event_id::PLUGIN_NAME => PluginEvent::Name,
            event_id::PLUGIN_PATH | event_id::PLUGIN_FILENAME => PluginEvent::Path,
            event_id::PLUGIN_VENDOR => PluginEvent::Vendor,
            _ => return Ok(None),
        };

        Ok(Some(make(decode_event_string(event, settings)?)))
    }
}

/// Decodes the payload of a string event.
pub fn decode_event_string(
    event: &RawEvent,
    settings: &ParserSettings,
) -> EventDecodeResult<String> {
    if event.payload.is_empty() {
        return Err(EventDecodeError::NotAStringEvent { event_id: event.id });
    }

    let codec = settings.get_ansi_codec();
    decode_string(&event.payload, codec).map_err(|reason| EventDecodeError::Undecodable {
        event_id: event.id,
        codec: codec.name(),
        reason,
    })
}

/// Whether `name` looks like the name of a plugin rather than a channel or window label.
pub fn is_plugin_name(name: &str, settings: &ParserSettings) -> bool {
    if name.chars().count() <= 1 {
        return false;
    }

    let lower = name.to_lowercase();
    !settings
        .get_excluded_names()
        .iter()
        .any(|excluded| lower.contains(excluded.as_str()))
}

/// Whether `path` points at a plugin binary.
///
/// This is a substring test, not a suffix test: bundle paths such as
/// `Serum.vst3/Contents/x86_64-win/Serum.vst3` qualify as well.
pub fn is_plugin_path(path: &str, settings: &ParserSettings) -> bool {
    if path.is_empty() {
        return false;
    }

    let lower = path.to_lowercase();
    settings
        .get_plugin_extensions()
        .iter()
        .any(|ext| lower.contains(ext.as_str()))
}

/// Folds decoded plugin events into [`PluginRecord`]s.
///
/// Grouping is positional: the last record is the open one. A name always opens a new
/// record, a path fills the open record unless it already has one, and a vendor is
/// attached to the open record.
#[derive(Debug)]
pub struct PluginReconstructor<'a> {
    settings: &'a ParserSettings,
    plugins: Vec<PluginRecord>,
}

impl<'a> PluginReconstructor<'a> {
    pub fn new(settings: &'a ParserSettings) -> Self {
        PluginReconstructor {
            settings,
            plugins: Vec::new(),
        }
    }

    /// Feeds a single raw event. Events without payload or with an id that carries no
    /// plugin information are ignored. Undecodable events are logged and dropped.
    pub fn feed(&mut self, event: &RawEvent) {
        if event.is_empty() {
            return;
        }

        // A vendor never opens a record, no need to decode it.
        if event.id == event_id::PLUGIN_VENDOR && self.plugins.is_empty() {
            return;
        }

        match PluginEvent::from_raw(event, self.settings) {
            Ok(Some(plugin_event)) => self.apply(plugin_event),
            Ok(None) => {}
            Err(e) => debug!("Offset {}: dropping event: {}", event.offset, e),
        }
    }

    /// Applies an already decoded event.
    pub fn apply(&mut self, event: PluginEvent) {
        match event {
            PluginEvent::Name(name) => {
                if is_plugin_name(&name, self.settings) {
                    debug!("Found plugin name: {}", name);
                    self.plugins.push(PluginRecord::with_name(name));
                }
            }
            PluginEvent::Path(path) => {
                if !is_plugin_path(&path, self.settings) {
                    return;
                }
                match self.plugins.last_mut() {
                    Some(open) if open.path.is_none() => {
                        debug!("Added path to plugin: {}", path);
                        open.path = Some(path);
                    }
                    _ => {
                        debug!("Found plugin path: {}", path);
                        self.plugins.push(PluginRecord::with_path(path));
                    }
                }
            }
            PluginEvent::Vendor(vendor) => {
                if let Some(open) = self.plugins.last_mut() {
                    debug!("Added vendor to plugin: {}", vendor);
                    open.vendor = Some(vendor);
                }
            }
        }
    }

    pub fn into_plugins(self) -> Vec<PluginRecord> {
        self.plugins
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn utf16le(s: &str) -> Vec<u8> {
        s.encode_utf16()
            .flat_map(|u| u.to_le_bytes())
            .chain([0, 0])
            .collect()
    }

    fn event(id: u8, s: &str) -> RawEvent {
        RawEvent {
            id,
            offset: 0,
            payload: utf16le(s),
        }
    }

    fn name(s: &str) -> RawEvent {
        event(event_id::PLUGIN_NAME, s)
    }

    fn path(s: &str) -> RawEvent {
        event(event_id::PLUGIN_PATH, s)
    }

    fn vendor(s: &str) -> RawEvent {
        event(event_id::PLUGIN_VENDOR, s)
    }

    fn reconstruct(events: &[RawEvent]) -> Vec<PluginRecord> {
        let settings = ParserSettings::default();
        let mut reconstructor = PluginReconstructor::new(&settings);
        for e in events {
            reconstructor.feed(e);
        }
        reconstructor.into_plugins()
    }

    fn record(name: Option<&str>, path: Option<&str>, vendor: Option<&str>) -> PluginRecord {
        PluginRecord {
            name: name.map(str::to_owned),
            path: path.map(str::to_owned),
            vendor: vendor.map(str::to_owned),
        }
    }

    #[test]
    fn test_name_followed_by_path_is_one_plugin() {
        let plugins = reconstruct(&[name("Foo"), path("C:/Foo.dll")]);
        assert_eq!(plugins, vec![record(Some("Foo"), Some("C:/Foo.dll"), None)]);
    }

    #[test]
    fn test_consecutive_paths_are_separate_plugins() {
        let plugins = reconstruct(&[path("a.dll"), path("b.vst3")]);
        assert_eq!(
            plugins,
            vec![
                record(None, Some("a.dll"), None),
                record(None, Some("b.vst3"), None)
            ]
        );
    }

    #[test]
    fn test_vendor_attaches_to_last_plugin() {
        let plugins = reconstruct(&[
            name("Serum"),
            path("C:/VST/Serum_x64.dll"),
            vendor("Xfer Records"),
            name("Vital"),
            vendor("Vital Audio"),
        ]);
        assert_eq!(
            plugins,
            vec![
                record(Some("Serum"), Some("C:/VST/Serum_x64.dll"), Some("Xfer Records")),
                record(Some("Vital"), None, Some("Vital Audio")),
            ]
        );
    }

    #[test]
    fn test_vendor_without_plugin_is_ignored() {
        let plugins = reconstruct(&[vendor("Xfer Records"), name("Serum")]);
        assert_eq!(plugins, vec![record(Some("Serum"), None, None)]);
    }

    #[test]
    fn test_later_vendor_overwrites() {
        let plugins = reconstruct(&[name("Serum"), vendor("Xfer"), vendor("Xfer Records")]);
        assert_eq!(plugins[0].vendor.as_deref(), Some("Xfer Records"));
    }

    #[test]
    fn test_excluded_names_never_open_a_plugin() {
        for label in ["Mixer", "MIXER", "mixer", "Pattern 1", "Master", "Insert master 2"] {
            let plugins = reconstruct(&[name(label), vendor("Image-Line")]);
            assert!(plugins.is_empty(), "`{}` should not produce a plugin", label);
        }
    }

    #[test]
    fn test_excluded_name_does_not_steal_the_path() {
        let plugins = reconstruct(&[name("Serum"), name("Mixer"), path("Serum.dll")]);
        assert_eq!(plugins, vec![record(Some("Serum"), Some("Serum.dll"), None)]);
    }

    #[test]
    fn test_single_character_names_are_rejected() {
        let plugins = reconstruct(&[name("X"), name(" Y "), name("")]);
        assert!(plugins.is_empty());
    }

    #[test]
    fn test_unicode_whitespace_counts_towards_name_length() {
        let plugins = reconstruct(&[name("\u{3000}X"), name("\u{3000}")]);
        assert_eq!(plugins, vec![record(Some("\u{3000}X"), None, None)]);
    }

    #[test]
    fn test_name_always_opens_a_new_plugin() {
        let plugins = reconstruct(&[name("Serum"), name("Serum")]);
        assert_eq!(plugins.len(), 2);
    }

    #[test]
    fn test_path_after_complete_plugin_opens_nameless_plugin() {
        let plugins = reconstruct(&[name("Serum"), path("Serum.dll"), path("Vital.vst3")]);
        assert_eq!(
            plugins,
            vec![
                record(Some("Serum"), Some("Serum.dll"), None),
                record(None, Some("Vital.vst3"), None),
            ]
        );
    }

    #[test]
    fn test_non_plugin_paths_are_ignored() {
        let plugins = reconstruct(&[name("Serum"), path("C:/Samples/kick.wav")]);
        assert_eq!(plugins, vec![record(Some("Serum"), None, None)]);
    }

    #[test]
    fn test_filename_and_text_events_are_recognised() {
        let filename = RawEvent {
            id: event_id::PLUGIN_FILENAME,
            offset: 0,
            payload: b"Sytrus.so".to_vec(),
        };
        let plugins = reconstruct(&[event(event_id::TEXT, "Sytrus"), filename]);
        assert_eq!(plugins, vec![record(Some("Sytrus"), Some("Sytrus.so"), None)]);
    }

    #[test]
    fn test_unrelated_and_empty_events_are_ignored() {
        let empty_name = RawEvent {
            id: event_id::PLUGIN_NAME,
            offset: 0,
            payload: vec![],
        };
        let plugins = reconstruct(&[
            event(event_id::DATA, "Serum"),
            event(0x42, "Serum.dll"),
            empty_name,
            name("Vital"),
        ]);
        assert_eq!(plugins, vec![record(Some("Vital"), None, None)]);
    }

    #[test]
    fn test_path_filter_accepts_all_plugin_extensions() {
        let settings = ParserSettings::default();
        for p in [
            "C:\\VST\\Serum_x64.DLL",
            "/Library/Audio/Plug-Ins/VST/Serum.vst",
            "/Library/Audio/Plug-Ins/VST3/Serum.vst3",
            "/usr/lib/vst/Surge.so",
            "/Library/Audio/Plug-Ins/Components/Serum.component",
            "C:/Program Files/Common Files/VST3/Serum.vst3/Contents/x86_64-win/Serum.vst3",
        ] {
            assert!(is_plugin_path(p, &settings), "{}", p);
        }
        assert!(!is_plugin_path("", &settings));
        assert!(!is_plugin_path("C:/Samples/loop.wav", &settings));
    }

    #[test]
    fn test_custom_excluded_names() {
        let settings = ParserSettings::default().excluded_names(vec!["sampler".to_owned()]);
        assert!(!is_plugin_name("Audio Sampler", &settings));
        assert!(is_plugin_name("Mixer", &settings));
    }

    #[test]
    fn test_from_raw_classifies_events() {
        let settings = ParserSettings::default();
        assert_eq!(
            PluginEvent::from_raw(&vendor("Xfer"), &settings).unwrap(),
            Some(PluginEvent::Vendor("Xfer".to_owned()))
        );
        assert_eq!(
            PluginEvent::from_raw(&event(event_id::DATA, "Xfer"), &settings).unwrap(),
            None
        );
    }

    #[test]
    fn test_empty_payload_is_a_decode_error() {
        let settings = ParserSettings::default();
        let e = RawEvent {
            id: event_id::PLUGIN_NAME,
            offset: 0,
            payload: vec![],
        };
        assert!(matches!(
            PluginEvent::from_raw(&e, &settings),
            Err(EventDecodeError::NotAStringEvent { event_id: 0xC9 })
        ));
    }
}
