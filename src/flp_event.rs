use serde::Serialize;

/// Event ids this crate gives a name to.
///
/// The id byte also selects the framing of the event, see [`Framing`].
pub mod event_id {
    /// Extra VST plugin info blob.
    pub const VST_PLUGIN_INFO: u8 = 0x35;
    /// Plugin file name (8-bit length prefix).
    pub const PLUGIN_FILENAME: u8 = 0x58;
    /// Generic text event.
    pub const TEXT: u8 = 0xC0;
    pub const PLUGIN_NAME: u8 = 0xC9;
    pub const PLUGIN_PATH: u8 = 0xCA;
    pub const PLUGIN_VENDOR: u8 = 0xCB;
    /// Generic data event.
    pub const DATA: u8 = 0xD0;

    /// Human readable name of a known event id.
    pub fn name(id: u8) -> Option<&'static str> {
        match id {
            VST_PLUGIN_INFO => Some("VstPluginInfo"),
            PLUGIN_FILENAME => Some("PluginFilename"),
            TEXT => Some("Text"),
            PLUGIN_NAME => Some("PluginName"),
            PLUGIN_PATH => Some("PluginPath"),
            PLUGIN_VENDOR => Some("PluginVendor"),
            DATA => Some("Data"),
            _ => None,
        }
    }
}

/// How the payload of an event is laid out on disk. Determined by the id byte alone.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum Framing {
    /// `[0, 64)`: the event is its id, no payload.
    Bare,
    /// `[64, 128)`: `u8` length followed by the payload.
    ShortPrefixed,
    /// `[128, 192)`: exactly four payload bytes.
    Dword,
    /// `[192, 256)`: `u32` little-endian length followed by the payload.
    LongPrefixed,
}

impl Framing {
    pub fn from_event_id(id: u8) -> Self {
        match id {
            0..=63 => Framing::Bare,
            64..=127 => Framing::ShortPrefixed,
            128..=191 => Framing::Dword,
            _ => Framing::LongPrefixed,
        }
    }

    /// Number of length-prefix bytes between the id and the payload.
    pub fn prefix_len(self) -> u64 {
        match self {
            Framing::Bare | Framing::Dword => 0,
            Framing::ShortPrefixed => 1,
            Framing::LongPrefixed => 4,
        }
    }
}

/// A single tokenized event from the data chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawEvent {
    pub id: u8,
    /// Offset of the id byte, relative to the start of the file.
    pub offset: u64,
    pub payload: Vec<u8>,
}

impl RawEvent {
    pub fn framing(&self) -> Framing {
        Framing::from_event_id(self.id)
    }

    /// Bytes this event occupies in the data chunk (id, length prefix and payload).
    pub fn encoded_len(&self) -> u64 {
        1 + self.framing().prefix_len() + self.payload.len() as u64
    }

    pub fn name(&self) -> Option<&'static str> {
        event_id::name(self.id)
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}
