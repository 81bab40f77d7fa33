mod hexdump;
pub(crate) mod read_ext;
mod strings;

pub use self::hexdump::{hex_preview, hexdump};
pub use self::strings::{StringEncoding, decode_string, trim};
