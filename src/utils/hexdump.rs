use std::fmt::Write;

const BYTES_PER_LINE: usize = 16;

/// Renders `data` in canonical hex+ASCII form (like `hexdump -C`), one line per 16 bytes.
/// `offset` is added to the addresses printed in the first column.
pub fn hexdump(data: &[u8], offset: u64) -> String {
    let mut out = String::new();

    for (i, line) in data.chunks(BYTES_PER_LINE).enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let address = offset + (i * BYTES_PER_LINE) as u64;
        let _ = write!(out, "{:08x}:", address);

        for b in line {
            let _ = write!(out, " {:02x}", b);
        }

        // align the ASCII column on short lines
        for _ in line.len()..BYTES_PER_LINE {
            out.push_str("   ");
        }

        out.push_str("  |");
        for &b in line {
            // replace all control and non-ascii chars with dots
            if b.is_ascii_graphic() || b == b' ' {
                out.push(b as char);
            } else {
                out.push('.');
            }
        }
        out.push('|');
    }

    out
}

/// Single line hex preview of at most `limit` bytes, used in log messages.
pub fn hex_preview(data: &[u8], limit: usize) -> String {
    let mut out = String::with_capacity(limit.min(data.len()) * 3);
    for (i, b) in data.iter().take(limit).enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{:02x}", b);
    }
    if data.len() > limit {
        out.push_str(" ..");
    }
    out
}
