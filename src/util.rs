/// Render a byte buffer as a classic 16-per-line hex dump for trace logs.
///
/// Pure formatting for operator visibility; cannot affect the session.
pub fn hexdump(buf: &[u8]) -> String {
    let mut out = String::new();
    for (line, chunk) in buf.chunks(16).enumerate() {
        out.push_str(&format!("{:08x}  ", line * 16));
        for (i, byte) in chunk.iter().enumerate() {
            out.push_str(&format!("{byte:02x} "));
            if i == 7 {
                out.push(' ');
            }
        }
        for i in chunk.len()..16 {
            out.push_str("   ");
            if i == 7 {
                out.push(' ');
            }
        }
        out.push(' ');
        for byte in chunk {
            out.push(if byte.is_ascii_graphic() || *byte == b' ' {
                *byte as char
            } else {
                '.'
            });
        }
        if line * 16 + chunk.len() < buf.len() {
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hexdump_formats_offsets_hex_and_ascii() {
        let dump = hexdump(b"USB/IP\x00\x01");
        assert!(dump.starts_with("00000000  55 53 42 2f 49 50 00 01"));
        assert!(dump.ends_with("USB/IP.."));
    }

    #[test]
    fn hexdump_splits_lines_every_16_bytes() {
        let dump = hexdump(&[0u8; 17]);
        let lines: Vec<_> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("00000010  00"));
    }

    #[test]
    fn hexdump_of_empty_buffer_is_empty() {
        assert_eq!(hexdump(&[]), "");
    }
}
