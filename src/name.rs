//! Account names travel as 64-bit packed integers in table cursors.

const CHARMAP: &[u8; 32] = b".12345abcdefghijklmnopqrstuvwxyz";

/// Converts between account names and their on-chain numeric form.
pub trait NameCodec: Send + Sync {
    fn encode(&self, name: &str) -> u64;
    fn decode(&self, value: u64) -> String;
}

/// Base-32 packing: twelve 5-bit symbols followed by one 4-bit symbol.
#[derive(Debug, Default, Clone, Copy)]
pub struct PackedName;

fn symbol_value(ch: u8) -> u64 {
    match ch {
        b'a'..=b'z' => (ch - b'a' + 6) as u64,
        b'1'..=b'5' => (ch - b'1' + 1) as u64,
        _ => 0,
    }
}

impl NameCodec for PackedName {
    fn encode(&self, name: &str) -> u64 {
        let bytes = name.as_bytes();
        let mut value = 0u64;
        for (idx, ch) in bytes.iter().take(12).enumerate() {
            value |= (symbol_value(*ch) & 0x1f) << (64 - 5 * (idx + 1));
        }
        if let Some(ch) = bytes.get(12) {
            value |= symbol_value(*ch) & 0x0f;
        }
        value
    }

    fn decode(&self, value: u64) -> String {
        let mut out = [b'.'; 13];
        let mut tmp = value;
        for idx in 0..13 {
            let (mask, shift) = if idx == 0 { (0x0f, 4) } else { (0x1f, 5) };
            out[12 - idx] = CHARMAP[(tmp & mask) as usize];
            tmp >>= shift;
        }
        String::from_utf8_lossy(&out)
            .trim_end_matches('.')
            .to_string()
    }
}
