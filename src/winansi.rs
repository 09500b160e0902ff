//! Windows-1252 ("WinAnsiEncoding") for simple PDF fonts.
//!
//! Every byte outside 0x80..=0x9F maps to the code point of the same value.

/// The 0x80..=0x9F slots that carry something other than a C1 control.
const UPPER_CONTROL_SLOTS: [(u8, char); 27] = [
    (0x80, '€'),
    (0x82, '‚'),
    (0x83, 'ƒ'),
    (0x84, '„'),
    (0x85, '…'),
    (0x86, '†'),
    (0x87, '‡'),
    (0x88, 'ˆ'),
    (0x89, '‰'),
    (0x8A, 'Š'),
    (0x8B, '‹'),
    (0x8C, 'Œ'),
    (0x8E, 'Ž'),
    (0x91, '‘'),
    (0x92, '’'),
    (0x93, '“'),
    (0x94, '”'),
    (0x95, '•'),
    (0x96, '–'),
    (0x97, '—'),
    (0x98, '˜'),
    (0x99, '™'),
    (0x9A, 'š'),
    (0x9B, '›'),
    (0x9C, 'œ'),
    (0x9E, 'ž'),
    (0x9F, 'Ÿ'),
];

pub(crate) fn decode_byte(byte: u8) -> char {
    if (0x80..=0x9F).contains(&byte) {
        for (slot, c) in UPPER_CONTROL_SLOTS {
            if slot == byte {
                return c;
            }
        }
    }
    char::from(byte)
}

pub(crate) fn encode_char(c: char) -> Option<u8> {
    match u32::from(c) {
        code @ (0x00..=0x7F | 0xA0..=0xFF) => u8::try_from(code).ok(),
        _ => UPPER_CONTROL_SLOTS
            .iter()
            .find(|(_, mapped)| *mapped == c)
            .map(|(slot, _)| *slot),
    }
}

/// Characters with no WinAnsi slot are left out.
pub(crate) fn encode(text: &str) -> Vec<u8> {
    text.chars().filter_map(encode_char).collect()
}

pub(crate) fn decode(bytes: &[u8]) -> String {
    bytes.iter().copied().map(decode_byte).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typographic_punctuation_survives() {
        let text = "“café” – €5 • ok";
        assert_eq!(decode(&encode(text)), text);
    }

    #[test]
    fn unmapped_chars_are_dropped() {
        assert_eq!(encode("a中b"), b"ab");
        assert_eq!(encode_char('\u{81}'), None);
    }

    #[test]
    fn bullet_has_its_own_slot() {
        assert_eq!(encode_char('•'), Some(0x95));
        assert_eq!(decode_byte(0x95), '•');
    }
}
