use super::structs::{GROUP_BUFFER_SIZE, TELEINFO_CHAR_SPACE};

/// One Teleinfo information group: a label, its value and the checksum byte
/// sent right after them.
///
/// Label and value live in fixed 64 byte buffers. The last byte always stays
/// zero, so at most 63 characters are kept and anything beyond is dropped.
#[derive(Debug, Clone)]
pub struct Group {
    label: [u8; GROUP_BUFFER_SIZE],
    label_len: usize,
    value: [u8; GROUP_BUFFER_SIZE],
    value_len: usize,
    checksum: u8,
}

impl Group {
    pub fn new() -> Self {
        return Group {
            label: [0; GROUP_BUFFER_SIZE],
            label_len: 0,
            value: [0; GROUP_BUFFER_SIZE],
            value_len: 0,
            checksum: 0,
        };
    }

    pub fn reset(&mut self) {
        self.label = [0; GROUP_BUFFER_SIZE];
        self.label_len = 0;
        self.value = [0; GROUP_BUFFER_SIZE];
        self.value_len = 0;
        self.checksum = 0;
    }

    pub fn append_label(&mut self, character: u8) {
        if self.label_len < GROUP_BUFFER_SIZE - 1 {
            self.label[self.label_len] = character;
            self.label_len += 1;
        }
    }

    pub fn append_value(&mut self, character: u8) {
        if self.value_len < GROUP_BUFFER_SIZE - 1 {
            self.value[self.value_len] = character;
            self.value_len += 1;
        }
    }

    pub fn set_checksum(&mut self, character: u8) {
        self.checksum = character;
    }

    pub fn checksum(&self) -> u8 {
        self.checksum
    }

    /// Checksum the meter should have sent for the current label and value.
    ///
    /// The sum runs over both whole buffers, padding included, with one SP
    /// between label and value. Only the six low bits are kept and 0x20 is
    /// added so the result is always printable.
    pub fn expected_checksum(&self) -> u8 {
        let mut sum: u32 = 0;
        for b in self.label.iter() {
            sum += *b as u32;
        }
        sum += TELEINFO_CHAR_SPACE as u32;
        for b in self.value.iter() {
            sum += *b as u32;
        }
        ((sum & 0x3F) + 0x20) as u8
    }

    pub fn is_valid(&self) -> bool {
        self.checksum == self.expected_checksum()
    }

    pub fn label(&self) -> &str {
        as_text(&self.label[..self.label_len])
    }

    pub fn value(&self) -> &str {
        as_text(&self.value[..self.value_len])
    }
}

/// Text up to the first NUL, a NUL received on the line ends the string
fn as_text(buf: &[u8]) -> &str {
    let end = buf.iter().position(|b| *b == 0).unwrap_or(buf.len());
    std::str::from_utf8(&buf[..end]).unwrap_or("")
}

impl Default for Group {
    fn default() -> Self {
        Self::new()
    }
}
