// SPDX-License-Identifier: MIT OR Apache-2.0

/// Reads fixed-width values from fuzzer bytes, yielding zeros once exhausted.
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn next_u8(&mut self) -> u8 {
        let byte = self.data.get(self.pos).copied().unwrap_or(0);
        self.pos = self.pos.saturating_add(1);
        byte
    }

    pub fn next_u16(&mut self) -> u16 {
        u16::from_le_bytes([self.next_u8(), self.next_u8()])
    }

    pub fn next_f64(&mut self) -> f64 {
        let mut bytes = [0u8; 8];
        for byte in &mut bytes {
            *byte = self.next_u8();
        }
        f64::from_le_bytes(bytes)
    }
}

/// Maps `seed` into `min..=max`.
pub fn bounded(seed: u8, min: usize, max: usize) -> usize {
    min + usize::from(seed) % (max - min + 1)
}
