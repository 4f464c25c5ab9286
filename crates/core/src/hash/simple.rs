//! Trivial catalog members: the null digest and the additive checksums.

use super::Checksum;

/// Accepts any input and always produces four zero bytes.
pub(super) struct NoHash;

impl Checksum for NoHash {
    fn update(&mut self, _data: &[u8]) {}

    fn sum(&self) -> Vec<u8> {
        vec![0; 4]
    }

    fn reset(&mut self) {}

    fn size(&self) -> usize {
        4
    }
}

/// Wrapping byte sum, emitted big-endian.
pub(super) struct Sum32(u32);

impl Sum32 {
    pub(super) fn new() -> Self {
        Self(0)
    }
}

impl Checksum for Sum32 {
    fn update(&mut self, data: &[u8]) {
        for &b in data {
            self.0 = self.0.wrapping_add(u32::from(b));
        }
    }

    fn sum(&self) -> Vec<u8> {
        self.0.to_be_bytes().to_vec()
    }

    fn reset(&mut self) {
        self.0 = 0;
    }

    fn size(&self) -> usize {
        4
    }
}

/// Wrapping byte sum, emitted big-endian.
pub(super) struct Sum64(u64);

impl Sum64 {
    pub(super) fn new() -> Self {
        Self(0)
    }
}

impl Checksum for Sum64 {
    fn update(&mut self, data: &[u8]) {
        for &b in data {
            self.0 = self.0.wrapping_add(u64::from(b));
        }
    }

    fn sum(&self) -> Vec<u8> {
        self.0.to_be_bytes().to_vec()
    }

    fn reset(&mut self) {
        self.0 = 0;
    }

    fn size(&self) -> usize {
        8
    }
}
