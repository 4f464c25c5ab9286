//! Incremental MurmurHash3 (x86 32-bit, x86 128-bit, x64 128-bit), seed 0.
//!
//! The published `murmur3` crate hashes a whole reader in one shot, which
//! does not fit a digest that must absorb bytes incrementally and be
//! snapshotted mid-stream; these states follow the reference algorithm and
//! buffer at most one block of tail bytes. The crate serves as a test
//! oracle for the 32-bit variant.

use super::Checksum;

fn fmix32(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}

fn fmix64(mut h: u64) -> u64 {
    h ^= h >> 33;
    h = h.wrapping_mul(0xff51_afd7_ed55_8ccd);
    h ^= h >> 33;
    h = h.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    h ^= h >> 33;
    h
}

pub(super) struct Murmur32 {
    h1: u32,
    tail: [u8; 4],
    tail_len: usize,
    total: u64,
}

impl Murmur32 {
    const C1: u32 = 0xcc9e_2d51;
    const C2: u32 = 0x1b87_3593;

    pub(super) fn new() -> Self {
        Self {
            h1: 0,
            tail: [0; 4],
            tail_len: 0,
            total: 0,
        }
    }

    fn mix(&mut self, block: [u8; 4]) {
        let mut k1 = u32::from_le_bytes(block);
        k1 = k1.wrapping_mul(Self::C1);
        k1 = k1.rotate_left(15);
        k1 = k1.wrapping_mul(Self::C2);
        self.h1 ^= k1;
        self.h1 = self.h1.rotate_left(13);
        self.h1 = self.h1.wrapping_mul(5).wrapping_add(0xe654_6b64);
    }
}

impl Checksum for Murmur32 {
    fn update(&mut self, mut data: &[u8]) {
        self.total += data.len() as u64;
        if self.tail_len > 0 {
            let take = (4 - self.tail_len).min(data.len());
            self.tail[self.tail_len..self.tail_len + take].copy_from_slice(&data[..take]);
            self.tail_len += take;
            data = &data[take..];
            if self.tail_len < 4 {
                return;
            }
            let block = self.tail;
            self.mix(block);
            self.tail_len = 0;
        }
        let mut blocks = data.chunks_exact(4);
        for block in &mut blocks {
            self.mix(block.try_into().unwrap());
        }
        let rest = blocks.remainder();
        self.tail[..rest.len()].copy_from_slice(rest);
        self.tail_len = rest.len();
    }

    fn sum(&self) -> Vec<u8> {
        let mut h1 = self.h1;
        if self.tail_len > 0 {
            let mut k1 = 0u32;
            for i in (0..self.tail_len).rev() {
                k1 = (k1 << 8) | u32::from(self.tail[i]);
            }
            k1 = k1.wrapping_mul(Self::C1);
            k1 = k1.rotate_left(15);
            k1 = k1.wrapping_mul(Self::C2);
            h1 ^= k1;
        }
        h1 ^= self.total as u32;
        fmix32(h1).to_be_bytes().to_vec()
    }

    fn reset(&mut self) {
        *self = Self::new();
    }

    fn size(&self) -> usize {
        4
    }
}

pub(super) struct Murmur128x86 {
    state: [u32; 4],
    tail: [u8; 16],
    tail_len: usize,
    total: u64,
}

impl Murmur128x86 {
    const C: [u32; 4] = [0x239b_961b, 0xab0c_c77c, 0x38b3_4ae5, 0xa1e3_8b93];

    pub(super) fn new() -> Self {
        Self {
            state: [0; 4],
            tail: [0; 16],
            tail_len: 0,
            total: 0,
        }
    }

    fn mix(&mut self, block: &[u8]) {
        let [mut h1, mut h2, mut h3, mut h4] = self.state;
        let k1 = u32::from_le_bytes(block[0..4].try_into().unwrap());
        let k2 = u32::from_le_bytes(block[4..8].try_into().unwrap());
        let k3 = u32::from_le_bytes(block[8..12].try_into().unwrap());
        let k4 = u32::from_le_bytes(block[12..16].try_into().unwrap());

        h1 ^= Self::scramble(k1, 0, 15);
        h1 = h1.rotate_left(19).wrapping_add(h2);
        h1 = h1.wrapping_mul(5).wrapping_add(0x561c_cd1b);

        h2 ^= Self::scramble(k2, 1, 16);
        h2 = h2.rotate_left(17).wrapping_add(h3);
        h2 = h2.wrapping_mul(5).wrapping_add(0x0bca_a747);

        h3 ^= Self::scramble(k3, 2, 17);
        h3 = h3.rotate_left(15).wrapping_add(h4);
        h3 = h3.wrapping_mul(5).wrapping_add(0x96cd_1c35);

        h4 ^= Self::scramble(k4, 3, 18);
        h4 = h4.rotate_left(13).wrapping_add(h1);
        h4 = h4.wrapping_mul(5).wrapping_add(0x32ac_3b17);

        self.state = [h1, h2, h3, h4];
    }

    // k * c[lane] <<< r * c[next lane]
    fn scramble(k: u32, lane: usize, r: u32) -> u32 {
        k.wrapping_mul(Self::C[lane])
            .rotate_left(r)
            .wrapping_mul(Self::C[(lane + 1) % 4])
    }
}

impl Checksum for Murmur128x86 {
    fn update(&mut self, mut data: &[u8]) {
        self.total += data.len() as u64;
        if self.tail_len > 0 {
            let take = (16 - self.tail_len).min(data.len());
            self.tail[self.tail_len..self.tail_len + take].copy_from_slice(&data[..take]);
            self.tail_len += take;
            data = &data[take..];
            if self.tail_len < 16 {
                return;
            }
            let block = self.tail;
            self.mix(&block);
            self.tail_len = 0;
        }
        let mut blocks = data.chunks_exact(16);
        for block in &mut blocks {
            self.mix(block);
        }
        let rest = blocks.remainder();
        self.tail[..rest.len()].copy_from_slice(rest);
        self.tail_len = rest.len();
    }

    fn sum(&self) -> Vec<u8> {
        let [mut h1, mut h2, mut h3, mut h4] = self.state;
        let t = self.tail_len;
        let rotations = [15, 16, 17, 18];

        // Tail lanes mix in reverse declaration order, mirroring the
        // reference fallthrough.
        for lane in (0..4).rev() {
            let lo = lane * 4;
            if t <= lo {
                continue;
            }
            let mut k = 0u32;
            for i in (lo..t.min(lo + 4)).rev() {
                k = (k << 8) | u32::from(self.tail[i]);
            }
            k = Self::scramble(k, lane, rotations[lane]);
            match lane {
                0 => h1 ^= k,
                1 => h2 ^= k,
                2 => h3 ^= k,
                _ => h4 ^= k,
            }
        }

        let len = self.total as u32;
        h1 ^= len;
        h2 ^= len;
        h3 ^= len;
        h4 ^= len;

        h1 = h1.wrapping_add(h2).wrapping_add(h3).wrapping_add(h4);
        h2 = h2.wrapping_add(h1);
        h3 = h3.wrapping_add(h1);
        h4 = h4.wrapping_add(h1);

        h1 = fmix32(h1);
        h2 = fmix32(h2);
        h3 = fmix32(h3);
        h4 = fmix32(h4);

        h1 = h1.wrapping_add(h2).wrapping_add(h3).wrapping_add(h4);
        h2 = h2.wrapping_add(h1);
        h3 = h3.wrapping_add(h1);
        h4 = h4.wrapping_add(h1);

        let mut out = Vec::with_capacity(16);
        for h in [h1, h2, h3, h4] {
            out.extend_from_slice(&h.to_be_bytes());
        }
        out
    }

    fn reset(&mut self) {
        *self = Self::new();
    }

    fn size(&self) -> usize {
        16
    }
}

pub(super) struct Murmur128x64 {
    h1: u64,
    h2: u64,
    tail: [u8; 16],
    tail_len: usize,
    total: u64,
}

impl Murmur128x64 {
    const C1: u64 = 0x87c3_7b91_1142_53d5;
    const C2: u64 = 0x4cf5_ad43_2745_937f;

    pub(super) fn new() -> Self {
        Self {
            h1: 0,
            h2: 0,
            tail: [0; 16],
            tail_len: 0,
            total: 0,
        }
    }

    fn mix(&mut self, block: &[u8]) {
        let mut k1 = u64::from_le_bytes(block[0..8].try_into().unwrap());
        let mut k2 = u64::from_le_bytes(block[8..16].try_into().unwrap());

        k1 = k1.wrapping_mul(Self::C1).rotate_left(31).wrapping_mul(Self::C2);
        self.h1 ^= k1;
        self.h1 = self.h1.rotate_left(27).wrapping_add(self.h2);
        self.h1 = self.h1.wrapping_mul(5).wrapping_add(0x52dc_e729);

        k2 = k2.wrapping_mul(Self::C2).rotate_left(33).wrapping_mul(Self::C1);
        self.h2 ^= k2;
        self.h2 = self.h2.rotate_left(31).wrapping_add(self.h1);
        self.h2 = self.h2.wrapping_mul(5).wrapping_add(0x3849_5ab5);
    }
}

impl Checksum for Murmur128x64 {
    fn update(&mut self, mut data: &[u8]) {
        self.total += data.len() as u64;
        if self.tail_len > 0 {
            let take = (16 - self.tail_len).min(data.len());
            self.tail[self.tail_len..self.tail_len + take].copy_from_slice(&data[..take]);
            self.tail_len += take;
            data = &data[take..];
            if self.tail_len < 16 {
                return;
            }
            let block = self.tail;
            self.mix(&block);
            self.tail_len = 0;
        }
        let mut blocks = data.chunks_exact(16);
        for block in &mut blocks {
            self.mix(block);
        }
        let rest = blocks.remainder();
        self.tail[..rest.len()].copy_from_slice(rest);
        self.tail_len = rest.len();
    }

    fn sum(&self) -> Vec<u8> {
        let mut h1 = self.h1;
        let mut h2 = self.h2;
        let t = self.tail_len;

        if t > 8 {
            let mut k2 = 0u64;
            for i in (8..t).rev() {
                k2 = (k2 << 8) | u64::from(self.tail[i]);
            }
            k2 = k2.wrapping_mul(Self::C2).rotate_left(33).wrapping_mul(Self::C1);
            h2 ^= k2;
        }
        if t > 0 {
            let mut k1 = 0u64;
            for i in (0..t.min(8)).rev() {
                k1 = (k1 << 8) | u64::from(self.tail[i]);
            }
            k1 = k1.wrapping_mul(Self::C1).rotate_left(31).wrapping_mul(Self::C2);
            h1 ^= k1;
        }

        h1 ^= self.total;
        h2 ^= self.total;
        h1 = h1.wrapping_add(h2);
        h2 = h2.wrapping_add(h1);
        h1 = fmix64(h1);
        h2 = fmix64(h2);
        h1 = h1.wrapping_add(h2);
        h2 = h2.wrapping_add(h1);

        let mut out = Vec::with_capacity(16);
        out.extend_from_slice(&h1.to_be_bytes());
        out.extend_from_slice(&h2.to_be_bytes());
        out
    }

    fn reset(&mut self) {
        *self = Self::new();
    }

    fn size(&self) -> usize {
        16
    }
}
