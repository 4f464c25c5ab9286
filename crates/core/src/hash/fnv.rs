//! Incremental Fowler–Noll–Vo hashes, FNV-1 and FNV-1a, in 32/64/128-bit
//! widths.
//!
//! The published `fnv` crate only exposes a 64-bit FNV-1a `Hasher` for hash
//! maps, so the catalog carries its own states; the crate is kept around as
//! a test oracle.

use super::Checksum;

const BASIS32: u32 = 0x811c_9dc5;
const PRIME32: u32 = 0x0100_0193;

const BASIS64: u64 = 0xcbf2_9ce4_8422_2325;
const PRIME64: u64 = 0x0000_0100_0000_01b3;

const BASIS128: u128 = 0x6c62_272e_07bb_0142_62b8_2175_6295_c58d;
const PRIME128: u128 = 0x0000_0000_0100_0000_0000_0000_0000_013b;

macro_rules! fnv_state {
    ($name:ident, $int:ty, $basis:expr, $prime:expr, multiply_first) => {
        fnv_state!(@define $name, $int, $basis);

        impl Checksum for $name {
            fn update(&mut self, data: &[u8]) {
                for &b in data {
                    self.0 = self.0.wrapping_mul($prime) ^ <$int>::from(b);
                }
            }

            fnv_state!(@common $int, $basis);
        }
    };
    ($name:ident, $int:ty, $basis:expr, $prime:expr, xor_first) => {
        fnv_state!(@define $name, $int, $basis);

        impl Checksum for $name {
            fn update(&mut self, data: &[u8]) {
                for &b in data {
                    self.0 = (self.0 ^ <$int>::from(b)).wrapping_mul($prime);
                }
            }

            fnv_state!(@common $int, $basis);
        }
    };
    (@define $name:ident, $int:ty, $basis:expr) => {
        pub(super) struct $name($int);

        impl $name {
            pub(super) fn new() -> Self {
                Self($basis)
            }
        }
    };
    (@common $int:ty, $basis:expr) => {
        fn sum(&self) -> Vec<u8> {
            self.0.to_be_bytes().to_vec()
        }

        fn reset(&mut self) {
            self.0 = $basis;
        }

        fn size(&self) -> usize {
            std::mem::size_of::<$int>()
        }
    };
}

fnv_state!(Fnv32, u32, BASIS32, PRIME32, multiply_first);
fnv_state!(Fnv32a, u32, BASIS32, PRIME32, xor_first);
fnv_state!(Fnv64, u64, BASIS64, PRIME64, multiply_first);
fnv_state!(Fnv64a, u64, BASIS64, PRIME64, xor_first);
fnv_state!(Fnv128, u128, BASIS128, PRIME128, multiply_first);
fnv_state!(Fnv128a, u128, BASIS128, PRIME128, xor_first);
