//! Streaming checksum catalog.
//!
//! Every algorithm is exposed through the object-safe [`Checksum`] trait so
//! the digest layer can hold any pair of them behind one type. Cryptographic
//! algorithms come from the RustCrypto crates, adler and xxHash from their
//! dedicated crates, and the FNV and MurmurHash3 families are implemented
//! in-crate because no published crate offers them as incremental digests in
//! all the required widths.

mod fnv;
mod murmur;
mod simple;

use digest::Digest as _;

use crate::error::{Error, Result};

/// Streaming hash state.
///
/// Callers feed data incrementally via [`Checksum::update`] and may take a
/// snapshot of the digest at any point with [`Checksum::sum`] without
/// disturbing the state.
pub trait Checksum: Send {
    /// Feed bytes into the state.
    fn update(&mut self, data: &[u8]);

    /// Non-destructive snapshot of the current digest.
    fn sum(&self) -> Vec<u8>;

    /// Clear the state back to its initial value.
    fn reset(&mut self);

    /// Digest width in bytes.
    fn size(&self) -> usize;
}

/// Recognized algorithm names, sorted.
pub const FAMILIES: &[&str] = &[
    "adler",
    "fnv128",
    "fnv128a",
    "fnv32",
    "fnv32a",
    "fnv64",
    "fnv64a",
    "md5",
    "murmur128x64",
    "murmur128x86",
    "murmur32",
    "none",
    "sha1",
    "sha224",
    "sha256",
    "sha384",
    "sha512",
    "sum32",
    "sum64",
    "xxh32",
    "xxh64",
];

/// Build a hasher for the given algorithm name.
///
/// Names are matched case-insensitively; the empty string selects `md5`.
///
/// # Errors
/// Returns [`Error::UnsupportedAlgorithm`] when the name is not in the
/// catalog.
pub fn select(name: &str) -> Result<Box<dyn Checksum>> {
    let hasher: Box<dyn Checksum> = match name.to_lowercase().as_str() {
        "" | "md5" => Box::new(CryptoHash(md5::Md5::new())),
        "sha1" => Box::new(CryptoHash(sha1::Sha1::new())),
        "sha224" => Box::new(CryptoHash(sha2::Sha224::new())),
        "sha256" => Box::new(CryptoHash(sha2::Sha256::new())),
        "sha384" => Box::new(CryptoHash(sha2::Sha384::new())),
        "sha512" => Box::new(CryptoHash(sha2::Sha512::new())),
        "adler" => Box::new(Adler::new()),
        "xxh32" => Box::new(Xxh32::new()),
        "xxh64" => Box::new(Xxh64::new()),
        "fnv32" => Box::new(fnv::Fnv32::new()),
        "fnv32a" => Box::new(fnv::Fnv32a::new()),
        "fnv64" => Box::new(fnv::Fnv64::new()),
        "fnv64a" => Box::new(fnv::Fnv64a::new()),
        "fnv128" => Box::new(fnv::Fnv128::new()),
        "fnv128a" => Box::new(fnv::Fnv128a::new()),
        "murmur32" => Box::new(murmur::Murmur32::new()),
        "murmur128x86" => Box::new(murmur::Murmur128x86::new()),
        "murmur128x64" => Box::new(murmur::Murmur128x64::new()),
        "none" => Box::new(simple::NoHash),
        "sum32" => Box::new(simple::Sum32::new()),
        "sum64" => Box::new(simple::Sum64::new()),
        _ => return Err(Error::UnsupportedAlgorithm(name.to_string())),
    };
    Ok(hasher)
}

/// Digest width for the given algorithm name, without building a hasher.
///
/// # Errors
/// Returns [`Error::UnsupportedAlgorithm`] when the name is not in the
/// catalog.
pub fn size_of(name: &str) -> Result<usize> {
    let size = match name.to_lowercase().as_str() {
        "" | "md5" => 16,
        "sha1" => 20,
        "sha224" => 28,
        "sha256" => 32,
        "sha384" => 48,
        "sha512" => 64,
        "adler" | "xxh32" | "fnv32" | "fnv32a" | "murmur32" | "none" | "sum32" => 4,
        "xxh64" | "fnv64" | "fnv64a" | "sum64" => 8,
        "fnv128" | "fnv128a" | "murmur128x86" | "murmur128x64" => 16,
        _ => return Err(Error::UnsupportedAlgorithm(name.to_string())),
    };
    Ok(size)
}

/// Adapter over the RustCrypto digest crates.
struct CryptoHash<D>(D);

impl<D> Checksum for CryptoHash<D>
where
    D: digest::Digest + Clone + Send + 'static,
{
    fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    fn sum(&self) -> Vec<u8> {
        self.0.clone().finalize().to_vec()
    }

    fn reset(&mut self) {
        self.0 = D::new();
    }

    fn size(&self) -> usize {
        <D as digest::Digest>::output_size()
    }
}

struct Adler(adler32::RollingAdler32);

impl Adler {
    fn new() -> Self {
        Self(adler32::RollingAdler32::new())
    }
}

impl Checksum for Adler {
    fn update(&mut self, data: &[u8]) {
        self.0.update_buffer(data);
    }

    fn sum(&self) -> Vec<u8> {
        self.0.hash().to_be_bytes().to_vec()
    }

    fn reset(&mut self) {
        self.0 = adler32::RollingAdler32::new();
    }

    fn size(&self) -> usize {
        4
    }
}

struct Xxh32(xxhash_rust::xxh32::Xxh32);

impl Xxh32 {
    fn new() -> Self {
        Self(xxhash_rust::xxh32::Xxh32::new(0))
    }
}

impl Checksum for Xxh32 {
    fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    fn sum(&self) -> Vec<u8> {
        self.0.digest().to_be_bytes().to_vec()
    }

    fn reset(&mut self) {
        self.0.reset(0);
    }

    fn size(&self) -> usize {
        4
    }
}

struct Xxh64(xxhash_rust::xxh64::Xxh64);

impl Xxh64 {
    fn new() -> Self {
        Self(xxhash_rust::xxh64::Xxh64::new(0))
    }
}

impl Checksum for Xxh64 {
    fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    fn sum(&self) -> Vec<u8> {
        self.0.digest().to_be_bytes().to_vec()
    }

    fn reset(&mut self) {
        self.0.reset(0);
    }

    fn size(&self) -> usize {
        8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_is_sorted() {
        let mut sorted = FAMILIES.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, FAMILIES);
    }

    #[test]
    fn test_every_family_constructs() {
        for name in FAMILIES {
            let hasher = select(name).unwrap();
            assert_eq!(hasher.size(), size_of(name).unwrap(), "width of {name}");
            assert_eq!(hasher.sum().len(), hasher.size(), "sum length of {name}");
        }
    }

    #[test]
    fn test_empty_name_defaults_to_md5() {
        let hasher = select("").unwrap();
        assert_eq!(hasher.size(), 16);
        assert_eq!(
            hex::encode(hasher.sum()),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
    }

    #[test]
    fn test_names_match_case_insensitively() {
        assert_eq!(select("SHA256").unwrap().size(), 32);
        assert_eq!(size_of("Md5").unwrap(), 16);
    }

    #[test]
    fn test_unknown_name_is_rejected() {
        assert!(matches!(
            select("blake3"),
            Err(Error::UnsupportedAlgorithm(_))
        ));
        assert!(matches!(
            size_of("crc32"),
            Err(Error::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_md5_scenario_vector() {
        let mut hasher = select("md5").unwrap();
        hasher.update(b"hello");
        hasher.update(b"world");
        assert_eq!(
            hex::encode(hasher.sum()),
            "fc5e038d38a57032085441e7fe7010b0"
        );
    }

    #[test]
    fn test_sha_vectors() {
        let mut sha1 = select("sha1").unwrap();
        sha1.update(b"abc");
        assert_eq!(
            hex::encode(sha1.sum()),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );

        let mut sha256 = select("sha256").unwrap();
        sha256.update(b"abc");
        assert_eq!(
            hex::encode(sha256.sum()),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_adler_vector() {
        let mut hasher = select("adler").unwrap();
        hasher.update(b"Wikipedia");
        assert_eq!(hasher.sum(), 0x11e6_0398_u32.to_be_bytes());
    }

    #[test]
    fn test_xxh_empty_vectors() {
        assert_eq!(select("xxh32").unwrap().sum(), 0x02cc_5d05_u32.to_be_bytes());
        assert_eq!(
            select("xxh64").unwrap().sum(),
            0xef46_db37_51d8_e999_u64.to_be_bytes()
        );
    }

    #[test]
    fn test_sum_is_a_snapshot() {
        let mut hasher = select("sha256").unwrap();
        hasher.update(b"partial");
        let first = hasher.sum();
        let second = hasher.sum();
        assert_eq!(first, second);

        hasher.update(b" more");
        assert_ne!(hasher.sum(), first);
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let mut hasher = select("xxh64").unwrap();
        let initial = hasher.sum();
        hasher.update(b"data");
        assert_ne!(hasher.sum(), initial);
        hasher.reset();
        assert_eq!(hasher.sum(), initial);
    }

    #[test]
    fn test_chunked_updates_match_single_shot() {
        for name in FAMILIES {
            let mut chunked = select(name).unwrap();
            let mut whole = select(name).unwrap();
            let data = b"the quick brown fox jumps over the lazy dog";

            for chunk in data.chunks(7) {
                chunked.update(chunk);
            }
            whole.update(data);

            assert_eq!(chunked.sum(), whole.sum(), "algorithm {name}");
        }
    }
}
