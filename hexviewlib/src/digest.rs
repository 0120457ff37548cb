//! The `digest` module defines the [`Digest`] trait every checksum algorithm implements,
//! adapters for the RustCrypto hashes, CRC-32 and Adler-32, the additive `sumN`/`xor8`
//! checksums, and the [`DigestRegistry`] that maps algorithm names to constructors.

use sha2::digest::Digest as CryptoDigest;
use std::collections::BTreeMap;
use std::error::Error;

/// Error a digest may raise while consuming bytes.
pub type DigestError = Box<dyn Error + Send + Sync>;

/// Constructor stored in the [`DigestRegistry`].
pub type DigestFactory = fn() -> Box<dyn Digest>;

/// Algorithm used when a requested name is unknown.
pub const DEFAULT_ALGORITHM: &str = "md5";

/// Incremental checksum or hash.
pub trait Digest: Send {
    /// Registry name of the algorithm, e.g. `"sha256"`.
    fn name(&self) -> &str;

    /// Size of the final digest in bytes.
    fn digest_size(&self) -> usize;

    /// Feeds more bytes into the digest.
    ///
    /// # Errors
    /// Returns an error if the implementation cannot accept the bytes.
    fn update(&mut self, bytes: &[u8]) -> Result<(), DigestError>;

    /// Digest of everything fed so far. Does not reset the state.
    fn digest(&self) -> Vec<u8>;

    /// [`Digest::digest`] as lowercase hex.
    fn hexdigest(&self) -> String {
        self.digest().iter().map(|b| format!("{b:02x}")).collect()
    }
}

struct RustCrypto<D> {
    name: &'static str,
    hasher: D,
}

impl<D> Digest for RustCrypto<D>
where
    D: CryptoDigest + Clone + Send,
{
    fn name(&self) -> &str {
        self.name
    }

    fn digest_size(&self) -> usize {
        <D as CryptoDigest>::output_size()
    }

    fn update(&mut self, bytes: &[u8]) -> Result<(), DigestError> {
        CryptoDigest::update(&mut self.hasher, bytes);
        Ok(())
    }

    fn digest(&self) -> Vec<u8> {
        CryptoDigest::finalize(self.hasher.clone()).to_vec()
    }
}

fn rust_crypto<D>(name: &'static str) -> Box<dyn Digest>
where
    D: CryptoDigest + Clone + Send + 'static,
{
    Box::new(RustCrypto {
        name,
        hasher: <D as CryptoDigest>::new(),
    })
}

struct Crc32(crc32fast::Hasher);

impl Digest for Crc32 {
    fn name(&self) -> &str {
        "crc32"
    }

    fn digest_size(&self) -> usize {
        4
    }

    fn update(&mut self, bytes: &[u8]) -> Result<(), DigestError> {
        self.0.update(bytes);
        Ok(())
    }

    fn digest(&self) -> Vec<u8> {
        self.0.clone().finalize().to_be_bytes().to_vec()
    }
}

struct Adler32(adler2::Adler32);

impl Digest for Adler32 {
    fn name(&self) -> &str {
        "adler32"
    }

    fn digest_size(&self) -> usize {
        4
    }

    fn update(&mut self, bytes: &[u8]) -> Result<(), DigestError> {
        self.0.write_slice(bytes);
        Ok(())
    }

    fn digest(&self) -> Vec<u8> {
        self.0.checksum().to_be_bytes().to_vec()
    }
}

/// Sum of all bytes, truncated to `width` bytes.
struct ByteSum {
    name: &'static str,
    width: usize,
    sum: u64,
}

impl Digest for ByteSum {
    fn name(&self) -> &str {
        self.name
    }

    fn digest_size(&self) -> usize {
        self.width
    }

    fn update(&mut self, bytes: &[u8]) -> Result<(), DigestError> {
        self.sum = bytes
            .iter()
            .fold(self.sum, |acc, &b| acc.wrapping_add(u64::from(b)));
        Ok(())
    }

    fn digest(&self) -> Vec<u8> {
        let be = self.sum.to_be_bytes();
        be[be.len() - self.width..].to_vec()
    }
}

const fn byte_sum(name: &'static str, width: usize) -> ByteSum {
    ByteSum { name, width, sum: 0 }
}

#[derive(Default)]
struct Xor8(u8);

impl Digest for Xor8 {
    fn name(&self) -> &str {
        "xor8"
    }

    fn digest_size(&self) -> usize {
        1
    }

    fn update(&mut self, bytes: &[u8]) -> Result<(), DigestError> {
        self.0 = bytes.iter().fold(self.0, |acc, &b| acc ^ b);
        Ok(())
    }

    fn digest(&self) -> Vec<u8> {
        vec![self.0]
    }
}

/// Named digest constructors.
#[derive(Debug, Clone)]
pub struct DigestRegistry {
    factories: BTreeMap<String, DigestFactory>,
}

impl Default for DigestRegistry {
    /// Registry holding all built-in algorithms.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("md5", || rust_crypto::<md5::Md5>("md5"));
        registry.register("sha1", || rust_crypto::<sha1::Sha1>("sha1"));
        registry.register("sha224", || rust_crypto::<sha2::Sha224>("sha224"));
        registry.register("sha256", || rust_crypto::<sha2::Sha256>("sha256"));
        registry.register("sha384", || rust_crypto::<sha2::Sha384>("sha384"));
        registry.register("sha512", || rust_crypto::<sha2::Sha512>("sha512"));
        registry.register("md2", || rust_crypto::<md2::Md2>("md2"));
        registry.register("md4", || rust_crypto::<md4::Md4>("md4"));
        registry.register("ripemd160", || rust_crypto::<ripemd::Ripemd160>("ripemd160"));
        registry.register("whirlpool", || rust_crypto::<whirlpool::Whirlpool>("whirlpool"));
        registry.register("tiger", || rust_crypto::<tiger::Tiger>("tiger"));
        registry.register("crc32", || Box::new(Crc32(crc32fast::Hasher::new())));
        registry.register("adler32", || Box::new(Adler32(adler2::Adler32::new())));
        registry.register("sum8", || Box::new(byte_sum("sum8", 1)));
        registry.register("sum16", || Box::new(byte_sum("sum16", 2)));
        registry.register("sum24", || Box::new(byte_sum("sum24", 3)));
        registry.register("sum32", || Box::new(byte_sum("sum32", 4)));
        registry.register("xor8", || Box::new(Xor8::default()));
        registry
    }
}

impl DigestRegistry {
    /// Registry without any algorithm.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Adds or replaces an algorithm.
    pub fn register(&mut self, name: impl Into<String>, factory: DigestFactory) {
        self.factories.insert(name.into(), factory);
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Creates a fresh digest for `name`.
    ///
    /// # Examples
    /// ```
    /// use hexviewlib::DigestRegistry;
    ///
    /// let registry = DigestRegistry::default();
    /// let mut crc = registry.create("crc32").unwrap();
    /// crc.update(b"123456789").unwrap();
    /// assert_eq!(crc.hexdigest(), "cbf43926");
    /// ```
    #[must_use]
    pub fn create(&self, name: &str) -> Option<Box<dyn Digest>> {
        self.factories.get(name).map(|factory| factory())
    }

    /// Creates `name`, or `fallback` if `name` is not registered.
    #[must_use]
    pub fn create_or(&self, name: &str, fallback: &str) -> Option<Box<dyn Digest>> {
        self.create(name).or_else(|| {
            log::warn!("Unknown hash algorithm '{name}', using '{fallback}'");
            self.create(fallback)
        })
    }

    /// Creates `name`, or [`DEFAULT_ALGORITHM`] if `name` is not registered.
    #[must_use]
    pub fn create_or_default(&self, name: &str) -> Option<Box<dyn Digest>> {
        self.create_or(name, DEFAULT_ALGORITHM)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex_of(name: &str, data: &[u8]) -> String {
        let mut digest = DigestRegistry::default().create(name).unwrap();
        digest.update(data).unwrap();
        digest.hexdigest()
    }

    #[test]
    fn test_known_vectors() {
        assert_eq!(hex_of("md5", b"abc"), "900150983cd24fb0d6963f7d28e17f72");
        assert_eq!(
            hex_of("sha1", b"abc"),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
        assert_eq!(
            hex_of("sha256", b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(hex_of("crc32", b"123456789"), "cbf43926");
        assert_eq!(hex_of("adler32", b"Wikipedia"), "11e60398");
    }

    #[test]
    fn test_legacy_hash_vectors() {
        assert_eq!(hex_of("md2", b"abc"), "da853b0d3f88d99b30283a69e6ded6bb");
        assert_eq!(hex_of("md4", b"abc"), "a448017aaf21d8525fc10ae87aa6729d");
        assert_eq!(
            hex_of("ripemd160", b"abc"),
            "8eb208f7e05d987a9b044a8e98c6b087f15a0bfc"
        );
        assert_eq!(
            hex_of("tiger", b"abc"),
            "2aab1484e8c158f2bfb8c5ff41b57a525129131c957b5f93"
        );
        assert_eq!(
            hex_of("whirlpool", b"abc"),
            "4e2448a4c6f486bb16b6562c73b4020bf3043e3a731bce721ae1b303d97e6d4c\
             7181eebdb6c57e277d0e34957114cbd6c797fc9d95d8b582d225292076d4eef5"
        );
    }

    #[test]
    fn test_additive_checksums() {
        // Arrange
        let data = [0xFF, 0x02, 0x10];

        // Act & Assert
        assert_eq!(hex_of("sum8", &data), "11");
        assert_eq!(hex_of("sum16", &data), "0111");
        assert_eq!(hex_of("sum24", &data), "000111");
        assert_eq!(hex_of("sum32", &data), "00000111");
        assert_eq!(hex_of("xor8", &[0x0F, 0xF0, 0x01]), "fe");
        assert_eq!(hex_of("adler32", &[]), "00000001");
    }

    #[test]
    fn test_incremental_updates_match_single_update() {
        let registry = DigestRegistry::default();
        for name in registry.names() {
            // Arrange
            let mut whole = registry.create(name).unwrap();
            let mut parts = registry.create(name).unwrap();

            // Act
            whole.update(b"hello hex world").unwrap();
            parts.update(b"hello ").unwrap();
            parts.update(b"hex ").unwrap();
            parts.update(b"world").unwrap();

            // Assert
            assert_eq!(whole.digest(), parts.digest(), "{name}");
            assert_eq!(whole.digest().len(), whole.digest_size(), "{name}");
            assert_eq!(whole.name(), name);
        }
    }

    #[test]
    fn test_digest_sizes() {
        let registry = DigestRegistry::default();
        let size = |name: &str| registry.create(name).map(|d| d.digest_size());
        assert_eq!(size("md5"), Some(16));
        assert_eq!(size("sha224"), Some(28));
        assert_eq!(size("sha384"), Some(48));
        assert_eq!(size("sha512"), Some(64));
        assert_eq!(size("sum24"), Some(3));
        assert_eq!(size("ripemd160"), Some(20));
        assert_eq!(size("tiger"), Some(24));
        assert_eq!(size("whirlpool"), Some(64));
    }

    #[test]
    fn test_unknown_name_falls_back() {
        // Arrange
        let registry = DigestRegistry::default();

        // Act
        let fallback = registry.create_or_default("snefru");
        let other = registry.create_or("snefru", "sha1");

        // Assert
        assert!(registry.create("snefru").is_none());
        assert_eq!(fallback.map(|d| d.name().to_string()), Some("md5".into()));
        assert_eq!(other.map(|d| d.name().to_string()), Some("sha1".into()));
    }

    #[test]
    fn test_register_custom_algorithm() {
        struct Count(usize);
        impl Digest for Count {
            fn name(&self) -> &str {
                "count"
            }
            fn digest_size(&self) -> usize {
                1
            }
            fn update(&mut self, bytes: &[u8]) -> Result<(), DigestError> {
                self.0 += bytes.len();
                Ok(())
            }
            fn digest(&self) -> Vec<u8> {
                vec![u8::try_from(self.0).unwrap_or(u8::MAX)]
            }
        }

        // Arrange
        let mut registry = DigestRegistry::empty();
        registry.register("count", || Box::new(Count(0)));

        // Act
        let mut digest = registry.create("count").unwrap();
        digest.update(&[1, 2, 3]).unwrap();

        // Assert
        assert!(registry.contains("count"));
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["count"]);
        assert_eq!(digest.hexdigest(), "03");
    }
}
