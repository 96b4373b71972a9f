//! Content fixity (hash) computation.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use strum::{Display, EnumString};

/// Read buffer size for streaming hashes.
const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Supported fixity algorithms.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum FixityAlgorithm {
    #[serde(rename = "SHA-1", alias = "sha1")]
    #[strum(to_string = "SHA-1", serialize = "sha1")]
    Sha1,
    #[serde(rename = "MD5", alias = "md5")]
    #[strum(to_string = "MD5")]
    Md5,
    #[serde(rename = "SHA-256", alias = "sha256")]
    #[strum(to_string = "SHA-256", serialize = "sha256")]
    Sha256,
    #[serde(rename = "SHA-512", alias = "sha512")]
    #[strum(to_string = "SHA-512", serialize = "sha512")]
    Sha512,
    #[serde(rename = "BLAKE3", alias = "blake3")]
    #[strum(to_string = "BLAKE3")]
    Blake3,
}

/// One fixity value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixity {
    /// Algorithm display name, e.g. `SHA-256`.
    pub algorithm: String,
    /// Upper-case hex digest.
    pub value: String,
    /// File the digest belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl Fixity {
    /// Create a fixity for a path.
    pub fn new(algorithm: impl Into<String>, value: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            algorithm: algorithm.into(),
            value: value.into(),
            path: Some(path.into()),
        }
    }
}

/// Computes content digests.
pub trait FixityProvider {
    /// Digest of the file at `path` as upper-case hex.
    fn digest(&self, path: &Path, algorithm: FixityAlgorithm) -> io::Result<String>;
}

/// Streams files through the RustCrypto / BLAKE3 hashers.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashFixityProvider;

impl HashFixityProvider {
    fn hash_with<D: Digest>(reader: &mut impl Read) -> io::Result<String> {
        let mut hasher = D::new();
        let mut buffer = vec![0u8; HASH_BUFFER_SIZE];
        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }
        Ok(hex::encode_upper(hasher.finalize()))
    }

    fn hash_blake3(reader: &mut impl Read) -> io::Result<String> {
        let mut hasher = blake3::Hasher::new();
        let mut buffer = vec![0u8; HASH_BUFFER_SIZE];
        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }
        Ok(hex::encode_upper(hasher.finalize().as_bytes()))
    }
}

impl FixityProvider for HashFixityProvider {
    fn digest(&self, path: &Path, algorithm: FixityAlgorithm) -> io::Result<String> {
        let mut file = File::open(path)?;
        match algorithm {
            FixityAlgorithm::Sha1 => Self::hash_with::<Sha1>(&mut file),
            FixityAlgorithm::Md5 => Self::hash_with::<Md5>(&mut file),
            FixityAlgorithm::Sha256 => Self::hash_with::<Sha256>(&mut file),
            FixityAlgorithm::Sha512 => Self::hash_with::<Sha512>(&mut file),
            FixityAlgorithm::Blake3 => Self::hash_blake3(&mut file),
        }
    }
}
