use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::hash::Hasher as _;
use std::io::{self, Read};
use std::path::Path;
use twox_hash::XxHash64;

pub const DEFAULT_READ_BUFFER_SIZE: usize = 64 * 1024; // 64KB

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Blake3,
    Xxh64,
}

impl HashAlgorithm {
    /// Digest width in bytes.
    pub fn width(self) -> usize {
        match self {
            HashAlgorithm::Blake3 => blake3::OUT_LEN,
            HashAlgorithm::Xxh64 => 8,
        }
    }

    fn hasher(self) -> ContentHasher {
        match self {
            HashAlgorithm::Blake3 => ContentHasher::Blake3(Box::default()),
            HashAlgorithm::Xxh64 => ContentHasher::Xxh64(XxHash64::with_seed(0)),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashAlgorithm::Blake3 => write!(f, "blake3"),
            HashAlgorithm::Xxh64 => write!(f, "xxh64"),
        }
    }
}

/// Fingerprint of a file's full content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest(Vec<u8>);

impl Digest {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Digest(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

enum ContentHasher {
    Blake3(Box<blake3::Hasher>),
    Xxh64(XxHash64),
}

impl ContentHasher {
    fn update(&mut self, data: &[u8]) {
        match self {
            ContentHasher::Blake3(hasher) => {
                hasher.update(data);
            }
            ContentHasher::Xxh64(hasher) => hasher.write(data),
        }
    }

    fn finalize(self) -> Digest {
        match self {
            ContentHasher::Blake3(hasher) => Digest::from_bytes(*hasher.finalize().as_bytes()),
            ContentHasher::Xxh64(hasher) => Digest::from_bytes(hasher.finish().to_be_bytes()),
        }
    }
}

/// Hash everything `reader` yields, `buffer_size` bytes at a time.
pub fn hash_reader<R: Read>(
    mut reader: R,
    algorithm: HashAlgorithm,
    buffer_size: usize,
) -> io::Result<Digest> {
    let mut hasher = algorithm.hasher();
    let mut buffer = vec![0; buffer_size.max(1)];
    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..bytes_read]);
    }
    Ok(hasher.finalize())
}

pub fn hash_file(file: &Path, algorithm: HashAlgorithm, buffer_size: usize) -> io::Result<Digest> {
    let f = File::open(file)?;
    hash_reader(f, algorithm, buffer_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_digest_width_matches_algorithm() {
        for algorithm in [HashAlgorithm::Blake3, HashAlgorithm::Xxh64] {
            let digest = hash_reader(Cursor::new(b"abc"), algorithm, 16).unwrap();
            assert_eq!(digest.as_bytes().len(), algorithm.width());
            assert_eq!(digest.to_hex().len(), algorithm.width() * 2);
        }
    }

    #[test]
    fn test_chunk_size_does_not_change_digest() {
        let data = vec![0x5Au8; 10_000];
        let small = hash_reader(Cursor::new(&data), HashAlgorithm::Blake3, 7).unwrap();
        let large = hash_reader(Cursor::new(&data), HashAlgorithm::Blake3, 1 << 20).unwrap();
        assert_eq!(small, large);
        assert_eq!(small.as_bytes(), blake3::hash(&data).as_bytes());
    }

    #[test]
    fn test_different_content_different_digest() {
        let a = hash_reader(Cursor::new(b"one"), HashAlgorithm::Xxh64, 4).unwrap();
        let b = hash_reader(Cursor::new(b"two"), HashAlgorithm::Xxh64, 4).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let err = hash_file(
            Path::new("/definitely/not/here/duped"),
            HashAlgorithm::Blake3,
            DEFAULT_READ_BUFFER_SIZE,
        )
        .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
