//! Content hashing for fingerprints and cache keys.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

/// Compute the SHA-256 digest of a byte slice as 64 upper-hex characters.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode_upper(hasher.finalize())
}

/// Compute the SHA-256 digest of a string.
pub fn hash_str(s: &str) -> String {
    hash_bytes(s.as_bytes())
}

/// Compute the SHA-256 digest of a file's contents, streamed.
///
/// The digest depends only on content, never on path or timestamps.
pub fn hash_file(path: &Path) -> Result<String> {
    let file = File::open(path)
        .with_context(|| format!("failed to open file for hashing: {}", path.display()))?;

    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode_upper(hasher.finalize()))
}

/// A hasher for building fingerprints from multiple components.
#[derive(Default)]
pub struct Fingerprint {
    hasher: Sha256,
}

impl Fingerprint {
    /// Create a new fingerprint builder.
    pub fn new() -> Self {
        Fingerprint {
            hasher: Sha256::new(),
        }
    }

    /// Add a string component to the fingerprint.
    pub fn update_str(&mut self, s: &str) -> &mut Self {
        self.hasher.update(s.as_bytes());
        self.hasher.update(b"\0"); // Separator
        self
    }

    /// Add multiple strings to the fingerprint.
    pub fn update_strs<'a>(&mut self, items: impl IntoIterator<Item = &'a str>) -> &mut Self {
        for s in items {
            self.update_str(s);
        }
        self
    }

    /// Finalize and return the fingerprint as an upper-hex string.
    pub fn finish(self) -> String {
        hex::encode_upper(self.hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_hash_str_shape() {
        let hash = hash_str("hello");
        assert_eq!(hash.len(), 64);
        assert!(hash
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
        assert_eq!(
            hash,
            "2CF24DBA5FB0A30E26E83B2AC5B9E29E1B161E5C1FA7425E73043362938B9824"
        );
    }

    #[test]
    fn test_hash_file_matches_bytes() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("test.txt");
        std::fs::write(&path, "hello").unwrap();

        assert_eq!(hash_file(&path).unwrap(), hash_str("hello"));
    }

    #[test]
    fn test_hash_file_missing() {
        let tmp = TempDir::new().unwrap();
        assert!(hash_file(&tmp.path().join("nope.c")).is_err());
    }

    #[test]
    fn test_fingerprint_order_sensitive() {
        let fp1 = {
            let mut fp = Fingerprint::new();
            fp.update_str("hello").update_str("world");
            fp.finish()
        };

        let fp2 = {
            let mut fp = Fingerprint::new();
            fp.update_str("world").update_str("hello");
            fp.finish()
        };

        assert_ne!(fp1, fp2);
    }

    #[test]
    fn test_fingerprint_separator() {
        // "ab" + "c" must differ from "a" + "bc"
        let fp1 = {
            let mut fp = Fingerprint::new();
            fp.update_str("ab").update_str("c");
            fp.finish()
        };

        let fp2 = {
            let mut fp = Fingerprint::new();
            fp.update_str("a").update_str("bc");
            fp.finish()
        };

        assert_ne!(fp1, fp2);
    }
}
