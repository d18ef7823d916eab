//! SHA-256 digest of the published archive.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{PackError, PackResult};

/// SHA-256 of an artifact, rendered as 64 uppercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactDigest(String);

impl ArtifactDigest {
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(hex::encode_upper(Sha256::digest(bytes)))
    }

    pub fn hex(&self) -> &str {
        &self.0
    }

    /// Parse a hex digest, accepting either case.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let valid = hex.len() == 64 && hex.bytes().all(|b| b.is_ascii_hexdigit());
        valid.then(|| Self(hex.to_ascii_uppercase()))
    }
}

impl fmt::Display for ArtifactDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SHA-256: {}", self.0)
    }
}

/// Stream `path` through SHA-256.
pub fn digest_file(path: &Path) -> PackResult<ArtifactDigest> {
    let to_err = |source| PackError::Digest {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::open(path).map_err(to_err)?;
    let mut hasher = Sha256::new();
    let mut buf = [0_u8; 8192];
    loop {
        let n = file.read(&mut buf).map_err(to_err)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(ArtifactDigest(hex::encode_upper(hasher.finalize())))
}
