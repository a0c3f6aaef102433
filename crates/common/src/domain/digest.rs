use md5::{Digest as _, Md5};
use std::fmt;

/// 16-byte MD5 digest identifying the natural key of a dimension.
///
/// Fields are hashed as a raw concatenation with no separators, so
/// `["ab", "c"]` and `["a", "bc"]` produce the same digest. Callers accept
/// this collision class; it is not corrected here.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest([u8; 16]);

impl Digest {
    /// Hashes the concatenation of `parts` in order
    pub fn of<T: AsRef<[u8]>>(parts: &[T]) -> Self {
        let mut hasher = Md5::new();
        for part in parts {
            hasher.update(part.as_ref());
        }
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&hasher.finalize());
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// The four digests derived from one observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservationDigests {
    pub user: Digest,
    pub device: Digest,
    pub address: Digest,
    /// Hash over the three dimension digests' bytes
    pub identity: Digest,
}

impl ObservationDigests {
    pub fn new(user: Digest, device: Digest, address: Digest) -> Self {
        let identity = Digest::of(&[user.as_bytes(), device.as_bytes(), address.as_bytes()]);
        Self {
            user,
            device,
            address,
            identity,
        }
    }
}
