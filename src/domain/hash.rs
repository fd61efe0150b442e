use std::{fmt::Display, path::Path};

/// Number of digest bytes kept in a cache key (128 bits).
const KEY_LEN: usize = 16;

/// Represents the artwork cache key of an audio file.
///
/// The key is derived from the file's canonical path, not from its content,
/// so it stays the same for as long as the file is not moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; KEY_LEN]);

impl CacheKey {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let digest = blake3::hash(bytes);
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&digest.as_bytes()[..KEY_LEN]);
        Self(key)
    }

    pub fn from_path(path: &Path) -> Self {
        Self::from_bytes(path.to_string_lossy().as_bytes())
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::CacheKey;

    #[test]
    fn same_path_gives_same_key() {
        let a = CacheKey::from_path(&PathBuf::from("/music/a.mp3"));
        let b = CacheKey::from_path(&PathBuf::from("/music/a.mp3"));
        assert_eq!(a, b);
        assert_eq!(a.to_hex(), b.to_hex());
    }

    #[test]
    fn different_paths_give_different_keys() {
        let a = CacheKey::from_path(&PathBuf::from("/music/a.mp3"));
        let b = CacheKey::from_path(&PathBuf::from("/music/b.mp3"));
        assert_ne!(a, b);
    }

    #[test]
    fn key_is_128_bit_hex_prefix_of_blake3() {
        let key = CacheKey::from_bytes(b"/music/a.mp3");
        let hex = key.to_hex();

        assert_eq!(hex.len(), 32);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

        let full = blake3::hash(b"/music/a.mp3").to_hex().to_string();
        assert!(full.starts_with(&hex));
        assert_eq!(key.to_string(), hex);
    }
}
