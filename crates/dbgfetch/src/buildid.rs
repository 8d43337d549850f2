//! Build-id normalization.
//!
//! A build-id reaches us either as the raw note bytes from an ELF file or as
//! a hex string typed by a user. Both spellings normalize to the same
//! lowercase hex string, which is the cache key and the URL path segment.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Longest build-id accepted, in bytes.
pub const MAX_BUILD_ID_BYTES: usize = 64;

/// A build-id in canonical lowercase hex.
///
/// Equality, hashing and ordering all use the canonical string, so
/// `BuildId::from_bytes(&[0xab, 0xcd])` equals `"ABCD".parse()`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BuildId(String);

impl BuildId {
    /// Normalize a build-id given as bytes plus length.
    ///
    /// - `len > 0`: the first `len` bytes of `raw` are the binary build-id
    /// - `len == 0`: `raw` is a hex string, optionally NUL terminated
    /// - `len < 0`: always rejected
    ///
    /// # Examples
    ///
    /// ```
    /// use dbgfetch::BuildId;
    ///
    /// let blob = BuildId::normalize(&[0xab, 0xcd], 2).unwrap();
    /// let text = BuildId::normalize(b"ABCD\0", 0).unwrap();
    /// assert_eq!(blob, text);
    /// assert_eq!(blob.as_str(), "abcd");
    /// ```
    pub fn normalize(raw: &[u8], len: isize) -> Result<Self> {
        match usize::try_from(len) {
            Err(_) => Err(Error::InvalidBuildId(format!("negative length {len}"))),
            Ok(0) => {
                let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
                let text = std::str::from_utf8(&raw[..end])
                    .map_err(|_| Error::InvalidBuildId("hex string is not valid UTF-8".into()))?;
                Self::from_hex(text)
            }
            Ok(len) => {
                let bytes = raw.get(..len).ok_or_else(|| {
                    Error::InvalidBuildId(format!("length {len} exceeds the {} bytes supplied", raw.len()))
                })?;
                Self::from_bytes(bytes)
            }
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(Error::InvalidBuildId("empty".into()));
        }
        if bytes.len() > MAX_BUILD_ID_BYTES {
            return Err(Error::InvalidBuildId(format!(
                "{} bytes is longer than {MAX_BUILD_ID_BYTES}",
                bytes.len()
            )));
        }
        Ok(Self(hex::encode(bytes)))
    }

    pub fn from_hex(text: &str) -> Result<Self> {
        let bytes = hex::decode(text).map_err(|e| Error::InvalidBuildId(format!("{text:?}: {e}")))?;
        Self::from_bytes(&bytes)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for BuildId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s.trim())
    }
}

impl fmt::Display for BuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BuildId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_and_hex_agree() {
        let blob = BuildId::normalize(&[0xAB, 0xCD], 2).unwrap();
        let text = BuildId::normalize(b"abcd", 0).unwrap();
        assert_eq!(blob, text);
        assert_eq!(blob.to_string(), "abcd");
    }

    #[test]
    fn test_hex_is_lowercased() {
        let id: BuildId = "DeadBEEF".parse().unwrap();
        assert_eq!(id.as_str(), "deadbeef");
    }

    #[test]
    fn test_hex_stops_at_nul() {
        let id = BuildId::normalize(b"0a1b\0garbage", 0).unwrap();
        assert_eq!(id.as_str(), "0a1b");
    }

    #[test]
    fn test_binary_uses_only_len_bytes() {
        let id = BuildId::normalize(&[0x01, 0x02, 0x03], 2).unwrap();
        assert_eq!(id.as_str(), "0102");
    }

    #[test]
    fn test_binary_preserves_nul_bytes() {
        let id = BuildId::normalize(&[0x00, 0xff], 2).unwrap();
        assert_eq!(id.as_str(), "00ff");
    }

    #[test]
    fn test_negative_length() {
        assert!(matches!(BuildId::normalize(b"ab", -1), Err(Error::InvalidBuildId(_))));
    }

    #[test]
    fn test_length_beyond_input() {
        assert!(matches!(BuildId::normalize(&[0x01], 4), Err(Error::InvalidBuildId(_))));
    }

    #[test]
    fn test_odd_length_hex() {
        assert!(matches!("abc".parse::<BuildId>(), Err(Error::InvalidBuildId(_))));
    }

    #[test]
    fn test_non_hex_characters() {
        assert!(matches!("abzz".parse::<BuildId>(), Err(Error::InvalidBuildId(_))));
        assert!(matches!("ab/d".parse::<BuildId>(), Err(Error::InvalidBuildId(_))));
        assert!(matches!(BuildId::normalize(b"0x12", 0), Err(Error::InvalidBuildId(_))));
    }

    #[test]
    fn test_empty() {
        assert!(matches!(BuildId::normalize(b"\0", 0), Err(Error::InvalidBuildId(_))));
        assert!(matches!(BuildId::from_bytes(&[]), Err(Error::InvalidBuildId(_))));
    }

    #[test]
    fn test_too_long() {
        let long = [0x11u8; MAX_BUILD_ID_BYTES + 1];
        assert!(matches!(BuildId::from_bytes(&long), Err(Error::InvalidBuildId(_))));
        assert!(BuildId::from_bytes(&long[..MAX_BUILD_ID_BYTES]).is_ok());
    }

    #[test]
    fn test_sha1_sized_id() {
        let bytes: Vec<u8> = (0u8..20).collect();
        let id = BuildId::from_bytes(&bytes).unwrap();
        assert_eq!(id.as_str().len(), 40);
        assert_eq!(id.as_str(), "000102030405060708090a0b0c0d0e0f10111213");
    }
}
