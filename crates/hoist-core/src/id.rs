use data_encoding::BASE32_NOPAD;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

use crate::CoreError;

const FINGERPRINT_PREFIX: &str = "hst_";

/// Content fingerprint of a payload. Two payloads with identical bytes always
/// share a fingerprint, regardless of name or metadata.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let bytes = hex::decode(s).map_err(|e| CoreError::InvalidFingerprint(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CoreError::InvalidFingerprint("expected 32 bytes".into()))?;
        Ok(Self(arr))
    }

    pub fn from_display(s: &str) -> Result<Self, CoreError> {
        let encoded = s.strip_prefix(FINGERPRINT_PREFIX).ok_or_else(|| {
            CoreError::InvalidFingerprint(format!("missing prefix '{FINGERPRINT_PREFIX}'"))
        })?;
        let upper = encoded.to_uppercase();
        let bytes = BASE32_NOPAD
            .decode(upper.as_bytes())
            .map_err(|e| CoreError::InvalidFingerprint(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CoreError::InvalidFingerprint("expected 32 bytes".into()))?;
        Ok(Self(arr))
    }

    /// Accepts either the prefixed display form or plain hex.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        if s.starts_with(FINGERPRINT_PREFIX) {
            Self::from_display(s)
        } else {
            Self::from_hex(s)
        }
    }

    /// First 2 hex chars, used for object directory sharding
    pub fn shard_prefix(&self) -> String {
        hex::encode(&self.0[..1])
    }

    /// Remaining hex chars for the object filename
    pub fn shard_suffix(&self) -> String {
        hex::encode(&self.0[1..])
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = BASE32_NOPAD.encode(&self.0).to_lowercase();
        write!(f, "{FINGERPRINT_PREFIX}{encoded}")
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self)
    }
}

impl FromStr for Fingerprint {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(Ulid);

impl ItemId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Ulid::from_bytes(bytes))
    }

    pub fn as_bytes(&self) -> [u8; 16] {
        self.0.to_bytes()
    }

    pub fn from_string(s: &str) -> Result<Self, CoreError> {
        let ulid = Ulid::from_string(s).map_err(|e| CoreError::InvalidItemId(e.to_string()))?;
        Ok(Self(ulid))
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ItemId({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::fingerprint;

    #[test]
    fn fingerprint_display_roundtrip() {
        let fp = fingerprint(b"photo bytes");
        let shown = fp.to_string();
        assert!(shown.starts_with("hst_"));
        assert_eq!(Fingerprint::from_display(&shown).unwrap(), fp);
        assert_eq!(shown.parse::<Fingerprint>().unwrap(), fp);
    }

    #[test]
    fn fingerprint_hex_roundtrip() {
        let fp = fingerprint(b"photo bytes");
        assert_eq!(Fingerprint::parse(&fp.to_hex()).unwrap(), fp);
    }

    #[test]
    fn fingerprint_rejects_short_hex() {
        assert!(Fingerprint::from_hex("abcd").is_err());
        assert!(Fingerprint::from_display("nope").is_err());
    }

    #[test]
    fn shard_parts_cover_hex() {
        let fp = fingerprint(b"x");
        assert_eq!(format!("{}{}", fp.shard_prefix(), fp.shard_suffix()), fp.to_hex());
    }

    #[test]
    fn item_ids_are_unique_and_parse() {
        let a = ItemId::new();
        let b = ItemId::new();
        assert_ne!(a, b);
        assert_eq!(ItemId::from_string(&a.to_string()).unwrap(), a);
        assert!(ItemId::from_string("not-a-ulid").is_err());
    }
}
