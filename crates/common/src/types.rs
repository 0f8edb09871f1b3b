use serde::{Deserialize, Serialize};

/// Backend-generated identity of a persisted record.
///
/// The value `0` is the unset sentinel: a record carries it until a create
/// operation succeeds, after which the identity never changes.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RecordId(i64);

impl RecordId {
    /// Identity of a record that has not been persisted yet.
    pub const UNSET: RecordId = RecordId(0);

    /// Wraps a raw identity value.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw identity value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }

    /// Returns true once the backend has assigned an identity.
    pub fn is_set(&self) -> bool {
        self.0 != 0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<RecordId> for i64 {
    fn from(id: RecordId) -> Self {
        id.0
    }
}

impl std::str::FromStr for RecordId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<i64>().map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_unset() {
        let id = RecordId::default();
        assert_eq!(id, RecordId::UNSET);
        assert!(!id.is_set());
    }

    #[test]
    fn generated_identity_is_set() {
        let id = RecordId::new(42);
        assert!(id.is_set());
        assert_eq!(id.as_i64(), 42);
    }

    #[test]
    fn parses_from_path_segment() {
        let id: RecordId = "17".parse().unwrap();
        assert_eq!(id, RecordId::new(17));
        assert!("abc".parse::<RecordId>().is_err());
    }

    #[test]
    fn serializes_as_plain_integer() {
        let json = serde_json::to_string(&RecordId::new(7)).unwrap();
        assert_eq!(json, "7");
        let back: RecordId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, RecordId::new(7));
    }
}
