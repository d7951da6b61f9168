//! Record identity

use serde::{Deserialize, Serialize};

/// Identity of a single record in a domain repository
///
/// Records are partitioned by `kind` (the entity type name) and addressed by a
/// numeric id that is unique within that kind. Ordering is by kind first, then
/// id, so sets of keys iterate deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    pub kind: String,
    pub id: i64,
}

impl RecordKey {
    pub fn new(kind: impl Into<String>, id: i64) -> Self {
        Self {
            kind: kind.into(),
            id,
        }
    }
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}
