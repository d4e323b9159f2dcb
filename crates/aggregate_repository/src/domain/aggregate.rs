//! Aggregate and identity contracts.

use rusqlite::types::{FromSql, ToSql};
use std::fmt::Display;
use std::hash::Hash;
use uuid::Uuid;

/// Identity value of an aggregate.
///
/// `generate` must be side-effect free and never touch storage.
pub trait Identity:
    Clone + Eq + Hash + Display + ToSql + FromSql + Send + Sync + 'static
{
    fn generate() -> Self;
}

/// Random UUID v4 rendered as text.
impl Identity for String {
    fn generate() -> Self {
        Uuid::new_v4().to_string()
    }
}

impl Identity for Uuid {
    fn generate() -> Self {
        Uuid::new_v4()
    }
}

/// Identity-bearing unit of consistency.
pub trait Aggregate: Clone + Send + Sync + 'static {
    type Id: Identity;

    fn id(&self) -> &Self::Id;
}

#[cfg(test)]
mod tests {
    use super::Identity;
    use std::collections::HashSet;
    use uuid::Uuid;

    #[test]
    fn generated_string_ids_are_unique_uuids() {
        let ids: HashSet<String> = (0..10_000).map(|_| String::generate()).collect();
        assert_eq!(ids.len(), 10_000);
        assert!(ids.iter().all(|id| Uuid::parse_str(id).is_ok()));
    }

    #[test]
    fn generated_uuid_ids_are_v4() {
        let id = Uuid::generate();
        assert_eq!(id.get_version_num(), 4);
    }
}
