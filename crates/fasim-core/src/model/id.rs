//! Integer identities for stored entities.
//!
//! Every identity wraps the `INTEGER PRIMARY KEY` SQLite assigned to the
//! row. Node identities are the exception that callers may also mint
//! themselves: before a pipeline is persisted its nodes carry placeholder
//! ids that only describe intended edges.

use rusqlite::ToSql;
use rusqlite::types::{FromSql, FromSqlResult, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wrap a raw integer identity.
            #[must_use]
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// The raw integer identity.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.0))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                i64::column_result(value).map(Self)
            }
        }
    };
}

define_id!(
    /// Durable identity of an [`Item`](super::Item).
    ItemId
);
define_id!(
    /// Durable identity of a [`Facility`](super::Facility).
    FacilityId
);
define_id!(
    /// Durable identity of a [`Pipeline`](super::Pipeline).
    PipelineId
);
define_id!(
    /// Identity of a [`PipelineNode`](super::PipelineNode): a placeholder
    /// before persistence, the row id of `pipeline_nodes` after.
    NodeId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_serialize_as_bare_integers() {
        let json = serde_json::to_string(&NodeId::new(7)).expect("serialize");
        assert_eq!(json, "7");

        let back: ItemId = serde_json::from_str("42").expect("deserialize");
        assert_eq!(back, ItemId::new(42));
    }

    #[test]
    fn ids_work_as_json_map_keys() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(NodeId::new(2), "b");
        map.insert(NodeId::new(1), "a");

        let json = serde_json::to_string(&map).expect("serialize");
        assert_eq!(json, r#"{"1":"a","2":"b"}"#);

        let back: std::collections::BTreeMap<NodeId, String> =
            serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.len(), 2);
        assert_eq!(back[&NodeId::new(1)], "a");
    }

    #[test]
    fn ids_round_trip_through_sqlite() -> rusqlite::Result<()> {
        let conn = rusqlite::Connection::open_in_memory()?;
        let id: FacilityId = conn.query_row("SELECT ?1", [FacilityId::new(99)], |row| row.get(0))?;
        assert_eq!(id.get(), 99);
        Ok(())
    }
}
