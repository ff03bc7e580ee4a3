use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(uuid::Uuid);

        impl $name {
            /// Generate a new time-ordered identifier (UUID v7).
            pub fn new() -> Self {
                Self(uuid::Uuid::now_v7())
            }

            /// Wrap an existing UUID.
            pub fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// The underlying UUID.
            pub fn as_uuid(&self) -> &uuid::Uuid {
                &self.0
            }

            /// Short representation (first 8 characters of the UUID).
            pub fn short_id(&self) -> String {
                self.0.to_string()[..8].to_string()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl FromStr for $name {
            type Err = TypeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                uuid::Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|e| TypeError::InvalidId(format!("{s:?}: {e}")))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.short_id())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id! {
    /// Opaque caller identity issued by the authentication layer.
    ///
    /// The store only uses it as an ownership-partition key; it never creates
    /// or validates users itself.
    UserId
}

uuid_id! {
    /// Identifier of a [`TodoList`](crate::TodoList).
    ListId
}

uuid_id! {
    /// Identifier of a [`TodoItem`](crate::TodoItem).
    ItemId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ids_are_unique() {
        let a = ListId::new();
        let b = ListId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn parse_display_roundtrip() {
        let id = UserId::new();
        let parsed: UserId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn parse_tolerates_surrounding_whitespace() {
        let id = ListId::new();
        let parsed: ListId = format!("  {id}\n").parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn parse_rejects_garbage() {
        let err = "not-a-uuid".parse::<ItemId>().unwrap_err();
        assert!(matches!(err, TypeError::InvalidId(_)));
    }

    #[test]
    fn short_id_is_eight_chars() {
        assert_eq!(UserId::new().short_id().len(), 8);
    }

    #[test]
    fn debug_names_the_kind() {
        let debug = format!("{:?}", ListId::new());
        assert!(debug.starts_with("ListId("));
    }

    #[test]
    fn serializes_as_bare_uuid_string() {
        let id = ItemId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let back: ItemId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
