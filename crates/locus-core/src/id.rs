//! Strongly-typed identifiers, the map [`Revision`] counter and [`Timestamp`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing identifier string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Allocate a fresh, process-unique identifier.
            ///
            /// Uses a random v4 UUID behind a kind prefix, so ids of
            /// different kinds never collide even when printed side by side.
            pub fn generate() -> Self {
                Self(format!(concat!($prefix, "-{}"), Uuid::new_v4().simple()))
            }

            /// The identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(v: &str) -> Self {
                Self(v.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(v: String) -> Self {
                Self(v)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifies a [`SpatialMap`](crate::SpatialMap), one per signing session.
    ///
    /// Map ids are always generated by the manager; a discarded map's id is
    /// never handed out again.
    MapId,
    "map"
);

string_id!(
    /// Identifies a [`SpatialReference`](crate::SpatialReference) within a map.
    ///
    /// Immutable after creation. Callers may supply their own ids (for
    /// example the gloss of the sign that introduced the referent).
    ReferenceId,
    "ref"
);

string_id!(
    /// Identifies a [`SpatialConnection`](crate::SpatialConnection).
    ConnectionId,
    "conn"
);

string_id!(
    /// Identifies a [`SpatialRegion`](crate::SpatialRegion).
    RegionId,
    "region"
);

/// Mutation counter of a [`SpatialMap`](crate::SpatialMap).
///
/// Incremented on every committed mutation. Derived query results are
/// cached under the revision they were computed against, so a bumped
/// revision can never be served a stale result.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Revision(pub u64);

impl Revision {
    /// The revision following this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Revision {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Wall-clock instant in milliseconds since the UNIX epoch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// The current wall-clock time.
    ///
    /// A clock set before 1970 reads as zero rather than failing.
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self(millis)
    }

    /// The current time, but never earlier than `floor`.
    ///
    /// Keeps `updated_at >= created_at` even if the wall clock steps back.
    pub fn now_at_least(floor: Timestamp) -> Self {
        Self::now().max(floor)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_prefixed_and_unique() {
        let a = ReferenceId::generate();
        let b = ReferenceId::generate();
        assert!(a.as_str().starts_with("ref-"));
        assert_ne!(a, b);
        assert!(MapId::generate().as_str().starts_with("map-"));
        assert!(ConnectionId::generate().as_str().starts_with("conn-"));
        assert!(RegionId::generate().as_str().starts_with("region-"));
    }

    #[test]
    fn revision_next_is_monotonic() {
        let r = Revision::default();
        assert_eq!(r.next(), Revision(1));
        assert!(r.next() > r);
    }

    #[test]
    fn now_at_least_respects_floor() {
        let far_future = Timestamp(u64::MAX / 2);
        assert_eq!(Timestamp::now_at_least(far_future), far_future);
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = ReferenceId::new("dog");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"dog\"");
    }
}
