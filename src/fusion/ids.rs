//! Opaque identifiers for tags, tracks and readers.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

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
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// RFID tag, i.e. the identity of one animal.
    TagId
);

string_id!(
    /// Anonymous track label from the pose tracker (e.g. `ind1`).
    ///
    /// Only meaningful within the raw pose output; nothing assumes it is
    /// stable across an interval boundary.
    TrackId
);

string_id!(
    /// RFID antenna name (e.g. `R1.1`).
    ReaderId
);
