//! Identifier newtypes.
//!
//! Every entity is addressed by an opaque string. Distinct newtypes keep a
//! recipient id from being passed where a split id is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the raw identifier.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// True if the identifier is empty or only whitespace.
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Identity of a revenue split version.
    SplitId
);
string_id!(
    /// The content item whose revenue is split.
    ContentId
);
string_id!(
    /// The creator who owns a split.
    CreatorId
);
string_id!(
    /// A party receiving a share of revenue.
    RecipientId
);
string_id!(
    /// The party that paid for content.
    PayerId
);
string_id!(
    /// Identity of a recorded payment.
    TransactionId
);
string_id!(
    /// Identity of a claim receipt.
    ClaimId
);
