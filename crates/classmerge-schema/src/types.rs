//! Newtype wrappers for resource names, providing compile-time type safety.
//!
//! All newtypes serialize/deserialize as plain strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

/// Separator used in logical paths and archive entry names, independent of host.
pub const SEPARATOR: char = '/';

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance from a string.
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Return the inner string as a slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_newtype!(
    /// A resource path (`a/b/C.class`) or a package prefix (`a/b/`), independent
    /// of where the resource physically lives.
    LogicalPath
);

string_newtype!(
    /// Name of an entry inside an archive, always `/`-separated and relative.
    EntryName
);

impl LogicalPath {
    /// Build a logical path from user input, converting `\` separators to `/`.
    pub fn normalized(s: &str) -> Self {
        Self(s.trim().replace('\\', "/"))
    }

    /// A prefix denotes every entry whose name starts with it.
    pub fn is_prefix(&self) -> bool {
        self.0.ends_with(SEPARATOR)
    }

    /// The same path with exactly one trailing separator.
    pub fn as_prefix(&self) -> Self {
        if self.is_prefix() {
            self.clone()
        } else {
            Self(format!("{}{SEPARATOR}", self.0))
        }
    }
}

impl EntryName {
    /// Directory entries in a zip container end with the separator.
    pub fn is_dir(&self) -> bool {
        self.0.ends_with(SEPARATOR)
    }
}
