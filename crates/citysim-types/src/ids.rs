//! Type-safe identifier wrappers around [`String`].
//!
//! Cars are identified by their VIN and cities by a slug derived from
//! their display name. Both are human-readable strings on the wire, but
//! they are distinct types so a car id can never be looked up in the city
//! directory by accident.

use serde::{Deserialize, Serialize};

/// Generates a newtype wrapper around [`String`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an already-generated identifier string.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Return the inner [`String`] value.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id! {
    /// Vehicle identification number of a simulated car.
    CarId
}

define_id! {
    /// Slug identifying a city: its name lower-cased with spaces replaced
    /// by underscores.
    CityId
}

impl CityId {
    /// Derive the city id from a display name (`"King's Landing"` becomes
    /// `"king's_landing"`).
    pub fn from_name(name: &str) -> Self {
        Self(name.to_lowercase().replace(' ', "_"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn city_id_is_slug_of_name() {
        assert_eq!(CityId::from_name("Kings Landing").as_str(), "kings_landing");
        assert_eq!(CityId::from_name("Braavos").as_str(), "braavos");
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = CarId::new("1HGBH41JXMN109186");
        let json = serde_json::to_string(&id).unwrap_or_default();
        assert_eq!(json, "\"1HGBH41JXMN109186\"");
    }
}
