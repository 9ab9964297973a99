//! Identifiers used across the domain.
//!
//! Ids are opaque strings assigned by callers or by an `IdFactory`. The
//! default factory produces UUIDv7 strings so ids sort by creation time.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Produces new aggregate identifiers.
pub trait IdFactory: Send + Sync {
    fn new_id(&self) -> Result<String, DomainError>;
}

/// UUIDv7 id factory (time-ordered).
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidV7Factory;

impl IdFactory for UuidV7Factory {
    fn new_id(&self) -> Result<String, DomainError> {
        Ok(Uuid::now_v7().to_string())
    }
}

/// Id of an organization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrganizationId(String);

/// Id of an appointment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppointmentId(String);

/// Id of a place.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaceId(String);

/// Id of an employee.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmployeeId(String);

/// Id of a user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

macro_rules! impl_string_id {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Wrap an existing identifier. Blank values are rejected.
            pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
                let value = value.into();
                if value.trim().is_empty() {
                    return Err(DomainError::invalid_argument(
                        "INVALID_ID",
                        concat!($name, " must not be blank"),
                    ));
                }
                Ok(Self(value))
            }

            /// Allocate a fresh identifier from a factory.
            pub fn generate(factory: &dyn IdFactory) -> Result<Self, DomainError> {
                Self::new(factory.new_id()?)
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

impl_string_id!(OrganizationId, "OrganizationId");
impl_string_id!(AppointmentId, "AppointmentId");
impl_string_id!(PlaceId, "PlaceId");
impl_string_id!(EmployeeId, "EmployeeId");
impl_string_id!(UserId, "UserId");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_ids_are_rejected() {
        assert!(OrganizationId::new("  ").is_err());
        assert!("".parse::<PlaceId>().is_err());
    }

    #[test]
    fn uuid_factory_ids_are_unique_uuids() {
        let factory = UuidV7Factory;
        let a = AppointmentId::generate(&factory).unwrap();
        let b = AppointmentId::generate(&factory).unwrap();

        assert_ne!(a, b);
        assert!(Uuid::parse_str(a.as_str()).is_ok());
    }
}
