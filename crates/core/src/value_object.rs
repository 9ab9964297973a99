//! Value objects: equality by value, not identity.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values. To
/// "modify" one, build a new one.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

/// Human-facing title, normalised to title case (`"dental check"` -> `"Dental Check"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Title(String);

impl ValueObject for Title {}

impl Title {
    pub fn new(value: impl AsRef<str>) -> Result<Self, DomainError> {
        let words: Vec<String> = value
            .as_ref()
            .split_whitespace()
            .map(title_case_word)
            .collect();
        if words.is_empty() {
            return Err(DomainError::invalid_argument(
                "INVALID_TITLE",
                "title must not be blank",
            ));
        }
        Ok(Self(words.join(" ")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn title_case_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

impl core::fmt::Display for Title {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Title {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Title> for String {
    fn from(value: Title) -> Self {
        value.0
    }
}

/// Geographic point (`"latitude,longitude"` in text form).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpatialLocation {
    pub latitude: f64,
    pub longitude: f64,
}

impl ValueObject for SpatialLocation {}

impl SpatialLocation {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, DomainError> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(DomainError::invalid_argument(
                "INVALID_SPATIAL_LOCATION",
                format!("coordinates out of range: {latitude},{longitude}"),
            ));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

impl core::fmt::Display for SpatialLocation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:.6},{:.6}", self.latitude, self.longitude)
    }
}

impl FromStr for SpatialLocation {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            DomainError::invalid_argument(
                "INVALID_SPATIAL_LOCATION",
                format!("expected coordinates (latitude,longitude), got {s:?}"),
            )
        };
        let (lat, lon) = s.split_once(',').ok_or_else(invalid)?;
        let lat = lat.trim().parse::<f64>().map_err(|_| invalid())?;
        let lon = lon.trim().parse::<f64>().map_err(|_| invalid())?;
        Self::new(lat, lon)
    }
}
