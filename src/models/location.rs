// file: src/models/location.rs
// description: coarse caller location and the explicit lookup outcome
// reference: internal data structures

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Location {
    pub fn new(city: &str, state: &str, country: &str) -> Self {
        Self {
            city: non_empty(city),
            state: non_empty(state),
            country: non_empty(country),
            latitude: None,
            longitude: None,
        }
    }

    pub fn with_coordinates(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }

    pub fn city(&self) -> &str {
        self.city.as_deref().unwrap_or_default()
    }

    pub fn state(&self) -> &str {
        self.state.as_deref().unwrap_or_default()
    }

    pub fn country(&self) -> &str {
        self.country.as_deref().unwrap_or_default()
    }

    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }

    /// True when no place name is known at all.
    pub fn is_blank(&self) -> bool {
        self.city().trim().is_empty()
            && self.state().trim().is_empty()
            && self.country().trim().is_empty()
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Outcome of a best-effort location lookup. A failed lookup and a lookup
/// that found nothing are both `Absent`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LocationLookup {
    Resolved(Location),
    #[default]
    Absent,
}

impl LocationLookup {
    pub fn as_location(&self) -> Option<&Location> {
        match self {
            LocationLookup::Resolved(location) => Some(location),
            LocationLookup::Absent => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, LocationLookup::Absent)
    }
}

impl From<Option<Location>> for LocationLookup {
    fn from(location: Option<Location>) -> Self {
        match location {
            Some(location) if !location.is_blank() => LocationLookup::Resolved(location),
            _ => LocationLookup::Absent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_fields_are_unknown() {
        let location = Location::new("Austin", "", " US ");
        assert_eq!(location.city(), "Austin");
        assert_eq!(location.state, None);
        assert_eq!(location.country(), "US");
    }

    #[test]
    fn test_blank_location_is_absent() {
        let lookup = LocationLookup::from(Some(Location::default()));
        assert!(lookup.is_absent());

        let lookup = LocationLookup::from(Some(Location::new("", "CA", "")));
        assert_eq!(lookup.as_location().map(Location::state), Some("CA"));
    }

    #[test]
    fn test_coordinates_need_both_axes() {
        let mut location = Location::new("Los Angeles", "CA", "US");
        location.latitude = Some(34.05);
        assert_eq!(location.coordinates(), None);

        let location = location.with_coordinates(34.05, -118.24);
        assert_eq!(location.coordinates(), Some((34.05, -118.24)));
    }
}
