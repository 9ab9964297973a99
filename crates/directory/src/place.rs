use serde::{Deserialize, Serialize};

use bookings_core::{Entity, PlaceId, SpatialLocation};

use crate::fetcher::ReferenceEntity;

/// Physical location where appointments happen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    id: PlaceId,
    name: String,
    location: Option<SpatialLocation>,
}

impl Place {
    pub fn new(id: PlaceId, name: impl Into<String>, location: Option<SpatialLocation>) -> Self {
        Self {
            id,
            name: name.into(),
            location,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> Option<SpatialLocation> {
        self.location
    }
}

impl Entity for Place {
    type Id = PlaceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl ReferenceEntity for Place {
    const RESOURCE: &'static str = "place";
}
