use serde::{Deserialize, Serialize};

use bookings_core::{Entity, UserId};

use crate::fetcher::ReferenceEntity;

/// Platform user; the one who schedules appointments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    id: UserId,
    full_name: String,
}

impl User {
    pub fn new(id: UserId, full_name: impl Into<String>) -> Self {
        Self {
            id,
            full_name: full_name.into(),
        }
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl ReferenceEntity for User {
    const RESOURCE: &'static str = "user";
}
