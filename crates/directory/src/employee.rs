use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bookings_core::{EmployeeId, Entity};

use crate::fetcher::ReferenceEntity;

/// Staff member an appointment can be targeted to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    id: EmployeeId,
    full_name: String,
    hired_at: DateTime<Utc>,
}

impl Employee {
    pub fn new(id: EmployeeId, full_name: impl Into<String>, hired_at: DateTime<Utc>) -> Self {
        Self {
            id,
            full_name: full_name.into(),
            hired_at,
        }
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn hired_at(&self) -> DateTime<Utc> {
        self.hired_at
    }
}

impl Entity for Employee {
    type Id = EmployeeId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl ReferenceEntity for Employee {
    const RESOURCE: &'static str = "employee";
}
