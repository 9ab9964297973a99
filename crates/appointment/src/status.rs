use core::str::FromStr;
use serde::{Deserialize, Serialize};

use bookings_core::DomainError;

/// Appointment lifecycle status.
///
/// `Unknown` exists only as the zero value of external input; it never
/// survives validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    #[default]
    Unknown,
    Scheduled,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 4] = [
        AppointmentStatus::Unknown,
        AppointmentStatus::Scheduled,
        AppointmentStatus::Cancelled,
        AppointmentStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Unknown => "UNKNOWN",
            AppointmentStatus::Scheduled => "SCHEDULED",
            AppointmentStatus::Cancelled => "CANCELLED",
            AppointmentStatus::Completed => "COMPLETED",
        }
    }
}

impl core::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                DomainError::invalid_argument(
                    "INVALID_STATUS",
                    format!("unknown appointment status label {s:?}"),
                )
            })
    }
}
