use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RiderStatus {
    Active,
    OffDuty,
    Inactive,
}

impl RiderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiderStatus::Active => "active",
            RiderStatus::OffDuty => "off_duty",
            RiderStatus::Inactive => "inactive",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VehicleType {
    Bicycle,
    Motorcycle,
    Car,
    Van,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rider {
    pub id: Uuid,
    pub full_name: String,
    pub phone: String,
    pub vehicle_type: VehicleType,
    pub status: RiderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Condensed rider fields joined onto assignment listings.
#[derive(Debug, Clone, Serialize)]
pub struct RiderSummary {
    pub id: Uuid,
    pub full_name: String,
    pub phone: String,
    pub vehicle_type: VehicleType,
}

impl From<&Rider> for RiderSummary {
    fn from(rider: &Rider) -> Self {
        Self {
            id: rider.id,
            full_name: rider.full_name.clone(),
            phone: rider.phone.clone(),
            vehicle_type: rider.vehicle_type,
        }
    }
}
