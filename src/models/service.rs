use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    PunctureRepair,
    StepneyChange,
    TubeReplacement,
    AirFill,
    FuelDelivery,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VehicleType {
    Car,
    Bike,
    Scooter,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceOffering {
    pub key: ServiceKind,
    pub title: &'static str,
    pub base_price: f64,
    pub estimated_time_minutes: u32,
}

pub const CATALOG: [ServiceKind; 5] = [
    ServiceKind::PunctureRepair,
    ServiceKind::StepneyChange,
    ServiceKind::TubeReplacement,
    ServiceKind::AirFill,
    ServiceKind::FuelDelivery,
];

impl ServiceKind {
    pub fn offering(self) -> ServiceOffering {
        let (title, base_price, estimated_time_minutes) = match self {
            ServiceKind::PunctureRepair => ("Puncture Repair", 199.0, 30),
            ServiceKind::StepneyChange => ("Stepney Change", 149.0, 20),
            ServiceKind::TubeReplacement => ("Tube Replacement", 349.0, 45),
            ServiceKind::AirFill => ("Air Filling", 49.0, 10),
            ServiceKind::FuelDelivery => ("Fuel Delivery", 99.0, 25),
        };

        ServiceOffering {
            key: self,
            title,
            base_price,
            estimated_time_minutes,
        }
    }
}
