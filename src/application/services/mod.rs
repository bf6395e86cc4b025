//! Engine services: meter-value synthesis and smart charging.

pub mod meter_values;
pub mod smart_charging;
