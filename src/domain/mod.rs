//! Core entities of the session engine: station identity, connector ledger,
//! templates, reservations and feature profiles.

pub mod connector;
pub mod feature_profile;
pub mod info;
pub mod ocpp_config;
pub mod reservation;
pub mod template;

pub use connector::{ActiveTransaction, ClearProfilesFilter, Connector, ConnectorLedger};
pub use feature_profile::FeatureProfile;
pub use info::{CurrentType, StationInfo};
pub use ocpp_config::OcppConfiguration;
pub use reservation::Reservation;
pub use template::{SampledValueTemplate, StationTemplate};
