//! Use-case layer: feature gate, inbound handlers, engine services.

pub mod gate;
pub mod handlers;
pub mod services;
