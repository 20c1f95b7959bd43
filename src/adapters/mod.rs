//! Platform backends for the ports.
//!
//! ESP-IDF implementations are gated on `target_os = "espidf"`; every other
//! target gets simulation backends so the full provisioning logic runs in
//! host tests.

pub mod dns;
pub mod http;
pub mod nvs;
pub mod system;
pub mod wifi;
