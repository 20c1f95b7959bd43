//! Schema-driven parameter store with captive-portal provisioning.
//!
//! Hexagonal layout: pure logic in the core modules, platform touchpoints
//! behind port traits with ESP-IDF and simulation adapters.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                   Adapters (outer ring)                  │
//! │                                                          │
//! │  EspNvsStorage   EspWireless   EspHttpPortal   EspSystem │
//! │  MemoryNvs       SimWireless   SimHttpServer   SimSystem │
//! │                                                          │
//! │  ─────────────── Port Trait Boundary ───────────────     │
//! │                                                          │
//! │  ┌────────────────────────────────────────────────┐      │
//! │  │  Schema · Store · FormPage · Portal            │      │
//! │  └────────────────────────────────────────────────┘      │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! The record lives in NVS as `[signature][crc16][fields]`; the form page
//! is generated from the same schema that defines the record, and the
//! portal serves it over a soft AP with catch-all DNS until the device is
//! provisioned.
#![deny(unused_must_use)]

pub mod adapters;
pub mod boot_flags;
pub mod codec;
pub mod error;
pub mod markup;
pub mod portal;
pub mod ports;
pub mod schema;
pub mod store;
pub mod web;

pub use error::{Error, Result};
pub use portal::{Portal, PortalConfig, PortalEvent, PortalState, PortalStatus};
pub use schema::{Bound, Choice, DefaultValue, Editor, EditorFlags, ParamInfo, ParamType, Schema};
pub use store::{Store, Value};
pub use web::FormPage;
