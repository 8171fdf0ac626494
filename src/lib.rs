#![cfg_attr(not(test), no_std)]

//! mitsu_bridge
//!
//! ESP32-S3 firmware for Mitsubishi heat pumps with a CN105 connector.
//!
//! The crate is split the same way on every image: hardware-independent
//! modules (`protocol`, `heatpump`, `logic`, `wifi`, `bridge`, `report`) talk
//! to the outside world only through the traits in [`traits`], and the
//! `firmware` feature adds the esp-hal bindings in `hardware`.

pub mod bridge;
pub mod config;
pub mod error;
pub mod heatpump;
pub mod logic;
pub mod model;
pub mod protocol;
pub mod report;
pub mod traits;
pub mod wifi;

#[cfg(feature = "firmware")]
pub mod hardware;

#[cfg(test)]
pub(crate) mod mock;

pub use error::{Error, Result};
