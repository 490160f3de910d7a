//! Cellular base-station recorder for Termux-hosted Android devices.
//!
//! Samples the GPS position on a fixed cadence, snapshots every detected
//! cell tower at each fix, and writes the combined readings to a timestamped
//! JSON file when the session stops.

pub mod mapper;
pub mod model;
pub mod sensors;
pub mod session;
pub mod storage;
