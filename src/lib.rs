//! release-pilot: drive a gated, multi-stage software release across git,
//! an issue tracker and a review/CI service.
//!
//! The library exposes the stage driver and the client traits so the
//! orchestration can be exercised against fakes; the binary wires up the
//! real clients.

pub mod controller;
pub mod core;
pub mod forge;
pub mod gates;
pub mod tracker;
pub mod ui;
