//! metafeed monitor library
//!
//! This library exposes modules for integration testing.
//! The main binary is in main.rs.

pub mod config;
pub mod decoder;
pub mod error;
pub mod events;
pub mod feed;
pub mod message;
pub mod metrics;
pub mod monitor;
pub mod queue;
pub mod reassembly;
pub mod routes;
pub mod tracker;
