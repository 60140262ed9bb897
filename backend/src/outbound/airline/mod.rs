//! Airline outbound adapters.
//!
//! This module provides a thin HTTP implementation of the `AirlineAdapter`
//! port, configured per airline.

mod dto;
mod http_adapter;

pub use http_adapter::{HttpAirlineAdapter, HttpAirlineSettings};
