//! In-process storage adapters.

mod flight_repository;

pub use flight_repository::InMemoryFlightRecordRepository;
