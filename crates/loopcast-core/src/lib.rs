pub mod config;
pub mod logging;

// Acquisition
pub mod acquire;
pub mod catalog;
pub mod combine;
pub mod executor;
pub mod parse;
pub mod providers;
pub mod retry;
pub mod scorer;
pub mod state;
pub mod storage;

// Scheduling
pub mod inventory;
pub mod media;
pub mod schedule;
