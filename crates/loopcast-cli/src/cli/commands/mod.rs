//! CLI command handlers, one file per command.

mod acquire;
mod combine;
mod now;
mod schedule;
mod status;

pub use acquire::run_acquire;
pub use combine::run_combine;
pub use now::run_now;
pub use schedule::run_schedule;
pub use status::run_status;
