//! Personal work-time tracker for the terminal. Runs a live start/stop
//! timer, records sessions per person and day (splitting a running session
//! at midnight), supports manual entries and deletions, and round-trips
//! the data through a plain-text report.

pub mod cli;
pub mod report;
pub mod store;
pub mod tracker;
pub mod utils;
