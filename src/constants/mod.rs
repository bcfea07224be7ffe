//! Constants (fixed limits, header names and environment lookups) used across the application.
pub mod api;
pub mod secrets;
