//! Response helpers shared by every route.
pub mod envelope;
pub mod httperror;
