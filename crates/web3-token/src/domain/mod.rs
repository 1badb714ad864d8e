//! # Domain Layer
//!
//! Pure token logic with no I/O dependencies.
//! This is the inner layer of the hexagonal architecture.

pub mod address;
pub mod config;
pub mod duration;
pub mod entities;
pub mod envelope;
pub mod errors;
pub mod message;
pub mod validation;
