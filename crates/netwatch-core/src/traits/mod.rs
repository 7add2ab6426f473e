//! Core traits for the netwatch system
//!
//! - [`AccessValidator`]: A single connectivity probe

pub mod access_validator;

pub use access_validator::AccessValidator;
