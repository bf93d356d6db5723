//! Security module
//!
//! Completion-service API key storage (environment, OS keyring, file).

pub mod keyring;

pub use keyring::{delete_api_key, get_api_key, has_api_key, set_api_key};
