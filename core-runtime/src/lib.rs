//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the practice portal core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that the auth and onboarding
//! crates depend on. It establishes the logging conventions, the validated
//! collaborator bundle (`CoreConfig`) and the event broadcasting mechanism
//! through which the core talks to the host UI.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
