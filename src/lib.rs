//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates (`core-service` and, through it, `core-auth` and
//! `core-onboarding`). Host applications can depend on
//! `practice-core-workspace` and enable the documented features without
//! wiring each crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_service::{CoreService, CoreServiceBuilder};
