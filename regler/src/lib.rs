//! Schema-driven settings panel for axum applications.
//!
//! An admin defines typed configuration entries at runtime, without code
//! changes or migrations; application code reads them through the
//! [`SettingStore`](regler_core::SettingStore). This crate provides the
//! process builder wiring everything together and the admin HTTP API the
//! (external) settings UI talks to.

pub use crate::regler::*;

/// Re-export of [`regler_core`]
pub mod core {
    pub use regler_core::*;
}

pub mod re_exports {
    pub use axum;
}

pub mod api_error;
pub mod error;
pub mod handler;
pub mod logging;
mod regler;
