//! ---
//! volture_section: "01-core-functionality"
//! volture_subsection: "module"
//! volture_type: "source"
//! volture_scope: "code"
//! volture_description: "Runtime helpers supporting the tick driver."
//! volture_version: "v0.1.0"
//! volture_owner: "tbd"
//! ---
//! Scheduling helpers for the Volture runtime.

pub mod scheduling;

pub use scheduling::RateLimiter;
