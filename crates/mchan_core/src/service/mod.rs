//! Forum use-case services.
//!
//! # Responsibility
//! - Orchestrate parse/reconcile/persist into session-level APIs.
//! - Keep CLI and host layers decoupled from storage details.

pub mod forum_service;
pub mod generator;
