//! Concrete collaborators for `rollout-core`: job handlers, approval gates
//! and progress renderers, plus factory functions that wire them from an
//! [`AppConfig`](rollout_core::api::AppConfig).

mod command;

pub mod approval;
pub mod executor;
pub mod factory;
pub mod handlers;
