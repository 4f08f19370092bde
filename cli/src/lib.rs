//! rollout-cli library: command implementations, exposed for unit tests.

pub mod commands;
