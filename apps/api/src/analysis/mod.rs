//! Requirement extraction, candidate matching, and batch orchestration.

pub mod batch;
pub mod handlers;
pub mod matcher;
pub mod prompts;
pub mod requirements;
