//! Side-effecting collaborators, each behind a narrow API.

pub mod agent_config;
pub mod gitlab;
pub mod host;
pub mod permissions;
pub mod registry;
pub mod templates;
