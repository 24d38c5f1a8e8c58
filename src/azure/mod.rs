//! Azure Resource Manager, Microsoft Graph, and authentication.
//!
//! This module handles all Azure-related operations:
//! - [`auth`] - token acquisition strategies
//! - [`arm`] - subscription discovery and template deployments
//! - [`graph`] - directory visibility lookups

mod arm;
mod auth;
mod graph;

// Re-export public types and functions
pub use arm::{
    arm_parameters, ArmClient, DeployTarget, ResourceGroupDeployer, DEFAULT_MANAGEMENT_ENDPOINT,
};
pub use auth::{acquire_tokens, AccessTokens, AuthMethod, ARM_SCOPE, GRAPH_SCOPE};
pub use graph::{GraphClient, LookupOutcome, PrincipalLookup, DEFAULT_GRAPH_ENDPOINT};
