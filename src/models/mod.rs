//! Domain models for the onboarding run.
//!
//! This module contains the core data structures used throughout the application:
//! - [`AccountInfo`] - subscription context discovered from ARM
//! - [`DeploymentOutputs`] - typed access to ARM deployment outputs
//! - [`RegistrationPayload`] - notification body for the collection service

mod account;
mod deployment;
mod registration;

// Re-export public types
pub use account::{AccountInfo, SubscriptionEntry, SubscriptionPage};
pub use deployment::{Deployment, DeploymentOutputs, DeploymentProperties};
pub use registration::RegistrationPayload;
