//! Run configuration and CLI parameters.
//!
//! Everything a run needs is resolved up front into an explicit [`RunConfig`]
//! and passed down as arguments; nothing reads ambient state later.

use crate::azure::AuthMethod;
use clap::Parser;
use regex::Regex;
use std::error::Error;
use std::sync::OnceLock;

/// Maximum directory lookup attempts before the replication wait gives up.
pub const MAX_LOOKUP_ATTEMPTS: u32 = 4;
/// Base delay in seconds for the lookup backoff schedule.
pub const LOOKUP_BASE_DELAY_SECS: u64 = 8;

/// Custom workspace table the templates create and the DCR routes into.
pub const LOG_TABLE_NAME: &str = "OnboardingEvents_CL";

/// Where the resource templates are fetched from unless overridden.
pub const DEFAULT_TEMPLATE_BASE_URL: &str =
    "https://stonboardingassets.blob.core.windows.net/templates";

/// Environment variable consulted when --api-token is not given.
pub const API_TOKEN_ENV: &str = "REGISTRATION_API_TOKEN";

/// Transport-level timeout for every HTTP call.
pub const HTTP_TIMEOUT_SECS: u64 = 120;

/// Provision the Azure resources for log-ingestion onboarding.
#[derive(Parser, Debug)]
#[command(name = "azure-monitor-onboarding", version)]
pub struct Args {
    /// Target resource group (must already exist)
    #[arg(long)]
    pub resource_group: String,

    /// Override the derived Log Analytics workspace name
    #[arg(long)]
    pub workspace_name: Option<String>,

    /// Subscription id or display name; defaults to the first enabled one
    #[arg(long)]
    pub subscription: Option<String>,

    /// How to authenticate against Azure
    #[arg(long, value_enum, default_value = "azure-cli")]
    pub auth_method: AuthMethod,

    /// Registration endpoint to notify once provisioning finished
    #[arg(long)]
    pub api_url: Option<String>,

    /// Bearer token for the registration endpoint (or REGISTRATION_API_TOKEN)
    #[arg(long)]
    pub api_token: Option<String>,

    /// Override the template download location
    #[arg(long)]
    pub template_base_url: Option<String>,
}

/// Registration endpoint, present only when fully configured.
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    pub url: String,
    pub token: String,
}

/// Resolved configuration for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub resource_group: String,
    /// Workspace name, either the override or derived from the resource group.
    pub workspace_name: String,
    pub subscription: Option<String>,
    pub auth_method: AuthMethod,
    pub template_base_url: String,
    pub notify: Option<NotifyConfig>,
}

impl RunConfig {
    /// Validate the parameters and resolve derived values.
    pub fn from_args(args: Args) -> Result<Self, Box<dyn Error>> {
        let resource_group = args.resource_group.trim().to_string();
        if !resource_group_pattern().is_match(&resource_group) || resource_group.ends_with('.') {
            return Err(format!("Invalid resource group name: {resource_group:?}").into());
        }

        let workspace_name = match args.workspace_name {
            Some(name) => name,
            None => derive_workspace_name(&resource_group),
        };
        if !workspace_name_pattern().is_match(&workspace_name) {
            return Err(format!(
                "Invalid workspace name {workspace_name:?}: 4-63 characters, alphanumerics and \
                 hyphens, starting and ending alphanumeric (use --workspace-name to override \
                 the derived default)"
            )
            .into());
        }

        let api_token = args
            .api_token
            .or_else(|| std::env::var(API_TOKEN_ENV).ok());
        let notify = match (args.api_url, api_token) {
            (Some(url), Some(token)) => Some(NotifyConfig { url, token }),
            (Some(url), None) => {
                return Err(format!(
                    "--api-url {url} given but no bearer token; pass --api-token or set {API_TOKEN_ENV}"
                )
                .into())
            }
            // A token alone just means no registration was requested.
            (None, _) => None,
        };

        Ok(RunConfig {
            resource_group,
            workspace_name,
            subscription: args.subscription,
            auth_method: args.auth_method,
            template_base_url: args
                .template_base_url
                .unwrap_or_else(|| DEFAULT_TEMPLATE_BASE_URL.to_string()),
            notify,
        })
    }

    /// Deterministic service principal name for this resource group.
    pub fn principal_name(&self) -> String {
        format!("sp-{}", self.resource_group)
    }

    /// Deterministic automation account name for this resource group.
    pub fn automation_account_name(&self) -> String {
        format!("aa-{}", self.resource_group)
    }

    /// Deterministic data collection rule name for the workspace.
    pub fn dcr_name(&self) -> String {
        format!("dcr-{}", self.workspace_name)
    }
}

/// Workspace name derived from the resource group: `law-` prefix, anything
/// outside alphanumerics/hyphens mapped to hyphens, clamped to 63 chars.
pub fn derive_workspace_name(resource_group: &str) -> String {
    let sanitized: String = resource_group
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let mut name = format!("law-{}", sanitized.trim_matches('-'));
    name.truncate(63);
    name.trim_end_matches('-').to_string()
}

/// Azure resource group rules: alphanumerics, underscores, parentheses,
/// hyphens, periods; 1-90 chars. (Trailing period checked separately.)
fn resource_group_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[-\w().]{1,90}$").expect("Invalid Regex"))
}

/// Log Analytics workspace rules: 4-63 chars, alphanumerics and hyphens,
/// starting and ending alphanumeric.
fn workspace_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9-]{2,61}[A-Za-z0-9]$").expect("Invalid Regex")
    })
}
