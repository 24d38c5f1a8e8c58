//! Token acquisition for Azure Resource Manager and Microsoft Graph.
//!
//! Two strategies cover the environments this tool runs in: an ambient
//! Azure CLI session (cloud shell, CI) and an interactive device-code
//! sign-in for hosts without one.

use azure_core::auth::TokenCredential;
use azure_identity::device_code_flow;
use azure_identity::AzureCliCredential;
use clap::ValueEnum;
use futures::StreamExt;
use std::error::Error;

/// Scope for management-endpoint calls.
pub const ARM_SCOPE: &str = "https://management.azure.com/.default";
/// Scope for directory lookups.
pub const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Well-known public client id of the Azure CLI, usable for device-code
/// sign-in without registering an application.
const DEVICE_CODE_CLIENT_ID: &str = "04b07795-8ddb-461a-bbee-02f9e1bf7b46";
const DEVICE_CODE_TENANT: &str = "organizations";

/// How a run authenticates against Azure.
#[derive(ValueEnum, Clone, Debug, PartialEq, Eq)]
pub enum AuthMethod {
    /// Reuse the ambient `az login` session.
    AzureCli,
    /// Interactive device-code sign-in.
    DeviceCode,
}

/// Bearer tokens for the two audiences a run talks to.
pub struct AccessTokens {
    pub arm: String,
    pub graph: String,
}

/// Acquire ARM and Graph tokens with the chosen strategy.
pub async fn acquire_tokens(method: &AuthMethod) -> Result<AccessTokens, Box<dyn Error>> {
    match method {
        AuthMethod::AzureCli => {
            log::info!("Authenticating via the Azure CLI session");
            let credential = AzureCliCredential::new();
            let arm = credential
                .get_token(&[ARM_SCOPE])
                .await
                .map_err(|e| format!("Azure CLI token for ARM failed (is `az login` done?): {e}"))?
                .token
                .secret()
                .to_string();
            let graph = credential
                .get_token(&[GRAPH_SCOPE])
                .await
                .map_err(|e| format!("Azure CLI token for Graph failed: {e}"))?
                .token
                .secret()
                .to_string();
            Ok(AccessTokens { arm, graph })
        }
        AuthMethod::DeviceCode => {
            let arm = device_code_token(ARM_SCOPE, "Azure Resource Manager").await?;
            let graph = device_code_token(GRAPH_SCOPE, "Microsoft Graph").await?;
            Ok(AccessTokens { arm, graph })
        }
    }
}

/// Run one device-code sign-in for the given scope.
///
/// Each audience needs its own grant, so an interactive run prompts twice.
async fn device_code_token(scope: &str, audience: &str) -> Result<String, Box<dyn Error>> {
    log::info!("Device-code sign-in required for {audience}");
    let http_client = azure_core::new_http_client();
    let flow = device_code_flow::start(
        http_client,
        DEVICE_CODE_TENANT,
        DEVICE_CODE_CLIENT_ID,
        &[scope],
    )
    .await
    .map_err(|e| format!("Could not start device-code sign-in for {audience}: {e}"))?;

    println!("{}", flow.message());

    let mut responses = Box::pin(flow.stream());
    let mut last_error = None;
    while let Some(response) = responses.next().await {
        match response {
            Ok(authorization) => {
                return Ok(authorization.access_token().secret().to_string());
            }
            // A still-pending authorization surfaces as an error item; keep
            // polling until the user completes the sign-in or the flow expires.
            Err(e) => {
                log::debug!("Device-code poll for {audience}: {e}");
                last_error = Some(e);
            }
        }
    }
    match last_error {
        Some(e) => Err(format!("Device-code sign-in for {audience} failed: {e}").into()),
        None => Err(format!("Device-code sign-in for {audience} produced no response").into()),
    }
}
