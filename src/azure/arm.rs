//! Azure Resource Manager interaction.
//!
//! Subscription discovery and resource-group-scoped template deployments.
//! A deployment is submitted with one PUT and then polled until ARM reports
//! a terminal provisioning state; the heavy lifting (resource creation,
//! idempotence, ordering inside a template) is ARM's, not ours.

use crate::models::{AccountInfo, Deployment, DeploymentOutputs, SubscriptionEntry, SubscriptionPage};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::error::Error;
use std::time::Duration;

/// Public Azure management endpoint.
pub const DEFAULT_MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";

const DEPLOYMENT_API_VERSION: &str = "2021-04-01";
const SUBSCRIPTION_API_VERSION: &str = "2022-12-01";

/// Seconds between provisioning-state polls.
const PROVISION_POLL_SECS: u64 = 10;
/// Poll budget before a deployment is declared wedged.
const PROVISION_POLL_LIMIT: u32 = 120;

/// Target that can run a named template deployment in a resource group.
///
/// [`ResourceGroupDeployer`] is the live implementation; tests substitute
/// their own to exercise the pipeline without a subscription.
#[async_trait(?Send)]
pub trait DeployTarget {
    async fn deploy(
        &self,
        resource_group: &str,
        deployment_name: &str,
        template: &Value,
        parameters: Value,
    ) -> Result<DeploymentOutputs, Box<dyn Error>>;
}

/// Thin client over the ARM REST surface.
pub struct ArmClient {
    http: reqwest::Client,
    endpoint: String,
    token: String,
}

impl ArmClient {
    pub fn new(http: reqwest::Client, token: &str) -> Self {
        Self::with_endpoint(http, token, DEFAULT_MANAGEMENT_ENDPOINT)
    }

    /// Client against a non-default management endpoint (sovereign clouds,
    /// tests).
    pub fn with_endpoint(http: reqwest::Client, token: &str, endpoint: &str) -> Self {
        ArmClient {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    /// Discover the subscription to operate in.
    ///
    /// # Arguments
    /// * `selector` - Optional subscription id or display name. If None, the
    ///   first enabled subscription visible to the token is used.
    pub async fn discover_account(
        &self,
        selector: Option<&str>,
    ) -> Result<AccountInfo, Box<dyn Error>> {
        let mut url = format!(
            "{}/subscriptions?api-version={SUBSCRIPTION_API_VERSION}",
            self.endpoint
        );
        let mut entries: Vec<SubscriptionEntry> = Vec::new();

        loop {
            let body = self.get_text(&url).await?;
            let mut deserializer = serde_json::Deserializer::from_str(&body);
            let page: SubscriptionPage = serde_path_to_error::deserialize(&mut deserializer)
                .map_err(|e| {
                    format!("Error parsing subscription list: path={} error={}", e.path(), e)
                })?;
            entries.extend(page.value);

            match page.next_link {
                Some(next) if next == url => {
                    return Err("Subscription paging repeated itself - possible infinite loop".into())
                }
                Some(next) => url = next,
                None => break,
            }
        }
        log::info!("Found {} subscription(s)", entries.len());

        let chosen = match selector {
            Some(wanted) => entries.iter().find(|s| {
                s.subscription_id.eq_ignore_ascii_case(wanted)
                    || s.display_name.eq_ignore_ascii_case(wanted)
            }),
            None => entries
                .iter()
                .find(|s| s.state == "Enabled")
                .or_else(|| entries.first()),
        };
        let subscription = chosen.ok_or_else(|| match selector {
            Some(wanted) => format!("No subscription matching {wanted:?}"),
            None => "No subscriptions visible to this account".to_string(),
        })?;

        log::info!(
            "Using subscription {name:?} ({id})",
            name = subscription.display_name,
            id = subscription.subscription_id
        );
        Ok(AccountInfo {
            subscription_id: subscription.subscription_id.clone(),
            tenant_id: subscription.tenant_id.clone(),
            subscription_name: subscription.display_name.clone(),
        })
    }

    /// Submit a template deployment and wait for its terminal state.
    ///
    /// # Returns
    /// * `Ok(DeploymentOutputs)` - outputs once ARM reports Succeeded
    /// * `Err` - rejection, Failed/Canceled state, or poll budget exhausted
    pub async fn deploy(
        &self,
        subscription_id: &str,
        resource_group: &str,
        deployment_name: &str,
        template: &Value,
        parameters: Value,
    ) -> Result<DeploymentOutputs, Box<dyn Error>> {
        let url = self.deployment_url(subscription_id, resource_group, deployment_name);
        let body = json!({
            "properties": {
                "mode": "Incremental",
                "template": template,
                "parameters": parameters,
            }
        });

        log::info!("Submitting deployment {deployment_name} to {resource_group}");
        let response = self
            .http
            .put(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(
                format!("ARM rejected deployment {deployment_name}: {status} {detail}").into(),
            );
        }

        self.wait_for_outcome(&url, deployment_name).await
    }

    async fn wait_for_outcome(
        &self,
        url: &str,
        deployment_name: &str,
    ) -> Result<DeploymentOutputs, Box<dyn Error>> {
        for poll in 1..=PROVISION_POLL_LIMIT {
            let body = self.get_text(url).await?;
            let mut deserializer = serde_json::Deserializer::from_str(&body);
            let state: Deployment =
                serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
                    log::error!("OUTPUT START:\n\n{body}\n\nOUTPUT END\n");
                    format!(
                        "Error parsing deployment {deployment_name}: path={} error={}",
                        e.path(),
                        e
                    )
                })?;

            match state.properties.provisioning_state.as_deref() {
                Some("Succeeded") => {
                    log::info!("Deployment {deployment_name} succeeded after {poll} poll(s)");
                    return Ok(DeploymentOutputs::new(
                        state.properties.outputs.unwrap_or_default(),
                    ));
                }
                Some(terminal @ ("Failed" | "Canceled")) => {
                    let detail = state
                        .properties
                        .error
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| "no error detail".to_string());
                    return Err(
                        format!("Deployment {deployment_name} ended {terminal}: {detail}").into(),
                    );
                }
                other => {
                    log::debug!("Deployment {deployment_name} poll {poll}: state={other:?}");
                }
            }
            tokio::time::sleep(Duration::from_secs(PROVISION_POLL_SECS)).await;
        }
        Err(format!(
            "Deployment {deployment_name} still not terminal after {PROVISION_POLL_LIMIT} polls"
        )
        .into())
    }

    fn deployment_url(
        &self,
        subscription_id: &str,
        resource_group: &str,
        deployment_name: &str,
    ) -> String {
        format!(
            "{endpoint}/subscriptions/{subscription_id}/resourcegroups/{resource_group}/providers/Microsoft.Resources/deployments/{deployment_name}?api-version={DEPLOYMENT_API_VERSION}",
            endpoint = self.endpoint
        )
    }

    async fn get_text(&self, url: &str) -> Result<String, Box<dyn Error>> {
        let response = self.http.get(url).bearer_auth(&self.token).send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(format!("GET {url} returned {status}: {text}").into());
        }
        Ok(text)
    }
}

/// [`ArmClient`] bound to the discovered account, in the shape the pipeline
/// deploys through.
pub struct ResourceGroupDeployer<'a> {
    pub arm: &'a ArmClient,
    pub account: &'a AccountInfo,
}

#[async_trait(?Send)]
impl DeployTarget for ResourceGroupDeployer<'_> {
    async fn deploy(
        &self,
        resource_group: &str,
        deployment_name: &str,
        template: &Value,
        parameters: Value,
    ) -> Result<DeploymentOutputs, Box<dyn Error>> {
        self.arm
            .deploy(
                &self.account.subscription_id,
                resource_group,
                deployment_name,
                template,
                parameters,
            )
            .await
    }
}

/// Build an ARM parameters object from name/value pairs.
///
/// ARM expects every parameter wrapped as `{"value": ...}`.
pub fn arm_parameters(pairs: &[(&str, Value)]) -> Value {
    let mut parameters = Map::new();
    for (name, value) in pairs {
        parameters.insert((*name).to_string(), json!({ "value": value }));
    }
    Value::Object(parameters)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arm_parameters_wraps_values() {
        let parameters = arm_parameters(&[
            ("workspaceName", json!("law-rg-test")),
            ("tableName", json!("OnboardingEvents_CL")),
        ]);
        assert_eq!(parameters["workspaceName"]["value"], "law-rg-test");
        assert_eq!(parameters["tableName"]["value"], "OnboardingEvents_CL");
    }

    #[test]
    fn test_arm_parameters_empty() {
        assert_eq!(arm_parameters(&[]), json!({}));
    }

    #[test]
    fn test_deployment_url_shape() {
        let client = ArmClient::with_endpoint(
            reqwest::Client::new(),
            "token",
            "https://management.azure.com/",
        );
        let url = client.deployment_url("sub-1", "rg-test", "onboard-identity-1");
        assert_eq!(
            url,
            "https://management.azure.com/subscriptions/sub-1/resourcegroups/rg-test/providers/Microsoft.Resources/deployments/onboard-identity-1?api-version=2021-04-01"
        );
    }
}
