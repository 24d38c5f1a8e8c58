//! Microsoft Graph directory lookups.
//!
//! The single query this tool needs: whether a newly created principal is
//! visible in the directory yet. Directory replication is eventually
//! consistent, so absence is an expected state, not an error.

use async_trait::async_trait;
use std::error::Error;

/// Public Microsoft Graph endpoint.
pub const DEFAULT_GRAPH_ENDPOINT: &str = "https://graph.microsoft.com";

/// Result of a directory lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupOutcome {
    Found,
    /// Clean 404: the object has not replicated (or does not exist).
    NotFound,
}

/// Directory that can answer whether a principal resolves yet.
///
/// [`GraphClient`] is the live implementation; the replication poller and
/// its tests only see this trait.
#[async_trait(?Send)]
pub trait PrincipalLookup {
    async fn principal_visible(&self, object_id: &str) -> Result<LookupOutcome, Box<dyn Error>>;
}

/// Thin client over the one Graph call we make.
pub struct GraphClient {
    http: reqwest::Client,
    endpoint: String,
    token: String,
}

impl GraphClient {
    pub fn new(http: reqwest::Client, token: &str) -> Self {
        Self::with_endpoint(http, token, DEFAULT_GRAPH_ENDPOINT)
    }

    pub fn with_endpoint(http: reqwest::Client, token: &str, endpoint: &str) -> Self {
        GraphClient {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }
}

#[async_trait(?Send)]
impl PrincipalLookup for GraphClient {
    async fn principal_visible(&self, object_id: &str) -> Result<LookupOutcome, Box<dyn Error>> {
        let url = format!(
            "{}/v1.0/servicePrincipals/{object_id}?$select=id",
            self.endpoint
        );
        log::debug!("Directory lookup: {url}");

        let response = self.http.get(&url).bearer_auth(&self.token).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(LookupOutcome::Found);
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(LookupOutcome::NotFound);
        }
        let detail = response.text().await.unwrap_or_default();
        Err(format!("Graph lookup for {object_id} returned {status}: {detail}").into())
    }
}
