//! Azure subscription discovery models.

use serde::Deserialize;

/// Subscription context a run operates in, discovered from ARM.
#[derive(Debug, Clone)]
pub struct AccountInfo {
    /// Azure subscription ID.
    pub subscription_id: String,
    /// Azure AD tenant ID the subscription belongs to.
    pub tenant_id: String,
    /// Subscription display name.
    pub subscription_name: String,
}

/// One page of the ARM subscription listing.
#[derive(Deserialize, Debug)]
pub struct SubscriptionPage {
    /// Subscriptions in this page.
    pub value: Vec<SubscriptionEntry>,
    /// Link to the next page (if more results available).
    #[serde(rename = "nextLink")]
    pub next_link: Option<String>,
}

/// Subscription entry as returned by the management endpoint.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionEntry {
    pub subscription_id: String,
    pub tenant_id: String,
    pub display_name: String,
    /// "Enabled", "Disabled", "Warned", etc.
    pub state: String,
}
