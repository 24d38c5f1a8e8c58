//! Registration payload for the collection service.

use serde::Serialize;

/// Body of the registration POST, everything the collection service needs
/// to route ingested logs for this environment.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationPayload {
    pub tenant_id: String,
    pub subscription_id: String,
    pub resource_group_name: String,
    pub workspace_name: String,
    /// Full ARM resource id of the workspace.
    pub workspace_id: String,
    /// Workspace customer id (the GUID log queries are scoped to).
    pub customer_id: String,
    pub table_name: String,
    pub dcr_immutable_id: String,
    pub logs_ingestion_endpoint: String,
}
