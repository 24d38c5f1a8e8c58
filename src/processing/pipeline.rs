//! The deployment sequence.
//!
//! Three template deployments run in order, each parameterized partly by
//! configuration and partly by the previous step's outputs. Mandatory steps
//! stop the run on the first error; only the final registration call is best
//! effort. There is no rollback: the templates use deterministic names and
//! create-if-not-exists semantics, so a failed run is fixed by re-running.

use crate::azure::{arm_parameters, DeployTarget, PrincipalLookup};
use crate::config::{RunConfig, LOG_TABLE_NAME};
use crate::models::{AccountInfo, RegistrationPayload};
use crate::output::{send_registration, NotifyOutcome};
use crate::templates::TemplateSet;
use chrono::Utc;
use serde_json::json;
use std::error::Error;

use super::replication::{wait_for_replication, BackoffPolicy, ReplicationWait};

/// Everything a finished run produced, for the final report and the
/// registration payload.
#[derive(Debug)]
pub struct RunSummary {
    pub account: AccountInfo,
    pub resource_group: String,
    pub workspace_name: String,
    pub workspace_id: String,
    pub customer_id: String,
    pub table_name: String,
    pub dcr_immutable_id: String,
    pub logs_ingestion_endpoint: String,
    pub principal_id: String,
    pub automation_principal_id: String,
    pub role_assignments: i64,
    pub principal_replication: ReplicationWait,
    pub automation_replication: ReplicationWait,
    pub notification: NotifyOutcome,
}

/// Timestamped deployment name so re-runs do not collide in the deployment
/// history.
fn deployment_name(step: &str) -> String {
    format!("onboard-{step}-{}", Utc::now().format("%Y%m%d-%H%M%S"))
}

/// Run the deployment sequence against an already-discovered account.
pub async fn run(
    cfg: &RunConfig,
    account: &AccountInfo,
    deployer: &dyn DeployTarget,
    directory: &dyn PrincipalLookup,
    templates: &TemplateSet,
    http: &reqwest::Client,
) -> Result<RunSummary, Box<dyn Error>> {
    let policy = BackoffPolicy::default();

    log::info!("Step 1/3: service principal {}", cfg.principal_name());
    let outputs = deployer
        .deploy(
            &cfg.resource_group,
            &deployment_name("identity"),
            &templates.service_principal,
            arm_parameters(&[("principalName", json!(cfg.principal_name()))]),
        )
        .await?;
    let principal_id = outputs.string("principalId")?;
    let principal_replication = wait_for_replication(directory, &principal_id, &policy).await;

    log::info!(
        "Step 2/3: workspace {} with data collection rule {}",
        cfg.workspace_name,
        cfg.dcr_name()
    );
    let outputs = deployer
        .deploy(
            &cfg.resource_group,
            &deployment_name("workspace"),
            &templates.workspace,
            arm_parameters(&[
                ("workspaceName", json!(cfg.workspace_name)),
                ("automationAccountName", json!(cfg.automation_account_name())),
                ("dataCollectionRuleName", json!(cfg.dcr_name())),
                ("tableName", json!(LOG_TABLE_NAME)),
            ]),
        )
        .await?;
    let workspace_id = outputs.string("workspaceId")?;
    let customer_id = outputs.string("customerId")?;
    let dcr_immutable_id = outputs.string("dcrImmutableId")?;
    let logs_ingestion_endpoint = outputs.string("logsIngestionEndpoint")?;
    let automation_principal_id = outputs.string("automationPrincipalId")?;
    let automation_replication =
        wait_for_replication(directory, &automation_principal_id, &policy).await;

    log::info!("Step 3/3: role assignments");
    let outputs = deployer
        .deploy(
            &cfg.resource_group,
            &deployment_name("permissions"),
            &templates.permissions,
            arm_parameters(&[
                ("principalId", json!(principal_id)),
                ("automationPrincipalId", json!(automation_principal_id)),
                ("workspaceName", json!(cfg.workspace_name)),
            ]),
        )
        .await?;
    let role_assignments = outputs.count("roleAssignmentCount")?;

    let payload = RegistrationPayload {
        tenant_id: account.tenant_id.clone(),
        subscription_id: account.subscription_id.clone(),
        resource_group_name: cfg.resource_group.clone(),
        workspace_name: cfg.workspace_name.clone(),
        workspace_id: workspace_id.clone(),
        customer_id: customer_id.clone(),
        table_name: LOG_TABLE_NAME.to_string(),
        dcr_immutable_id: dcr_immutable_id.clone(),
        logs_ingestion_endpoint: logs_ingestion_endpoint.clone(),
    };
    let notification = match &cfg.notify {
        Some(notify_cfg) => send_registration(http, notify_cfg, &payload).await,
        None => {
            log::info!("No registration endpoint configured, skipping notification");
            NotifyOutcome::Skipped
        }
    };

    Ok(RunSummary {
        account: account.clone(),
        resource_group: cfg.resource_group.clone(),
        workspace_name: cfg.workspace_name.clone(),
        workspace_id,
        customer_id,
        table_name: LOG_TABLE_NAME.to_string(),
        dcr_immutable_id,
        logs_ingestion_endpoint,
        principal_id,
        automation_principal_id,
        role_assignments,
        principal_replication,
        automation_replication,
        notification,
    })
}
