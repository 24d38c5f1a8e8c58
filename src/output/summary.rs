//! End-of-run terminal report.

use crate::output::notify::NotifyOutcome;
use crate::processing::{ReplicationWait, RunSummary};
use colored::Colorize;
use itertools::Itertools;

/// Print the run report to stdout.
pub fn print_summary(summary: &RunSummary) {
    println!();
    println!("{}", "Onboarding complete".green().bold());
    println!(
        "  subscription:       {} ({})",
        summary.account.subscription_name, summary.account.subscription_id
    );
    println!("  tenant:             {}", summary.account.tenant_id);
    println!("  resource group:     {}", summary.resource_group);
    println!(
        "  workspace:          {} ({})",
        summary.workspace_name, summary.customer_id
    );
    println!("  table:              {}", summary.table_name);
    println!("  data collection:    {}", summary.dcr_immutable_id);
    println!("  ingestion endpoint: {}", summary.logs_ingestion_endpoint);
    println!(
        "  principals:         {}",
        principal_list(&summary.principal_id, &summary.automation_principal_id)
    );
    println!("  role assignments:   {}", summary.role_assignments);

    for (label, wait) in [
        ("service principal", &summary.principal_replication),
        ("managed identity", &summary.automation_replication),
    ] {
        if let ReplicationWait::GaveUp { attempts } = wait {
            println!(
                "  {note} {label} not visible after {attempts} lookups; role assignments may need a re-run",
                note = "NOTE".on_red()
            );
        }
    }

    match summary.notification {
        NotifyOutcome::Sent => println!("  registration:       sent"),
        NotifyOutcome::Skipped => println!("  registration:       skipped (not configured)"),
        NotifyOutcome::Failed => println!(
            "  {note} registration failed; re-run or register manually",
            note = "NOTE".on_red()
        ),
    }
}

/// Comma-joined principal ids, empty entries dropped.
fn principal_list(ids: &str, more: &str) -> String {
    [ids, more].iter().filter(|id| !id.is_empty()).join(", ")
}
