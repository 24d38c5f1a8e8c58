// cargo watch -x 'fmt' -x 'run'  // 'run -- --resource-group rg-test'

pub mod azure;
pub mod config;
pub mod models;
pub mod output;
pub mod processing;
pub mod templates;

use azure::{acquire_tokens, ArmClient, GraphClient, ResourceGroupDeployer};
use config::{RunConfig, HTTP_TIMEOUT_SECS};
use processing::RunSummary;
use std::error::Error;
use std::time::Duration;
use templates::ScratchDir;

/// Run the full onboarding sequence with the given configuration.
///
/// Authenticate, discover the subscription, download the templates into a
/// scratch directory, run the three deployments with their replication
/// waits, and make the optional registration call. The scratch directory is
/// removed on every path out of this function, including errors.
pub async fn run_onboarding(cfg: &RunConfig) -> Result<RunSummary, Box<dyn Error>> {
    let tokens = acquire_tokens(&cfg.auth_method).await?;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()?;
    let arm = ArmClient::new(http.clone(), &tokens.arm);
    let account = arm.discover_account(cfg.subscription.as_deref()).await?;

    // Dropped on every return below, which is what deletes the directory.
    let scratch = ScratchDir::create()?;
    let templates = templates::fetch_all(&http, &cfg.template_base_url, &scratch).await?;

    let deployer = ResourceGroupDeployer {
        arm: &arm,
        account: &account,
    };
    let directory = GraphClient::new(http.clone(), &tokens.graph);

    processing::run(cfg, &account, &deployer, &directory, &templates, &http).await
}
