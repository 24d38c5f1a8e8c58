use azure_monitor_onboarding::config::{Args, RunConfig};
use azure_monitor_onboarding::output::print_summary;
use azure_monitor_onboarding::run_onboarding;
use clap::Parser;
use std::error::Error;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Do as little as possible in main.rs as it can't contain any tests
    log4rs::init_file("log4rs.yml", Default::default()).expect("Error initializing log4rs");
    dotenv::dotenv().ok();
    //
    log::info!("#Start main()");

    let args = Args::parse();
    let cfg = RunConfig::from_args(args)?;

    let summary = run_onboarding(&cfg).await?;
    print_summary(&summary);

    Ok(())
}
