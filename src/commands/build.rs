use anyhow::Context as _;
use folio::build::{Builder, base_path_from_config};
use folio::config::{Config, resolve_config_path};
use tracing::{info, warn};

use crate::BuildArgs;

pub async fn run(args: &BuildArgs) -> Result<(), anyhow::Error> {
    let config_path = resolve_config_path(args.config_file.as_deref())?;
    let mut config = Config::load_from_file(&config_path)?;
    if args.drafts {
        config.build.drafts = true;
    }

    // Get the base path for resolving relative paths
    let base_path = base_path_from_config(&config_path);

    // The pipeline is synchronous and blocks on async fetches itself, so it
    // runs off the runtime's worker threads.
    let runtime = tokio::runtime::Handle::current();
    let builder = Builder::new(config, base_path);
    let result = tokio::task::spawn_blocking(move || builder.build(runtime))
        .await
        .context("build task panicked")??;

    if result.failed_sources > 0 {
        warn!("{} external feeds could not be loaded", result.failed_sources);
    }
    info!(
        "Built site to {} ({} documents, {} feeds, {} static files)",
        result.output_dir.display(),
        result.documents,
        result.feeds,
        result.static_files
    );

    Ok(())
}
