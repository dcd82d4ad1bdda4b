use folio::build::{base_path_from_config, clean};
use folio::config::{Config, resolve_config_path};
use tracing::info;

use crate::CleanArgs;

pub async fn run(args: &CleanArgs) -> Result<(), anyhow::Error> {
    let config_path = resolve_config_path(args.config_file.as_deref())?;
    let config = Config::load_from_file(&config_path)?;

    // Get the base path for resolving relative paths
    let base_path = base_path_from_config(&config_path);

    let dry_run = args.dry_run;
    let removed =
        tokio::task::spawn_blocking(move || clean(&config, &base_path, dry_run)).await??;

    for dir in &removed {
        if dry_run {
            info!("Would delete {}", dir.display());
        } else {
            info!("Deleted {}", dir.display());
        }
    }
    if removed.is_empty() {
        info!("Nothing to clean");
    }

    Ok(())
}
