use std::path::PathBuf;

use tokio::runtime::Handle;
use tracing::info;

use crate::build::item::ItemKind;
use crate::build::pipeline::{BuildContext, BuildError, ItemStore, Orchestrator};
use crate::config::Config;

/// Summary of a finished build.
#[derive(Debug)]
pub struct BuildResult {
    pub output_dir: PathBuf,
    /// Items discovered from source files
    pub documents: usize,
    /// Items that produced output
    pub rendered: usize,
    pub feeds: usize,
    pub static_files: usize,
    /// External feeds that could not be loaded
    pub failed_sources: usize,
    /// Everything the build produced, for callers that want to inspect it
    pub store: ItemStore,
}

/// Runs a complete build for one site.
pub struct Builder {
    config: Config,
    base_path: PathBuf,
}

impl Builder {
    pub fn new(config: Config, base_path: PathBuf) -> Self {
        Self { config, base_path }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Build with the built-in plugins and config priority overrides.
    ///
    /// Blocks the calling thread; `runtime` must not be driving it.
    pub fn build(&self, runtime: Handle) -> Result<BuildResult, BuildError> {
        let mut orchestrator = Orchestrator::with_defaults(&self.config);
        self.build_with(&mut orchestrator, runtime)
    }

    /// Build with a caller-assembled orchestrator.
    ///
    /// The config is validated again here since callers may change it after
    /// loading.
    pub fn build_with(
        &self,
        orchestrator: &mut Orchestrator,
        runtime: Handle,
    ) -> Result<BuildResult, BuildError> {
        self.config.validate()?;
        orchestrator.apply_overrides(&self.config.plugins);

        let mut ctx = BuildContext::new(&self.config, self.base_path.clone(), runtime)?;
        let output_dir = ctx.output_dir();
        info!(
            "Building {} with {} workers",
            self.config.site.name,
            ctx.pool().size()
        );

        orchestrator.run(&mut ctx)?;

        let store = ctx.into_store();
        let result = BuildResult {
            output_dir,
            documents: store
                .items
                .iter()
                .filter(|i| i.source_path.is_some())
                .count(),
            rendered: store.items.iter().filter(|i| i.is_rendered()).count(),
            feeds: store.feeds.len(),
            static_files: store.assets.len(),
            failed_sources: store.feeds.iter().filter(|f| f.error.is_some()).count(),
            store,
        };
        info!(
            "Built {} items ({} remote entries) into {}",
            result.rendered,
            result
                .store
                .items
                .iter()
                .filter(|i| i.kind == ItemKind::Remote)
                .count(),
            result.output_dir.display()
        );
        Ok(result)
    }
}

/// Remove a build's output directory and blogroll cache.
///
/// Returns the directories that existed and were removed (or would be, when
/// `dry_run` is set).
pub fn clean(config: &Config, base_path: &std::path::Path, dry_run: bool) -> std::io::Result<Vec<PathBuf>> {
    let resolve = |path: &std::path::Path| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_path.join(path)
        }
    };

    let mut removed = Vec::new();
    for dir in [resolve(&config.site.output), resolve(&config.blogroll.cache_dir)] {
        if !dir.exists() {
            continue;
        }
        if !dry_run {
            std::fs::remove_dir_all(&dir)?;
        }
        removed.push(dir);
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_empty_site() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("content")).unwrap();
        std::fs::write(dir.path().join("content/index.md"), "---\ntitle: Home\n---\nHello").unwrap();

        let runtime = tokio::runtime::Runtime::new().unwrap();
        let builder = Builder::new(Config::default(), dir.path().to_path_buf());
        let result = builder.build(runtime.handle().clone()).unwrap();

        assert_eq!(result.documents, 1);
        assert_eq!(result.failed_sources, 0);
        let index = std::fs::read_to_string(result.output_dir.join("index.html")).unwrap();
        assert!(index.contains("Hello"));
    }

    #[test]
    fn test_missing_content_dir_names_the_plugin() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let builder = Builder::new(Config::default(), dir.path().to_path_buf());

        let err = builder.build(runtime.handle().clone()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("plugin 'source' failed during discover"), "{message}");
    }

    #[test]
    fn test_invalid_config_is_rejected_before_any_stage() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.build.fetch_concurrency = 0;

        let runtime = tokio::runtime::Runtime::new().unwrap();
        let err = Builder::new(config, dir.path().to_path_buf())
            .build(runtime.handle().clone())
            .unwrap_err();
        assert!(matches!(err, BuildError::Config(_)), "{err}");
        assert!(!dir.path().join("_site").exists());
    }

    #[test]
    fn test_clean_removes_output_and_cache() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        std::fs::create_dir_all(dir.path().join("_site/a")).unwrap();
        std::fs::create_dir_all(dir.path().join(".folio-cache")).unwrap();

        let planned = clean(&config, dir.path(), true).unwrap();
        assert_eq!(planned.len(), 2);
        assert!(dir.path().join("_site").exists());

        clean(&config, dir.path(), false).unwrap();
        assert!(!dir.path().join("_site").exists());
        assert!(!dir.path().join(".folio-cache").exists());
    }
}
