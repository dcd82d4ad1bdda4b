//! Pipeline error types.

use serde::Serialize;

use super::Stage;
use crate::config::ConfigError;

/// A plugin's stage method failed.
///
/// Fatal to the run: the orchestrator stops at the first one.
#[derive(thiserror::Error, Debug)]
#[error("plugin '{plugin}' failed during {stage}: {source:#}")]
pub struct StageError {
    pub plugin: String,
    pub stage: Stage,
    #[source]
    pub source: anyhow::Error,
}

/// One external resource failed.
///
/// This is data, not control flow: it is recorded on the resource's
/// record and never aborts the stage by itself.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{resource}: {message}")]
pub struct ResourceError {
    pub resource: String,
    pub message: String,
}

impl ResourceError {
    pub fn new(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            message: message.into(),
        }
    }
}

/// Errors that stop a build.
#[derive(thiserror::Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Stage(#[from] StageError),
}
