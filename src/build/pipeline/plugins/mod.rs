//! Built-in plugins.
//!
//! | Plugin      | Stage (priority)                      |
//! |-------------|---------------------------------------|
//! | `source`    | discover (early)                      |
//! | `publish`   | configure (early)                     |
//! | `taxonomy`  | configure (default), collect (early)  |
//! | `feeds`     | collect (default)                     |
//! | `blogroll`  | collect (late)                        |
//! | `links`     | transform (default)                   |
//! | `markdown`  | transform (late)                      |
//! | `template`  | render (default)                      |
//! | `write`     | write (default)                       |

pub mod blogroll;
pub mod feeds;
pub mod links;
pub mod markdown;
pub mod publish;
pub mod source;
pub mod taxonomy;
pub mod template;
pub mod write;

pub use blogroll::{BlogrollPlugin, FeedFetcher, HttpFetcher};
pub use feeds::FeedsPlugin;
pub use links::LinksPlugin;
pub use markdown::MarkdownPlugin;
pub use publish::PublishPlugin;
pub use source::SourcePlugin;
pub use taxonomy::TaxonomyPlugin;
pub use template::TemplatePlugin;
pub use write::WritePlugin;

use super::Orchestrator;
use crate::config::Config;

/// Register every built-in plugin, configured from `config`.
///
/// The blogroll plugin is only registered when it has sources.
pub fn register_defaults(orchestrator: &mut Orchestrator, config: &Config) {
    orchestrator
        .register(SourcePlugin)
        .register(PublishPlugin::new())
        .register(TaxonomyPlugin::new(config.taxonomies.clone()))
        .register(FeedsPlugin::new(config.feeds.clone()));
    if !config.blogroll.feeds.is_empty() {
        orchestrator.register(BlogrollPlugin::new(config.blogroll.clone()));
    }
    orchestrator
        .register(LinksPlugin)
        .register(MarkdownPlugin)
        .register(TemplatePlugin)
        .register(WritePlugin);
}
