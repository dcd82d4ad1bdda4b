//! Markdown rendering.

use tracing::info;

use crate::build::markdown::{parser_options, render_markdown};
use crate::build::pipeline::{BuildContext, Plugin, Priority, Stage, Transform};

/// Renders every source-backed item's markdown to an HTML fragment.
///
/// Runs late in transform so earlier plugins can still rewrite `content`.
/// After this plugin, `item.html` and `item.toc` are set for every item with
/// a source file; synthetic items keep `html = None`.
pub struct MarkdownPlugin;

impl Transform for MarkdownPlugin {
    fn transform(&mut self, ctx: &mut BuildContext) -> anyhow::Result<()> {
        let options = parser_options(&ctx.config.markdown)?;

        ctx.run_concurrently(|item| {
            if item.source_path.is_some() {
                let output = render_markdown(&item.content, options);
                item.html = Some(output.html);
                item.toc = output.toc;
            }
            Ok::<(), std::convert::Infallible>(())
        })?;

        let rendered = ctx.items().iter().filter(|i| i.html.is_some()).count();
        info!("Rendered {} markdown documents", rendered);
        Ok(())
    }
}

impl Plugin for MarkdownPlugin {
    fn name(&self) -> &str {
        "markdown"
    }

    fn priority_for(&self, stage: Stage) -> Priority {
        match stage {
            Stage::Transform => Priority::LATE,
            _ => Priority::DEFAULT,
        }
    }

    fn as_transform(&mut self) -> Option<&mut dyn Transform> {
        Some(self)
    }
}
