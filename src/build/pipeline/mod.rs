//! Stage/priority plugin scheduler.
//!
//! A build runs a fixed sequence of stages:
//! 1. Discover (find source content)
//! 2. Configure (adjust flags, register synthetic items)
//! 3. Collect (derive feeds)
//! 4. Transform (per-item processing such as link extraction)
//! 5. Render (produce output documents)
//! 6. Write (put them on disk)
//!
//! Plugins participate in a stage by implementing that stage's trait and
//! exposing it through the matching `as_*` accessor on [`Plugin`]. Within a
//! stage, plugins run in ascending [`Priority`] order; equal priorities keep
//! registration order. Stages and plugins always run one at a time, and the
//! first error stops the build.

mod concurrency;
mod context;
mod error;
pub mod plugins;

pub use concurrency::{WorkerPool, fan_out, first_error};
pub use context::{Artifact, Asset, BuildContext, ItemStore};
pub use error::{BuildError, ResourceError, StageError};

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{Config, PluginConfig};

// =============================================================================
// Stages and priorities
// =============================================================================

/// One phase of the build, in execution order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Discover,
    Configure,
    Collect,
    Transform,
    Render,
    Write,
}

impl Stage {
    /// Every stage, in execution order.
    pub const ALL: [Stage; 6] = [
        Stage::Discover,
        Stage::Configure,
        Stage::Collect,
        Stage::Transform,
        Stage::Render,
        Stage::Write,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Discover => "discover",
            Stage::Configure => "configure",
            Stage::Collect => "collect",
            Stage::Transform => "transform",
            Stage::Render => "render",
            Stage::Write => "write",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown stage '{s}'"))
    }
}

/// Position of a plugin within a stage; lower runs first.
///
/// The named bands are 100 apart so plugins can slot in between with
/// [`Priority::offset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(i32);

impl Priority {
    pub const EARLY: Priority = Priority(-100);
    pub const DEFAULT: Priority = Priority(0);
    pub const LATE: Priority = Priority(100);

    pub const fn new(value: i32) -> Self {
        Priority(value)
    }

    /// Shift this priority by `delta` within its band.
    pub const fn offset(self, delta: i32) -> Self {
        Priority(self.0.saturating_add(delta))
    }

    pub const fn value(self) -> i32 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::DEFAULT
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Plugin contracts
// =============================================================================

/// Find source content and register items.
pub trait Discover {
    fn discover(&mut self, ctx: &mut BuildContext) -> anyhow::Result<()>;
}

/// Adjust item flags and register synthetic items.
pub trait Configure {
    fn configure(&mut self, ctx: &mut BuildContext) -> anyhow::Result<()>;
}

/// Derive feeds from the item set.
pub trait Collect {
    fn collect(&mut self, ctx: &mut BuildContext) -> anyhow::Result<()>;
}

/// Per-item processing after feeds exist.
pub trait Transform {
    fn transform(&mut self, ctx: &mut BuildContext) -> anyhow::Result<()>;
}

/// Produce output documents.
pub trait Render {
    fn render(&mut self, ctx: &mut BuildContext) -> anyhow::Result<()>;
}

/// Put output on disk.
pub trait Write {
    fn write(&mut self, ctx: &mut BuildContext) -> anyhow::Result<()>;
}

/// A unit of behaviour registered with the [`Orchestrator`].
///
/// A plugin opts into a stage by returning `Some(self)` from the matching
/// accessor; every accessor defaults to `None`.
///
/// ```ignore
/// struct Counter;
///
/// impl Collect for Counter {
///     fn collect(&mut self, ctx: &mut BuildContext) -> anyhow::Result<()> {
///         info!("{} items", ctx.items().len());
///         Ok(())
///     }
/// }
///
/// impl Plugin for Counter {
///     fn name(&self) -> &str { "counter" }
///     fn as_collect(&mut self) -> Option<&mut dyn Collect> { Some(self) }
/// }
/// ```
pub trait Plugin: Send {
    /// Unique name, used in logs, errors and `plugins.<name>` config.
    fn name(&self) -> &str;

    /// Priority within `stage`.
    fn priority_for(&self, _stage: Stage) -> Priority {
        Priority::DEFAULT
    }

    fn as_discover(&mut self) -> Option<&mut dyn Discover> {
        None
    }

    fn as_configure(&mut self) -> Option<&mut dyn Configure> {
        None
    }

    fn as_collect(&mut self) -> Option<&mut dyn Collect> {
        None
    }

    fn as_transform(&mut self) -> Option<&mut dyn Transform> {
        None
    }

    fn as_render(&mut self) -> Option<&mut dyn Render> {
        None
    }

    fn as_write(&mut self) -> Option<&mut dyn Write> {
        None
    }
}

/// Invoke `plugin`'s method for `stage`, if it has one.
///
/// Returns `None` when the plugin does not take part in the stage.
fn invoke(
    plugin: &mut dyn Plugin,
    stage: Stage,
    ctx: &mut BuildContext,
) -> Option<anyhow::Result<()>> {
    match stage {
        Stage::Discover => plugin.as_discover().map(|p| p.discover(ctx)),
        Stage::Configure => plugin.as_configure().map(|p| p.configure(ctx)),
        Stage::Collect => plugin.as_collect().map(|p| p.collect(ctx)),
        Stage::Transform => plugin.as_transform().map(|p| p.transform(ctx)),
        Stage::Render => plugin.as_render().map(|p| p.render(ctx)),
        Stage::Write => plugin.as_write().map(|p| p.write(ctx)),
    }
}

fn participates(plugin: &mut dyn Plugin, stage: Stage) -> bool {
    match stage {
        Stage::Discover => plugin.as_discover().is_some(),
        Stage::Configure => plugin.as_configure().is_some(),
        Stage::Collect => plugin.as_collect().is_some(),
        Stage::Transform => plugin.as_transform().is_some(),
        Stage::Render => plugin.as_render().is_some(),
        Stage::Write => plugin.as_write().is_some(),
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Runs registered plugins through every stage.
///
/// # Example
///
/// ```ignore
/// let mut orchestrator = Orchestrator::with_defaults(&config);
/// orchestrator.register(MyPlugin::new());
/// orchestrator.apply_overrides(&config.plugins);
/// orchestrator.run(&mut ctx)?;
/// ```
#[derive(Default)]
pub struct Orchestrator {
    /// Plugins in registration order
    plugins: Vec<Box<dyn Plugin>>,
    /// Priority overrides from config, keyed by plugin name and stage
    overrides: HashMap<(String, Stage), Priority>,
}

impl Orchestrator {
    /// Create an orchestrator with no plugins.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an orchestrator with the built-in plugins registered.
    pub fn with_defaults(config: &Config) -> Self {
        let mut orchestrator = Self::new();
        plugins::register_defaults(&mut orchestrator, config);
        orchestrator
    }

    /// Add a plugin; registration order breaks priority ties.
    pub fn register<P: Plugin + 'static>(&mut self, plugin: P) -> &mut Self {
        self.plugins.push(Box::new(plugin));
        self
    }

    /// Apply per-plugin priority overrides from config.
    ///
    /// Overrides replace what the plugin itself reports for that stage.
    /// Names that match no registered plugin are logged and ignored.
    pub fn apply_overrides(&mut self, plugins: &HashMap<String, PluginConfig>) {
        for (name, plugin_config) in plugins {
            if !self.plugins.iter().any(|p| p.name() == name) {
                warn!("priority override for unknown plugin '{}'", name);
                continue;
            }
            for (stage, value) in &plugin_config.priority {
                self.overrides
                    .insert((name.clone(), *stage), Priority::new(*value));
            }
        }
    }

    /// Names of all registered plugins, in registration order.
    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    fn effective_priority(&self, plugin: &dyn Plugin, stage: Stage) -> Priority {
        self.overrides
            .get(&(plugin.name().to_string(), stage))
            .copied()
            .unwrap_or_else(|| plugin.priority_for(stage))
    }

    /// Indices of the plugins taking part in `stage`, in execution order.
    fn order(&mut self, stage: Stage) -> Vec<usize> {
        let mut participants: Vec<(Priority, usize)> = Vec::new();
        for index in 0..self.plugins.len() {
            if participates(&mut *self.plugins[index], stage) {
                let priority = self.effective_priority(&*self.plugins[index], stage);
                participants.push((priority, index));
            }
        }
        // Stable: equal priorities keep registration order
        participants.sort_by_key(|(priority, _)| *priority);
        participants.into_iter().map(|(_, index)| index).collect()
    }

    /// Names of the plugins that would run in `stage`, in order.
    pub fn plan(&mut self, stage: Stage) -> Vec<String> {
        self.order(stage)
            .into_iter()
            .map(|index| self.plugins[index].name().to_string())
            .collect()
    }

    /// Run every participating plugin for one stage.
    pub fn run_stage(&mut self, stage: Stage, ctx: &mut BuildContext) -> Result<(), StageError> {
        let order = self.order(stage);
        info!("{} ({} plugins)", stage, order.len());

        for index in order {
            let plugin = &mut *self.plugins[index];
            let name = plugin.name().to_string();
            debug!("{} -> {}", stage, name);

            if let Some(Err(source)) = invoke(plugin, stage, ctx) {
                return Err(StageError {
                    plugin: name,
                    stage,
                    source,
                });
            }
        }
        Ok(())
    }

    /// Run all stages in order, stopping at the first failure.
    pub fn run(&mut self, ctx: &mut BuildContext) -> Result<(), StageError> {
        for stage in Stage::ALL {
            self.run_stage(stage, ctx)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    use crate::build::item::Item;

    type Log = Arc<Mutex<Vec<String>>>;

    /// Records every stage call into a shared log.
    struct Recorder {
        name: String,
        priority: Priority,
        log: Log,
        fail: bool,
    }

    impl Recorder {
        fn new(name: &str, priority: Priority, log: &Log) -> Self {
            Self {
                name: name.to_string(),
                priority,
                log: Arc::clone(log),
                fail: false,
            }
        }

        fn record(&self, stage: Stage) -> anyhow::Result<()> {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:{}", stage, self.name));
            if self.fail {
                anyhow::bail!("{} gave up", self.name);
            }
            Ok(())
        }
    }

    impl Collect for Recorder {
        fn collect(&mut self, _ctx: &mut BuildContext) -> anyhow::Result<()> {
            self.record(Stage::Collect)
        }
    }

    impl Write for Recorder {
        fn write(&mut self, _ctx: &mut BuildContext) -> anyhow::Result<()> {
            self.record(Stage::Write)
        }
    }

    impl Plugin for Recorder {
        fn name(&self) -> &str {
            &self.name
        }

        fn priority_for(&self, _stage: Stage) -> Priority {
            self.priority
        }

        fn as_collect(&mut self) -> Option<&mut dyn Collect> {
            Some(self)
        }

        fn as_write(&mut self) -> Option<&mut dyn Write> {
            Some(self)
        }
    }

    /// Appends an item during discover, nothing else.
    struct Seeder;

    impl Discover for Seeder {
        fn discover(&mut self, ctx: &mut BuildContext) -> anyhow::Result<()> {
            ctx.append_item(Item::new("seeded"));
            Ok(())
        }
    }

    impl Plugin for Seeder {
        fn name(&self) -> &str {
            "seeder"
        }

        fn as_discover(&mut self) -> Option<&mut dyn Discover> {
            Some(self)
        }
    }

    fn with_context(f: impl FnOnce(&mut BuildContext)) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let config = Config::default();
        let mut ctx =
            BuildContext::new(&config, PathBuf::new(), runtime.handle().clone()).unwrap();
        f(&mut ctx);
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[test]
    fn test_priority_order_with_ties() {
        let log = Log::default();
        let mut orchestrator = Orchestrator::new();
        orchestrator.register(Recorder::new("A", Priority::DEFAULT, &log));
        orchestrator.register(Recorder::new("B", Priority::EARLY, &log));
        orchestrator.register(Recorder::new("C", Priority::DEFAULT, &log));

        assert_eq!(orchestrator.plan(Stage::Collect), vec!["B", "A", "C"]);

        with_context(|ctx| orchestrator.run_stage(Stage::Collect, ctx).unwrap());
        assert_eq!(entries(&log), vec!["collect:B", "collect:A", "collect:C"]);
    }

    #[test]
    fn test_order_is_deterministic() {
        let log = Log::default();
        let mut orchestrator = Orchestrator::new();
        for (i, name) in ["p", "q", "r", "s", "t", "u"].iter().enumerate() {
            let priority = Priority::DEFAULT.offset((i as i32 % 3) * 10);
            orchestrator.register(Recorder::new(name, priority, &log));
        }

        let first = orchestrator.plan(Stage::Write);
        for _ in 0..10 {
            assert_eq!(orchestrator.plan(Stage::Write), first);
        }
        assert_eq!(first, vec!["p", "s", "q", "t", "r", "u"]);
    }

    #[test]
    fn test_non_participants_are_skipped() {
        let log = Log::default();
        let mut orchestrator = Orchestrator::new();
        orchestrator.register(Seeder);
        orchestrator.register(Recorder::new("A", Priority::DEFAULT, &log));

        assert_eq!(orchestrator.plan(Stage::Discover), vec!["seeder"]);
        assert!(orchestrator.plan(Stage::Render).is_empty());

        with_context(|ctx| {
            orchestrator.run(ctx).unwrap();
            assert_eq!(ctx.items().len(), 1);
        });
        assert_eq!(entries(&log), vec!["collect:A", "write:A"]);
    }

    #[test]
    fn test_first_error_stops_the_run() {
        let log = Log::default();
        let mut failing = Recorder::new("broken", Priority::DEFAULT, &log);
        failing.fail = true;

        let mut orchestrator = Orchestrator::new();
        orchestrator.register(Recorder::new("first", Priority::EARLY, &log));
        orchestrator.register(failing);
        orchestrator.register(Recorder::new("after", Priority::LATE, &log));

        with_context(|ctx| {
            let err = orchestrator.run(ctx).unwrap_err();
            assert_eq!(err.plugin, "broken");
            assert_eq!(err.stage, Stage::Collect);
            assert_eq!(
                err.to_string(),
                "plugin 'broken' failed during collect: broken gave up"
            );
        });
        // Neither the later plugin nor the write stage ran
        assert_eq!(entries(&log), vec!["collect:first", "collect:broken"]);
    }

    #[test]
    fn test_overrides_replace_declared_priority() {
        let log = Log::default();
        let mut orchestrator = Orchestrator::new();
        orchestrator.register(Recorder::new("A", Priority::DEFAULT, &log));
        orchestrator.register(Recorder::new("B", Priority::DEFAULT, &log));

        let mut overrides = HashMap::new();
        let mut plugin_config = PluginConfig::default();
        plugin_config.priority.insert(Stage::Collect, -500);
        overrides.insert("B".to_string(), plugin_config);
        overrides.insert("missing".to_string(), PluginConfig::default());
        orchestrator.apply_overrides(&overrides);

        assert_eq!(orchestrator.plan(Stage::Collect), vec!["B", "A"]);
        // Only the named stage is affected
        assert_eq!(orchestrator.plan(Stage::Write), vec!["A", "B"]);
    }

    #[test]
    fn test_stage_parsing() {
        assert_eq!("Transform".parse::<Stage>(), Ok(Stage::Transform));
        assert!("publish".parse::<Stage>().is_err());
        assert!(Stage::Discover < Stage::Write);
        assert_eq!(Stage::ALL.len(), 6);
    }

    #[test]
    fn test_priority_bands() {
        assert!(Priority::EARLY < Priority::DEFAULT);
        assert!(Priority::DEFAULT < Priority::LATE);
        assert!(Priority::EARLY.offset(50) < Priority::DEFAULT);
        assert_eq!(Priority::LATE.offset(-5).value(), 95);
    }
}
