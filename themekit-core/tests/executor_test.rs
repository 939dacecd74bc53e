use std::sync::{Arc, Mutex};

use themekit_core::adapter::{Outcome, TaskContext, ToolAdapter};
use themekit_core::config::ProjectConfig;
use themekit_core::context::RunContext;
use themekit_core::executor::Executor;
use themekit_core::fileset::ResolvedSet;
use themekit_core::registry::TaskRegistry;
use themekit_core::reporter::{MemorySink, Reporter};
use themekit_core::task::{AdapterConfig, LeafTask};
use themekit_core::Result;

/// Records every invocation; fails when its config says so.
#[derive(Default)]
struct RecordingAdapter {
    calls: Arc<Mutex<Vec<String>>>,
}

impl ToolAdapter for RecordingAdapter {
    fn tool(&self) -> &'static str {
        "mock"
    }

    fn run(
        &self,
        config: &AdapterConfig,
        _sets: &[ResolvedSet],
        ctx: &TaskContext<'_>,
    ) -> Result<Outcome> {
        self.calls.lock().unwrap().push(ctx.invocation.to_string());
        match config {
            AdapterConfig::Custom { value, .. } if value.as_bool() == Some(false) => {
                Ok(Outcome::failed(format!("{} broke", ctx.invocation)))
            }
            _ => Ok(Outcome::Ok),
        }
    }
}

/// Re-enters the executor with the task named in its config.
struct NestingAdapter;

impl ToolAdapter for NestingAdapter {
    fn tool(&self) -> &'static str {
        "nest"
    }

    fn run(
        &self,
        config: &AdapterConfig,
        _sets: &[ResolvedSet],
        ctx: &TaskContext<'_>,
    ) -> Result<Outcome> {
        let AdapterConfig::Custom { value, .. } = config else {
            return Ok(Outcome::failed("bad config"));
        };
        ctx.runner.run_task(value.as_str().unwrap_or_default())?;
        Ok(Outcome::Ok)
    }
}

fn mock(ok: bool) -> LeafTask {
    LeafTask::new(AdapterConfig::Custom {
        tag: "mock".to_string(),
        value: toml::Value::Boolean(ok),
    })
}

fn setup(registry: TaskRegistry) -> (RunContext, MemorySink, Arc<Mutex<Vec<String>>>) {
    let mut registry = registry;
    let adapter = RecordingAdapter::default();
    let calls = Arc::clone(&adapter.calls);
    registry.register_adapter("mock", Arc::new(adapter));
    let (reporter, sink) = Reporter::memory();
    let dir = std::env::temp_dir();
    let ctx = RunContext::new(ProjectConfig::default(), registry, reporter, dir);
    (ctx, sink, calls)
}

#[test]
fn test_alias_runs_steps_in_order() {
    let mut registry = TaskRegistry::new();
    registry.register_leaf("one", mock(true));
    registry.register_leaf("two", mock(true));
    registry.register_multi("three", [("x", mock(true)), ("y", mock(true))]);
    registry.register_alias("all", ["one", "three", "two"]);

    let (ctx, sink, calls) = setup(registry);
    Executor::new(&ctx).run_task("all").unwrap();

    assert_eq!(*calls.lock().unwrap(), vec!["one", "three:x", "three:y", "two"]);
    assert!(sink.contents().contains("Running \"three:x\" (mock) task"));
}

#[test]
fn test_failure_skips_remaining_steps() {
    let mut registry = TaskRegistry::new();
    registry.register_leaf("one", mock(true));
    registry.register_leaf("bad", mock(false));
    registry.register_leaf("never", mock(true));
    registry.register_alias("all", ["one", "bad", "never"]);

    let (ctx, sink, calls) = setup(registry);
    let err = Executor::new(&ctx).run_task("all").unwrap_err();

    assert_eq!(err.kind(), "adapter-failed");
    assert!(err.to_string().contains("bad broke"));
    assert_eq!(*calls.lock().unwrap(), vec!["one", "bad"]);
    assert!(ctx.is_aborted());
    assert!(sink.contents().contains("✗ bad broke"));
}

#[test]
fn test_single_target() {
    let mut registry = TaskRegistry::new();
    registry.register_multi("screen", [("begin", mock(true)), ("finish", mock(true))]);

    let (ctx, _sink, calls) = setup(registry);
    Executor::new(&ctx).run_task("screen:finish").unwrap();

    assert_eq!(*calls.lock().unwrap(), vec!["screen:finish"]);
}

#[test]
fn test_unknown_task() {
    let (ctx, _sink, calls) = setup(TaskRegistry::new());
    let err = Executor::new(&ctx).run_task("xyzzy").unwrap_err();

    assert_eq!(err.to_string(), "unknown-task: xyzzy");
    assert!(calls.lock().unwrap().is_empty());
}

#[test]
fn test_unknown_target_and_target_on_leaf() {
    let mut registry = TaskRegistry::new();
    registry.register_multi("screen", [("begin", mock(true))]);
    registry.register_leaf("plain", mock(true));

    let (ctx, _sink, _calls) = setup(registry);
    let executor = Executor::new(&ctx);

    assert_eq!(
        executor.run_task("screen:nope").unwrap_err().to_string(),
        "unknown-task: screen:nope"
    );
    assert_eq!(executor.run_task("plain:x").unwrap_err().kind(), "unknown-task");
}

#[test]
fn test_unknown_step_runs_nothing() {
    let mut registry = TaskRegistry::new();
    registry.register_leaf("one", mock(true));
    registry.register_alias("all", ["one", "missing"]);

    let (ctx, _sink, calls) = setup(registry);
    let executor = Executor::new(&ctx);

    assert_eq!(executor.run_task("all").unwrap_err().kind(), "unknown-task");
    assert_eq!(executor.invocations(), 0);
    assert!(calls.lock().unwrap().is_empty());
}

#[test]
fn test_cycle_runs_nothing() {
    let mut registry = TaskRegistry::new();
    registry.register_leaf("one", mock(true));
    registry.register_alias("a", ["one", "b"]);
    registry.register_alias("b", ["a"]);

    let (ctx, _sink, calls) = setup(registry);
    let executor = Executor::new(&ctx);
    let err = executor.run_task("a").unwrap_err();

    assert_eq!(err.kind(), "task-cycle");
    assert_eq!(err.to_string(), "task-cycle: a -> b -> a");
    assert_eq!(executor.invocations(), 0);
    assert!(calls.lock().unwrap().is_empty());
}

#[test]
fn test_shared_steps_are_not_cycles() {
    let mut registry = TaskRegistry::new();
    registry.register_leaf("one", mock(true));
    registry.register_alias("left", ["one"]);
    registry.register_alias("both", ["left", "left"]);

    let (ctx, _sink, calls) = setup(registry);
    Executor::new(&ctx).run_task("both").unwrap();

    assert_eq!(calls.lock().unwrap().len(), 2);
}

#[test]
fn test_reentering_running_task_is_cycle() {
    let mut registry = TaskRegistry::new();
    registry.register_adapter("nest", Arc::new(NestingAdapter));
    registry.register_leaf(
        "outer",
        LeafTask::new(AdapterConfig::Custom {
            tag: "nest".to_string(),
            value: toml::Value::String("all".to_string()),
        }),
    );
    registry.register_alias("all", ["outer"]);

    let (ctx, _sink, _calls) = setup(registry);
    let err = Executor::new(&ctx).run_task("all").unwrap_err();

    assert_eq!(err.kind(), "task-cycle");
}

#[test]
fn test_leaf_running_itself_is_cycle() {
    let mut registry = TaskRegistry::new();
    registry.register_adapter("nest", Arc::new(NestingAdapter));
    registry.register_leaf(
        "watch",
        LeafTask::new(AdapterConfig::Custom {
            tag: "nest".to_string(),
            value: toml::Value::String("watch".to_string()),
        }),
    );

    let (ctx, _sink, _calls) = setup(registry);
    let err = Executor::new(&ctx).run_task("watch").unwrap_err();

    assert_eq!(err.to_string(), "task-cycle: watch -> watch");
}

#[test]
fn test_interrupt_cancels_before_next_step() {
    let mut registry = TaskRegistry::new();
    registry.register_leaf("one", mock(true));
    registry.register_alias("all", ["one"]);

    let (ctx, _sink, calls) = setup(registry);
    ctx.interrupt();
    let err = Executor::new(&ctx).run_task("all").unwrap_err();

    assert_eq!(err.kind(), "cancelled");
    assert!(calls.lock().unwrap().is_empty());
}

#[test]
fn test_missing_adapter_is_config_error() {
    let mut registry = TaskRegistry::new();
    registry.register_leaf(
        "orphan",
        LeafTask::new(AdapterConfig::Custom {
            tag: "nobody".to_string(),
            value: toml::Value::Boolean(true),
        }),
    );

    let (ctx, _sink, _calls) = setup(registry);
    let err = Executor::new(&ctx).run_task("orphan").unwrap_err();

    assert_eq!(err.kind(), "config-invalid");
}
