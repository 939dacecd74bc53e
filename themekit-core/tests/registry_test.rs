use themekit_core::graph::TaskGraph;
use themekit_core::options::{CleanOptions, CopyOptions};
use themekit_core::registry::TaskRegistry;
use themekit_core::task::{AdapterConfig, LeafTask, TaskDefinition};

fn clean() -> LeafTask {
    LeafTask::new(AdapterConfig::Clean(CleanOptions::default()))
}

fn copy() -> LeafTask {
    LeafTask::new(AdapterConfig::Copy(CopyOptions::default()))
}

#[test]
fn test_reregistration_keeps_later_definition() {
    let mut registry = TaskRegistry::new();
    registry.register_leaf("boot", clean());
    registry.register_alias("boot", ["clean", "copy"]);

    assert_eq!(registry.len(), 1);
    assert_eq!(
        registry.lookup("boot"),
        Some(&TaskDefinition::Alias(vec![
            "clean".to_string(),
            "copy".to_string()
        ]))
    );
}

#[test]
fn test_alias_steps_resolve_late() {
    let mut registry = TaskRegistry::new();
    registry.register_alias("boot", ["clean", "copy"]);
    assert!(TaskGraph::new(&registry).validate().is_err());

    registry.register_multi("clean", [("dist", clean())]);
    registry.register_multi("copy", [("dist", copy())]);
    assert!(TaskGraph::new(&registry).validate().is_ok());
}

#[test]
fn test_task_names_sorted() {
    let mut registry = TaskRegistry::new();
    registry.register_leaf("zeta", clean());
    registry.register_leaf("alpha", copy());
    registry.register_alias("mid", ["alpha"]);

    assert_eq!(registry.task_names(), vec!["alpha", "mid", "zeta"]);
}

#[test]
fn test_multi_keeps_declared_order() {
    let mut registry = TaskRegistry::new();
    registry.register_multi("screen", [("finish", clean()), ("begin", copy())]);

    match registry.lookup("screen") {
        Some(TaskDefinition::Multi(targets)) => {
            let keys: Vec<&String> = targets.keys().collect();
            assert_eq!(keys, vec!["finish", "begin"]);
        }
        other => panic!("unexpected definition: {:?}", other),
    }
    assert_eq!(registry.lookup("screen").map(|d| d.describe()).unwrap(), "finish, begin");
}
