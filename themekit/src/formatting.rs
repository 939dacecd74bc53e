//! Terminal output for the informational flags.

use comfy_table::{Cell, Table};
use owo_colors::OwoColorize;

use themekit_core::graph::TaskGraph;
use themekit_core::registry::TaskRegistry;
use themekit_core::task::TaskDefinition;

fn kind_color(definition: &TaskDefinition) -> comfy_table::Color {
    match definition {
        TaskDefinition::Alias(_) => comfy_table::Color::Cyan,
        TaskDefinition::Multi(_) => comfy_table::Color::Green,
        TaskDefinition::Leaf(_) => comfy_table::Color::White,
    }
}

/// Builds the `--list` table: every task, its kind and what it runs.
pub fn task_table(registry: &TaskRegistry, color: bool) -> Table {
    let mut table = Table::new();
    table
        .set_header(vec![
            Cell::new("Task").add_attribute(comfy_table::Attribute::Bold),
            Cell::new("Kind").add_attribute(comfy_table::Attribute::Bold),
            Cell::new("Runs").add_attribute(comfy_table::Attribute::Bold),
        ])
        .load_preset(comfy_table::presets::UTF8_FULL)
        .apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS)
        .set_content_arrangement(comfy_table::ContentArrangement::Dynamic);
    if !color {
        table.force_no_tty();
    }

    for name in registry.task_names() {
        let Some(definition) = registry.lookup(&name) else {
            continue;
        };
        table.add_row(vec![
            Cell::new(&name).fg(comfy_table::Color::White),
            Cell::new(definition.kind()).fg(kind_color(definition)),
            Cell::new(definition.describe()).fg(comfy_table::Color::DarkGrey),
        ]);
    }
    table
}

pub fn print_task_table(registry: &TaskRegistry, color: bool) {
    println!("{}", task_table(registry, color));
}

/// Prints the outcome of `--check`. Returns whether the graph is valid.
pub fn print_check(graph: &TaskGraph, color: bool) -> bool {
    let mut problems = Vec::new();
    for (alias, step) in graph.dangling() {
        problems.push(format!("alias '{}' refers to unknown task '{}'", alias, step));
    }
    for cycle in graph.cycles() {
        problems.push(format!("cycle: {}", cycle.join(" -> ")));
    }

    if problems.is_empty() {
        let line = "✓ Task graph is valid";
        if color {
            println!("{}", line.green().bold());
        } else {
            println!("{}", line);
        }
        return true;
    }
    for problem in &problems {
        if color {
            println!("{} {}", "✗".red(), problem.red().bold());
        } else {
            println!("✗ {}", problem);
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use themekit_core::options::ScreenOptions;
    use themekit_core::task::{AdapterConfig, LeafTask};

    #[test]
    fn test_table_lists_every_task() {
        let mut registry = TaskRegistry::new();
        registry.register_leaf(
            "hello",
            LeafTask::new(AdapterConfig::Screen(ScreenOptions {
                text: "hi".to_string(),
                color: None,
            })),
        );
        registry.register_alias("default", ["hello"]);
        let rendered = task_table(&registry, false).to_string();
        assert!(rendered.contains("hello"));
        assert!(rendered.contains("alias"));
        assert!(rendered.contains("screen"));
    }
}
