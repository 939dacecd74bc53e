//! Workflow execution: alias expansion, cycle detection and adapter dispatch.

use std::cell::{Cell, RefCell};

use tracing::debug;

use crate::adapter::{Outcome, TaskContext, TaskRunner};
use crate::context::RunContext;
use crate::error::{Error, Result};
use crate::fileset::{self, ResolvedSet};
use crate::registry::TaskRegistry;
use crate::task::{split_target, LeafTask, TaskDefinition};

/// One concrete leaf invocation produced by planning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Display name, `task` or `task:target`.
    pub name: String,
    pub task: String,
    pub target: Option<String>,
}

impl Invocation {
    fn leaf(task: &str) -> Self {
        Self {
            name: task.to_string(),
            task: task.to_string(),
            target: None,
        }
    }

    fn target(task: &str, target: &str) -> Self {
        Self {
            name: format!("{}:{}", task, target),
            task: task.to_string(),
            target: Some(target.to_string()),
        }
    }
}

/// Runs tasks from the context's registry, one leaf at a time.
pub struct Executor<'a> {
    ctx: &'a RunContext,
    active: RefCell<Vec<String>>,
    invoked: Cell<usize>,
}

impl<'a> Executor<'a> {
    pub fn new(ctx: &'a RunContext) -> Self {
        Self {
            ctx,
            active: RefCell::new(Vec::new()),
            invoked: Cell::new(0),
        }
    }

    /// Number of adapter invocations so far.
    pub fn invocations(&self) -> usize {
        self.invoked.get()
    }

    /// Expands `invocation` into the ordered list of leaf invocations it
    /// stands for, without running anything.
    ///
    /// # Errors
    ///
    /// Returns `unknown-task` for names or targets missing from the registry
    /// and `task-cycle` when an alias reaches itself.
    pub fn plan(&self, invocation: &str) -> Result<Vec<Invocation>> {
        let mut order = Vec::new();
        let mut visiting = Vec::new();
        visit(self.ctx.registry(), invocation, &mut order, &mut visiting)?;
        Ok(order)
    }

    /// Runs a task (`name` or `name:target`) to completion.
    ///
    /// The whole alias tree is planned before the first adapter runs, so
    /// unknown steps and cycles perform no work. Steps then run in declared
    /// order; the first failure stops the run.
    ///
    /// # Errors
    ///
    /// `unknown-task`, `task-cycle`, `adapter-failed`, `config-invalid`,
    /// `io-failed`, or `cancelled` when interrupted between steps.
    pub fn run_task(&self, invocation: &str) -> Result<()> {
        let (name, _) = split_target(invocation);

        self.check_reentry(name)?;

        let plan = self.plan(invocation)?;
        debug!(
            "Plan for '{}': {:?}",
            invocation,
            plan.iter().map(|i| i.name.as_str()).collect::<Vec<_>>()
        );

        // Leaves mark themselves active while they run.
        if !matches!(self.ctx.registry().lookup(name), Some(TaskDefinition::Alias(_))) {
            return self.execute_plan(&plan);
        }
        self.active.borrow_mut().push(name.to_string());
        let result = self.execute_plan(&plan);
        self.active.borrow_mut().pop();
        result
    }

    /// A task that is already running may not start again from inside
    /// itself, e.g. through a watch group.
    fn check_reentry(&self, name: &str) -> Result<()> {
        let active = self.active.borrow();
        match active.iter().position(|n| n == name) {
            Some(pos) => {
                let mut cycle: Vec<String> = active[pos..].to_vec();
                cycle.push(name.to_string());
                Err(Error::TaskCycle { cycle })
            }
            None => Ok(()),
        }
    }

    fn execute_plan(&self, plan: &[Invocation]) -> Result<()> {
        for invocation in plan {
            if self.ctx.is_cancelled() {
                debug!("Cancelled before '{}'", invocation.name);
                return Err(Error::Cancelled);
            }
            self.check_reentry(&invocation.task)?;
            self.active.borrow_mut().push(invocation.task.clone());
            let result = self.run_leaf(invocation);
            self.active.borrow_mut().pop();
            result?;
        }
        Ok(())
    }

    fn run_leaf(&self, invocation: &Invocation) -> Result<()> {
        let leaf = self.leaf_for(invocation)?;
        let adapter = self.ctx.registry().adapter(&leaf.adapter).ok_or_else(|| {
            Error::config(format!(
                "no adapter registered for '{}' (task '{}')",
                leaf.adapter, invocation.name
            ))
        })?;

        let reporter = self.ctx.reporter();
        reporter.task_header(&invocation.name, adapter.tool());

        let src_root = self.ctx.src_root();
        let sets = leaf
            .files
            .iter()
            .map(|pattern| fileset::resolve(pattern, &src_root))
            .collect::<Result<Vec<ResolvedSet>>>()?;

        let task_ctx = TaskContext {
            invocation: &invocation.name,
            run: self.ctx,
            runner: self,
        };

        self.invoked.set(self.invoked.get() + 1);
        debug!(
            "Dispatching '{}' to adapter '{}' with {} file set(s)",
            invocation.name,
            leaf.adapter,
            sets.len()
        );

        match adapter.run(&leaf.config, &sets, &task_ctx) {
            Ok(Outcome::Ok) => Ok(()),
            Ok(Outcome::Failed { diagnostics }) => {
                self.ctx.abort();
                for diagnostic in &diagnostics {
                    reporter.error(diagnostic);
                }
                Err(Error::AdapterFailed {
                    task: invocation.name.clone(),
                    tool: adapter.tool().to_string(),
                    diagnostics,
                })
            }
            Err(e) => {
                self.ctx.abort();
                Err(e)
            }
        }
    }

    fn leaf_for(&self, invocation: &Invocation) -> Result<&'a LeafTask> {
        let unknown = || Error::UnknownTask {
            name: invocation.name.clone(),
        };
        match (self.ctx.registry().lookup(&invocation.task), &invocation.target) {
            (Some(TaskDefinition::Leaf(leaf)), None) => Ok(leaf),
            (Some(TaskDefinition::Multi(targets)), Some(target)) => {
                targets.get(target).ok_or_else(unknown)
            }
            _ => Err(unknown()),
        }
    }
}

impl TaskRunner for Executor<'_> {
    fn run_task(&self, invocation: &str) -> Result<()> {
        Executor::run_task(self, invocation)
    }
}

fn visit(
    registry: &TaskRegistry,
    invocation: &str,
    order: &mut Vec<Invocation>,
    visiting: &mut Vec<String>,
) -> Result<()> {
    let (name, target) = split_target(invocation);
    let definition = registry.lookup(name).ok_or_else(|| Error::UnknownTask {
        name: invocation.to_string(),
    })?;

    match (definition, target) {
        (TaskDefinition::Alias(steps), None) => {
            if let Some(pos) = visiting.iter().position(|n| n == name) {
                let mut cycle: Vec<String> = visiting[pos..].to_vec();
                cycle.push(name.to_string());
                return Err(Error::TaskCycle { cycle });
            }
            visiting.push(name.to_string());
            for step in steps {
                visit(registry, step, order, visiting)?;
            }
            visiting.pop();
        }
        (TaskDefinition::Leaf(_), None) => order.push(Invocation::leaf(name)),
        (TaskDefinition::Multi(targets), None) => {
            order.extend(targets.keys().map(|t| Invocation::target(name, t)));
        }
        (TaskDefinition::Multi(targets), Some(target)) if targets.contains_key(target) => {
            order.push(Invocation::target(name, target));
        }
        _ => {
            return Err(Error::UnknownTask {
                name: invocation.to_string(),
            })
        }
    }

    Ok(())
}
