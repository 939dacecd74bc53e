mod formatting;
mod workflows;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::Ordering;

use anyhow::{Context, Result};
use clap::Parser;
use owo_colors::OwoColorize;
use tracing::{debug, Level};
use tracing_subscriber::EnvFilter;

use themekit_core::config::Config;
use themekit_core::context::RunContext;
use themekit_core::executor::Executor;
use themekit_core::graph::TaskGraph;
use themekit_core::path_utils::normalize;
use themekit_core::registry::TaskRegistry;
use themekit_core::reporter::Reporter;

#[derive(Parser)]
#[command(name = "themekit")]
#[command(about = "Task runner for building and packaging WordPress themes")]
#[command(version)]
struct Cli {
    /// Tasks to run, as `task` or `task:target`. Defaults to `default`.
    tasks: Vec<String>,

    /// Project root.
    #[arg(short = 'C', long, default_value = ".")]
    cwd: PathBuf,

    /// Configuration file, relative to the project root.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the registered tasks and exit.
    #[arg(long, action)]
    list: bool,

    /// Validate the task graph and exit.
    #[arg(long, action)]
    check: bool,

    #[arg(long, action)]
    no_color: bool,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[arg(short, long, action)]
    quiet: bool,
}

fn init_tracing(cli: &Cli) {
    let level = if cli.quiet {
        Level::ERROR
    } else {
        match cli.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!cli.no_color)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{} {:#}", "✗".red(), e);
            ExitCode::FAILURE
        }
    }
}

/// Runs the requested tasks. `Ok(false)` means a task failed and has
/// already been reported.
fn run(cli: Cli) -> Result<bool> {
    let cwd = std::env::current_dir().context("Failed to read the current directory")?;
    let root = normalize(&cwd.join(&cli.cwd));
    let color = !cli.no_color;

    let config = Config::discover(&root, cli.config.as_deref())
        .with_context(|| format!("Failed to load configuration under {}", root.display()))?;
    debug!("Project '{}' at {}", config.project.name, root.display());

    let mut registry = TaskRegistry::new();
    themekit_adapters::register_builtin(&mut registry);
    workflows::declare(&mut registry, &config, &root);

    if cli.list {
        formatting::print_task_table(&registry, color);
        return Ok(true);
    }
    if cli.check {
        return Ok(formatting::print_check(&TaskGraph::new(&registry), color));
    }

    let ctx = RunContext::new(config.project, registry, Reporter::stdout(color), &root);
    let flag = ctx.interrupt_flag();
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .context("Failed to install the interrupt handler")?;

    let tasks = if cli.tasks.is_empty() {
        vec!["default".to_string()]
    } else {
        cli.tasks
    };

    let executor = Executor::new(&ctx);
    for task in &tasks {
        if let Err(e) = executor.run_task(task) {
            debug!("Task '{}' ended with {}", task, e.kind());
            ctx.reporter().error(&e.to_string());
            ctx.reporter().finish(false);
            return Ok(false);
        }
    }
    ctx.reporter().finish(true);
    Ok(true)
}
