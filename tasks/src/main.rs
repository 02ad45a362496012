//! Command-line client for the task API.
//!
//! Every command loads the collection first, then runs against the store.
//!
//! ```text
//! tasklist list
//! tasklist add "Buy milk" --description "2 liters"
//! tasklist edit 3 --title "Buy oat milk" --done true
//! tasklist toggle 3
//! tasklist remove 3
//! ```

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tasklist::{
    HttpTaskService, SystemClock, Task, TaskConfig, TaskDraft, TaskError, TaskId, TaskPatch,
    TaskStore,
};
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

#[derive(Debug, Parser)]
#[command(name = "tasklist", version, about = "Manage tasks on a remote to-do API")]
struct Cli {
    /// Base URL of the task API (overrides TASKLIST_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List all tasks
    #[command(alias = "ls")]
    List,
    /// Show one task
    Show {
        /// Task id
        id: TaskId,
    },
    /// Create a task
    Add {
        /// Task title
        title: String,
        /// Optional description
        #[arg(short, long, default_value = "")]
        description: String,
    },
    /// Change fields of a task
    Edit {
        /// Task id
        id: TaskId,
        /// New title
        #[arg(short, long)]
        title: Option<String>,
        /// New description
        #[arg(short, long)]
        description: Option<String>,
        /// New completion flag
        #[arg(long)]
        done: Option<bool>,
    },
    /// Flip a task between done and pending
    Toggle {
        /// Task id
        id: TaskId,
    },
    /// Delete a task
    #[command(alias = "rm")]
    Remove {
        /// Task id
        id: TaskId,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    let mut config = TaskConfig::from_env().context("loading configuration")?;
    if let Some(api_url) = cli.api_url {
        config = config.with_api_url(api_url);
        config.validate().context("validating --api-url")?;
    }

    let service = HttpTaskService::from_config(&config)?;
    let store = TaskStore::with_config(service, Arc::new(SystemClock), &config);

    tracing::debug!(api_url = %config.api_url, "Loading tasks");
    store
        .load()
        .await
        .with_context(|| format!("loading tasks from {}", config.api_url))?;

    let result = run(&store, cli.cmd).await;

    if let Err(e) = store.shutdown(config.shutdown_timeout()).await {
        tracing::warn!(error = %e, "Shutdown did not complete cleanly");
    }

    result
}

async fn run(store: &TaskStore<HttpTaskService>, cmd: Commands) -> anyhow::Result<()> {
    match cmd {
        Commands::List => {
            let tasks = store.tasks().await;
            if tasks.is_empty() {
                println!("No tasks yet.");
            }
            for task in &tasks {
                println!("{}", summary_line(task));
            }
            println!(
                "\nCompleted: {}/{}",
                store.completed_count().await,
                store.count().await
            );
        },
        Commands::Show { id } => {
            let task = store
                .get(id)
                .await
                .ok_or(TaskError::NotFoundLocally(id))?;
            print_details(&task);
        },
        Commands::Add { title, description } => {
            let task = store
                .add(TaskDraft::new(title, description))
                .await
                .map_err(report)?;
            println!("Created {}", summary_line(&task));
        },
        Commands::Edit {
            id,
            title,
            description,
            done,
        } => {
            let patch = TaskPatch {
                title,
                description,
                done,
            };
            if patch.is_empty() {
                anyhow::bail!("nothing to change: pass --title, --description or --done");
            }
            let task = store.edit(id, patch).await.map_err(report)?;
            println!("Updated {}", summary_line(&task));
        },
        Commands::Toggle { id } => {
            let task = store.toggle_done(id).await.map_err(report)?;
            println!("Toggled {}", summary_line(&task));
        },
        Commands::Remove { id } => {
            store.remove(id).await.map_err(report)?;
            println!("Deleted task {id}");
        },
    }
    Ok(())
}

/// Print every field error before handing the failure back
fn report(error: TaskError) -> anyhow::Error {
    if let Some(errors) = error.validation_errors() {
        for field_error in errors {
            eprintln!("  - {field_error}");
        }
    }
    anyhow::Error::new(error)
}

fn summary_line(task: &Task) -> String {
    let status = if task.done { "✓" } else { " " };
    format!("[{status}] #{} {}", task.id, task.title)
}

fn print_details(task: &Task) {
    println!("{}", summary_line(task));
    if !task.description.is_empty() {
        println!("    {}", task.description);
    }
    if let Some(created_at) = task.created_at {
        println!("    created {}", created_at.format("%Y-%m-%d %H:%M"));
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tasklist=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}
