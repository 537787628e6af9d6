use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use polyagent::app::Application;
use polyagent::config::Settings;
use polyagent::tasks::TaskStoreError;
use polyagent::Task;

#[derive(Parser)]
#[command(name = "polyagent", version, about = "Route a task to the best-suited agent")]
struct Cli {
    /// Config file (defaults to ~/.config/polyagent/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process one query and print the enriched result as JSON
    Query {
        query: String,
        /// Force a specific agent by name
        #[arg(long)]
        agent: Option<String>,
        #[arg(long)]
        task_type: Option<String>,
        /// Run every qualifying agent and keep the most confident answer
        #[arg(long)]
        parallel: bool,
        #[arg(long)]
        threshold: Option<f64>,
        /// Let the research agent include web results
        #[arg(long)]
        web: bool,
        /// Submit as a background job and poll until it finishes
        #[arg(long)]
        background: bool,
        /// Cancel a background job still running after this many seconds
        #[arg(long, requires = "background")]
        timeout: Option<u64>,
    },
    /// List registered agents and their tools
    Agents,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref())?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Agents => {
            let app = Application::new(&settings)?;
            println!("{}", serde_json::to_string_pretty(&app.agents())?);
        }
        Command::Query {
            query,
            agent,
            task_type,
            parallel,
            threshold,
            web,
            background,
            timeout,
        } => {
            if parallel {
                settings.coordinator.enable_parallel = true;
            }
            if let Some(threshold) = threshold {
                settings.coordinator.confidence_threshold = threshold;
            }
            settings.validate()?;

            let mut task = Task::new(query).with("use_web_search", web);
            if let Some(agent) = agent {
                task = task.with("preferred_handler", agent);
            }
            if let Some(task_type) = task_type {
                task = task.with("task_type", task_type);
            }

            let mut app = Application::new(&settings)?;
            if background {
                app.start_eviction();
                let id = app.jobs().submit(task).await;
                let deadline = timeout.map(|secs| tokio::time::Instant::now() + Duration::from_secs(secs));
                loop {
                    if deadline.is_some_and(|at| tokio::time::Instant::now() >= at) {
                        match app.jobs().cancel(id).await {
                            Ok(()) | Err(TaskStoreError::AlreadyFinished(_)) => {}
                            Err(e) => return Err(e.into()),
                        }
                    }
                    match app.jobs().status(id).await {
                        Some(record) if record.status.is_terminal() => {
                            println!("{}", serde_json::to_string_pretty(&record)?);
                            break;
                        }
                        Some(_) => tokio::time::sleep(Duration::from_millis(50)).await,
                        None => anyhow::bail!("job {} expired before completion", id),
                    }
                }
            } else {
                let output = app.query(&task).await?;
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
        }
    }

    Ok(())
}
