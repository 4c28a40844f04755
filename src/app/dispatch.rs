use crate::app::status::render_overview;
use crate::cli::commands::{Cli, Commands, TaskCommands};
use crate::client::ChatClient;
use crate::client::telegram::TelegramClient;
use crate::config::Config;
use crate::steering::{
    ForwardMode, RegistryOptions, TaskConfig, TaskOverview, TaskRegistry, TaskStatus, TaskStore,
};
use anyhow::{Context, Result, bail};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

/// Buffer between the protocol listener and the registry's router.
const EVENT_BUFFER: usize = 256;

pub async fn dispatch(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Commands::Run => run_engine(config).await,
        Commands::Status => {
            let store = TaskStore::new(config.tasks_file());
            let overview = offline_overview(&store.load()?);
            print!("{}", render_overview(&overview));
            Ok(())
        }
        Commands::Tasks { task_command } => run_task_command(task_command, &config),
    }
}

/// Engine loop: one shared protocol session feeding the task registry's
/// router, running until Ctrl-C.
async fn run_engine(config: Config) -> Result<()> {
    let token = config.telegram.bot_token.trim();
    if token.is_empty() {
        bail!("no bot token configured; set telegram.bot_token or TELEGRAM_BOT_TOKEN");
    }

    let client: Arc<dyn ChatClient> = Arc::new(TelegramClient::new(
        token.to_string(),
        config.telegram.poll_timeout_secs,
    ));
    let store = TaskStore::new(config.tasks_file());
    let registry = Arc::new(TaskRegistry::new(
        Arc::clone(&client),
        store,
        config.forwarding.as_ref(),
        RegistryOptions::from_config(&config),
    )?);

    let started = registry.start_enabled().await;
    info!(started, "steering engine up");

    let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
    let listener = tokio::spawn(async move { client.listen(events_tx).await });
    let router = {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move { registry.dispatch(events_rx).await })
    };

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown signal received");

    registry.stop_all().await;
    router.abort();
    listener.abort();
    Ok(())
}

/// Task-store edits for the offline CLI. These write the same file the
/// engine reads at startup; a running engine picks changes up on restart.
fn run_task_command(command: TaskCommands, config: &Config) -> Result<()> {
    let store = TaskStore::new(config.tasks_file());

    match command {
        TaskCommands::List => {
            let overview = offline_overview(&store.load()?);
            print!("{}", render_overview(&overview));
        }
        TaskCommands::Add {
            name,
            source,
            target,
            id,
            mode,
            delay,
            disabled,
        } => {
            let task_id = id.unwrap_or_else(|| format!("task-{}", uuid::Uuid::new_v4()));
            let mut task = TaskConfig::new(task_id, &name, source.trim(), target.trim());
            task.forward_mode = parse_mode(&mode)?;
            task.forward_delay = delay.max(0.0);
            task.enabled = !disabled;
            task.validate()?;

            let mut tasks = store.load()?;
            if tasks.iter().any(|t| t.task_id == task.task_id) {
                bail!("a task with id '{}' already exists", task.task_id);
            }
            let (task_id, name) = (task.task_id.clone(), task.name.clone());
            tasks.push(task);
            store.save(&tasks)?;
            println!("added task '{name}' ({task_id})");
        }
        TaskCommands::Remove { id } => {
            let mut tasks = store.load()?;
            let before = tasks.len();
            tasks.retain(|t| t.task_id != id);
            if tasks.len() == before {
                bail!("no task with id '{id}'");
            }
            store.save(&tasks)?;
            println!("removed task '{id}'");
        }
        TaskCommands::Enable { id } => {
            set_enabled(&store, &id, true)?;
            println!("enabled task '{id}'");
        }
        TaskCommands::Disable { id } => {
            set_enabled(&store, &id, false)?;
            println!("disabled task '{id}'");
        }
    }

    Ok(())
}

fn set_enabled(store: &TaskStore, id: &str, enabled: bool) -> Result<()> {
    let mut tasks = store.load()?;
    let task = tasks
        .iter_mut()
        .find(|t| t.task_id == id)
        .with_context(|| format!("no task with id '{id}'"))?;
    task.enabled = enabled;
    store.save(&tasks)
}

fn parse_mode(raw: &str) -> Result<ForwardMode> {
    match raw.to_lowercase().as_str() {
        "copy" => Ok(ForwardMode::Copy),
        "forward" => Ok(ForwardMode::Forward),
        other => bail!("unknown mode '{other}' (expected 'copy' or 'forward')"),
    }
}

/// Overview built from persisted records alone; every task reads as stopped
/// since no engine state is available offline.
fn offline_overview(tasks: &[TaskConfig]) -> BTreeMap<String, TaskOverview> {
    tasks
        .iter()
        .map(|task| {
            (
                task.task_id.clone(),
                TaskOverview {
                    name: task.name.clone(),
                    status: TaskStatus::Stopped,
                    source_chat: task.source_chat.clone(),
                    target_chat: task.target_chat.clone(),
                    stats: None,
                },
            )
        })
        .collect()
}
