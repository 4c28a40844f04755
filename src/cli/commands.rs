use clap::{Parser, Subcommand};

/// `steerbot` - multi-task Telegram message steering engine.
#[derive(Parser, Debug)]
#[command(name = "steerbot")]
#[command(version = "0.1.0")]
#[command(about = "Steer messages between Telegram chats, many tasks at once.", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the steering engine (long-poll, route, deliver) until Ctrl-C
    Run,

    /// Show configured tasks and their persisted settings
    Status,

    /// Manage steering tasks in the task store
    Tasks {
        #[command(subcommand)]
        task_command: TaskCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// List configured tasks
    List,

    /// Add a steering task
    Add {
        /// Human-readable task name
        #[arg(long)]
        name: String,

        /// Source chat (numeric id, @handle, or t.me link)
        #[arg(long)]
        source: String,

        /// Target chat (numeric id, @handle, or t.me link)
        #[arg(long)]
        target: String,

        /// Task id (generated when omitted)
        #[arg(long)]
        id: Option<String>,

        /// Delivery mode: copy (re-emit as new) or forward (keep attribution)
        #[arg(long, default_value = "copy")]
        mode: String,

        /// Base delay between deliveries, in seconds
        #[arg(long, default_value = "1.0")]
        delay: f64,

        /// Create the task disabled
        #[arg(long)]
        disabled: bool,
    },

    /// Remove a task from the store
    Remove {
        /// Task id
        id: String,
    },

    /// Enable a task (picked up on the next engine start)
    Enable {
        /// Task id
        id: String,
    },

    /// Disable a task
    Disable {
        /// Task id
        id: String,
    },
}
