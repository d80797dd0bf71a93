use std::path::PathBuf;

use clap::{Parser, Subcommand};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(
    name = "tasktrack",
    version = VERSION,
    about = "Offline-tolerant task and project tracker",
    after_help = "\
NOTE:
  Data lives in <data-dir> (default .tasktrack, or $TASKTRACK_DIR):
    server.db    store served by `tasktrack serve`
    client.db    local mirror and pending request queue
    config.json  server URL, listen address, retry delays
  Run `tasktrack init` before any other command.

EXIT CODES:
  0  Success
  1  Error (not initialized, validation, unknown id, storage, etc.)

SYNC NOTES:
  `task`/`project` commands change the local mirror immediately and queue a
  request for the server. `sync` delivers the queue in order, one request at a
  time. Refreshes always run after pending writes."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Data directory (overrides TASKTRACK_DIR)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the data directory, both databases and a default config
    Init,

    /// Run the HTTP server
    Serve {
        /// Listen address (overrides config and TASKTRACK_ADDR)
        #[arg(long)]
        addr: Option<String>,
    },

    /// Task management (local mirror)
    #[command(subcommand)]
    Task(TaskCommands),

    /// Project management (local mirror)
    #[command(subcommand)]
    Project(ProjectCommands),

    /// Deliver queued requests to the server
    #[command(after_help = "\
NOTE:
  Without --wait: stops at the first connectivity failure and leaves the
                  request at the head of the queue.
  With    --wait: sleeps out the retry delay and keeps going until empty.
  Requests the server rejects are dropped and counted as failed.")]
    Sync {
        /// Queue a fetch of tasks and projects after pending writes
        #[arg(long)]
        refresh: bool,

        /// Keep retrying until the queue is empty
        #[arg(long)]
        wait: bool,
    },

    /// Show pending requests in delivery order
    Queue,
}

#[derive(Subcommand)]
pub enum TaskCommands {
    /// Add a task
    Add {
        /// Task description
        description: String,

        /// Position in the list (appends when omitted)
        #[arg(long)]
        position: Option<i64>,

        /// Progress between 0 and 1
        #[arg(long, default_value_t = 0.0)]
        progress: f64,

        /// Project ID
        #[arg(long)]
        project: Option<String>,
    },

    /// List tasks in position order
    List,

    /// Update a task
    Update {
        /// Task ID or unique ID prefix
        id: String,

        #[arg(long)]
        description: Option<String>,

        /// Move to this position
        #[arg(long)]
        position: Option<i64>,

        /// Progress between 0 and 1 (1 marks the task done)
        #[arg(long)]
        progress: Option<f64>,

        /// Project ID
        #[arg(long, conflicts_with = "no_project")]
        project: Option<String>,

        /// Clear the project
        #[arg(long)]
        no_project: bool,
    },

    /// Delete a task
    Delete {
        /// Task ID or unique ID prefix
        id: String,
    },
}

#[derive(Subcommand)]
pub enum ProjectCommands {
    /// Add a project
    Add {
        /// Project name
        name: String,

        /// Display color
        #[arg(long, default_value = "gray")]
        color: String,

        /// Tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// List projects
    List,

    /// Update a project
    Update {
        /// Project ID or unique ID prefix
        id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        color: Option<String>,

        /// Replace tags (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Delete a project (tasks keep their project ID)
    Delete {
        /// Project ID or unique ID prefix
        id: String,
    },
}
