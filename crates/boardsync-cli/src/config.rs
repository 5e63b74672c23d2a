use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};

use boardsync_core::remote::RemoteCredential;
use boardsync_db::DbConfig;
use boardsync_sync::{PushAction, SyncConfig};
use boardsync_trello::{ClientError, TrelloConfig, DEFAULT_BASE_URL};

#[derive(Debug, Parser)]
#[command(name = "boardsync", about = "Sync Trello boards into local projects")]
pub struct Cli {
    /// Tracker API base URL
    #[arg(long, global = true, env = "BOARDSYNC_TRELLO_URL", default_value = DEFAULT_BASE_URL)]
    pub trello_url: String,

    /// Server-side API key
    #[arg(long, global = true, env = "BOARDSYNC_TRELLO_KEY", hide_env_values = true)]
    pub trello_key: Option<String>,

    /// The account's tracker token
    #[arg(long, global = true, env = "BOARDSYNC_TRELLO_TOKEN", hide_env_values = true)]
    pub trello_token: Option<String>,

    /// Per-request timeout (seconds)
    #[arg(long, global = true, env = "BOARDSYNC_TIMEOUT", default_value = "20")]
    pub timeout: u64,

    /// Stop starting new list fetches after this many seconds
    #[arg(long, global = true, env = "BOARDSYNC_DEADLINE")]
    pub deadline: Option<u64>,

    /// SQLite database path
    #[arg(long, global = true, env = "BOARDSYNC_DB")]
    pub db: Option<String>,

    /// Local user the projects belong to
    #[arg(long, global = true, env = "BOARDSYNC_OWNER", default_value = "local")]
    pub owner: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the account's open boards
    Boards,
    /// Import a board as a project, or refresh an earlier import
    Import {
        board_id: String,
        /// Project name; defaults to the board's name
        #[arg(long)]
        name: Option<String>,
    },
    /// Re-sync a project linked to a board
    Sync { project_id: String },
    /// List a project's tasks with their linkage
    Tasks { project_id: String },
    /// Push a local task to its card
    Push {
        #[arg(value_enum)]
        action: PushArg,
        task_id: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PushArg {
    Create,
    Update,
    Archive,
    Delete,
}

impl From<PushArg> for PushAction {
    fn from(arg: PushArg) -> Self {
        match arg {
            PushArg::Create => PushAction::Create,
            PushArg::Update => PushAction::Update,
            PushArg::Archive => PushAction::Archive,
            PushArg::Delete => PushAction::Delete,
        }
    }
}

impl Cli {
    pub fn trello_config(&self) -> TrelloConfig {
        TrelloConfig {
            base_url: self.trello_url.clone(),
            api_key: self.trello_key.clone(),
            timeout: Duration::from_secs(self.timeout),
        }
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            deadline: self.deadline.map(Duration::from_secs),
        }
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig {
            sqlite_path: self.db.clone(),
        }
    }

    pub fn credential(&self) -> Result<RemoteCredential, ClientError> {
        self.trello_config().credential(self.trello_token.as_deref())
    }

    /// Like [`Cli::credential`], but a missing token is `None` so the engine
    /// reports it as an auth failure. A missing API key is still an error.
    pub fn optional_credential(&self) -> Result<Option<RemoteCredential>, ClientError> {
        match self.credential() {
            Ok(cred) => Ok(Some(cred)),
            Err(ClientError::MissingCredential(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
