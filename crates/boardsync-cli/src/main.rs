use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;

use boardsync_cli::config::{Cli, Command};
use boardsync_db::open_database;
use boardsync_sync::{PushOutcome, SyncEngine, SyncReport};
use boardsync_trello::TrelloClient;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("boardsync=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db = open_database(&cli.db_config()).context("open database")?;
    let client = TrelloClient::new(&cli.trello_config()).context("build tracker client")?;
    let engine = SyncEngine::new(db, Arc::new(client), cli.sync_config());

    match &cli.command {
        Command::Boards => {
            let cred = cli.credential()?;
            let boards = engine.list_boards(&cred).await?;
            if boards.is_empty() {
                eprintln!("No open boards.");
            }
            for board in boards {
                println!("{:<26} {}", board.id, board.name);
            }
        }
        Command::Import { board_id, name } => {
            let cred = cli.credential()?;
            let name = match name {
                Some(name) => name.clone(),
                None => engine
                    .list_boards(&cred)
                    .await?
                    .into_iter()
                    .find(|b| &b.id == board_id)
                    .map(|b| b.name)
                    .with_context(|| format!("board {board_id} is not among your open boards"))?,
            };
            let (project, report) = engine
                .import_board(&cred, board_id, &name, &cli.owner)
                .await?;
            info!(project_id = %project.id, "imported board {board_id} as {:?}", project.name);
            eprintln!("Project {} ({})", project.name, project.id);
            print_report(&report)?;
        }
        Command::Sync { project_id } => {
            let cred = cli.optional_credential()?;
            let report = engine
                .sync_project(cred.as_ref(), &cli.owner, project_id)
                .await?;
            print_report(&report)?;
        }
        Command::Tasks { project_id } => {
            let tasks = engine.list_project_tasks(project_id).await?;
            if tasks.is_empty() {
                eprintln!("No tasks.");
            } else {
                println!("{:<38} {:<12} {:<8} {:<26} TITLE", "ID", "STATUS", "PRIORITY", "CARD");
                for linked in tasks {
                    let card = linked
                        .meta
                        .as_ref()
                        .and_then(|m| m.remote_card_id.as_deref())
                        .unwrap_or("-");
                    println!(
                        "{:<38} {:<12} {:<8} {:<26} {}",
                        linked.task.id,
                        linked.task.status.as_str(),
                        linked.task.priority.as_str(),
                        card,
                        linked.task.title,
                    );
                }
            }
        }
        Command::Push { action, task_id } => {
            let cred = cli.optional_credential()?;
            match engine.push_task(cred.as_ref(), task_id, (*action).into()).await {
                PushOutcome::Succeeded => eprintln!("Pushed task {task_id}"),
                PushOutcome::Failed(e) => bail!("push failed for task {task_id}: {e}"),
            }
        }
    }

    Ok(())
}

fn print_report(report: &SyncReport) -> Result<()> {
    if let Some(ref message) = report.message {
        eprintln!("{message}");
    }
    eprintln!(
        "{} imported, {} updated, {} failed",
        report.imported_count,
        report.updated_count,
        report.failed_count()
    );
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}
