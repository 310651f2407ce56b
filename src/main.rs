//! # Document Archive CLI (`docarc`)
//!
//! The `docarc` binary manages a local document archive: a folder tree of
//! content-addressed documents stored in SQLite, plus an inbox watcher that
//! imports files dropped into a directory.
//!
//! ## Usage
//!
//! ```bash
//! docarc --config ./config/docarc.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docarc init` | Create the SQLite database and the root folder |
//! | `docarc folder tree` | Show the folder hierarchy with document counts |
//! | `docarc folder create <name>` | Create a folder (under the root or `--parent`) |
//! | `docarc folder rename <id> <name>` | Rename a folder |
//! | `docarc folder move <id> <parent>` | Move a folder under a new parent |
//! | `docarc folder delete <id>` | Delete a folder, its subfolders and documents |
//! | `docarc import <file>` | Import a file (into the root or `--folder`) |
//! | `docarc list` | List documents |
//! | `docarc get <id>` | Show a document's metadata and text |
//! | `docarc export <id> <target>` | Write a document's bytes to a file |
//! | `docarc search "<term>"` | Substring search with snippets |
//! | `docarc log` | Show the import log |
//! | `docarc watch` | Import files dropped into the inbox until Ctrl-C |
//!
//! Logs go to stderr and are filtered with `RUST_LOG`
//! (default `doc_archive=info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use doc_archive::archive::Archive;
use doc_archive::{config, doc_cmd, folder_cmd, get, import_log, ingest, search};

/// Document Archive: a hierarchical, content-addressed document store with
/// an unattended inbox importer.
#[derive(Parser)]
#[command(
    name = "docarc",
    about = "Document Archive: folders of deduplicated documents with an inbox importer",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/docarc.toml`.
    #[arg(long, global = true, default_value = "./config/docarc.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema and the root folder.
    ///
    /// Idempotent; running it multiple times is safe.
    Init,

    /// Manage folders.
    Folder {
        #[command(subcommand)]
        action: FolderAction,
    },

    /// Import a file into the archive. The source file is left in place.
    Import {
        /// File to import.
        file: PathBuf,

        /// Target folder id. Defaults to the root folder.
        #[arg(long)]
        folder: Option<String>,
    },

    /// List documents.
    List {
        /// Only documents in this folder.
        #[arg(long)]
        folder: Option<String>,

        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Show a document's metadata and extracted text.
    Get {
        /// Document id.
        id: String,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Write a document's stored bytes to a file.
    Export {
        /// Document id.
        id: String,
        /// Destination path.
        target: PathBuf,
    },

    /// Change a document's title.
    RenameDoc { id: String, title: String },

    /// Move a document to another folder.
    MoveDoc { id: String, folder: String },

    /// Delete a document.
    DeleteDoc { id: String },

    /// Case-insensitive substring search over titles, file names and text.
    Search {
        /// The search term.
        term: String,
    },

    /// Show the most recent import log entries.
    Log {
        /// Maximum number of entries.
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },

    /// Watch the inbox directory and import new files until Ctrl-C.
    Watch,
}

#[derive(Subcommand)]
enum FolderAction {
    /// Show the folder hierarchy with document counts.
    Tree {
        /// Print JSON instead of an indented tree.
        #[arg(long)]
        json: bool,
    },
    /// Create a folder.
    Create {
        name: String,
        /// Parent folder id. Defaults to the root folder.
        #[arg(long)]
        parent: Option<String>,
    },
    /// Rename a folder.
    Rename { id: String, name: String },
    /// Move a folder under a new parent.
    Move { id: String, parent: String },
    /// Delete a folder with all of its subfolders and documents.
    Delete { id: String },
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "doc_archive=info".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let archive = Archive::open(&cfg).await?;
            archive.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Folder { action } => match action {
            FolderAction::Tree { json } => folder_cmd::run_tree(&cfg, json).await?,
            FolderAction::Create { name, parent } => {
                folder_cmd::run_create(&cfg, parent.as_deref(), &name).await?
            }
            FolderAction::Rename { id, name } => folder_cmd::run_rename(&cfg, &id, &name).await?,
            FolderAction::Move { id, parent } => folder_cmd::run_move(&cfg, &id, &parent).await?,
            FolderAction::Delete { id } => folder_cmd::run_delete(&cfg, &id).await?,
        },
        Commands::Import { file, folder } => {
            doc_cmd::run_import(&cfg, &file, folder.as_deref()).await?;
        }
        Commands::List { folder, json } => {
            doc_cmd::run_list(&cfg, folder.as_deref(), json).await?;
        }
        Commands::Get { id, json } => {
            get::run_get(&cfg, &id, json).await?;
        }
        Commands::Export { id, target } => {
            doc_cmd::run_export(&cfg, &id, &target).await?;
        }
        Commands::RenameDoc { id, title } => {
            doc_cmd::run_rename(&cfg, &id, &title).await?;
        }
        Commands::MoveDoc { id, folder } => {
            doc_cmd::run_move(&cfg, &id, &folder).await?;
        }
        Commands::DeleteDoc { id } => {
            doc_cmd::run_delete(&cfg, &id).await?;
        }
        Commands::Search { term } => {
            search::run_search(&cfg, &term).await?;
        }
        Commands::Log { limit } => {
            import_log::run_log(&cfg, limit).await?;
        }
        Commands::Watch => {
            ingest::run_watch(&cfg).await?;
        }
    }

    Ok(())
}
