//! # Document Archive
//!
//! A hierarchical, content-addressed document archive with an unattended
//! inbox importer.
//!
//! Documents live in a folder tree rooted at a single `Root` folder. Each
//! document is stored once per distinct content (SHA-256 of its bytes), with
//! its extracted text for search. Files dropped into an inbox directory are
//! picked up by a watcher, waited on until their writer lets go, imported
//! into a configured root-level folder, and removed from the inbox.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ InboxWatcher │──▶│   Pipeline   │──▶│ Documents +  │
//! │   (notify)   │   │ queue/worker │   │  FolderTree  │
//! └──────────────┘   └──────┬───────┘   └──────┬───────┘
//!                           │                  │
//!                           ▼                  ▼
//!                    ┌────────────┐     ┌──────────────┐
//!                    │ Import log │     │ ArchiveStore │
//!                    └────────────┘     │ SQLite / mem │
//!                                       └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docarc init                          # create database and root folder
//! docarc folder create Taxes           # add a folder under the root
//! docarc import ./scan.pdf --folder <id>
//! docarc search "invoice"
//! docarc watch                         # import files dropped into the inbox
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Error taxonomy |
//! | [`hash`] | Content hashing |
//! | [`file_types`] | Extension allow-list and MIME table |
//! | [`store`] | Storage trait, SQLite and in-memory backends |
//! | [`folders`] | Folder tree invariants |
//! | [`documents`] | Import, dedupe, and document mutation |
//! | [`extract`] | PDF / DOCX text extraction |
//! | [`search`] | Substring search with snippets |
//! | [`ingest`] | Inbox import pipeline |
//! | [`watcher`] | Filesystem watcher feeding the pipeline |
//! | [`import_log`] | Operator-visible import log |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |

pub mod archive;
pub mod config;
pub mod db;
pub mod doc_cmd;
pub mod documents;
pub mod error;
pub mod extract;
pub mod file_types;
pub mod folder_cmd;
pub mod folders;
pub mod get;
pub mod hash;
pub mod import_log;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod search;
pub mod store;
pub mod watcher;
