//! Inbox directory watcher.
//!
//! Turns filesystem notifications for the inbox into [`Intake::offer`]
//! calls. Only arrivals count: a file created in the directory or renamed
//! into it. Modifications of files already there are not offers; the
//! pipeline's readiness check deals with files still being written.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, error, info};

use crate::ingest::Intake;

/// Keeps the OS watch alive; dropping it stops capture.
pub struct InboxWatcher {
    _watcher: RecommendedWatcher,
}

impl InboxWatcher {
    pub fn start(dir: &Path, intake: Intake) -> Result<Self> {
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    for path in arrivals(&event) {
                        debug!(path = %path.display(), "inbox arrival");
                        intake.offer(path);
                    }
                }
                Err(e) => error!(error = %e, "inbox watcher error"),
            }
        })
        .context("Failed to create inbox watcher")?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch inbox: {}", dir.display()))?;
        info!(path = %dir.display(), "watching inbox");

        Ok(Self { _watcher: watcher })
    }
}

/// Paths of files that arrived in the watched directory with this event.
fn arrivals(event: &Event) -> Vec<&Path> {
    match event.kind {
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event
            .paths
            .iter()
            .map(PathBuf::as_path)
            .filter(|p| !p.is_dir())
            .collect(),
        // Backends that cannot tell the two sides of a rename apart report
        // both; only the side that still exists arrived.
        EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => event
            .paths
            .iter()
            .map(PathBuf::as_path)
            .filter(|p| p.is_file())
            .collect(),
        _ => Vec::new(),
    }
}
