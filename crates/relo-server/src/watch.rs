//! Build output watching.
//!
//! Turns bursts of filesystem events in the build output directory into
//! single build-completed triggers for the manager. A build writes several
//! bundles in quick succession; only events matching the configured patterns
//! count, and a trigger fires once the directory has been quiet for the
//! debounce period.

use std::path::{Path, PathBuf};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};

use crate::manager::ManagerEvent;

/// Watches the build output directory and fires build-completed triggers.
pub(crate) struct BuildWatcher {
    dir: PathBuf,
    patterns: Vec<String>,
    debounce: Duration,
    trigger: mpsc::Sender<ManagerEvent>,
    watcher: Option<RecommendedWatcher>,
}

impl BuildWatcher {
    pub(crate) fn new(
        dir: PathBuf,
        patterns: Vec<String>,
        debounce: Duration,
        trigger: mpsc::Sender<ManagerEvent>,
    ) -> Self {
        Self {
            dir,
            patterns,
            debounce,
            trigger,
            watcher: None,
        }
    }

    /// Start the filesystem watcher.
    ///
    /// Spawns a background task that coalesces raw events and posts one
    /// `BuildCompleted` per settled burst. The notify watcher stays alive as
    /// long as this struct does.
    ///
    /// # Errors
    ///
    /// Returns an error if the watcher cannot be created or the directory
    /// cannot be watched.
    pub(crate) fn start(&mut self) -> Result<(), notify::Error> {
        let (tx, rx) = mpsc::channel::<Event>(100);

        // The notify callback is sync, hence blocking_send
        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            if let Ok(event) = res {
                let _ = tx.blocking_send(event);
            }
        })?;

        watcher.watch(&self.dir, RecursiveMode::Recursive)?;
        self.watcher = Some(watcher);

        tracing::info!(dir = %self.dir.display(), "watching build output");

        tokio::spawn(coalesce_events(
            rx,
            self.dir.clone(),
            self.patterns.clone(),
            self.debounce,
            self.trigger.clone(),
        ));

        Ok(())
    }
}

/// Collapse raw filesystem events into one trigger per settled burst.
async fn coalesce_events(
    mut rx: mpsc::Receiver<Event>,
    dir: PathBuf,
    patterns: Vec<String>,
    debounce: Duration,
    trigger: mpsc::Sender<ManagerEvent>,
) {
    loop {
        // Wait for the first event of a burst.
        let Some(event) = rx.recv().await else {
            return;
        };
        if !is_relevant(&event, &dir, &patterns) {
            continue;
        }

        // Keep absorbing until the output has been quiet for the debounce
        // period; relevant events push the deadline out.
        let mut deadline = Instant::now() + debounce;
        loop {
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Some(event)) => {
                    if is_relevant(&event, &dir, &patterns) {
                        deadline = Instant::now() + debounce;
                    }
                }
                Ok(None) => return,
                Err(_) => break,
            }
        }

        tracing::debug!("build output settled; requesting reload");
        if trigger.send(ManagerEvent::BuildCompleted).await.is_err() {
            return;
        }
    }
}

/// Whether an event is a content change to a watched bundle.
fn is_relevant(event: &Event, dir: &Path, patterns: &[String]) -> bool {
    if !matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) {
        return false;
    }

    event
        .paths
        .iter()
        .any(|path| matches_patterns(path, dir, patterns))
}

/// Check if a path matches any watch pattern.
fn matches_patterns(path: &Path, dir: &Path, patterns: &[String]) -> bool {
    let Ok(relative) = path.strip_prefix(dir) else {
        return false;
    };

    let relative_str = relative.to_string_lossy();

    patterns
        .iter()
        .filter_map(|p| glob::Pattern::new(p).ok())
        .any(|glob_pattern| glob_pattern.matches(&relative_str))
}
