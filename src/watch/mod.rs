use anyhow::{Context, Result};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use notify_debouncer_mini::{new_debouncer, DebouncedEvent, DebouncedEventKind};
use std::ffi::OsString;
use std::path::Path;
use std::sync::mpsc;
use std::time::Duration;

/// Events emitted by the diff watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// The watched diff file was written; time to re-read and re-parse it
    DiffChanged,
    /// The OS watcher reported a failure (e.g. watch limit reached)
    Error(String),
}

/// A debounced watcher over a single diff file that grows while a session runs
pub struct DiffWatcher {
    _watcher: notify_debouncer_mini::Debouncer<RecommendedWatcher>,
}

impl DiffWatcher {
    /// Start watching `path`. Events are debounced by `debounce_ms` milliseconds.
    ///
    /// The parent directory is watched rather than the file itself, so the
    /// watch survives editors and tools that replace the file on write.
    pub fn new(path: &Path, debounce_ms: u64, tx: mpsc::Sender<WatchEvent>) -> Result<Self> {
        let file_name = path
            .file_name()
            .map(|n| n.to_os_string())
            .with_context(|| format!("not a file path: {}", path.display()))?;
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => std::env::current_dir().context("failed to resolve current directory")?,
        };

        let mut debouncer = new_debouncer(
            Duration::from_millis(debounce_ms),
            move |result: std::result::Result<Vec<DebouncedEvent>, notify::Error>| {
                let event = match result {
                    Ok(events) if touches_file(&events, &file_name) => WatchEvent::DiffChanged,
                    Ok(_) => return,
                    Err(e) => {
                        tracing::warn!(error = %e, "diff watcher error");
                        WatchEvent::Error(e.to_string())
                    }
                };
                // Receiver gone means the follow loop has exited
                let _ = tx.send(event);
            },
        )
        .context("failed to create file watcher")?;

        debouncer
            .watcher()
            .watch(&dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("failed to watch {}", dir.display()))?;
        tracing::debug!(dir = %dir.display(), "watching diff file");

        Ok(DiffWatcher {
            _watcher: debouncer,
        })
    }
}

fn touches_file(events: &[DebouncedEvent], file_name: &OsString) -> bool {
    events.iter().any(|e| {
        e.kind == DebouncedEventKind::Any && e.path.file_name() == Some(file_name.as_os_str())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn make_event(path: &str, kind: DebouncedEventKind) -> DebouncedEvent {
        DebouncedEvent {
            path: PathBuf::from(path),
            kind,
        }
    }

    #[test]
    fn only_events_for_watched_file_count() {
        let name = OsString::from("session.diff");
        assert!(touches_file(
            &[make_event("/tmp/x/other.txt", DebouncedEventKind::Any), make_event("/tmp/x/session.diff", DebouncedEventKind::Any)],
            &name
        ));
        assert!(!touches_file(&[make_event("/tmp/x/other.txt", DebouncedEventKind::Any)], &name));
        assert!(!touches_file(&[make_event("/tmp/x/session.diff", DebouncedEventKind::AnyContinuous)], &name));
        assert!(!touches_file(&[], &name));
    }

    #[test]
    fn rejects_path_without_file_name() {
        let (tx, _rx) = mpsc::channel();
        assert!(DiffWatcher::new(Path::new("/"), 50, tx).is_err());
    }
}
