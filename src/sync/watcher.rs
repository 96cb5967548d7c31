//! Change detection for the site tree.
//!
//! The watcher keeps a SHA-256 hash of every tracked file in
//! `sync/watcher_state.json`. Each check rehashes the tree, appends any
//! differences to `sync/pending_changes.json` and moves the stored state
//! forward. While `watch` runs its process id sits in `sync/watcher.pid`;
//! removing that file stops the loop at the next tick.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Local;
use serde::{Deserialize, Serialize};
use tokio::time::{interval_at, Instant};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::core::config::SyncConfig;
use crate::core::errors::{LearningHubError, Result};
use crate::core::file_utils::{relative_slash_path, sha256_hex, FileReader, FileWriter};

/// Stored hashes, inside the sync directory
pub const STATE_FILE: &str = "watcher_state.json";
/// Changes not yet synced, inside the sync directory
pub const CHANGES_FILE: &str = "pending_changes.json";
/// Process id of a running watcher, inside the sync directory
pub const PID_FILE: &str = "watcher.pid";

fn now_iso() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

/// Hashes from the last check
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WatcherState {
    /// Root-relative path to content hash
    #[serde(default)]
    pub file_hashes: BTreeMap<String, String>,
    /// When changes were last recorded
    #[serde(default)]
    pub last_check: Option<String>,
}

/// Kind of change to a tracked file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// New file
    Added,
    /// Content hash differs
    Modified,
    /// File is gone
    Deleted,
}

impl ChangeKind {
    /// Lowercase label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
        }
    }
}

/// One recorded change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingChange {
    /// Root-relative path
    pub file: String,
    /// What happened
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    /// Detection time
    pub detected: String,
}

/// Contents of `pending_changes.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PendingChanges {
    /// Changes in detection order
    #[serde(default)]
    pub changes: Vec<PendingChange>,
    /// Last write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

/// Differences between two hash maps, each list sorted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Only in the new map
    pub added: Vec<String>,
    /// In both with different hashes
    pub modified: Vec<String>,
    /// Only in the old map
    pub deleted: Vec<String>,
}

impl ChangeSet {
    /// No differences
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Number of changed paths
    pub fn total(&self) -> usize {
        self.added.len() + self.modified.len() + self.deleted.len()
    }

    /// Every change with its kind: added, then modified, then deleted
    pub fn entries(&self) -> impl Iterator<Item = (ChangeKind, &str)> {
        let added = self.added.iter().map(|f| (ChangeKind::Added, f.as_str()));
        let modified = self.modified.iter().map(|f| (ChangeKind::Modified, f.as_str()));
        let deleted = self.deleted.iter().map(|f| (ChangeKind::Deleted, f.as_str()));
        added.chain(modified).chain(deleted)
    }
}

/// Compare two hash maps
pub fn detect_changes(old: &BTreeMap<String, String>, new: &BTreeMap<String, String>) -> ChangeSet {
    let old_keys: BTreeSet<&String> = old.keys().collect();
    let new_keys: BTreeSet<&String> = new.keys().collect();

    ChangeSet {
        added: new_keys.difference(&old_keys).map(|f| f.to_string()).collect(),
        modified: old_keys
            .intersection(&new_keys)
            .filter(|f| old.get(**f) != new.get(**f))
            .map(|f| f.to_string())
            .collect(),
        deleted: old_keys.difference(&new_keys).map(|f| f.to_string()).collect(),
    }
}

/// Snapshot for `sync status`
#[derive(Debug, Clone, PartialEq)]
pub struct WatcherStatus {
    /// Contents of the PID file, when present
    pub running_pid: Option<String>,
    /// Last recorded check
    pub last_check: Option<String>,
    /// Files in the stored state
    pub tracked_files: usize,
    /// Recorded changes
    pub pending: Vec<PendingChange>,
}

/// Something the watch loop reports
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    /// First run stored this many hashes
    Indexed(usize),
    /// A check found differences
    Changes(ChangeSet),
    /// A check found nothing
    Unchanged,
}

/// Change watcher for one site
#[derive(Debug, Clone)]
pub struct Watcher {
    root: PathBuf,
    sync_dir: PathBuf,
    patterns: Vec<glob::Pattern>,
    ignore_dirs: Vec<String>,
    interval: Duration,
}

impl Watcher {
    /// Watcher for the site at `root`
    pub fn new(root: &Path, settings: &SyncConfig) -> Result<Self> {
        let patterns = settings
            .watch_patterns
            .iter()
            .map(|p| glob::Pattern::new(p))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self {
            root: root.to_path_buf(),
            sync_dir: root.join(&settings.dir),
            patterns,
            ignore_dirs: settings.ignore_dirs.clone(),
            interval: Duration::from_secs(settings.interval_secs.max(1)),
        })
    }

    /// Site root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Poll period
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// `sync/watcher_state.json`
    pub fn state_path(&self) -> PathBuf {
        self.sync_dir.join(STATE_FILE)
    }

    /// `sync/pending_changes.json`
    pub fn changes_path(&self) -> PathBuf {
        self.sync_dir.join(CHANGES_FILE)
    }

    /// `sync/watcher.pid`
    pub fn pid_path(&self) -> PathBuf {
        self.sync_dir.join(PID_FILE)
    }

    fn is_tracked(&self, name: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(name))
    }

    /// Hash every tracked file under the root
    pub fn tracked_files(&self) -> Result<BTreeMap<String, String>> {
        let mut hashes = BTreeMap::new();
        let walker = WalkDir::new(&self.root).into_iter().filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !self
                    .ignore_dirs
                    .iter()
                    .any(|d| entry.file_name().to_string_lossy() == d.as_str())
        });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                // removed between listing its directory and visiting it
                Err(e) if e.io_error().is_some_and(|io| io.kind() == io::ErrorKind::NotFound) => {
                    debug!("Skipping vanished entry: {}", e);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            if !entry.file_type().is_file() || !self.is_tracked(&entry.file_name().to_string_lossy()) {
                continue;
            }
            let Some(rel) = relative_slash_path(&self.root, entry.path()) else {
                continue;
            };
            if let Some(hash) = hash_file(entry.path()) {
                hashes.insert(rel, hash);
            }
        }
        debug!("Hashed {} tracked files", hashes.len());
        Ok(hashes)
    }

    /// Stored state; a missing or unreadable file means an empty state
    pub fn load_state(&self) -> WatcherState {
        load_or_default(&self.state_path())
    }

    /// Save the state
    pub fn save_state(&self, state: &WatcherState) -> Result<()> {
        FileWriter::write_json(&self.state_path(), state)
    }

    /// Recorded changes; a missing or unreadable file means none
    pub fn load_pending(&self) -> PendingChanges {
        load_or_default(&self.changes_path())
    }

    /// Append a change set to the pending changes file
    pub fn record_changes(&self, changes: &ChangeSet) -> Result<()> {
        let mut pending = self.load_pending();
        let detected = now_iso();
        pending.changes.extend(changes.entries().map(|(kind, file)| PendingChange {
            file: file.to_string(),
            kind,
            detected: detected.clone(),
        }));
        pending.last_updated = Some(now_iso());
        FileWriter::write_json(&self.changes_path(), &pending)
    }

    /// Rehash everything and store it as the current state
    pub fn reindex(&self) -> Result<usize> {
        let state = WatcherState {
            file_hashes: self.tracked_files()?,
            last_check: Some(now_iso()),
        };
        self.save_state(&state)?;
        info!("Reindexed {} files", state.file_hashes.len());
        Ok(state.file_hashes.len())
    }

    /// Compare the tree against `state`; when something changed, record it
    /// and move `state` forward
    pub fn check(&self, state: &mut WatcherState) -> Result<ChangeSet> {
        let current = self.tracked_files()?;
        let changes = detect_changes(&state.file_hashes, &current);
        if !changes.is_empty() {
            self.record_changes(&changes)?;
            state.file_hashes = current;
            state.last_check = Some(now_iso());
            self.save_state(state)?;
        }
        Ok(changes)
    }

    /// Index on first use, otherwise check once
    pub fn check_once(&self) -> Result<WatchEvent> {
        let mut state = self.load_state();
        if state.file_hashes.is_empty() {
            state.file_hashes = self.tracked_files()?;
            self.save_state(&state)?;
            return Ok(WatchEvent::Indexed(state.file_hashes.len()));
        }
        let changes = self.check(&mut state)?;
        Ok(if changes.is_empty() {
            WatchEvent::Unchanged
        } else {
            WatchEvent::Changes(changes)
        })
    }

    /// Poll until Ctrl-C or until the PID file disappears. `on_event` sees
    /// the first-run index and every non-empty change set.
    pub async fn run<F>(&self, mut on_event: F) -> Result<()>
    where
        F: FnMut(&WatchEvent),
    {
        let pid_path = self.pid_path();
        tokio::fs::create_dir_all(&self.sync_dir).await.map_err(|e| {
            LearningHubError::io(format!("Failed to create {}", self.sync_dir.display()), e)
        })?;
        tokio::fs::write(&pid_path, std::process::id().to_string())
            .await
            .map_err(|e| LearningHubError::io(format!("Failed to write {}", pid_path.display()), e))?;

        let mut state = self.load_state();
        if state.file_hashes.is_empty() {
            let watcher = self.clone();
            let indexed = tokio::task::spawn_blocking(move || {
                let hashes = watcher.tracked_files()?;
                let state = WatcherState {
                    file_hashes: hashes,
                    last_check: None,
                };
                watcher.save_state(&state)?;
                Ok::<_, LearningHubError>(state)
            })
            .await;
            match indexed {
                Ok(Ok(indexed)) => {
                    state = indexed;
                    on_event(&WatchEvent::Indexed(state.file_hashes.len()));
                }
                Ok(Err(e)) => {
                    remove_if_present(&pid_path).await?;
                    return Err(e);
                }
                Err(e) => {
                    remove_if_present(&pid_path).await?;
                    return Err(LearningHubError::internal(format!("indexing task failed: {e}")));
                }
            }
        }

        // one subscription for the whole loop so a signal that arrives
        // during a check is still seen afterwards
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        let outcome = loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !pid_path.exists() {
                        info!("PID file removed, stopping watcher");
                        break Ok(());
                    }
                    let (next, result) = self.check_in_background(std::mem::take(&mut state)).await;
                    state = next;
                    match result {
                        Ok(changes) if changes.is_empty() => debug!("No changes"),
                        Ok(changes) => on_event(&WatchEvent::Changes(changes)),
                        Err(e) => warn!("Check failed, retrying next tick: {}", e),
                    }
                }
                _ = &mut ctrl_c => {
                    info!("Watcher stopped");
                    break Ok(());
                }
            }
        };

        remove_if_present(&pid_path).await?;
        outcome
    }

    /// Run [`Watcher::check`] on the blocking pool. The state comes back
    /// even when the check fails.
    async fn check_in_background(&self, state: WatcherState) -> (WatcherState, Result<ChangeSet>) {
        let watcher = self.clone();
        let fallback = state.clone();
        let task = tokio::task::spawn_blocking(move || {
            let mut state = state;
            let result = watcher.check(&mut state);
            (state, result)
        });
        match task.await {
            Ok(done) => done,
            Err(e) => (
                fallback,
                Err(LearningHubError::internal(format!("check task failed: {e}"))),
            ),
        }
    }

    /// Current watcher status
    pub fn status(&self) -> WatcherStatus {
        let state = self.load_state();
        let running_pid = std::fs::read_to_string(self.pid_path())
            .ok()
            .map(|pid| pid.trim().to_string());
        WatcherStatus {
            running_pid,
            last_check: state.last_check,
            tracked_files: state.file_hashes.len(),
            pending: self.load_pending().changes,
        }
    }

    /// Delete the pending changes file. Returns whether it existed.
    pub fn clear_pending(&self) -> Result<bool> {
        remove_file_if_present(&self.changes_path())
    }

    /// Remove the PID file so a running loop exits. Returns the PID that
    /// was recorded, if any.
    pub fn stop(&self) -> Result<Option<String>> {
        let pid_path = self.pid_path();
        let pid = std::fs::read_to_string(&pid_path).ok().map(|p| p.trim().to_string());
        remove_file_if_present(&pid_path)?;
        Ok(pid)
    }
}

/// SHA-256 of a file; `None` when it vanished after being listed, an empty
/// hash when it exists but cannot be read
fn hash_file(path: &Path) -> Option<String> {
    match std::fs::read(path) {
        Ok(bytes) => Some(sha256_hex(&bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("{} disappeared before hashing", path.display());
            None
        }
        Err(e) => {
            warn!("Cannot hash {}: {}", path.display(), e);
            Some(String::new())
        }
    }
}

fn load_or_default<T>(path: &Path) -> T
where
    T: Default + serde::de::DeserializeOwned,
{
    if !path.exists() {
        return T::default();
    }
    FileReader::read_json(path).unwrap_or_else(|e| {
        warn!("Ignoring unreadable {}: {}", path.display(), e);
        T::default()
    })
}

fn remove_file_if_present(path: &Path) -> Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(LearningHubError::io(format!("Failed to remove {}", path.display()), e)),
    }
}

async fn remove_if_present(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(LearningHubError::io(format!("Failed to remove {}", path.display()), e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn map(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn site() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("content/tic/cls5")).unwrap();
        fs::create_dir_all(root.join("sync")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::write(root.join("index.html"), "<html></html>").unwrap();
        fs::write(root.join("content/tic/cls5/lectia1.html"), "<p>1</p>").unwrap();
        fs::write(root.join("content/tic/cls5/notes.txt"), "ignored").unwrap();
        fs::write(root.join("sync/state.json"), "{}").unwrap();
        fs::write(root.join("node_modules/pkg/index.js"), "x").unwrap();
        tmp
    }

    #[test]
    fn test_detect_changes() {
        let old = map(&[("a.html", "1"), ("b.html", "2"), ("c.html", "3")]);
        let new = map(&[("b.html", "2"), ("c.html", "9"), ("d.html", "4"), ("0.css", "5")]);
        let changes = detect_changes(&old, &new);
        assert_eq!(changes.added, vec!["0.css", "d.html"]);
        assert_eq!(changes.modified, vec!["c.html"]);
        assert_eq!(changes.deleted, vec!["a.html"]);
        assert_eq!(changes.total(), 4);
        assert!(detect_changes(&new, &new).is_empty());
    }

    #[test]
    fn test_tracked_files_skips_ignored() {
        let tmp = site();
        let watcher = Watcher::new(tmp.path(), &SyncConfig::default()).unwrap();
        let files = watcher.tracked_files().unwrap();
        let keys: Vec<&str> = files.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["content/tic/cls5/lectia1.html", "index.html"]);
        assert_eq!(files["index.html"], sha256_hex(b"<html></html>"));
    }

    #[test]
    fn test_check_once_indexes_then_records() {
        let tmp = site();
        let watcher = Watcher::new(tmp.path(), &SyncConfig::default()).unwrap();

        assert_eq!(watcher.check_once().unwrap(), WatchEvent::Indexed(2));
        assert_eq!(watcher.check_once().unwrap(), WatchEvent::Unchanged);

        fs::write(tmp.path().join("index.html"), "<html>v2</html>").unwrap();
        fs::write(tmp.path().join("style.css"), "body{}").unwrap();
        let WatchEvent::Changes(changes) = watcher.check_once().unwrap() else {
            panic!("expected changes");
        };
        assert_eq!(changes.added, vec!["style.css"]);
        assert_eq!(changes.modified, vec!["index.html"]);

        let status = watcher.status();
        assert_eq!(status.tracked_files, 3);
        assert!(status.last_check.is_some());
        assert!(status.running_pid.is_none());
        assert_eq!(status.pending.len(), 2);
        assert_eq!(status.pending[0].kind, ChangeKind::Added);
        assert_eq!(status.pending[1].file, "index.html");

        let raw = fs::read_to_string(watcher.changes_path()).unwrap();
        assert!(raw.contains(r#""type": "modified""#));

        assert!(watcher.clear_pending().unwrap());
        assert!(!watcher.clear_pending().unwrap());
        assert!(watcher.status().pending.is_empty());
    }

    #[test]
    fn test_reindex_and_stop() {
        let tmp = site();
        let watcher = Watcher::new(tmp.path(), &SyncConfig::default()).unwrap();
        assert_eq!(watcher.reindex().unwrap(), 2);
        assert!(watcher.load_state().last_check.is_some());

        assert_eq!(watcher.stop().unwrap(), None);
        fs::write(watcher.pid_path(), "4242\n").unwrap();
        assert_eq!(watcher.status().running_pid.as_deref(), Some("4242"));
        assert_eq!(watcher.stop().unwrap().as_deref(), Some("4242"));
        assert!(!watcher.pid_path().exists());
    }

    #[test]
    fn test_corrupt_state_is_ignored() {
        let tmp = site();
        let watcher = Watcher::new(tmp.path(), &SyncConfig::default()).unwrap();
        fs::write(watcher.state_path(), "{broken").unwrap();
        assert_eq!(watcher.load_state(), WatcherState::default());
    }

    #[tokio::test]
    async fn test_run_stops_when_pid_file_removed() {
        let tmp = site();
        let settings = SyncConfig {
            interval_secs: 1,
            ..SyncConfig::default()
        };
        let watcher = Watcher::new(tmp.path(), &settings).unwrap();
        let pid_path = watcher.pid_path();

        let remover = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            tokio::fs::remove_file(pid_path).await.unwrap();
        });

        let mut events = Vec::new();
        tokio::time::timeout(Duration::from_secs(5), watcher.run(|e| events.push(e.clone())))
            .await
            .expect("watcher did not stop")
            .unwrap();
        remover.await.unwrap();

        assert_eq!(events, vec![WatchEvent::Indexed(2)]);
        assert!(!watcher.pid_path().exists());
    }

    #[test]
    fn test_vanished_file_is_not_hashed() {
        let tmp = site();
        assert_eq!(hash_file(&tmp.path().join("gone.html")), None);
        assert_eq!(
            hash_file(&tmp.path().join("index.html")).as_deref(),
            Some(sha256_hex(b"<html></html>").as_str())
        );
    }

    #[tokio::test]
    async fn test_run_survives_a_failed_check() {
        let tmp = site();
        let settings = SyncConfig {
            interval_secs: 1,
            ..SyncConfig::default()
        };
        let watcher = Watcher::new(tmp.path(), &settings).unwrap();
        watcher.reindex().unwrap();

        // a directory where the changes file belongs makes recording fail
        let changes_path = watcher.changes_path();
        fs::create_dir_all(&changes_path).unwrap();
        fs::remove_file(tmp.path().join("content/tic/cls5/lectia1.html")).unwrap();

        let pid_path = watcher.pid_path();
        let helper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            tokio::fs::remove_dir(&changes_path).await.unwrap();
            tokio::time::sleep(Duration::from_millis(1000)).await;
            tokio::fs::remove_file(pid_path).await.unwrap();
        });

        let mut events = Vec::new();
        tokio::time::timeout(Duration::from_secs(10), watcher.run(|e| events.push(e.clone())))
            .await
            .expect("watcher did not stop")
            .unwrap();
        helper.await.unwrap();

        assert_eq!(events.len(), 1, "{events:?}");
        let WatchEvent::Changes(changes) = &events[0] else {
            panic!("expected changes");
        };
        assert_eq!(changes.deleted, vec!["content/tic/cls5/lectia1.html"]);
        assert_eq!(watcher.load_pending().changes.len(), 1);
    }
}
