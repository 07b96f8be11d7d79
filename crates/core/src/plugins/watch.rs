//! Watched-resource polling.
//!
//! A [`ResourceWatcher`] resolves a plugin's watch patterns through a
//! [`ResourceSource`] and reports resources that appeared or whose
//! modification time moved forward since the previous poll.

use chrono::{DateTime, Utc};
use globset::{GlobBuilder, GlobMatcher};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;
use walkdir::WalkDir;

/// Where watched resources live and how their timestamps are read
pub trait ResourceSource: Send + Sync + std::fmt::Debug {
    /// All resources matching `pattern`
    fn resolve(&self, pattern: &str) -> io::Result<Vec<PathBuf>>;

    /// Last modification time; `None` when the resource no longer exists
    fn last_modified(&self, path: &Path) -> io::Result<Option<DateTime<Utc>>>;

    /// Mark the resource as modified now, returning the new timestamp
    fn touch(&self, path: &Path) -> io::Result<DateTime<Utc>>;
}

/// Strip the `file:` scheme and a leading `./` from a watch pattern
pub fn normalize_pattern(pattern: &str) -> &str {
    let pattern = pattern.trim();
    let pattern = pattern.strip_prefix("file:").unwrap_or(pattern);
    pattern.strip_prefix("./").unwrap_or(pattern)
}

fn compile(pattern: &str) -> io::Result<GlobMatcher> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
}

fn is_glob_component(component: &Component<'_>) -> bool {
    component
        .as_os_str()
        .to_string_lossy()
        .contains(['*', '?', '[', '{'])
}

/// Directory to start walking from: the pattern up to its first wildcard component
fn literal_prefix(pattern: &Path) -> PathBuf {
    pattern
        .components()
        .take_while(|component| !is_glob_component(component))
        .collect()
}

/// Resolves patterns against a list of base directories on disk
#[derive(Debug, Clone)]
pub struct FileSystemSource {
    base_locations: Vec<PathBuf>,
}

impl FileSystemSource {
    pub fn new(base_locations: Vec<PathBuf>) -> Self {
        Self { base_locations }
    }

    pub fn base_locations(&self) -> &[PathBuf] {
        &self.base_locations
    }
}

impl ResourceSource for FileSystemSource {
    fn resolve(&self, pattern: &str) -> io::Result<Vec<PathBuf>> {
        let relative = Path::new(normalize_pattern(pattern));
        let bases = if relative.is_absolute() {
            vec![PathBuf::new()]
        } else {
            self.base_locations.clone()
        };

        let mut seen = HashSet::new();
        let mut found = Vec::new();

        for base in bases {
            let full = base.join(relative);
            let root = literal_prefix(&full);

            if root == full {
                if full.is_file() && seen.insert(full.clone()) {
                    found.push(full);
                }
                continue;
            }
            if !root.is_dir() {
                continue;
            }

            let matcher = compile(&full.to_string_lossy())?;
            for entry in WalkDir::new(&root)
                .follow_links(true)
                .sort_by_file_name()
                .into_iter()
                .filter_map(Result::ok)
            {
                if entry.file_type().is_file()
                    && matcher.is_match(entry.path())
                    && seen.insert(entry.path().to_path_buf())
                {
                    found.push(entry.into_path());
                }
            }
        }

        Ok(found)
    }

    fn last_modified(&self, path: &Path) -> io::Result<Option<DateTime<Utc>>> {
        match fs::metadata(path) {
            Ok(metadata) => Ok(Some(DateTime::<Utc>::from(metadata.modified()?))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn touch(&self, path: &Path) -> io::Result<DateTime<Utc>> {
        let now = SystemTime::now();
        fs::OpenOptions::new()
            .write(true)
            .open(path)?
            .set_modified(now)?;
        Ok(self.last_modified(path)?.unwrap_or_else(|| DateTime::<Utc>::from(now)))
    }
}

/// In-memory resource tree for tests and embedded hosts
#[derive(Debug, Default)]
pub struct MemoryResourceSource {
    resources: Mutex<BTreeMap<PathBuf, DateTime<Utc>>>,
    failing: Mutex<HashSet<PathBuf>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryResourceSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource or move its modification time
    pub fn set_modified(&self, path: impl Into<PathBuf>, modified: DateTime<Utc>) {
        lock(&self.resources).insert(path.into(), modified);
    }

    pub fn remove(&self, path: &Path) {
        lock(&self.resources).remove(path);
    }

    /// Make timestamp reads for `path` fail until cleared
    pub fn set_failing(&self, path: impl Into<PathBuf>, failing: bool) {
        let path = path.into();
        let mut set = lock(&self.failing);
        if failing {
            set.insert(path);
        } else {
            set.remove(&path);
        }
    }
}

impl ResourceSource for MemoryResourceSource {
    fn resolve(&self, pattern: &str) -> io::Result<Vec<PathBuf>> {
        let matcher = compile(normalize_pattern(pattern))?;
        Ok(lock(&self.resources)
            .keys()
            .filter(|path| matcher.is_match(path))
            .cloned()
            .collect())
    }

    fn last_modified(&self, path: &Path) -> io::Result<Option<DateTime<Utc>>> {
        if lock(&self.failing).contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("cannot read {}", path.display()),
            ));
        }
        Ok(lock(&self.resources).get(path).copied())
    }

    fn touch(&self, path: &Path) -> io::Result<DateTime<Utc>> {
        let mut resources = lock(&self.resources);
        let previous = resources.get(path).copied().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("{} not found", path.display()))
        })?;
        let now = Utc::now().max(previous + chrono::Duration::milliseconds(1));
        resources.insert(path.to_path_buf(), now);
        Ok(now)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Unmodified,
    /// Change detected, listener not yet notified
    PendingNotify,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WatchedResource {
    pub path: PathBuf,
    pub last_modified: Option<DateTime<Utc>>,
    /// The timestamp has never been read successfully; the first good read
    /// becomes the baseline and is not reported
    pub unread: bool,
    pub state: WatchState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceChangeKind {
    Added,
    Modified,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceChange {
    pub path: PathBuf,
    pub kind: ResourceChangeKind,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Tracks the resources behind a set of watch patterns
#[derive(Debug)]
pub struct ResourceWatcher {
    patterns: Vec<String>,
    pattern_counts: Vec<usize>,
    resources: Vec<WatchedResource>,
    source: Arc<dyn ResourceSource>,
}

impl ResourceWatcher {
    pub fn new(patterns: Vec<String>, source: Arc<dyn ResourceSource>) -> Self {
        let mut watcher = Self {
            pattern_counts: vec![0; patterns.len()],
            patterns,
            resources: Vec::new(),
            source,
        };

        for index in 0..watcher.patterns.len() {
            let resolved = watcher.resolve(index);
            watcher.pattern_counts[index] = resolved.len();
            for path in resolved {
                if !watcher.is_watching(&path) {
                    let (last_modified, unread) = watcher.read_timestamp(&path);
                    watcher.resources.push(WatchedResource {
                        path,
                        last_modified,
                        unread,
                        state: WatchState::Unmodified,
                    });
                }
            }
        }

        tracing::debug!(
            "Watching {} resources for patterns {:?}",
            watcher.resources.len(),
            watcher.patterns
        );
        watcher
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn resources(&self) -> &[WatchedResource] {
        &self.resources
    }

    pub fn is_watching(&self, path: &Path) -> bool {
        self.resources.iter().any(|resource| resource.path == path)
    }

    /// Report resources added since the last poll, then resources whose
    /// timestamp strictly increased. Reported resources become pending.
    pub fn detect_changes(&mut self) -> Vec<ResourceChange> {
        let mut changes = self.detect_new_resources();

        for resource in &mut self.resources {
            if resource.state == WatchState::PendingNotify {
                continue;
            }
            let current = match self.source.last_modified(&resource.path) {
                Ok(Some(current)) => current,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(
                        "Unable to read modification time of {}: {}",
                        resource.path.display(),
                        e
                    );
                    continue;
                }
            };

            if resource.unread {
                resource.unread = false;
                resource.last_modified = Some(current);
                continue;
            }
            if resource.last_modified.map_or(true, |previous| current > previous) {
                resource.last_modified = Some(current);
                resource.state = WatchState::PendingNotify;
                changes.push(ResourceChange {
                    path: resource.path.clone(),
                    kind: ResourceChangeKind::Modified,
                    last_modified: Some(current),
                });
            }
        }

        changes
    }

    fn detect_new_resources(&mut self) -> Vec<ResourceChange> {
        let mut changes = Vec::new();

        for index in 0..self.patterns.len() {
            let resolved = self.resolve(index);
            let previous_count = self.pattern_counts[index];
            self.pattern_counts[index] = resolved.len();
            if resolved.len() <= previous_count {
                continue;
            }

            for path in resolved {
                if self.is_watching(&path) {
                    continue;
                }
                let (last_modified, unread) = self.read_timestamp(&path);
                tracing::info!("New watched resource found: {}", path.display());
                changes.push(ResourceChange {
                    path: path.clone(),
                    kind: ResourceChangeKind::Added,
                    last_modified,
                });
                self.resources.push(WatchedResource {
                    path,
                    last_modified,
                    unread,
                    state: WatchState::PendingNotify,
                });
            }
        }

        changes
    }

    /// Listener has seen the change for `path`
    pub fn acknowledge(&mut self, path: &Path) {
        if let Some(resource) = self.resources.iter_mut().find(|r| r.path == path) {
            resource.state = WatchState::Unmodified;
        }
    }

    /// Mark every watched resource as modified now, returning all watched
    /// paths. Stored timestamps follow the touch so the next poll does not
    /// report the same resources again. A failed touch is logged and the
    /// path is still returned.
    pub fn touch_all(&mut self) -> Vec<PathBuf> {
        let mut touched = Vec::with_capacity(self.resources.len());
        for resource in &mut self.resources {
            match self.source.touch(&resource.path) {
                Ok(modified) => {
                    resource.last_modified = Some(modified);
                    resource.unread = false;
                }
                Err(e) => tracing::warn!("Unable to touch {}: {}", resource.path.display(), e),
            }
            touched.push(resource.path.clone());
        }
        touched
    }

    fn resolve(&self, index: usize) -> Vec<PathBuf> {
        let pattern = &self.patterns[index];
        match self.source.resolve(pattern) {
            Ok(paths) => paths,
            Err(e) => {
                tracing::warn!("Unable to resolve watched resource pattern '{}': {}", pattern, e);
                Vec::new()
            }
        }
    }

    /// Timestamp of `path` and whether the read failed
    fn read_timestamp(&self, path: &Path) -> (Option<DateTime<Utc>>, bool) {
        match self.source.last_modified(path) {
            Ok(modified) => (modified, false),
            Err(e) => {
                tracing::warn!("Unable to read modification time of {}: {}", path.display(), e);
                (None, true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap()
    }

    fn source() -> Arc<MemoryResourceSource> {
        let source = Arc::new(MemoryResourceSource::new());
        source.set_modified("conf/UrlMappings.yml", at(0));
        source.set_modified("conf/Audit.yml", at(0));
        source.set_modified("src/Book.rs", at(0));
        source
    }

    #[test]
    fn test_normalize_pattern() {
        assert_eq!(normalize_pattern("file:./conf/*.yml"), "conf/*.yml");
        assert_eq!(normalize_pattern("./conf/*.yml"), "conf/*.yml");
        assert_eq!(normalize_pattern("/abs/conf/*.yml"), "/abs/conf/*.yml");
    }

    #[test]
    fn test_literal_prefix() {
        assert_eq!(literal_prefix(Path::new("./conf/**/*.yml")), PathBuf::from("./conf"));
        assert_eq!(literal_prefix(Path::new("conf/a.yml")), PathBuf::from("conf/a.yml"));
    }

    #[test]
    fn test_initial_resolution() {
        let watcher = ResourceWatcher::new(vec!["./conf/*.yml".to_string()], source());
        assert_eq!(watcher.resources().len(), 2);
        assert!(watcher.is_watching(Path::new("conf/Audit.yml")));
        assert!(!watcher.is_watching(Path::new("src/Book.rs")));
    }

    #[test]
    fn test_change_fires_once_per_timestamp_increase() {
        let source = source();
        let mut watcher = ResourceWatcher::new(vec!["conf/*.yml".to_string()], source.clone());

        assert!(watcher.detect_changes().is_empty());

        source.set_modified("conf/Audit.yml", at(10));
        let changes = watcher.detect_changes();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ResourceChangeKind::Modified);
        assert_eq!(changes[0].last_modified, Some(at(10)));
        watcher.acknowledge(Path::new("conf/Audit.yml"));

        assert!(watcher.detect_changes().is_empty());

        source.set_modified("conf/Audit.yml", at(5));
        assert!(watcher.detect_changes().is_empty());
    }

    #[test]
    fn test_new_resource_is_reported_as_added() {
        let source = source();
        let mut watcher = ResourceWatcher::new(vec!["conf/*.yml".to_string()], source.clone());

        source.set_modified("conf/Security.yml", at(3));
        let changes = watcher.detect_changes();

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ResourceChangeKind::Added);
        assert_eq!(changes[0].path, PathBuf::from("conf/Security.yml"));
        assert_eq!(watcher.resources().len(), 3);
    }

    #[test]
    fn test_read_failure_counts_as_unchanged() {
        let source = source();
        let mut watcher = ResourceWatcher::new(vec!["conf/*.yml".to_string()], source.clone());

        source.set_modified("conf/Audit.yml", at(10));
        source.set_failing("conf/Audit.yml", true);
        assert!(watcher.detect_changes().is_empty());

        source.set_failing("conf/Audit.yml", false);
        assert_eq!(watcher.detect_changes().len(), 1);
    }

    #[test]
    fn test_failed_first_read_sets_baseline_silently() {
        let source = source();
        source.set_failing("conf/Audit.yml", true);
        let mut watcher = ResourceWatcher::new(vec!["conf/*.yml".to_string()], source.clone());
        assert!(watcher.resources().iter().any(|r| r.unread));

        source.set_failing("conf/Audit.yml", false);
        assert!(watcher.detect_changes().is_empty());
        assert!(watcher.detect_changes().is_empty());

        source.set_modified("conf/Audit.yml", at(10));
        let changes = watcher.detect_changes();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ResourceChangeKind::Modified);
    }

    #[test]
    fn test_touch_all_returns_paths_that_failed_to_touch() {
        let source = source();
        let mut watcher = ResourceWatcher::new(vec!["conf/*.yml".to_string()], source.clone());

        source.remove(Path::new("conf/Audit.yml"));
        let touched = watcher.touch_all();
        assert_eq!(touched.len(), 2);
        assert!(touched.contains(&PathBuf::from("conf/Audit.yml")));
    }

    #[test]
    fn test_removed_resource_is_skipped() {
        let source = source();
        let mut watcher = ResourceWatcher::new(vec!["conf/*.yml".to_string()], source.clone());

        source.remove(Path::new("conf/Audit.yml"));
        assert!(watcher.detect_changes().is_empty());
    }

    #[test]
    fn test_touch_all_does_not_report_again() {
        let source = source();
        let mut watcher = ResourceWatcher::new(vec!["conf/*.yml".to_string()], source.clone());

        let touched = watcher.touch_all();
        assert_eq!(touched.len(), 2);
        assert!(watcher.detect_changes().is_empty());
    }
}
