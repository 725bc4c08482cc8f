use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::release::error::CacheError;
use crate::release::types::Platform;

/// Trait for recording which releases have already been announced
#[cfg_attr(test, automock)]
pub trait SeenStore: Send {
    /// Check whether a release was already announced
    fn has_seen(&self, platform: Platform, project_id: &str, release_id: &str) -> bool;

    /// Record a release as announced. Returns true if it was not recorded before.
    fn mark_seen(&mut self, platform: Platform, project_id: &str, release_id: &str) -> bool;

    /// Whether the in-memory state differs from the last successful save
    fn has_unsaved_changes(&self) -> bool;

    /// Persist the full state
    fn save(&mut self) -> Result<(), CacheError>;
}

/// On-disk layout of the cache file
///
/// ```json
/// {
///   "modtale_seen": {"<project_uuid>": ["v1", "v2"]},
///   "curseforge_seen": {"<project_id>": ["6075247"]}
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSnapshot {
    pub modtale_seen: BTreeMap<String, BTreeSet<String>>,
    pub curseforge_seen: BTreeMap<String, BTreeSet<String>>,
}

impl CacheSnapshot {
    fn platform(&self, platform: Platform) -> &BTreeMap<String, BTreeSet<String>> {
        match platform {
            Platform::Modtale => &self.modtale_seen,
            Platform::CurseForge => &self.curseforge_seen,
        }
    }

    fn platform_mut(&mut self, platform: Platform) -> &mut BTreeMap<String, BTreeSet<String>> {
        match platform {
            Platform::Modtale => &mut self.modtale_seen,
            Platform::CurseForge => &mut self.curseforge_seen,
        }
    }

    /// Number of recorded release ids across all projects
    pub fn len(&self) -> usize {
        self.modtale_seen
            .values()
            .chain(self.curseforge_seen.values())
            .map(BTreeSet::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// JSON file backed cache of announced release ids
///
/// Owned by the single poll loop. Release ids are only ever added; deleting
/// the file is the way to reset it.
pub struct ReleaseCache {
    path: PathBuf,
    snapshot: CacheSnapshot,
    dirty: bool,
}

impl ReleaseCache {
    /// Empty cache that will be written to `path`
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            snapshot: CacheSnapshot::default(),
            dirty: false,
        }
    }

    /// Load the cache from `path`
    ///
    /// A missing file yields an empty cache. An unreadable or corrupt file also
    /// yields an empty cache so the bot keeps running, at the cost of
    /// announcing every known release again.
    pub fn load(path: &Path) -> Self {
        let mut cache = Self::new(path);

        match read_snapshot(path) {
            Ok(Some(snapshot)) => {
                info!(
                    "Loaded {} announced releases from {}",
                    snapshot.len(),
                    path.display()
                );
                cache.snapshot = snapshot;
            }
            Ok(None) => {
                info!("No cache file at {}, starting empty", path.display());
            }
            Err(e) => {
                warn!(
                    "Failed to load cache, starting fresh; all current releases will be announced again: {}",
                    e
                );
            }
        }

        cache
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> &CacheSnapshot {
        &self.snapshot
    }
}

impl SeenStore for ReleaseCache {
    fn has_seen(&self, platform: Platform, project_id: &str, release_id: &str) -> bool {
        self.snapshot
            .platform(platform)
            .get(project_id)
            .is_some_and(|seen| seen.contains(release_id))
    }

    fn mark_seen(&mut self, platform: Platform, project_id: &str, release_id: &str) -> bool {
        let inserted = self
            .snapshot
            .platform_mut(platform)
            .entry(project_id.to_string())
            .or_default()
            .insert(release_id.to_string());

        if inserted {
            self.dirty = true;
        }
        inserted
    }

    fn has_unsaved_changes(&self) -> bool {
        self.dirty
    }

    fn save(&mut self) -> Result<(), CacheError> {
        write_snapshot_atomic(&self.path, &self.snapshot)?;
        self.dirty = false;
        debug!(
            "Saved {} announced releases to {}",
            self.snapshot.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// Read a snapshot, returning `None` when the file does not exist
pub fn read_snapshot(path: &Path) -> Result<Option<CacheSnapshot>, CacheError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(CacheError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|source| CacheError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

/// Temp file written next to the target before being renamed over it
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "cache.json".into());
    name.push(format!(".{}.tmp", std::process::id()));
    path.with_file_name(name)
}

/// Write the snapshot to a temp file, fsync it and rename it over `path`
///
/// The target is always either the previous complete snapshot or the new one.
pub fn write_snapshot_atomic(path: &Path, snapshot: &CacheSnapshot) -> Result<(), CacheError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| CacheError::Io { path, source }
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }

    let serialized = serde_json::to_string_pretty(snapshot).map_err(CacheError::Serialize)?;
    let temp = temp_path(path);

    let written = File::create(&temp)
        .and_then(|mut file| {
            file.write_all(serialized.as_bytes())?;
            file.write_all(b"\n")?;
            file.sync_all()
        })
        .and_then(|_| fs::rename(&temp, path));

    if let Err(e) = written {
        let _ = fs::remove_file(&temp);
        return Err(io_err(path)(e));
    }

    Ok(())
}
