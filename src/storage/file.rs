//! File-backed storage adapter.

use super::log::{CompactionStats, LogEntry, ReactionLog};
use super::{check_consistent, StorageAdapter};
use crate::error::{ReactionError, Result};
use crate::types::{Channel, ReactionState, SubjectId};
use fs2::FileExt;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Magic bytes for the storage manifest.
const STORAGE_MAGIC: &[u8; 4] = b"RXN\0";

/// Current storage format version.
const STORAGE_VERSION: u8 = 1;

const LOG_FILE: &str = "reactions.log";

/// File storage configuration.
#[derive(Clone, Debug)]
pub struct FileStorageConfig {
    /// Directory holding the manifest, lock and log.
    pub path: PathBuf,

    /// Whether to create the storage if it doesn't exist.
    pub create_if_missing: bool,

    /// fsync every append before acknowledging it.
    pub sync_writes: bool,
}

impl Default for FileStorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./reactions"),
            create_if_missing: true,
            sync_writes: true,
        }
    }
}

/// Durable storage: every save appends the full channel state to a
/// checksummed log, and the latest state per channel is kept in memory.
///
/// Only one process can hold a storage directory open at a time.
pub struct FileStorage {
    config: FileStorageConfig,

    /// Lock file for exclusive access.
    _lock_file: File,

    log: ReactionLog,

    /// Latest state per subject and channel, rebuilt from the log on open.
    index: RwLock<HashMap<SubjectId, HashMap<Channel, ReactionState>>>,
}

impl FileStorage {
    /// Open existing storage or create a new one.
    pub fn open_or_create(config: FileStorageConfig) -> Result<Self> {
        if config.path.join("MANIFEST").exists() {
            Self::open(config)
        } else if config.create_if_missing {
            Self::create(config)
        } else {
            Err(ReactionError::NotInitialized)
        }
    }

    /// Create new, empty storage.
    pub fn create(config: FileStorageConfig) -> Result<Self> {
        fs::create_dir_all(&config.path)?;
        Self::write_manifest(&config.path)?;

        let lock_file = Self::acquire_lock(&config.path)?;
        let log = ReactionLog::create(config.path.join(LOG_FILE))?;

        info!(path = %config.path.display(), "created reaction storage");

        Ok(Self {
            config,
            _lock_file: lock_file,
            log,
            index: RwLock::new(HashMap::new()),
        })
    }

    /// Open existing storage and replay its log.
    pub fn open(config: FileStorageConfig) -> Result<Self> {
        Self::verify_manifest(&config.path)?;

        let lock_file = Self::acquire_lock(&config.path)?;
        let (log, entries) = ReactionLog::open(config.path.join(LOG_FILE))?;

        let mut index: HashMap<SubjectId, HashMap<Channel, ReactionState>> = HashMap::new();
        for entry in entries {
            match entry {
                LogEntry::Subject { subject } => {
                    index.entry(subject).or_default();
                }
                LogEntry::State {
                    subject,
                    channel,
                    state,
                } => {
                    if !state.is_consistent() {
                        return Err(ReactionError::Corruption(format!(
                            "inconsistent state for {}/{} in log",
                            subject, channel
                        )));
                    }
                    index.entry(subject).or_default().insert(channel, state);
                }
            }
        }

        info!(
            path = %config.path.display(),
            subjects = index.len(),
            entries = log.entry_count(),
            "opened reaction storage"
        );

        Ok(Self {
            config,
            _lock_file: lock_file,
            log,
            index: RwLock::new(index),
        })
    }

    /// Rewrite the log so it holds one entry per subject and channel.
    pub fn compact(&self) -> Result<CompactionStats> {
        // The snapshot is taken with appends blocked, so no save can land
        // in the old log only.
        let stats = self.log.rewrite(|| {
            let index = self.index.read();
            let mut entries = Vec::new();
            for (subject, channels) in index.iter() {
                entries.push(LogEntry::Subject {
                    subject: subject.clone(),
                });
                for (channel, state) in channels {
                    entries.push(LogEntry::State {
                        subject: subject.clone(),
                        channel: channel.clone(),
                        state: state.clone(),
                    });
                }
            }
            entries
        })?;

        info!(?stats, "compacted reaction log");

        Ok(stats)
    }

    /// Number of entries in the log, including superseded ones.
    pub fn log_entries(&self) -> u64 {
        self.log.entry_count()
    }

    /// Get the storage path.
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    // --- Private Helpers ---

    fn write_manifest(path: &Path) -> Result<()> {
        let mut file = File::create(path.join("MANIFEST"))?;

        file.write_all(STORAGE_MAGIC)?;
        file.write_all(&[STORAGE_VERSION])?;
        file.sync_all()?;

        Ok(())
    }

    fn verify_manifest(path: &Path) -> Result<()> {
        let mut file = File::open(path.join("MANIFEST"))?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != STORAGE_MAGIC {
            return Err(ReactionError::InvalidFormat("Invalid storage magic".into()));
        }

        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        if version[0] != STORAGE_VERSION {
            return Err(ReactionError::InvalidFormat(format!(
                "Unsupported storage version: {}",
                version[0]
            )));
        }

        Ok(())
    }

    fn acquire_lock(path: &Path) -> Result<File> {
        let lock_file = File::create(path.join("LOCK"))?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| ReactionError::Locked)?;

        Ok(lock_file)
    }
}

impl StorageAdapter for FileStorage {
    fn load(&self, subject: &SubjectId, channel: &Channel) -> Result<ReactionState> {
        let index = self.index.read();
        let channels = index
            .get(subject)
            .ok_or_else(|| ReactionError::NotFound(subject.clone()))?;

        Ok(channels.get(channel).cloned().unwrap_or_default())
    }

    fn save(&self, subject: &SubjectId, channel: &Channel, state: &ReactionState) -> Result<()> {
        check_consistent(subject, channel, state)?;

        // Subjects are never unregistered, so the check stays valid while
        // the append runs without the index lock.
        if !self.index.read().contains_key(subject) {
            return Err(ReactionError::NotFound(subject.clone()));
        }

        let entry = LogEntry::State {
            subject: subject.clone(),
            channel: channel.clone(),
            state: state.clone(),
        };
        self.log.append_then(&entry, self.config.sync_writes, || {
            if let Some(channels) = self.index.write().get_mut(subject) {
                channels.insert(channel.clone(), state.clone());
            }
        })?;

        debug!(%subject, %channel, count = state.count(), "saved reaction state");

        Ok(())
    }

    fn register_subject(&self, subject: &SubjectId) -> Result<()> {
        if self.index.read().contains_key(subject) {
            return Ok(());
        }

        let entry = LogEntry::Subject {
            subject: subject.clone(),
        };
        self.log.append_then(&entry, self.config.sync_writes, || {
            self.index.write().entry(subject.clone()).or_default();
        })?;

        Ok(())
    }

    fn contains_subject(&self, subject: &SubjectId) -> Result<bool> {
        Ok(self.index.read().contains_key(subject))
    }
}
