//! Append-only reaction log.
//!
//! Every entry is framed as `len (u32 LE) | MessagePack body | crc32 (u32 LE)`
//! after a 5-byte header (magic + version). A whole reaction state fits in
//! one frame, so a reader either sees the complete state or nothing.

use crate::error::{ReactionError, Result};
use crate::types::{Channel, ReactionState, SubjectId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Magic bytes for the reaction log.
const LOG_MAGIC: &[u8; 4] = b"RXL\0";

/// Current log format version.
const LOG_VERSION: u8 = 1;

const HEADER_LEN: u64 = 5;

/// Frames larger than this are refused on append and treated as corruption
/// on replay.
pub const MAX_ENTRY_LEN: usize = 64 * 1024 * 1024;

/// A single log entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LogEntry {
    /// A subject was registered.
    Subject { subject: SubjectId },

    /// Full state of one channel on a subject.
    State {
        subject: SubjectId,
        channel: Channel,
        state: ReactionState,
    },
}

/// Outcome of a log rewrite.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompactionStats {
    pub entries_before: u64,
    pub entries_after: u64,
    pub bytes_before: u64,
    pub bytes_after: u64,
}

/// Writer side of the log plus the byte offset of its last complete frame.
struct LogWriter {
    file: File,
    end: u64,
}

/// Append-only, checksummed log of reaction entries.
pub struct ReactionLog {
    path: PathBuf,
    writer: Mutex<LogWriter>,
    entries: Mutex<u64>,
    max_entry_len: usize,
}

impl ReactionLog {
    /// Create a new, empty log, replacing any file at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = Self::write_fresh(&path)?;

        Ok(Self {
            path,
            writer: Mutex::new(LogWriter {
                file,
                end: HEADER_LEN,
            }),
            entries: Mutex::new(0),
            max_entry_len: MAX_ENTRY_LEN,
        })
    }

    /// Lower the largest entry `append` accepts. Values above
    /// [`MAX_ENTRY_LEN`] are clamped to it.
    pub fn with_max_entry_len(mut self, max: usize) -> Self {
        self.max_entry_len = max.min(MAX_ENTRY_LEN);
        self
    }

    /// Open an existing log and replay its entries.
    ///
    /// A torn frame at the tail (from a crash mid-append) is cut off. A bad
    /// frame with any valid frame after it is reported as corruption, since
    /// an interrupted append is always the last one.
    pub fn open(path: impl AsRef<Path>) -> Result<(Self, Vec<LogEntry>)> {
        let path = path.as_ref().to_path_buf();
        let data = fs::read(&path)?;

        if data.len() < HEADER_LEN as usize || &data[0..4] != LOG_MAGIC {
            return Err(ReactionError::InvalidFormat("Invalid reaction log magic".into()));
        }
        if data[4] != LOG_VERSION {
            return Err(ReactionError::InvalidFormat(format!(
                "Unsupported reaction log version: {}",
                data[4]
            )));
        }

        let mut entries = Vec::new();
        let mut offset = HEADER_LEN as usize;

        while offset < data.len() {
            match Self::decode_frame(&data[offset..]) {
                Ok((entry, frame_len)) => {
                    entries.push(entry);
                    offset += frame_len;
                }
                Err(FrameError::Decode(msg)) => {
                    return Err(ReactionError::Corruption(format!(
                        "Reaction log entry at offset {}: {}",
                        offset, msg
                    )));
                }
                Err(err) if Self::has_frame_after(&data, offset + 1) => {
                    return Err(ReactionError::Corruption(format!(
                        "Reaction log entry at offset {}: {}, followed by valid entries",
                        offset, err
                    )));
                }
                Err(_) => break,
            }
        }

        let file = OpenOptions::new().append(true).open(&path)?;
        let end = offset as u64;

        if end < data.len() as u64 {
            warn!(
                path = %path.display(),
                valid = end,
                total = data.len(),
                "truncating torn tail of reaction log"
            );
            file.set_len(end)?;
            file.sync_all()?;
        }

        let log = Self {
            path,
            writer: Mutex::new(LogWriter { file, end }),
            entries: Mutex::new(entries.len() as u64),
            max_entry_len: MAX_ENTRY_LEN,
        };

        Ok((log, entries))
    }

    /// Append one entry. With `sync` the frame is on disk when this returns.
    ///
    /// If the write fails part-way, the file is cut back to the previous
    /// frame boundary and a persistence error is returned.
    pub fn append(&self, entry: &LogEntry, sync: bool) -> Result<()> {
        self.append_then(entry, sync, || ())
    }

    /// Append one entry, then run `committed` before the next append can
    /// start. Callers publish the entry from `committed` so their view
    /// changes in log order.
    pub fn append_then<F>(&self, entry: &LogEntry, sync: bool, committed: F) -> Result<()>
    where
        F: FnOnce(),
    {
        let frame = Self::encode_frame(entry, self.max_entry_len)?;

        let mut writer = self.writer.lock();
        let end = writer.end;

        if let Err(e) = Self::write_frame(&mut writer.file, &frame, sync) {
            warn!(path = %self.path.display(), error = %e, "reaction log append failed");
            if let Err(trunc) = writer.file.set_len(end) {
                warn!(
                    path = %self.path.display(),
                    error = %trunc,
                    "could not roll back torn append"
                );
            }
            return Err(ReactionError::Persistence(format!(
                "append to {}: {}",
                self.path.display(),
                e
            )));
        }

        writer.end = end + frame.len() as u64;
        *self.entries.lock() += 1;
        committed();

        Ok(())
    }

    /// Replace the log's contents with the entries returned by `collect`.
    ///
    /// `collect` runs with appends blocked, so nothing can land in the old
    /// log after it takes its snapshot. The new log is written to a
    /// temporary file and renamed over the old one, so a crash leaves either
    /// the old or the new log intact.
    pub fn rewrite<F>(&self, collect: F) -> Result<CompactionStats>
    where
        F: FnOnce() -> Vec<LogEntry>,
    {
        let mut writer = self.writer.lock();
        let entries_before = *self.entries.lock();
        let bytes_before = writer.end;

        let tmp_path = self.path.with_extension("log.tmp");
        let mut tmp = Self::write_fresh(&tmp_path)?;
        let mut end = HEADER_LEN;
        let mut count = 0u64;

        for entry in collect() {
            let frame = Self::encode_frame(&entry, MAX_ENTRY_LEN)?;
            tmp.write_all(&frame)?;
            end += frame.len() as u64;
            count += 1;
        }
        tmp.sync_all()?;
        drop(tmp);

        // Opened before the rename: once the new log is in place the writer
        // must already point at it.
        let file = OpenOptions::new().append(true).open(&tmp_path)?;
        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        *writer = LogWriter { file, end };
        *self.entries.lock() = count;

        Ok(CompactionStats {
            entries_before,
            entries_after: count,
            bytes_before,
            bytes_after: end,
        })
    }

    /// Number of entries currently in the log.
    pub fn entry_count(&self) -> u64 {
        *self.entries.lock()
    }

    /// Size of the log in bytes.
    pub fn len_bytes(&self) -> u64 {
        self.writer.lock().end
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_fresh(path: &Path) -> Result<File> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        file.write_all(LOG_MAGIC)?;
        file.write_all(&[LOG_VERSION])?;
        file.sync_all()?;

        Ok(file)
    }

    fn write_frame(file: &mut File, frame: &[u8], sync: bool) -> std::io::Result<()> {
        file.write_all(frame)?;
        if sync {
            file.sync_data()?;
        }
        Ok(())
    }

    fn encode_frame(entry: &LogEntry, max_len: usize) -> Result<Vec<u8>> {
        let encoded = rmp_serde::to_vec(entry)?;
        if encoded.len() > max_len {
            return Err(ReactionError::Persistence(format!(
                "log entry of {} bytes exceeds the {} byte limit",
                encoded.len(),
                max_len
            )));
        }

        let mut frame = Vec::with_capacity(encoded.len() + 8);
        frame.extend_from_slice(&(encoded.len() as u32).to_le_bytes());
        frame.extend_from_slice(&encoded);
        frame.extend_from_slice(&crc32fast::hash(&encoded).to_le_bytes());

        Ok(frame)
    }

    fn decode_frame(data: &[u8]) -> std::result::Result<(LogEntry, usize), FrameError> {
        if data.len() < 4 {
            return Err(FrameError::Truncated);
        }

        let len = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
        if len > MAX_ENTRY_LEN {
            return Err(FrameError::TooLarge(len));
        }

        let frame_len = 4 + len + 4;
        if data.len() < frame_len {
            return Err(FrameError::Truncated);
        }

        let body = &data[4..4 + len];
        let stored = u32::from_le_bytes([
            data[4 + len],
            data[5 + len],
            data[6 + len],
            data[7 + len],
        ]);
        if crc32fast::hash(body) != stored {
            return Err(FrameError::Checksum);
        }

        let entry: LogEntry =
            rmp_serde::from_slice(body).map_err(|e| FrameError::Decode(e.to_string()))?;

        Ok((entry, frame_len))
    }

    /// Whether a complete, checksummed entry starts anywhere at or after
    /// `from`.
    fn has_frame_after(data: &[u8], from: usize) -> bool {
        (from..data.len()).any(|start| Self::decode_frame(&data[start..]).is_ok())
    }
}

enum FrameError {
    /// Not enough bytes for a full frame.
    Truncated,
    Checksum,
    TooLarge(usize),
    /// Checksum matched but the body isn't a log entry.
    Decode(String),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Truncated => write!(f, "frame runs past end of log"),
            FrameError::Checksum => write!(f, "checksum mismatch"),
            FrameError::TooLarge(len) => write!(f, "entry too large ({} bytes)", len),
            FrameError::Decode(msg) => write!(f, "{}", msg),
        }
    }
}
