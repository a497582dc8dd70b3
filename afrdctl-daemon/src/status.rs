//! Read side of the daemon's status region.
//!
//! The daemon rewrites the region in place with no lock. The channel compares
//! the live leading stamp against the last generation it decoded, copies the
//! record once, and validates that private copy (see [`crate::layout`]).
//! Torn or half-written generations are skipped silently; the next poll
//! picks up the finished one.

use std::fs::File;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use afrdctl_core::FailureDetector;

use crate::layout::{
    decode_record, read_u16, read_u32, StatusSnapshot, MIN_RECORD_LEN, SIZE, STAMP,
};

/// Name the status detector reports under.
pub const STATUS_OPERATION: &str = "daemon status";

/// Read-only view of the status region plus the last decoded snapshot.
#[derive(Debug)]
pub struct StatusChannel {
    path: PathBuf,
    map: Option<Mmap>,
    last_stamp: Option<u32>,
    snapshot: Option<StatusSnapshot>,
    failures: FailureDetector,
}

impl StatusChannel {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            map: None,
            last_stamp: None,
            snapshot: None,
            failures: FailureDetector::new(STATUS_OPERATION),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.map.is_some()
    }

    /// Length of the current mapping, 0 when closed.
    pub fn mapped_len(&self) -> usize {
        self.map.as_ref().map_or(0, |map| map.len())
    }

    /// Latest consistent snapshot decoded since the channel was opened.
    pub fn snapshot(&self) -> Option<&StatusSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn failures(&self) -> &FailureDetector {
        &self.failures
    }

    pub fn failures_mut(&mut self) -> &mut FailureDetector {
        &mut self.failures
    }

    /// (Re)map the region. Refuses while the failure detector has given up.
    pub fn open(&mut self) -> bool {
        if self.failures.give_up() {
            return false;
        }

        self.close();
        self.snapshot = None;

        match map_region(&self.path) {
            Ok(map) => {
                tracing::debug!(path = %self.path.display(), len = map.len(), "status region mapped");
                self.map = Some(map);
                self.failures.success();
                true
            }
            Err(err) => {
                self.note_open_failure(&err);
                false
            }
        }
    }

    fn note_open_failure(&mut self, err: &io::Error) {
        if err.kind() == ErrorKind::PermissionDenied {
            tracing::error!(
                path = %self.path.display(),
                error = %err,
                "access to status region denied, giving up"
            );
            self.failures.fatal();
        } else {
            tracing::warn!(path = %self.path.display(), error = %err, "cannot open status region");
            self.failures.failure();
        }
    }

    /// Unmap the region; the next successful refresh is always treated as new.
    pub fn close(&mut self) {
        self.last_stamp = None;
        self.map = None;
    }

    /// Pull a new generation from the region.
    ///
    /// Returns `true` only when a new, consistent snapshot was decoded. A
    /// declared size that disagrees with the mapping closes the channel so
    /// the caller re-opens it on its next poll.
    pub fn refresh(&mut self) -> bool {
        if self.failures.give_up() {
            return false;
        }

        let copy = {
            let Some(live) = self.map.as_deref() else {
                return false;
            };
            if live.len() < MIN_RECORD_LEN {
                None
            } else {
                let stamp = read_u32(live, STAMP);
                if self.last_stamp == Some(stamp) {
                    return false;
                }
                let declared = usize::from(read_u16(live, SIZE));
                // One copy; the daemon may be rewriting `live` right now.
                (declared == live.len()).then(|| live.to_vec())
            }
        };

        let Some(copy) = copy else {
            tracing::debug!(
                path = %self.path.display(),
                "status region size changed, closing channel"
            );
            self.close();
            return false;
        };

        match decode_record(&copy) {
            Ok(snapshot) => {
                self.last_stamp = Some(snapshot.change_stamp);
                self.snapshot = Some(snapshot);
                true
            }
            Err(fault) => {
                tracing::trace!(%fault, "skipping inconsistent status generation");
                false
            }
        }
    }
}

fn map_region(path: &Path) -> io::Result<Mmap> {
    let file = File::open(path)?;
    let len = file.metadata()?.len();
    if len < MIN_RECORD_LEN as u64 {
        return Err(io::Error::new(
            ErrorKind::InvalidData,
            format!("status region holds {len} bytes, not yet published"),
        ));
    }
    // SAFETY: the mapping is read-only and every byte read from it is either a
    // plain integer or copied out before validation; concurrent writes by the
    // daemon can only produce a torn record, which the stamp check rejects.
    unsafe { Mmap::map(&file) }
}
