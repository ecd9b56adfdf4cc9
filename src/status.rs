//! Per-target build status, memoized for the lifetime of a run.

use crate::db::DepMap;
use std::collections::HashMap;
use std::os::unix::fs::MetadataExt;
use tracing::debug;

/// Build status of a target.  The mtime (seconds) is meaningful only for
/// `Uptodate`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Uptodate { mtime: i64 },
    Todo,
    Running,
    Remade,
    Failed,
}

#[derive(Default)]
pub struct StatusMap {
    map: HashMap<String, Status>,
}

impl StatusMap {
    pub fn new() -> StatusMap {
        StatusMap::default()
    }

    /// Status previously computed or recorded for `target`, if any.
    pub fn get(&self, target: &str) -> Option<Status> {
        self.map.get(target).copied()
    }

    /// Record a scheduler-driven transition (Running/Remade/Failed).
    pub fn set(&mut self, target: &str, status: Status) {
        self.map.insert(target.to_string(), status);
    }

    /// Compute and memoize the status of `target`:
    /// - a missing file is obsolete,
    /// - a file with an obsolete or younger dependency is obsolete,
    /// - otherwise the target is up to date.
    pub fn check(&mut self, target: &str, deps: &DepMap) -> Status {
        if let Some(status) = self.get(target) {
            return status;
        }
        // Provisional entry; breaks dependency cycles.
        self.map
            .insert(target.to_string(), Status::Uptodate { mtime: 0 });
        let status = self.compute(target, deps);
        debug!("status of {}: {:?}", target, status);
        self.map.insert(target.to_string(), status);
        status
    }

    fn compute(&mut self, target: &str, deps: &DepMap) -> Status {
        let mtime = match std::fs::metadata(target) {
            Ok(meta) => meta.mtime(),
            Err(_) => return Status::Todo,
        };
        if let Some(set) = deps.get(target) {
            for dep in set {
                match self.check(dep, deps) {
                    Status::Uptodate { mtime: last } if last <= mtime => {}
                    _ => return Status::Todo,
                }
            }
        }
        Status::Uptodate { mtime }
    }
}
