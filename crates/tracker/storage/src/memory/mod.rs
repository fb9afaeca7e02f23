//! In-memory reference implementation for tracker storage traits.
//!
//! This adapter is deterministic and test-friendly. Each table group sits
//! behind one `RwLock`, so compound writes (compare-and-swap commits,
//! idempotent upserts, cascading deletes, default-actor copies) are atomic
//! with respect to concurrent callers.

mod directory;
mod grants;
mod issues;
mod roles;
mod workflows;

use crate::{StorageError, StorageResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracker_types::{ProjectId, ProjectRecord};

use directory::DirectoryTables;
use grants::GrantTables;
use issues::IssueTables;
use roles::RoleTables;
use workflows::WorkflowTables;

/// In-memory tracker storage adapter.
#[derive(Default)]
pub struct InMemoryTrackerStorage {
    directory: RwLock<DirectoryTables>,
    projects: RwLock<HashMap<ProjectId, ProjectRecord>>,
    grants: RwLock<GrantTables>,
    roles: RwLock<RoleTables>,
    workflows: RwLock<WorkflowTables>,
    issues: RwLock<IssueTables>,
    unavailable: AtomicBool,
}

impl InMemoryTrackerStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a backend outage: while set, every call fails with
    /// `StorageError::Backend`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> StorageResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StorageError::Backend("storage unavailable".to_string()))
        } else {
            Ok(())
        }
    }

    fn read<'a, T>(
        &self,
        lock: &'a RwLock<T>,
        table: &str,
    ) -> StorageResult<RwLockReadGuard<'a, T>> {
        self.check_available()?;
        lock.read()
            .map_err(|_| StorageError::Backend(format!("{table} lock poisoned")))
    }

    fn write<'a, T>(
        &self,
        lock: &'a RwLock<T>,
        table: &str,
    ) -> StorageResult<RwLockWriteGuard<'a, T>> {
        self.check_available()?;
        lock.write()
            .map_err(|_| StorageError::Backend(format!("{table} lock poisoned")))
    }
}

/// Remove every element matching `predicate`; report whether any matched.
fn remove_where<T>(rows: &mut Vec<T>, predicate: impl Fn(&T) -> bool) -> bool {
    let before = rows.len();
    rows.retain(|row| !predicate(row));
    rows.len() != before
}
