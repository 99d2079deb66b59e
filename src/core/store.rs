//! Store abstraction for a persisted entry point.
//!
//! A store is a directory holding the entry point's database and its audit
//! log. Each store holds exactly one diamond.

use crate::core::schemas;
use std::path::{Path, PathBuf};

/// Default store directory, relative to the working directory.
pub const DEFAULT_STORE_DIR: &str = ".diamond";

#[derive(Debug, Clone)]
pub struct Store {
    /// Absolute or working-directory-relative path to the store root.
    pub root: PathBuf,
}

impl Store {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.root.join(schemas::DIAMOND_DB_NAME)
    }

    pub fn events_path(&self) -> PathBuf {
        self.root.join(schemas::DIAMOND_EVENTS_NAME)
    }
}
