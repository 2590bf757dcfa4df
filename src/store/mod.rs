//! Thin synchronous wrapper around the embedded sled database.
//!
//! `Store` owns the `sled::Db` handle and hands out the named trees ("buckets") the
//! chain layer reads and writes. All blockchain calls go through this module rather than
//! touching sled directly, so the on-disk layout stays in one place.

use crate::error::{BtcError, Result};
use sled::{Db, Tree};
use std::path::Path;

#[derive(Clone)]
pub struct Store {
    db: Db,
}

impl Store {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Store> {
        let db = sled::open(path).map_err(|e| BtcError::BlockchainDBconnection(e.to_string()))?;
        Ok(Store { db })
    }

    pub fn tree(&self, name: &str) -> Result<Tree> {
        self.db
            .open_tree(name)
            .map_err(|e| BtcError::OpenBlockchainTreeError(e.to_string()))
    }

    pub fn flush(&self) -> Result<()> {
        self.db
            .flush()
            .map(|_| ())
            .map_err(|e| BtcError::BlockchainDBconnection(e.to_string()))
    }
}
