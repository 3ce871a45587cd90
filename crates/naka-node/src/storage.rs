//! RocksDB-backed mirror of the registry.
//!
//! One column family, `coefficients`, keyed by token bytes. Values are
//! bincode-encoded [`StoredRecord`]s. The in-memory registry stays
//! authoritative; this store only lets previous values survive restarts.

use std::path::Path;

use chrono::Utc;
use rocksdb::{ColumnFamilyDescriptor, IteratorMode, Options, DB};
use tracing::warn;

use naka_core::constants::PREVIOUS_SENTINEL;
use naka_core::error::PersistenceError;
use naka_core::traits::{CoefficientStore, StoredCoefficient};
use naka_core::Token;

const CF_COEFFICIENTS: &str = "coefficients";

#[derive(Debug, Clone, PartialEq, Eq, bincode::Encode, bincode::Decode)]
struct StoredRecord {
    current: u32,
    previous: Option<u32>,
    /// Unix seconds.
    updated_at: i64,
}

pub struct RocksStore {
    db: DB,
}

fn storage_err(e: rocksdb::Error) -> PersistenceError {
    PersistenceError::Storage(e.to_string())
}

impl RocksStore {
    /// Open or create the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf = ColumnFamilyDescriptor::new(CF_COEFFICIENTS, Options::default());
        let db = DB::open_cf_descriptors(&db_opts, path.as_ref(), vec![cf]).map_err(storage_err)?;
        Ok(Self { db })
    }

    fn cf_handle(&self) -> Result<&rocksdb::ColumnFamily, PersistenceError> {
        self.db
            .cf_handle(CF_COEFFICIENTS)
            .ok_or_else(|| PersistenceError::Storage(format!("missing column family: {CF_COEFFICIENTS}")))
    }

    fn read(&self, token: &Token) -> Result<Option<StoredRecord>, PersistenceError> {
        let cf = self.cf_handle()?;
        match self.db.get_cf(cf, token.as_str().as_bytes()).map_err(storage_err)? {
            Some(bytes) => decode(&bytes).map(Some),
            None => Ok(None),
        }
    }
}

fn encode(record: &StoredRecord) -> Result<Vec<u8>, PersistenceError> {
    bincode::encode_to_vec(record, bincode::config::standard())
        .map_err(|e| PersistenceError::Codec(e.to_string()))
}

fn decode(bytes: &[u8]) -> Result<StoredRecord, PersistenceError> {
    let (record, _): (StoredRecord, _) =
        bincode::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| PersistenceError::Codec(e.to_string()))?;
    Ok(record)
}

impl CoefficientStore for RocksStore {
    fn upsert(
        &self,
        token: &Token,
        current: u32,
        previous: Option<u32>,
    ) -> Result<(), PersistenceError> {
        let record = StoredRecord {
            current,
            previous,
            updated_at: Utc::now().timestamp(),
        };
        let cf = self.cf_handle()?;
        self.db
            .put_cf(cf, token.as_str().as_bytes(), encode(&record)?)
            .map_err(storage_err)
    }

    fn get_previous(&self, token: &Token) -> i64 {
        match self.read(token) {
            Ok(Some(record)) => i64::from(record.current),
            Ok(None) => PREVIOUS_SENTINEL,
            Err(e) => {
                warn!(%token, "reading stored coefficient failed: {e}");
                PREVIOUS_SENTINEL
            }
        }
    }

    fn load_all(&self) -> Result<Vec<StoredCoefficient>, PersistenceError> {
        let cf = self.cf_handle()?;
        let mut out = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = item.map_err(storage_err)?;
            let token = std::str::from_utf8(&key)
                .map_err(|e| PersistenceError::Codec(format!("token key: {e}")))?;
            let record = decode(&value)?;
            out.push(StoredCoefficient {
                token: Token::new(token),
                current: record.current,
                previous: record.previous,
                updated_at: record.updated_at,
            });
        }
        Ok(out)
    }
}
