//! Document storage on top of RocksDB
//!
//! Records are JSON values under prefixed keys. `update` is the only
//! read-modify-write primitive and is serialised by a storage-wide lock, so
//! conditional balance changes and status transitions cannot interleave.

use crate::{
    config::{CompressionType, StorageConfig},
    errors::{CaseboxError, CaseboxResult, StorageError},
};
use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    path::Path,
    sync::{Arc, Mutex},
};

#[derive(Clone)]
pub struct OptimizedStorage {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl OptimizedStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> CaseboxResult<Self> {
        Self::open(path, &StorageConfig::default())
    }

    pub fn new_with_config(config: &StorageConfig) -> CaseboxResult<Self> {
        Self::open(&config.data_directory, config)
    }

    fn open<P: AsRef<Path>>(path: P, config: &StorageConfig) -> CaseboxResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_write_buffer_size(config.write_buffer_size_mb * 1024 * 1024);
        opts.set_max_write_buffer_number(config.max_write_buffer_number);
        opts.set_compression_type(match config.compression_type {
            CompressionType::None => rocksdb::DBCompressionType::None,
            CompressionType::Snappy => rocksdb::DBCompressionType::Snappy,
            CompressionType::Lz4 => rocksdb::DBCompressionType::Lz4,
            CompressionType::Zstd => rocksdb::DBCompressionType::Zstd,
        });

        let db = DB::open(&opts, path)
            .map_err(|e| StorageError::DatabaseOpenFailed(e.to_string()))?;
        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn get_raw(&self, key: &[u8]) -> CaseboxResult<Option<Vec<u8>>> {
        self.db
            .get(key)
            .map_err(|e| StorageError::ReadFailed(e.to_string()).into())
    }

    pub fn get<T: DeserializeOwned>(&self, key: &[u8]) -> CaseboxResult<Option<T>> {
        match self.get_raw(key)? {
            Some(bytes) => decode(key, &bytes).map(Some),
            None => Ok(None),
        }
    }

    pub fn put<T: Serialize>(&self, key: &[u8], value: &T) -> CaseboxResult<()> {
        let bytes = encode(key, value)?;
        self.db
            .put(key, bytes)
            .map_err(|e| StorageError::WriteFailed(e.to_string()).into())
    }

    pub fn batch_write<K, V>(&self, items: &[(K, V)]) -> CaseboxResult<()>
    where
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        let mut batch = WriteBatch::default();
        for (key, value) in items {
            batch.put(key, value);
        }
        self.db
            .write(batch)
            .map_err(|e| StorageError::WriteFailed(e.to_string()).into())
    }

    /// All `(key, value)` pairs whose key starts with `prefix`, in key order
    pub fn scan_prefix(&self, prefix: &[u8], limit: usize) -> CaseboxResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut rows = Vec::new();
        let iter = self
            .db
            .iterator(IteratorMode::From(prefix, Direction::Forward));

        for item in iter {
            let (key, value) = item.map_err(|e| StorageError::ReadFailed(e.to_string()))?;
            if !key.starts_with(prefix) || rows.len() >= limit {
                break;
            }
            rows.push((key.to_vec(), value.to_vec()));
        }

        Ok(rows)
    }

    /// Decoded values under `prefix`
    pub fn scan_values<T: DeserializeOwned>(&self, prefix: &[u8], limit: usize) -> CaseboxResult<Vec<T>> {
        self.scan_prefix(prefix, limit)?
            .into_iter()
            .map(|(key, value)| decode(&key, &value))
            .collect()
    }

    /// Atomic read-modify-write of a single record.
    ///
    /// `f` sees the current value (if any) and returns the value to store, or
    /// `None` to leave the record untouched. Returns what `f` produced.
    pub fn update<T, F>(&self, key: &[u8], f: F) -> CaseboxResult<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(Option<T>) -> CaseboxResult<Option<T>>,
    {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| StorageError::WriteFailed("storage write lock poisoned".to_string()))?;

        let current = self.get::<T>(key)?;
        let next = f(current)?;
        if let Some(ref value) = next {
            self.put(key, value)?;
        }
        Ok(next)
    }
}

fn encode<T: Serialize>(key: &[u8], value: &T) -> CaseboxResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| {
        CaseboxError::Storage(StorageError::WriteFailed(format!(
            "Failed to encode {}: {}",
            String::from_utf8_lossy(key),
            e
        )))
    })
}

fn decode<T: DeserializeOwned>(key: &[u8], bytes: &[u8]) -> CaseboxResult<T> {
    serde_json::from_slice(bytes).map_err(|e| {
        CaseboxError::Storage(StorageError::CorruptedData(format!(
            "Failed to decode {}: {}",
            String::from_utf8_lossy(key),
            e
        )))
    })
}

/// Encode a record for use in `batch_write`
pub fn to_json_bytes<T: Serialize>(key: &[u8], value: &T) -> CaseboxResult<Vec<u8>> {
    encode(key, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Counter {
        value: i64,
    }

    fn temp_storage() -> (tempfile::TempDir, OptimizedStorage) {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = OptimizedStorage::new(dir.path()).expect("open storage");
        (dir, storage)
    }

    #[test]
    fn test_put_get() {
        let (_dir, storage) = temp_storage();
        storage.put(b"counter:a", &Counter { value: 3 }).unwrap();

        let loaded: Option<Counter> = storage.get(b"counter:a").unwrap();
        assert_eq!(loaded, Some(Counter { value: 3 }));
        assert_eq!(storage.get::<Counter>(b"counter:b").unwrap(), None);
    }

    #[test]
    fn test_scan_prefix_stops_at_prefix_boundary() {
        let (_dir, storage) = temp_storage();
        storage.put(b"a:1", &Counter { value: 1 }).unwrap();
        storage.put(b"a:2", &Counter { value: 2 }).unwrap();
        storage.put(b"b:1", &Counter { value: 9 }).unwrap();

        let values: Vec<Counter> = storage.scan_values(b"a:", 100).unwrap();
        assert_eq!(values, vec![Counter { value: 1 }, Counter { value: 2 }]);

        let limited = storage.scan_prefix(b"a:", 1).unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_update_can_decline() {
        let (_dir, storage) = temp_storage();
        storage.put(b"counter:x", &Counter { value: 5 }).unwrap();

        let result = storage
            .update::<Counter, _>(b"counter:x", |current| {
                let current = current.unwrap();
                Ok((current.value >= 10).then(|| Counter { value: current.value - 10 }))
            })
            .unwrap();

        assert_eq!(result, None);
        assert_eq!(storage.get::<Counter>(b"counter:x").unwrap(), Some(Counter { value: 5 }));
    }

    #[test]
    fn test_concurrent_updates_do_not_lose_writes() {
        let (_dir, storage) = temp_storage();
        storage.put(b"counter:c", &Counter { value: 0 }).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let storage = storage.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        storage
                            .update::<Counter, _>(b"counter:c", |c| {
                                Ok(c.map(|c| Counter { value: c.value + 1 }))
                            })
                            .unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(storage.get::<Counter>(b"counter:c").unwrap(), Some(Counter { value: 400 }));
    }
}
