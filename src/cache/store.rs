//! Disk-backed entry store.
//!
//! Layout under the cache directory:
//!
//! ```text
//! <cache_dir>/metadata.json      index of every entry plus counters
//! <cache_dir>/entries/<key>.json one payload per entry, optionally gzipped
//! ```
//!
//! Every write lands in a temp file first and is renamed into place, so a
//! crash mid-write leaves the previous version intact. Payload files keep the
//! `.json` name whether compressed or not; the decoder sniffs the gzip magic.

use std::io::{Read, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use lru::LruCache;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::cache::entry::{CacheEntry, CacheMetadata, CachePayload};
use crate::cache::eviction::CapacityLimits;
use crate::error::CacheError;
use crate::similarity::SimilarityCandidate;

const METADATA_FILE: &str = "metadata.json";
const ENTRIES_DIR: &str = "entries";
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
/// Hot payloads kept decoded in memory.
const PAYLOAD_CACHE_CAPACITY: usize = 64;

/// Outcome of an index probe during `get`.
enum Probe {
    Missing,
    Expired,
    Live,
}

pub(crate) struct CacheStore {
    entries_dir: PathBuf,
    metadata_path: PathBuf,
    compression: bool,
    metadata: RwLock<CacheMetadata>,
    payload_cache: Mutex<LruCache<String, Arc<CachePayload>>>,
}

impl CacheStore {
    /// Opens (or initializes) the store under `root`. Directory creation
    /// failures raise; an unreadable metadata file degrades to an empty
    /// store with a warning, never an error.
    pub(crate) async fn open(root: impl Into<PathBuf>, compression: bool) -> Result<Self, CacheError> {
        let root = root.into();
        let entries_dir = root.join(ENTRIES_DIR);
        tokio::fs::create_dir_all(&entries_dir)
            .await
            .map_err(|e| CacheError::persistence(&entries_dir, e))?;
        let metadata_path = root.join(METADATA_FILE);
        let metadata = match Self::load_metadata(&metadata_path).await {
            Ok(Some(metadata)) => metadata,
            Ok(None) => CacheMetadata::new(Utc::now()),
            Err(e) => {
                warn!(
                    path = %metadata_path.display(),
                    error = %e,
                    "cache metadata unreadable, starting from an empty store"
                );
                CacheMetadata::new(Utc::now())
            }
        };
        Ok(Self {
            entries_dir,
            metadata_path,
            compression,
            metadata: RwLock::new(metadata),
            payload_cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(PAYLOAD_CACHE_CAPACITY).expect("capacity is non-zero"),
            )),
        })
    }

    async fn load_metadata(path: &Path) -> Result<Option<CacheMetadata>, CacheError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::persistence(path, e)),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.entries_dir.join(format!("{}.json", key))
    }

    /// Serializes a payload the way it will land on disk, so callers can
    /// size-check before committing anything.
    pub(crate) fn encode(&self, payload: &CachePayload) -> Result<Vec<u8>, CacheError> {
        let json = serde_json::to_vec(payload)?;
        if !self.compression {
            return Ok(json);
        }
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&json)
            .and_then(|_| encoder.finish())
            .map_err(|e| CacheError::persistence(&self.entries_dir, e))
    }

    fn decode(&self, key: &str, bytes: &[u8]) -> Result<CachePayload, CacheError> {
        let inflated;
        let json: &[u8] = if bytes.starts_with(&GZIP_MAGIC) {
            let mut decoder = GzDecoder::new(bytes);
            let mut out = Vec::new();
            decoder
                .read_to_end(&mut out)
                .map_err(|e| CacheError::corrupt(key, format!("gzip: {}", e)))?;
            inflated = out;
            &inflated
        } else {
            bytes
        };
        serde_json::from_slice(json).map_err(|e| CacheError::corrupt(key, e.to_string()))
    }

    async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| CacheError::persistence(&tmp, e))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| CacheError::persistence(path, e))
    }

    async fn persist_metadata(&self) -> Result<(), CacheError> {
        let bytes = {
            let metadata = self.metadata.read().await;
            serde_json::to_vec_pretty(&*metadata)?
        };
        self.write_atomic(&self.metadata_path, &bytes).await
    }

    async fn persist_best_effort(&self) {
        if let Err(e) = self.persist_metadata().await {
            warn!(error = %e, "cache metadata persist failed");
        }
    }

    fn cache_payload(&self, key: &str, payload: &Arc<CachePayload>) {
        if let Ok(mut cache) = self.payload_cache.lock() {
            cache.put(key.to_string(), Arc::clone(payload));
        }
    }

    fn cached_payload(&self, key: &str) -> Option<Arc<CachePayload>> {
        self.payload_cache
            .lock()
            .ok()
            .and_then(|mut cache| cache.get(key).cloned())
    }

    fn drop_cached_payload(&self, key: &str) {
        if let Ok(mut cache) = self.payload_cache.lock() {
            cache.pop(key);
        }
    }

    /// Looks up a live entry. Expired entries are evicted on the spot and
    /// reported as a miss; an unreadable payload is evicted and surfaces as
    /// [`CacheError::CorruptEntry`] so the caller can log it.
    pub(crate) async fn get(
        &self,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Arc<CachePayload>>, CacheError> {
        let probe = {
            let metadata = self.metadata.read().await;
            match metadata.entries.get(key) {
                None => Probe::Missing,
                Some(entry) if entry.is_expired_at(now) => Probe::Expired,
                Some(_) => Probe::Live,
            }
        };
        match probe {
            Probe::Missing => return Ok(None),
            Probe::Expired => {
                debug!(key, "entry expired, evicting lazily");
                self.evict_keys(&[key.to_string()]).await;
                return Ok(None);
            }
            Probe::Live => {}
        }
        if let Some(payload) = self.cached_payload(key) {
            return Ok(Some(payload));
        }
        let path = self.entry_path(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.evict_keys(&[key.to_string()]).await;
                return Err(CacheError::corrupt(key, format!("payload unreadable: {}", e)));
            }
        };
        match self.decode(key, &bytes) {
            Ok(payload) => {
                let payload = Arc::new(payload);
                self.cache_payload(key, &payload);
                Ok(Some(payload))
            }
            Err(e) => {
                self.evict_keys(&[key.to_string()]).await;
                Err(e)
            }
        }
    }

    /// Projected totals after writing `incoming` bytes under `key`, checked
    /// against the ceilings. Replacing an entry charges only the delta.
    pub(crate) async fn would_exceed(
        &self,
        key: &str,
        incoming: u64,
        limits: &CapacityLimits,
    ) -> bool {
        let metadata = self.metadata.read().await;
        let replaced = metadata.entries.get(key).map(|e| e.size_bytes).unwrap_or(0);
        let projected_size = metadata.total_size.saturating_sub(replaced) + incoming;
        let projected_count = metadata.entries.len() + usize::from(replaced == 0);
        projected_size > limits.max_size_bytes || projected_count > limits.max_entries
    }

    /// Writes one entry: payload file first, then the index. Returns the
    /// byte count that landed on disk.
    pub(crate) async fn put(
        &self,
        key: &str,
        payload: CachePayload,
        encoded: Vec<u8>,
    ) -> Result<u64, CacheError> {
        let size = encoded.len() as u64;
        let entry = CacheEntry::new(size, payload.timestamp, payload.expires_at, &payload.query)?;
        self.write_atomic(&self.entry_path(key), &encoded).await?;
        {
            let mut metadata = self.metadata.write().await;
            metadata.upsert(key.to_string(), entry);
        }
        self.persist_metadata().await?;
        self.cache_payload(key, &Arc::new(payload));
        Ok(size)
    }

    /// Removes one entry. `Ok(false)` when the key was not present.
    pub(crate) async fn remove(&self, key: &str) -> Result<bool, CacheError> {
        let existed = {
            let mut metadata = self.metadata.write().await;
            metadata.remove(key).is_some()
        };
        if !existed {
            return Ok(false);
        }
        self.drop_cached_payload(key);
        match tokio::fs::remove_file(self.entry_path(key)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(key, error = %e, "payload file removal failed"),
        }
        self.persist_metadata().await?;
        Ok(true)
    }

    /// Drops a batch of entries, tolerating individual file failures.
    /// Returns how many index entries were removed and the bytes freed.
    pub(crate) async fn evict_keys(&self, keys: &[String]) -> (usize, u64) {
        if keys.is_empty() {
            return (0, 0);
        }
        let mut removed = 0usize;
        let mut freed = 0u64;
        {
            let mut metadata = self.metadata.write().await;
            for key in keys {
                if let Some(bytes) = metadata.remove(key) {
                    removed += 1;
                    freed += bytes;
                }
            }
        }
        for key in keys {
            self.drop_cached_payload(key);
            match tokio::fs::remove_file(self.entry_path(key)).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(key, error = %e, "payload file removal failed"),
            }
        }
        self.persist_best_effort().await;
        (removed, freed)
    }

    /// Empties the store, aggregate counters included. Returns how many
    /// entries were dropped.
    pub(crate) async fn clear(&self) -> Result<usize, CacheError> {
        let keys: Vec<String> = {
            let mut metadata = self.metadata.write().await;
            let keys = metadata.entries.keys().cloned().collect();
            metadata.entries.clear();
            metadata.total_size = 0;
            metadata.hit_count = 0;
            metadata.miss_count = 0;
            metadata.similarity_hit_count = 0;
            keys
        };
        if let Ok(mut cache) = self.payload_cache.lock() {
            cache.clear();
        }
        for key in &keys {
            match tokio::fs::remove_file(self.entry_path(key)).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(key, error = %e, "payload file removal failed"),
            }
        }
        self.persist_metadata().await?;
        Ok(keys.len())
    }

    /// Loads every live entry as a similarity candidate. Unreadable payloads
    /// are skipped, not errors; the sweep will reclaim them.
    pub(crate) async fn candidates(&self, now: DateTime<Utc>) -> Vec<SimilarityCandidate> {
        let keys: Vec<String> = {
            let metadata = self.metadata.read().await;
            metadata
                .entries
                .iter()
                .filter(|(_, entry)| !entry.is_expired_at(now))
                .map(|(key, _)| key.clone())
                .collect()
        };
        let mut candidates = Vec::with_capacity(keys.len());
        for key in keys {
            let payload = if let Some(payload) = self.cached_payload(&key) {
                payload
            } else {
                let bytes = match tokio::fs::read(self.entry_path(&key)).await {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        debug!(key, error = %e, "skipping unreadable candidate");
                        continue;
                    }
                };
                match self.decode(&key, &bytes) {
                    Ok(payload) => {
                        let payload = Arc::new(payload);
                        self.cache_payload(&key, &payload);
                        payload
                    }
                    Err(e) => {
                        debug!(key, error = %e, "skipping undecodable candidate");
                        continue;
                    }
                }
            };
            candidates.push(SimilarityCandidate {
                cache_key: key,
                query: payload.query.clone(),
                context: payload.context.clone(),
            });
        }
        candidates
    }

    pub(crate) async fn note_direct_hit(&self, key: &str, now: DateTime<Utc>) {
        {
            let mut metadata = self.metadata.write().await;
            metadata.hit_count += 1;
            if let Some(entry) = metadata.entries.get_mut(key) {
                entry.record_access(now, None);
            }
        }
        self.persist_best_effort().await;
    }

    pub(crate) async fn note_similarity_hit(&self, key: &str, similarity: f64, now: DateTime<Utc>) {
        {
            let mut metadata = self.metadata.write().await;
            metadata.similarity_hit_count += 1;
            if let Some(entry) = metadata.entries.get_mut(key) {
                entry.record_access(now, Some(similarity));
            }
        }
        self.persist_best_effort().await;
    }

    pub(crate) async fn note_miss(&self) {
        {
            let mut metadata = self.metadata.write().await;
            metadata.miss_count += 1;
        }
        self.persist_best_effort().await;
    }

    pub(crate) async fn mark_cleanup(&self, now: DateTime<Utc>) {
        {
            let mut metadata = self.metadata.write().await;
            metadata.last_cleanup = Some(now);
        }
        self.persist_best_effort().await;
    }

    pub(crate) async fn snapshot(&self) -> CacheMetadata {
        self.metadata.read().await.clone()
    }

    /// Forces the index to disk. Used by shutdown.
    pub(crate) async fn flush(&self) -> Result<(), CacheError> {
        self.persist_metadata().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::entry::expiry_for;
    use crate::types::{CacheContext, ResponseBody};
    use chrono::Duration as ChronoDuration;
    use std::time::Duration;
    use tempfile::TempDir;

    fn payload_at(query: &str, now: DateTime<Utc>, ttl: Duration) -> CachePayload {
        CachePayload {
            query: query.to_string(),
            context: CacheContext::new().with_language("rust"),
            response: ResponseBody::from("an answer"),
            timestamp: now,
            expires_at: expiry_for(now, ttl),
            model: None,
            token_count: None,
            response_time_ms: None,
        }
    }

    async fn store_in(dir: &TempDir, compression: bool) -> CacheStore {
        CacheStore::open(dir.path(), compression).await.unwrap()
    }

    #[tokio::test]
    async fn test_open_creates_layout() {
        let dir = TempDir::new().unwrap();
        let _store = store_in(&dir, false).await;
        assert!(dir.path().join(ENTRIES_DIR).is_dir());
    }

    #[tokio::test]
    async fn test_put_then_get_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, false).await;
        let now = Utc::now();
        let payload = payload_at("how do I read a file", now, Duration::from_secs(60));
        let encoded = store.encode(&payload).unwrap();
        store.put("k1", payload, encoded).await.unwrap();

        let hit = store.get("k1", now).await.unwrap().unwrap();
        assert_eq!(hit.query, "how do I read a file");
        assert!(dir.path().join("entries/k1.json").is_file());
    }

    #[tokio::test]
    async fn test_get_absent_key_is_none() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, false).await;
        assert!(store.get("nope", Utc::now()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_entry_evicted_on_get() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, false).await;
        let now = Utc::now();
        let payload = payload_at("stale", now, Duration::from_millis(5));
        let encoded = store.encode(&payload).unwrap();
        store.put("k1", payload, encoded).await.unwrap();

        let later = now + ChronoDuration::milliseconds(50);
        assert!(store.get("k1", later).await.unwrap().is_none());
        let snapshot = store.snapshot().await;
        assert!(snapshot.entries.is_empty());
        assert_eq!(snapshot.total_size, 0);
        assert!(!dir.path().join("entries/k1.json").exists());
    }

    #[tokio::test]
    async fn test_corrupt_payload_surfaces_and_evicts() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, false).await;
        let now = Utc::now();
        let payload = payload_at("q", now, Duration::from_secs(60));
        let encoded = store.encode(&payload).unwrap();
        store.put("k1", payload, encoded).await.unwrap();

        // New store instance so the in-memory payload cache is cold.
        drop(store);
        let store = store_in(&dir, false).await;
        std::fs::write(dir.path().join("entries/k1.json"), b"{ not json").unwrap();

        let err = store.get("k1", now).await.unwrap_err();
        assert!(err.is_corrupt_entry());
        assert!(store.snapshot().await.entries.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_metadata_degrades_to_empty() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(METADATA_FILE), b"%% definitely not json").unwrap();
        let store = store_in(&dir, false).await;
        assert!(store.snapshot().await.entries.is_empty());
    }

    #[tokio::test]
    async fn test_metadata_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let now = Utc::now();
        {
            let store = store_in(&dir, false).await;
            let payload = payload_at("persisted", now, Duration::from_secs(600));
            let encoded = store.encode(&payload).unwrap();
            store.put("k1", payload, encoded).await.unwrap();
            store.note_direct_hit("k1", now).await;
        }
        let store = store_in(&dir, false).await;
        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.entries.len(), 1);
        assert_eq!(snapshot.hit_count, 1);
        assert_eq!(snapshot.entries["k1"].access_count, 1);
        let hit = store.get("k1", now).await.unwrap().unwrap();
        assert_eq!(hit.query, "persisted");
    }

    #[tokio::test]
    async fn test_compressed_payloads_sniffed_on_read() {
        let dir = TempDir::new().unwrap();
        let now = Utc::now();
        {
            let store = store_in(&dir, true).await;
            let payload = payload_at("compressed entry", now, Duration::from_secs(60));
            let encoded = store.encode(&payload).unwrap();
            assert!(encoded.starts_with(&GZIP_MAGIC));
            store.put("k1", payload, encoded).await.unwrap();
        }
        // Reopen without compression; the sniffing decoder still reads it.
        let store = store_in(&dir, false).await;
        let hit = store.get("k1", now).await.unwrap().unwrap();
        assert_eq!(hit.query, "compressed entry");
    }

    #[tokio::test]
    async fn test_remove() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, false).await;
        let now = Utc::now();
        let payload = payload_at("q", now, Duration::from_secs(60));
        let encoded = store.encode(&payload).unwrap();
        store.put("k1", payload, encoded).await.unwrap();

        assert!(store.remove("k1").await.unwrap());
        assert!(!store.remove("k1").await.unwrap());
        assert!(!dir.path().join("entries/k1.json").exists());
    }

    #[tokio::test]
    async fn test_clear_drops_everything() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, false).await;
        let now = Utc::now();
        for i in 0..3 {
            let payload = payload_at(&format!("q{}", i), now, Duration::from_secs(60));
            let encoded = store.encode(&payload).unwrap();
            store.put(&format!("k{}", i), payload, encoded).await.unwrap();
        }
        store.note_direct_hit("k0", now).await;
        store.note_miss().await;
        assert_eq!(store.clear().await.unwrap(), 3);
        let snapshot = store.snapshot().await;
        assert!(snapshot.entries.is_empty());
        assert_eq!(snapshot.total_size, 0);
        assert_eq!(snapshot.hit_count, 0);
        assert_eq!(snapshot.miss_count, 0);
        assert!(!dir.path().join("entries/k0.json").exists());
    }

    #[tokio::test]
    async fn test_candidates_exclude_expired() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, false).await;
        let now = Utc::now();
        let live = payload_at("live query", now, Duration::from_secs(600));
        let encoded = store.encode(&live).unwrap();
        store.put("live", live, encoded).await.unwrap();
        let dead = payload_at("dead query", now, Duration::from_millis(1));
        let encoded = store.encode(&dead).unwrap();
        store.put("dead", dead, encoded).await.unwrap();

        let later = now + ChronoDuration::seconds(1);
        let candidates = store.candidates(later).await;
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].cache_key, "live");
        assert_eq!(candidates[0].query, "live query");
    }

    #[tokio::test]
    async fn test_would_exceed_accounts_for_replacement() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, false).await;
        let now = Utc::now();
        let payload = payload_at("original", now, Duration::from_secs(60));
        let encoded = store.encode(&payload).unwrap();
        let size = encoded.len() as u64;
        store.put("k1", payload, encoded).await.unwrap();

        let limits = CapacityLimits {
            max_size_bytes: size + 10,
            max_entries: 1,
        };
        // Replacing k1 with a same-sized payload only charges the delta.
        assert!(!store.would_exceed("k1", size, &limits).await);
        // A second entry trips the count ceiling.
        assert!(store.would_exceed("k2", 1, &limits).await);
        // A much larger replacement trips the size ceiling.
        assert!(store.would_exceed("k1", size + 11, &limits).await);
    }

    #[tokio::test]
    async fn test_counters_update() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, false).await;
        let now = Utc::now();
        let payload = payload_at("q", now, Duration::from_secs(60));
        let encoded = store.encode(&payload).unwrap();
        store.put("k1", payload, encoded).await.unwrap();

        store.note_direct_hit("k1", now).await;
        store.note_similarity_hit("k1", 0.9, now).await;
        store.note_miss().await;

        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.hit_count, 1);
        assert_eq!(snapshot.similarity_hit_count, 1);
        assert_eq!(snapshot.miss_count, 1);
        let entry = &snapshot.entries["k1"];
        assert_eq!(entry.access_count, 2);
        assert_eq!(entry.last_similarity, Some(0.9));
    }
}
