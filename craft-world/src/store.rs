//! Concurrent chunk map: chunk-store membership is protected by one mutex,
//! but per-chunk mutation goes through each `Chunk`'s own lock, so many
//! connections can read/write disjoint chunks without contending on the map.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use craft_protocol::BlockPos;
use craft_util::WorkerPool;

use crate::block::Block;
use crate::chunk::Chunk;
use crate::generator::FlatGenerator;
use crate::region::RegionStore;

type ChunkCoord = (i32, i32);

#[derive(Debug, Clone, Copy, Default)]
pub struct ChunkStoreStats {
    pub loaded: usize,
    pub pending: usize,
}

/// The maximum number of idle chunks persisted and dropped in a single
/// eviction pass, so a cold cache doesn't stall a tick.
pub const MAX_EVICTIONS_PER_PASS: usize = 10;

type PendingWrite = (u8, i32, u8, Block);

pub struct ChunkStore {
    chunks: Mutex<HashMap<ChunkCoord, Arc<Chunk>>>,
    pending: Mutex<HashSet<ChunkCoord>>,
    pending_writes: Mutex<HashMap<ChunkCoord, Vec<PendingWrite>>>,
    generator: Arc<FlatGenerator>,
    region: Arc<Mutex<RegionStore>>,
    pool: Arc<WorkerPool>,
}

impl ChunkStore {
    pub fn new(world_dir: impl Into<std::path::PathBuf>, pool: Arc<WorkerPool>) -> Self {
        Self {
            chunks: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashSet::new()),
            pending_writes: Mutex::new(HashMap::new()),
            generator: Arc::new(FlatGenerator::new()),
            region: Arc::new(Mutex::new(RegionStore::new(world_dir))),
            pool,
        }
    }

    /// Returns the chunk if it's already resident, touching its access
    /// clock. Never blocks on disk or generation.
    pub fn get(&self, chunk_x: i32, chunk_z: i32) -> Option<Arc<Chunk>> {
        let chunk = self.chunks.lock().unwrap().get(&(chunk_x, chunk_z)).cloned();
        if let Some(chunk) = &chunk {
            chunk.touch();
        }
        chunk
    }

    pub fn is_pending(&self, chunk_x: i32, chunk_z: i32) -> bool {
        self.pending.lock().unwrap().contains(&(chunk_x, chunk_z))
    }

    /// Kicks off a background load-or-generate job unless the chunk is
    /// already resident or already in flight.
    pub fn request_load(self: &Arc<Self>, chunk_x: i32, chunk_z: i32) {
        let coord = (chunk_x, chunk_z);
        if self.chunks.lock().unwrap().contains_key(&coord) {
            return;
        }
        if !self.pending.lock().unwrap().insert(coord) {
            return;
        }

        let store = self.clone();
        let generator = self.generator.clone();
        let region = self.region.clone();
        self.pool.submit(move || {
            let from_disk = region
                .lock()
                .unwrap()
                .load(chunk_x, chunk_z)
                .ok()
                .flatten()
                .and_then(|bytes| Chunk::decode(chunk_x, chunk_z, bytes).ok());
            let chunk = from_disk.unwrap_or_else(|| generator.generate(chunk_x, chunk_z));
            for (x, y, z, block) in store.pending_writes.lock().unwrap().remove(&coord).unwrap_or_default() {
                chunk.set_block(x, y, z, block);
            }
            store.chunks.lock().unwrap().insert(coord, Arc::new(chunk));
            store.pending.lock().unwrap().remove(&coord);
        });
    }

    /// Reads a single block, decomposing `pos` into its owning chunk and
    /// local coordinates. Returns `None` if that chunk isn't resident.
    pub fn block_get(&self, pos: BlockPos) -> Option<Block> {
        let (chunk_x, chunk_z) = pos.chunk_coord();
        let (x, y, z) = pos.local();
        self.get(chunk_x, chunk_z).map(|chunk| chunk.get_block(x, y, z))
    }

    /// Writes a single block, auto-loading (generating, if uninitialized)
    /// the owning chunk if it isn't already resident. A write that arrives
    /// before the load finishes is queued and replayed onto the chunk the
    /// moment it becomes resident.
    pub fn block_set(self: &Arc<Self>, pos: BlockPos, block: Block) {
        let (chunk_x, chunk_z) = pos.chunk_coord();
        let (x, y, z) = pos.local();
        let coord = (chunk_x, chunk_z);
        match self.get(chunk_x, chunk_z) {
            Some(chunk) => {
                chunk.set_block(x, y, z, block);
            }
            None => {
                self.pending_writes
                    .lock()
                    .unwrap()
                    .entry(coord)
                    .or_default()
                    .push((x, y, z, block));
                self.request_load(chunk_x, chunk_z);
            }
        }
    }

    /// Persists a chunk if dirty and drops it from the resident map.
    pub fn unload(&self, chunk_x: i32, chunk_z: i32) {
        let chunk = self.chunks.lock().unwrap().remove(&(chunk_x, chunk_z));
        if let Some(chunk) = chunk {
            self.persist(&chunk);
        }
    }

    fn persist(&self, chunk: &Chunk) {
        if !chunk.is_dirty() {
            return;
        }
        let bytes = chunk.encode();
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);
        match self
            .region
            .lock()
            .unwrap()
            .save(chunk.chunk_x, chunk.chunk_z, &bytes, timestamp)
        {
            Ok(()) => chunk.clear_dirty(),
            Err(err) => tracing::warn!(
                chunk_x = chunk.chunk_x,
                chunk_z = chunk.chunk_z,
                %err,
                "failed to persist chunk"
            ),
        }
    }

    /// Persists every dirty resident chunk without unloading it.
    pub fn save_all(&self) {
        let chunks: Vec<Arc<Chunk>> = self.chunks.lock().unwrap().values().cloned().collect();
        for chunk in chunks {
            self.persist(&chunk);
        }
    }

    /// Evicts up to [`MAX_EVICTIONS_PER_PASS`] chunks idle longer than
    /// `max_idle`, persisting dirty ones first. Only runs at all once the
    /// resident count exceeds `max_loaded`.
    pub fn evict_idle(&self, max_idle: Duration, max_loaded: usize) -> usize {
        let candidates: Vec<ChunkCoord> = {
            let chunks = self.chunks.lock().unwrap();
            if chunks.len() <= max_loaded {
                return 0;
            }
            let mut stale: Vec<(ChunkCoord, Duration)> = chunks
                .iter()
                .filter(|(_, chunk)| chunk.idle_for() >= max_idle)
                .map(|(coord, chunk)| (*coord, chunk.idle_for()))
                .collect();
            stale.sort_by(|a, b| b.1.cmp(&a.1));
            stale
                .into_iter()
                .take(MAX_EVICTIONS_PER_PASS)
                .map(|(coord, _)| coord)
                .collect()
        };
        if !candidates.is_empty() {
            tracing::debug!(count = candidates.len(), "evicting idle chunks");
        }
        for coord in &candidates {
            self.unload(coord.0, coord.1);
        }
        candidates.len()
    }

    pub fn stats(&self) -> ChunkStoreStats {
        ChunkStoreStats {
            loaded: self.chunks.lock().unwrap().len(),
            pending: self.pending.lock().unwrap().len(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn test_store() -> (Arc<ChunkStore>, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!(
            "craft-store-test-{}-{}",
            std::process::id(),
            rand_suffix()
        ));
        let pool = Arc::new(WorkerPool::new(2));
        (Arc::new(ChunkStore::new(&dir, pool)), dir)
    }

    fn rand_suffix() -> u64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .subsec_nanos() as u64
    }

    #[test]
    fn request_load_populates_chunk_asynchronously() {
        let (store, dir) = test_store();
        store.request_load(0, 0);
        assert!(store.is_pending(0, 0) || store.get(0, 0).is_some());
        let mut waited = 0;
        while store.get(0, 0).is_none() && waited < 50 {
            std::thread::sleep(Duration::from_millis(20));
            waited += 1;
        }
        assert!(store.get(0, 0).is_some());
        assert_eq!(store.stats().pending, 0);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn duplicate_request_load_does_not_double_queue() {
        let (store, dir) = test_store();
        store.request_load(1, 1);
        store.request_load(1, 1);
        let mut waited = 0;
        while store.get(1, 1).is_none() && waited < 50 {
            std::thread::sleep(Duration::from_millis(20));
            waited += 1;
        }
        assert_eq!(store.stats().loaded, 1);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn unload_drops_from_resident_map() {
        let (store, dir) = test_store();
        store.request_load(2, 2);
        let mut waited = 0;
        while store.get(2, 2).is_none() && waited < 50 {
            std::thread::sleep(Duration::from_millis(20));
            waited += 1;
        }
        store.unload(2, 2);
        assert!(store.get(2, 2).is_none());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn block_set_on_a_resident_chunk_applies_immediately() {
        let (store, dir) = test_store();
        store.request_load(3, 3);
        let mut waited = 0;
        while store.get(3, 3).is_none() && waited < 50 {
            std::thread::sleep(Duration::from_millis(20));
            waited += 1;
        }
        let stone = crate::block::registry().by_name("minecraft:stone").unwrap();
        let pos = BlockPos::new(3 * 16, 0, 3 * 16);
        store.block_set(pos, stone);
        assert_eq!(store.block_get(pos), Some(stone));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn block_set_on_an_unloaded_chunk_auto_loads_and_replays_the_write() {
        let (store, dir) = test_store();
        let stone = crate::block::registry().by_name("minecraft:stone").unwrap();
        let pos = BlockPos::new(4 * 16 + 1, 0, 4 * 16 + 2);
        store.block_set(pos, stone);
        let mut waited = 0;
        while store.block_get(pos) != Some(stone) && waited < 50 {
            std::thread::sleep(Duration::from_millis(20));
            waited += 1;
        }
        assert_eq!(store.block_get(pos), Some(stone));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn evict_idle_is_a_noop_below_max_loaded() {
        let (store, dir) = test_store();
        store.request_load(5, 5);
        let mut waited = 0;
        while store.get(5, 5).is_none() && waited < 50 {
            std::thread::sleep(Duration::from_millis(20));
            waited += 1;
        }
        assert_eq!(store.evict_idle(Duration::from_secs(0), 10), 0);
        assert!(store.get(5, 5).is_some());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
