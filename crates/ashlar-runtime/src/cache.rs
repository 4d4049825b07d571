use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, RwLock};

use ashlar_model::{CHUNK_SIZE, StructureId};
use ashlar_render::{ChunkMesh, LodLevel, MeshKey, RenderQuality};
use hashbrown::HashMap;
use log::trace;

#[derive(Clone, Copy, Debug, Default)]
pub struct MeshCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub builds: u64,
    pub entries: usize,
}

/// Shared completion marker for one in-flight build. `None` means the
/// build failed or was abandoned; waiters then retry from scratch.
struct Inflight {
    done: Mutex<Option<Option<Arc<ChunkMesh>>>>,
    cv: Condvar,
}

impl Inflight {
    fn new() -> Self {
        Self {
            done: Mutex::new(None),
            cv: Condvar::new(),
        }
    }

    fn complete(&self, out: Option<Arc<ChunkMesh>>) {
        let mut g = self.done.lock().unwrap();
        *g = Some(out);
        self.cv.notify_all();
    }

    fn wait(&self) -> Option<Arc<ChunkMesh>> {
        let mut g = self.done.lock().unwrap();
        while g.is_none() {
            g = self.cv.wait(g).unwrap();
        }
        g.clone().unwrap()
    }
}

/// Bounded LRU cache of built chunk meshes keyed by
/// `(structure, chunk, lod)`. Concurrent `get_or_build` calls for one
/// key share a single builder invocation; unrelated keys build
/// concurrently. `invalidate` evicts everything for a structure, and an
/// in-flight build that started before the invalidation is never
/// inserted afterwards.
pub struct MeshCache {
    entries: RwLock<HashMap<MeshKey, Arc<ChunkMesh>>>,
    order: Mutex<VecDeque<MeshKey>>,
    inflight: Mutex<HashMap<MeshKey, Arc<Inflight>>>,
    // Bumped per structure by invalidate(); guarded by the entries lock
    // so eviction and late inserts cannot interleave.
    stamps: Mutex<HashMap<StructureId, u64>>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    builds: AtomicU64,
}

impl MeshCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            order: Mutex::new(VecDeque::new()),
            inflight: Mutex::new(HashMap::new()),
            stamps: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            builds: AtomicU64::new(0),
        }
    }

    /// Capacity sized to the quality's view distance: the chunk footprint
    /// visible at max range, across all LOD tiers, with a floor of 64.
    pub fn capacity_for(quality: &RenderQuality) -> usize {
        let r = (quality.view_distance / CHUNK_SIZE as f32).ceil() as usize;
        ((2 * r) * (2 * r) * LodLevel::ALL.len()).max(64)
    }

    pub fn get(&self, key: &MeshKey) -> Option<Arc<ChunkMesh>> {
        let found = self
            .entries
            .read()
            .ok()
            .and_then(|map| map.get(key).cloned());
        match found {
            Some(mesh) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                self.touch(key);
                Some(mesh)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Returns the cached mesh, building it on a miss. At most one
    /// concurrent build runs per key; other callers block on the shared
    /// marker and observe the same mesh. A builder returning `None`
    /// (failure or abandonment) leaves the key absent so the next
    /// request retries cleanly.
    pub fn get_or_build<F>(&self, key: MeshKey, builder: F) -> Option<Arc<ChunkMesh>>
    where
        F: FnOnce() -> Option<ChunkMesh>,
    {
        if let Some(mesh) = self.get(&key) {
            return Some(mesh);
        }
        let (marker, claimed) = {
            let mut inflight = self.inflight.lock().unwrap();
            match inflight.get(&key) {
                Some(existing) => (Arc::clone(existing), false),
                None => {
                    let marker = Arc::new(Inflight::new());
                    inflight.insert(key, Arc::clone(&marker));
                    (marker, true)
                }
            }
        };
        if !claimed {
            return match marker.wait() {
                Some(mesh) => Some(mesh),
                // The shared build failed; fall back to a fresh lookup so
                // this caller retries rather than erroring.
                None => self.get(&key),
            };
        }

        let stamp0 = self.stamp(key.structure);
        self.builds.fetch_add(1, Ordering::Relaxed);
        let built = builder().map(Arc::new);
        if let Some(mesh) = &built {
            self.insert_if_current(key, Arc::clone(mesh), stamp0);
        }
        {
            let mut inflight = self.inflight.lock().unwrap();
            inflight.remove(&key);
        }
        marker.complete(built.clone());
        built
    }

    /// Stores a mesh built outside the dedup path (the async runtime's
    /// drain loop). Subject to the same invalidation stamp rules.
    pub fn insert(&self, key: MeshKey, mesh: Arc<ChunkMesh>) {
        let stamp = self.stamp(key.structure);
        self.insert_if_current(key, mesh, stamp);
    }

    /// Evicts every entry for the structure. Meshes for an evicted
    /// structure are gone; a build racing this call will not repopulate
    /// the cache.
    pub fn invalidate(&self, structure: StructureId) {
        let removed = {
            let mut entries = self.entries.write().unwrap();
            {
                let mut stamps = self.stamps.lock().unwrap();
                *stamps.entry(structure).or_insert(0) += 1;
            }
            let before = entries.len();
            entries.retain(|k, _| k.structure != structure);
            before - entries.len()
        };
        if removed > 0 {
            self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
            let mut order = self.order.lock().unwrap();
            order.retain(|k| k.structure != structure);
        }
        trace!("invalidated structure {structure}: {removed} meshes evicted");
    }

    pub fn purge(&self) {
        let removed = {
            let mut entries = self.entries.write().unwrap();
            let len = entries.len();
            entries.clear();
            len
        };
        self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
        self.order.lock().unwrap().clear();
    }

    pub fn stats(&self) -> MeshCacheStats {
        MeshCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            builds: self.builds.load(Ordering::Relaxed),
            entries: self.entries.read().map(|m| m.len()).unwrap_or(0),
        }
    }

    fn stamp(&self, structure: StructureId) -> u64 {
        let entries = self.entries.read().unwrap();
        let stamps = self.stamps.lock().unwrap();
        let out = stamps.get(&structure).copied().unwrap_or(0);
        drop(entries);
        out
    }

    fn insert_if_current(&self, key: MeshKey, mesh: Arc<ChunkMesh>, stamp0: u64) {
        {
            let mut entries = self.entries.write().unwrap();
            let current = {
                let stamps = self.stamps.lock().unwrap();
                stamps.get(&key.structure).copied().unwrap_or(0)
            };
            if current != stamp0 {
                trace!("dropping stale mesh for invalidated structure {}", key.structure);
                return;
            }
            entries.insert(key, mesh);
        }
        self.remove_from_order(&key);
        {
            let mut order = self.order.lock().unwrap();
            order.push_back(key);
        }
        self.enforce_capacity();
    }

    fn touch(&self, key: &MeshKey) {
        let mut order = self.order.lock().unwrap();
        if let Some(pos) = order.iter().position(|k| k == key) {
            if let Some(entry) = order.remove(pos) {
                order.push_back(entry);
            }
        }
    }

    fn remove_from_order(&self, key: &MeshKey) {
        let mut order = self.order.lock().unwrap();
        if let Some(pos) = order.iter().position(|k| k == key) {
            order.remove(pos);
        }
    }

    fn enforce_capacity(&self) {
        let mut victims: Vec<MeshKey> = Vec::new();
        {
            let mut order = self.order.lock().unwrap();
            while order.len() > self.capacity {
                if let Some(old) = order.pop_front() {
                    victims.push(old);
                }
            }
        }
        if victims.is_empty() {
            return;
        }
        let mut entries = self.entries.write().unwrap();
        for key in victims {
            if entries.remove(&key).is_some() {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}
