//! Mesh-build runtime: job queues, worker orchestration, and the chunk
//! mesh cache.
#![forbid(unsafe_code)]

mod cache;

pub use cache::{MeshCache, MeshCacheStats};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Instant;

use ashlar_model::Structure;
use ashlar_render::{ChunkMesh, MeshKey, TextureAtlas, build_chunk_mesh};
use crossbeam_channel::{Receiver, Sender, unbounded};
use hashbrown::HashSet;
use log::debug;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::Mutex;

/// One chunk mesh build. Carries an immutable structure snapshot, the
/// revision it was scheduled against, and a cancellation flag flipped
/// when the chunk leaves the view.
#[derive(Clone)]
pub struct MeshJob {
    pub key: MeshKey,
    pub rev: u64,
    pub structure: Arc<Structure>,
    pub atlas: Arc<TextureAtlas>,
    pub cancel: Arc<AtomicBool>,
    pub job_id: u64,
}

/// Build result. `mesh` is `None` for cancelled or superseded jobs; the
/// cache key stays absent and a later request retries cleanly.
pub struct MeshJobOut {
    pub key: MeshKey,
    pub rev: u64,
    pub mesh: Option<Arc<ChunkMesh>>,
    pub job_id: u64,
    pub t_mesh_ms: u32,
}

fn process_mesh_job(job: MeshJob, tx: &Sender<MeshJobOut>) {
    let MeshJob {
        key,
        rev,
        structure,
        atlas,
        cancel,
        job_id,
    } = job;

    if cancel.load(Ordering::Relaxed) || structure.rev() != rev {
        let _ = tx.send(MeshJobOut {
            key,
            rev,
            mesh: None,
            job_id,
            t_mesh_ms: 0,
        });
        return;
    }

    let t0 = Instant::now();
    let mesh = build_chunk_mesh(&structure, key.chunk, key.lod, &atlas);
    let t_mesh_ms = t0.elapsed().as_millis().min(u128::from(u32::MAX)) as u32;

    // A cancellation that lands mid-build abandons the result rather
    // than letting it reach the cache.
    let mesh = if cancel.load(Ordering::Relaxed) {
        None
    } else {
        Some(Arc::new(mesh))
    };
    let _ = tx.send(MeshJobOut {
        key,
        rev,
        mesh,
        job_id,
        t_mesh_ms,
    });
}

/// Worker pool for chunk mesh builds. Chunks are independent, so jobs
/// fan out across the pool with no cross-chunk synchronization; the
/// scheduled-key set gives at-most-one pending build per key.
pub struct Runtime {
    job_tx: Sender<MeshJob>,
    res_rx: Receiver<MeshJobOut>,
    _pool: Arc<ThreadPool>,
    scheduled: Mutex<HashSet<MeshKey>>,
    queued: Arc<AtomicUsize>,
    inflight: Arc<AtomicUsize>,
    next_job_id: AtomicUsize,
    pub workers: usize,
}

impl Runtime {
    pub fn new() -> Self {
        let workers = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self::with_workers(workers)
    }

    pub fn with_workers(workers: usize) -> Self {
        let workers = workers.max(1);
        let (job_tx, job_rx) = unbounded::<MeshJob>();
        let (res_tx, res_rx) = unbounded::<MeshJobOut>();
        let queued = Arc::new(AtomicUsize::new(0));
        let inflight = Arc::new(AtomicUsize::new(0));

        let pool = Arc::new(
            ThreadPoolBuilder::new()
                .num_threads(workers)
                .thread_name(|i| format!("ashlar-mesh-{i}"))
                .build()
                .expect("mesh pool"),
        );
        for _ in 0..workers {
            let rx = job_rx.clone();
            let tx = res_tx.clone();
            let queued = Arc::clone(&queued);
            let inflight = Arc::clone(&inflight);
            pool.spawn(move || {
                while let Ok(job) = rx.recv() {
                    queued.fetch_sub(1, Ordering::Relaxed);
                    inflight.fetch_add(1, Ordering::Relaxed);
                    process_mesh_job(job, &tx);
                    inflight.fetch_sub(1, Ordering::Relaxed);
                }
            });
        }

        Self {
            job_tx,
            res_rx,
            _pool: pool,
            scheduled: Mutex::new(HashSet::new()),
            queued,
            inflight,
            next_job_id: AtomicUsize::new(1),
            workers,
        }
    }

    /// Schedules a build unless one is already pending for the key.
    /// Returns the cancellation handle for newly scheduled jobs.
    pub fn schedule(
        &self,
        key: MeshKey,
        structure: &Arc<Structure>,
        atlas: &Arc<TextureAtlas>,
    ) -> Option<Arc<AtomicBool>> {
        {
            let mut scheduled = self.scheduled.lock().unwrap();
            if !scheduled.insert(key) {
                return None;
            }
        }
        let cancel = Arc::new(AtomicBool::new(false));
        let job = MeshJob {
            key,
            rev: structure.rev(),
            structure: Arc::clone(structure),
            atlas: Arc::clone(atlas),
            cancel: Arc::clone(&cancel),
            job_id: self.next_job_id.fetch_add(1, Ordering::Relaxed) as u64,
        };
        self.queued.fetch_add(1, Ordering::Relaxed);
        let _ = self.job_tx.send(job);
        Some(cancel)
    }

    fn apply_result(
        &self,
        out: MeshJobOut,
        cache: &MeshCache,
        current_rev: &impl Fn(&MeshKey) -> u64,
    ) -> bool {
        {
            let mut scheduled = self.scheduled.lock().unwrap();
            scheduled.remove(&out.key);
        }
        let Some(mesh) = out.mesh else {
            debug!("build for {:?} abandoned (job {})", out.key, out.job_id);
            return false;
        };
        if out.rev != current_rev(&out.key) {
            debug!("build for {:?} superseded (rev {})", out.key, out.rev);
            return false;
        }
        cache.insert(out.key, mesh);
        true
    }

    /// Non-blocking drain of finished builds into the cache. Cancelled
    /// and superseded results are dropped. Returns the number of meshes
    /// stored.
    pub fn drain_into(&self, cache: &MeshCache, current_rev: impl Fn(&MeshKey) -> u64) -> usize {
        let outs: Vec<MeshJobOut> = self.res_rx.try_iter().collect();
        outs.into_iter()
            .map(|out| self.apply_result(out, cache, &current_rev))
            .filter(|stored| *stored)
            .count()
    }

    /// Blocks for the next finished build and applies it to the cache.
    /// `None` on timeout; `Some(stored)` otherwise.
    pub fn drain_next(
        &self,
        cache: &MeshCache,
        current_rev: impl Fn(&MeshKey) -> u64,
        timeout: std::time::Duration,
    ) -> Option<bool> {
        let out = self.res_rx.recv_timeout(timeout).ok()?;
        Some(self.apply_result(out, cache, &current_rev))
    }

    /// Jobs submitted but not yet finished.
    pub fn pending(&self) -> usize {
        self.queued.load(Ordering::Relaxed) + self.inflight.load(Ordering::Relaxed)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ashlar_model::{Block, BlockPos, BlockState, ChunkCoord, SourceFormat};
    use ashlar_render::LodLevel;
    use std::time::Duration;

    fn test_structure() -> Arc<Structure> {
        let state = Arc::new(BlockState::simple("minecraft:stone").unwrap());
        let blocks = (0..32)
            .map(|x| Block::new(BlockPos::new(x, 0, 0), state.clone()))
            .collect();
        Arc::new(Structure::new(1, "runtime-test", SourceFormat::Schematic, blocks).unwrap())
    }

    fn key_for(chunk: ChunkCoord) -> MeshKey {
        MeshKey {
            structure: 1,
            chunk,
            lod: LodLevel::L0,
        }
    }

    #[test]
    fn parallel_chunk_builds_land_in_the_cache() {
        let rt = Runtime::with_workers(2);
        let cache = MeshCache::new(16);
        let structure = test_structure();
        let atlas = Arc::new(TextureAtlas::fallback_only());

        for coord in structure.chunks() {
            assert!(rt.schedule(key_for(coord), &structure, &atlas).is_some());
        }
        for _ in 0..2 {
            let stored = rt
                .drain_next(&cache, |_| structure.rev(), Duration::from_secs(5))
                .expect("build finished in time");
            assert!(stored);
        }
        for coord in structure.chunks() {
            let mesh = cache.get(&key_for(coord)).unwrap();
            assert!(mesh.quad_count() > 0);
        }
    }

    #[test]
    fn duplicate_schedules_are_rejected_until_drained() {
        let rt = Runtime::with_workers(1);
        let structure = test_structure();
        let atlas = Arc::new(TextureAtlas::fallback_only());
        let key = key_for(ChunkCoord::new(0, 0, 0));
        assert!(rt.schedule(key, &structure, &atlas).is_some());
        assert!(rt.schedule(key, &structure, &atlas).is_none());
    }

    #[test]
    fn cancelled_job_does_not_reach_the_cache() {
        let rt = Runtime::with_workers(1);
        let cache = MeshCache::new(16);
        let structure = test_structure();
        let atlas = Arc::new(TextureAtlas::fallback_only());
        let key = key_for(ChunkCoord::new(0, 0, 0));

        let cancel = rt.schedule(key, &structure, &atlas).unwrap();
        cancel.store(true, Ordering::Relaxed);

        let stored = rt
            .drain_next(&cache, |_| structure.rev(), Duration::from_secs(5))
            .expect("result arrived");
        assert!(!stored, "cancelled build is abandoned");
        assert!(cache.get(&key).is_none());
        // The key is free again for a clean retry.
        assert!(rt.schedule(key, &structure, &atlas).is_some());
    }

    #[test]
    fn stale_revision_results_are_dropped() {
        let rt = Runtime::with_workers(1);
        let cache = MeshCache::new(16);
        let structure = test_structure();
        let atlas = Arc::new(TextureAtlas::fallback_only());
        let key = key_for(ChunkCoord::new(0, 0, 0));

        rt.schedule(key, &structure, &atlas).unwrap();
        // Pretend the structure was edited while the job ran.
        let newer_rev = structure.rev() + 1;
        let stored = rt
            .drain_next(&cache, |_| newer_rev, Duration::from_secs(5))
            .expect("result arrived");
        assert!(!stored, "stale revision is dropped");
        assert!(cache.get(&key).is_none());
    }
}
