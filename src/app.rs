use std::error::Error;
use std::fs;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ashlar_geom::{Aabb, Vec3};
use ashlar_nbt::decode_structure;
use ashlar_render::{
    Camera, FlatTexturePort, MeshKey, NullRenderPort, RenderPort, RenderQuality, RenderState,
    TexturePort, visible_chunks,
};
use ashlar_runtime::{MeshCache, Runtime};
use log::{info, warn};

use crate::Args;

const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

pub fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    let bytes = fs::read(&args.file)?;
    let name = args
        .file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("structure");
    let t0 = Instant::now();
    let structure = Arc::new(decode_structure(&bytes, 1, name)?);
    info!(
        "decoded '{}' ({}): {} blocks, {} chunks in {} ms",
        structure.name(),
        structure.source(),
        structure.block_count(),
        structure.chunks().len(),
        t0.elapsed().as_millis()
    );

    let quality = load_quality(args)?;
    info!(
        "quality '{}': thresholds {:?}, view distance {}",
        quality.name, quality.lod_thresholds, quality.view_distance
    );

    let mut state = RenderState::new(quality);
    state.camera = frame_camera(&structure, &state.camera);

    let atlas = Arc::new(FlatTexturePort.load_default_atlas()?);
    let cache = MeshCache::new(MeshCache::capacity_for(&state.quality));
    let runtime = match args.workers {
        Some(n) => Runtime::with_workers(n),
        None => Runtime::new(),
    };
    info!("mesh runtime: {} workers", runtime.workers);

    let visible = visible_chunks(&structure, &state.camera, &state.quality);
    if visible.is_empty() {
        warn!("no chunks within view distance; nothing to draw");
        return Ok(());
    }

    let mut scheduled = 0usize;
    for &(chunk, lod) in &visible {
        let key = MeshKey {
            structure: structure.id(),
            chunk,
            lod,
        };
        if runtime.schedule(key, &structure, &atlas).is_some() {
            scheduled += 1;
        }
    }
    info!("scheduled {} chunk builds", scheduled);

    let rev = structure.rev();
    let mut stored = 0usize;
    for _ in 0..scheduled {
        match runtime.drain_next(&cache, |_| rev, DRAIN_TIMEOUT) {
            Some(true) => stored += 1,
            Some(false) => {}
            None => {
                warn!("timed out waiting for mesh builds");
                break;
            }
        }
    }

    let mut port = NullRenderPort::default();
    let mut frame = Vec::with_capacity(visible.len());
    let mut quads = 0usize;
    for &(chunk, lod) in &visible {
        let key = MeshKey {
            structure: structure.id(),
            chunk,
            lod,
        };
        if let Some(mesh) = cache.get(&key) {
            quads += mesh.quad_count();
            frame.push(mesh);
        }
    }
    port.submit(&frame);
    info!(
        "frame: {} of {} chunk meshes built ({} quads), {} submitted",
        stored,
        visible.len(),
        quads,
        port.submitted_meshes
    );

    let stats = cache.stats();
    info!(
        "cache: {} entries, {} hits, {} misses, {} evictions",
        stats.entries, stats.hits, stats.misses, stats.evictions
    );
    Ok(())
}

fn load_quality(args: &Args) -> Result<RenderQuality, Box<dyn Error>> {
    let mut presets = RenderQuality::presets();
    if let Some(path) = &args.quality_config {
        let overrides = RenderQuality::from_toml_str(&fs::read_to_string(path)?)?;
        info!("loaded {} quality presets from {:?}", overrides.len(), path);
        // Overrides shadow the built-in preset of the same name.
        presets.retain(|p| !overrides.iter().any(|o| o.name == p.name));
        presets.extend(overrides);
    }
    presets
        .into_iter()
        .find(|q| q.name == args.quality)
        .ok_or_else(|| format!("unknown quality preset '{}'", args.quality).into())
}

/// Places the camera back along its own view axis far enough that the
/// whole structure sits inside the medium LOD band.
fn frame_camera(structure: &ashlar_model::Structure, camera: &Camera) -> Camera {
    let Some((min, max)) = structure.bounds() else {
        return *camera;
    };
    let bounds = Aabb::new(
        Vec3::new(min.x as f32, min.y as f32, min.z as f32),
        Vec3::new((max.x + 1) as f32, (max.y + 1) as f32, (max.z + 1) as f32),
    );
    let dist = bounds.diagonal().max(16.0);
    Camera {
        position: bounds.center() - camera.forward() * dist,
        ..*camera
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ashlar_model::{Block, BlockPos, BlockState, SourceFormat, Structure};

    #[test]
    fn framed_camera_keeps_structure_in_view() {
        let state = Arc::new(BlockState::simple("minecraft:stone").unwrap());
        let blocks = (0..8)
            .map(|x| Block::new(BlockPos::new(x, 0, 0), state.clone()))
            .collect();
        let structure = Structure::new(1, "t", SourceFormat::Schematic, blocks).unwrap();
        let camera = frame_camera(&structure, &Camera::default());
        let quality = RenderQuality::medium();
        let visible = visible_chunks(&structure, &camera, &quality);
        assert_eq!(visible.len(), 1);
    }

    #[test]
    fn empty_structure_leaves_camera_unchanged() {
        let structure = Structure::new(1, "t", SourceFormat::Schematic, Vec::new()).unwrap();
        let camera = Camera::default();
        assert_eq!(frame_camera(&structure, &camera), camera);
    }
}
