use std::collections::HashMap;

use ashlar_geom::Vec3;
use ashlar_model::{CHUNK_SIZE, ChunkCoord, Structure};
use serde::Deserialize;

use crate::ConfigError;
use crate::camera::Camera;

/// Discrete detail tiers, ordered nearest to coarsest. Coarser tiers
/// merge multiple source blocks into one rendered cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LodLevel {
    L0,
    L1,
    L2,
    L3,
}

impl LodLevel {
    pub const ALL: [LodLevel; 4] = [LodLevel::L0, LodLevel::L1, LodLevel::L2, LodLevel::L3];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Edge length, in blocks, of one rendered cell at this tier.
    #[inline]
    pub fn cell_size(self) -> i32 {
        1 << self.index()
    }

    #[inline]
    pub fn from_index(i: usize) -> Option<LodLevel> {
        Self::ALL.get(i).copied()
    }
}

/// Named rendering preset: ordered LOD distance thresholds plus a view
/// distance bound. A configuration value, never mutated at runtime.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct RenderQuality {
    pub name: String,
    pub lod_thresholds: [f32; 3],
    pub view_distance: f32,
}

impl RenderQuality {
    pub fn low() -> Self {
        Self {
            name: "low".to_string(),
            lod_thresholds: [24.0, 48.0, 96.0],
            view_distance: 128.0,
        }
    }

    pub fn medium() -> Self {
        Self {
            name: "medium".to_string(),
            lod_thresholds: [48.0, 96.0, 192.0],
            view_distance: 256.0,
        }
    }

    pub fn high() -> Self {
        Self {
            name: "high".to_string(),
            lod_thresholds: [96.0, 192.0, 384.0],
            view_distance: 512.0,
        }
    }

    pub fn presets() -> Vec<RenderQuality> {
        vec![Self::low(), Self::medium(), Self::high()]
    }

    pub fn by_name(name: &str) -> Result<RenderQuality, ConfigError> {
        Self::presets()
            .into_iter()
            .find(|q| q.name == name)
            .ok_or_else(|| ConfigError::UnknownQuality(name.to_string()))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.lod_thresholds;
        if !(t[0] < t[1] && t[1] < t[2]) || t[0] <= 0.0 {
            return Err(ConfigError::ThresholdOrder(self.name.clone()));
        }
        if self.view_distance <= 0.0 {
            return Err(ConfigError::ViewDistance(self.name.clone()));
        }
        Ok(())
    }

    /// Loads preset overrides from TOML, sorted by name so iteration
    /// order is stable:
    ///
    /// ```toml
    /// [quality.fast]
    /// lod_thresholds = [16.0, 32.0, 64.0]
    /// view_distance = 96.0
    /// ```
    pub fn from_toml_str(toml_str: &str) -> Result<Vec<RenderQuality>, ConfigError> {
        #[derive(Deserialize)]
        struct Entry {
            lod_thresholds: [f32; 3],
            view_distance: f32,
        }
        #[derive(Deserialize)]
        struct QualityFile {
            quality: HashMap<String, Entry>,
        }
        let cfg: QualityFile = toml::from_str(toml_str)?;
        let mut entries: Vec<(String, Entry)> = cfg.quality.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        let mut out = Vec::with_capacity(entries.len());
        for (name, e) in entries {
            let q = RenderQuality {
                name,
                lod_thresholds: e.lod_thresholds,
                view_distance: e.view_distance,
            };
            q.validate()?;
            out.push(q);
        }
        Ok(out)
    }
}

/// Maps a camera-to-chunk-center distance onto a detail tier. Monotonic
/// in distance; a distance exactly at a threshold takes the coarser tier
/// (each threshold is the inclusive lower bound of the next tier).
pub fn lod_for_distance(distance: f32, quality: &RenderQuality) -> LodLevel {
    for (i, &threshold) in quality.lod_thresholds.iter().enumerate() {
        if distance < threshold {
            return LodLevel::ALL[i];
        }
    }
    LodLevel::L3
}

/// World-space center of a chunk.
#[inline]
pub fn chunk_center(coord: ChunkCoord) -> Vec3 {
    let base = coord.base();
    let half = CHUNK_SIZE as f32 * 0.5;
    Vec3::new(
        base.x as f32 + half,
        base.y as f32 + half,
        base.z as f32 + half,
    )
}

/// Occupied chunks within the quality's view distance, each paired with
/// the tier chosen from its center distance.
pub fn visible_chunks(
    structure: &Structure,
    camera: &Camera,
    quality: &RenderQuality,
) -> Vec<(ChunkCoord, LodLevel)> {
    structure
        .chunks()
        .into_iter()
        .filter_map(|coord| {
            let dist = camera.position.distance(chunk_center(coord));
            if dist > quality.view_distance {
                return None;
            }
            Some((coord, lod_for_distance(dist, quality)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_is_inclusive_lower_bound_of_coarser_tier() {
        let q = RenderQuality::medium();
        assert_eq!(lod_for_distance(47.9, &q), LodLevel::L0);
        assert_eq!(lod_for_distance(48.0, &q), LodLevel::L1);
        assert_eq!(lod_for_distance(96.0, &q), LodLevel::L2);
        assert_eq!(lod_for_distance(192.0, &q), LodLevel::L3);
        assert_eq!(lod_for_distance(1.0e6, &q), LodLevel::L3);
    }

    #[test]
    fn cell_sizes_double_per_tier() {
        assert_eq!(
            LodLevel::ALL.map(LodLevel::cell_size),
            [1, 2, 4, 8]
        );
    }

    #[test]
    fn toml_overrides_parse_and_validate() {
        let qs = RenderQuality::from_toml_str(
            r#"
            [quality.fast]
            lod_thresholds = [16.0, 32.0, 64.0]
            view_distance = 96.0
            "#,
        )
        .unwrap();
        assert_eq!(qs.len(), 1);
        assert_eq!(qs[0].name, "fast");

        let err = RenderQuality::from_toml_str(
            r#"
            [quality.bad]
            lod_thresholds = [32.0, 32.0, 64.0]
            view_distance = 96.0
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::ThresholdOrder(_)));
    }
}
