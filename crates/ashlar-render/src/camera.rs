use ashlar_geom::Vec3;
use ashlar_model::BlockPos;

use crate::face::Face;
use crate::lod::RenderQuality;

/// Zoom floor; zoom actions clamp here instead of inverting the view.
pub const MIN_ZOOM: f32 = 0.1;

const PITCH_LIMIT: f32 = 89.0;

/// Viewer camera. Immutable; every mutator returns a new value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub yaw_deg: f32,
    pub pitch_deg: f32,
    pub zoom: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            yaw_deg: 315.0,
            pitch_deg: -30.0,
            zoom: 1.0,
        }
    }
}

impl Camera {
    pub fn forward(&self) -> Vec3 {
        let yaw_rad = self.yaw_deg.to_radians();
        let pitch_rad = self.pitch_deg.to_radians();
        Vec3::new(
            yaw_rad.cos() * pitch_rad.cos(),
            pitch_rad.sin(),
            yaw_rad.sin() * pitch_rad.cos(),
        )
        .normalized()
    }

    pub fn right(&self) -> Vec3 {
        self.forward().cross(Vec3::UP).normalized()
    }

    pub fn up(&self) -> Vec3 {
        self.right().cross(self.forward()).normalized()
    }

    fn rotated(self, dpitch: f32, dyaw: f32) -> Camera {
        Camera {
            pitch_deg: (self.pitch_deg + dpitch).clamp(-PITCH_LIMIT, PITCH_LIMIT),
            yaw_deg: (self.yaw_deg + dyaw).rem_euclid(360.0),
            ..self
        }
    }

    fn zoomed(self, dz: f32) -> Camera {
        Camera {
            zoom: (self.zoom + dz).max(MIN_ZOOM),
            ..self
        }
    }

    fn panned(self, dx: f32, dy: f32) -> Camera {
        Camera {
            position: self.position + self.right() * dx + self.up() * dy,
            ..self
        }
    }
}

/// A picked block plus the face that was struck.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Selection {
    pub pos: BlockPos,
    pub face: Face,
}

/// Camera / view-state transitions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CameraAction {
    Rotate { dpitch: f32, dyaw: f32 },
    Zoom(f32),
    Pan { dx: f32, dy: f32 },
    Reset,
}

/// Aggregate view state: pure state machine, `state x action -> state`.
/// The prior instance is never modified, so states are safely shareable.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderState {
    pub camera: Camera,
    pub quality: RenderQuality,
    pub selection: Option<Selection>,
}

impl RenderState {
    pub fn new(quality: RenderQuality) -> Self {
        Self {
            camera: Camera::default(),
            quality,
            selection: None,
        }
    }

    pub fn apply(&self, action: CameraAction) -> RenderState {
        let camera = match action {
            CameraAction::Rotate { dpitch, dyaw } => self.camera.rotated(dpitch, dyaw),
            CameraAction::Zoom(dz) => self.camera.zoomed(dz),
            CameraAction::Pan { dx, dy } => self.camera.panned(dx, dy),
            CameraAction::Reset => Camera::default(),
        };
        RenderState {
            camera,
            quality: self.quality.clone(),
            selection: self.selection,
        }
    }

    pub fn with_selection(&self, selection: Option<Selection>) -> RenderState {
        RenderState {
            selection,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> RenderState {
        RenderState::new(RenderQuality::medium())
    }

    #[test]
    fn pitch_clamps_at_ninety_minus_one() {
        let s = state().apply(CameraAction::Rotate {
            dpitch: 500.0,
            dyaw: 0.0,
        });
        assert_eq!(s.camera.pitch_deg, PITCH_LIMIT);
        let s = s.apply(CameraAction::Rotate {
            dpitch: -1000.0,
            dyaw: 0.0,
        });
        assert_eq!(s.camera.pitch_deg, -PITCH_LIMIT);
    }

    #[test]
    fn yaw_wraps_into_zero_to_360() {
        let s = state().apply(CameraAction::Rotate {
            dpitch: 0.0,
            dyaw: 450.0,
        });
        assert!((0.0..360.0).contains(&s.camera.yaw_deg));
        assert_eq!(s.camera.yaw_deg, (315.0f32 + 450.0).rem_euclid(360.0));
    }

    #[test]
    fn zoom_never_drops_below_minimum() {
        let mut s = state();
        for _ in 0..5 {
            s = s.apply(CameraAction::Zoom(-1000.0));
        }
        assert_eq!(s.camera.zoom, MIN_ZOOM);
    }

    #[test]
    fn reset_restores_default_camera_but_keeps_selection() {
        let sel = Selection {
            pos: BlockPos::new(1, 2, 3),
            face: Face::PosY,
        };
        let s = state()
            .apply(CameraAction::Pan { dx: 5.0, dy: -3.0 })
            .apply(CameraAction::Zoom(4.0))
            .with_selection(Some(sel));
        let r = s.apply(CameraAction::Reset);
        assert_eq!(r.camera, Camera::default());
        assert_eq!(r.selection, Some(sel));
        assert_eq!(r.quality, s.quality);
    }

    #[test]
    fn transitions_do_not_alias_the_prior_state() {
        let s = state();
        let before = s.clone();
        let _ = s.apply(CameraAction::Pan { dx: 1.0, dy: 1.0 });
        assert_eq!(s, before);
    }

    #[test]
    fn pan_moves_along_local_axes() {
        let s = state().apply(CameraAction::Pan { dx: 2.0, dy: 1.0 });
        let cam = Camera::default();
        let expect = cam.position + cam.right() * 2.0 + cam.up() * 1.0;
        assert!((s.camera.position - expect).length() < 1e-5);
    }
}
