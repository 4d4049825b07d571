use ashlar_model::Structure;
use log::debug;

use crate::camera::{RenderState, Selection};
use crate::port::{RaycastHit, RenderPort};

/// Resolves a renderer hit against the structure's block mapping. A hit
/// at a position with no block is a renderer/model inconsistency and
/// resolves to "no selection" rather than an error.
pub fn resolve_selection(structure: &Structure, hit: RaycastHit) -> Option<Selection> {
    if structure.contains(hit.pos) {
        Some(Selection {
            pos: hit.pos,
            face: hit.face,
        })
    } else {
        debug!(
            "raycast hit {:?} has no block in structure {}; dropping selection",
            hit.pos,
            structure.id()
        );
        None
    }
}

/// Full pick path: raycast through the render port, then resolve against
/// the structure. Always returns a new state; a miss clears the
/// selection.
pub fn pick(
    state: &RenderState,
    structure: &Structure,
    port: &impl RenderPort,
    screen_x: f32,
    screen_y: f32,
) -> RenderState {
    let selection = port
        .raycast(screen_x, screen_y)
        .and_then(|hit| resolve_selection(structure, hit));
    state.with_selection(selection)
}
