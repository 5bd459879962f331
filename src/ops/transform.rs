// ============================================================================
// TRANSFORM CONTROLLER: pointer gestures → artwork move / resize / rotate
// ============================================================================
//
// All coordinates are canvas coordinates. The controller owns nothing but the
// in-flight gesture; selection and the control box live in the scene and are
// only ever changed through its mutators, so the control box is recomputed in
// the same call that moves the artwork.

use egui::{Pos2, Vec2, pos2, vec2};

use crate::scene::{ArtworkId, ArtworkTransform, MIN_ARTWORK_SIDE, Scene};

/// Drawn radius of a handle disc.
pub const HANDLE_RADIUS: f32 = 4.0;
/// Pointer distance within which a handle is grabbed.
pub const HANDLE_GRAB_RADIUS: f32 = 7.0;
/// Distance of the rotate handle above the top edge.
pub const ROTATE_HANDLE_OFFSET: f32 = 50.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handle {
    TopLeft,
    Top,
    TopRight,
    Right,
    BottomRight,
    Bottom,
    BottomLeft,
    Left,
    Rotate,
}

impl Handle {
    pub const RESIZE: [Handle; 8] = [
        Handle::TopLeft,
        Handle::Top,
        Handle::TopRight,
        Handle::Right,
        Handle::BottomRight,
        Handle::Bottom,
        Handle::BottomLeft,
        Handle::Left,
    ];

    pub fn is_corner(&self) -> bool {
        matches!(
            self,
            Handle::TopLeft | Handle::TopRight | Handle::BottomRight | Handle::BottomLeft
        )
    }

    /// Handle location as a fraction of the artwork box (0, 0.5 or 1 per axis).
    fn anchor(&self) -> Vec2 {
        match self {
            Handle::TopLeft => vec2(0.0, 0.0),
            Handle::Top | Handle::Rotate => vec2(0.5, 0.0),
            Handle::TopRight => vec2(1.0, 0.0),
            Handle::Right => vec2(1.0, 0.5),
            Handle::BottomRight => vec2(1.0, 1.0),
            Handle::Bottom => vec2(0.5, 1.0),
            Handle::BottomLeft => vec2(0.0, 1.0),
            Handle::Left => vec2(0.0, 0.5),
        }
    }
}

/// Where a handle sits on the canvas for the given transform.
pub fn handle_position(t: &ArtworkTransform, handle: Handle) -> Pos2 {
    let a = handle.anchor();
    let mut local = vec2(a.x * t.size.x, a.y * t.size.y);
    if handle == Handle::Rotate {
        local.y = -ROTATE_HANDLE_OFFSET;
    }
    t.local_to_canvas(local)
}

/// What a pointer position lands on, in priority order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    DeleteGlyph,
    Handle(Handle),
    Body,
    Canvas,
}

pub fn hit_test(scene: &Scene, p: Pos2) -> Target {
    let Some(artwork) = scene.artwork() else {
        return Target::Canvas;
    };
    if scene.is_selected() {
        if let Some(cb) = scene.control_box() {
            if cb.delete_glyph_rect().contains(p) {
                return Target::DeleteGlyph;
            }
        }
        let t = &artwork.transform;
        let near = |h: Handle| handle_position(t, h).distance(p) <= HANDLE_GRAB_RADIUS;
        if near(Handle::Rotate) {
            return Target::Handle(Handle::Rotate);
        }
        if let Some(h) = Handle::RESIZE.into_iter().find(|h| near(*h)) {
            return Target::Handle(h);
        }
    }
    if artwork.transform.contains(p) {
        Target::Body
    } else {
        Target::Canvas
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GestureKind {
    Drag,
    Resize(Handle),
    Rotate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Selected,
    Dragging,
    Resizing(Handle),
    Rotating,
}

/// Result of a pointer press.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerAction {
    /// Previewing, no artwork under a locked scene, or nothing to do.
    Ignored,
    Deselected,
    Deleted,
    Began(GestureKind),
}

/// An in-flight gesture, tied to the artwork it started on.
#[derive(Clone, Copy, Debug)]
struct Gesture {
    artwork: ArtworkId,
    kind: GestureKind,
    origin: Pos2,
    start: ArtworkTransform,
    /// Set by the first pointer move; a press without movement is a click.
    engaged: bool,
}

#[derive(Default)]
pub struct TransformController {
    gesture: Option<Gesture>,
}

impl TransformController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self, scene: &Scene) -> Phase {
        match self.gesture.filter(|g| g.engaged) {
            Some(g) => match g.kind {
                GestureKind::Drag => Phase::Dragging,
                GestureKind::Resize(h) => Phase::Resizing(h),
                GestureKind::Rotate => Phase::Rotating,
            },
            None if scene.is_selected() => Phase::Selected,
            None => Phase::Idle,
        }
    }

    pub fn is_active(&self) -> bool {
        self.gesture.is_some()
    }

    pub fn pointer_down(&mut self, scene: &mut Scene, p: Pos2) -> PointerAction {
        self.gesture = None;
        if scene.state().previewing {
            return PointerAction::Ignored;
        }
        let target = hit_test(scene, p);
        let Some(artwork) = scene.artwork() else {
            return PointerAction::Ignored;
        };
        if !artwork.draggable {
            return PointerAction::Ignored;
        }
        let (id, start) = (artwork.id, artwork.transform);

        let kind = match target {
            Target::DeleteGlyph => {
                scene.delete_artwork();
                return PointerAction::Deleted;
            }
            Target::Canvas => {
                scene.set_selected(false);
                return PointerAction::Deselected;
            }
            Target::Handle(Handle::Rotate) => GestureKind::Rotate,
            Target::Handle(h) => GestureKind::Resize(h),
            Target::Body => {
                scene.set_selected(true);
                GestureKind::Drag
            }
        };
        self.gesture = Some(Gesture {
            artwork: id,
            kind,
            origin: p,
            start,
            engaged: false,
        });
        tracing::trace!(?kind, "gesture started");
        PointerAction::Began(kind)
    }

    /// Apply the gesture for the current pointer position. Returns true when
    /// the artwork transform changed.
    pub fn pointer_move(&mut self, scene: &mut Scene, p: Pos2) -> bool {
        let Some(gesture) = self.gesture.as_mut() else {
            return false;
        };
        let live = scene.artwork().is_some_and(|a| a.id == gesture.artwork);
        if !live || scene.state().previewing {
            self.gesture = None;
            return false;
        }
        gesture.engaged = true;

        let delta = p - gesture.origin;
        let start = gesture.start;
        let next = match gesture.kind {
            GestureKind::Drag => ArtworkTransform {
                position: start.position + delta,
                ..start
            },
            GestureKind::Resize(handle) => resize(&start, handle, delta),
            GestureKind::Rotate => rotate(&start, gesture.origin, p),
        };
        scene.update_transform(Some(next.position), Some(next.size), Some(next.rotation))
    }

    /// Ends the gesture. Returns true if one was in progress.
    pub fn pointer_up(&mut self, _scene: &mut Scene) -> bool {
        match self.gesture.take() {
            Some(g) => {
                tracing::trace!(kind = ?g.kind, engaged = g.engaged, "gesture ended");
                true
            }
            None => false,
        }
    }

    /// Abort the gesture and put the artwork back where it started.
    pub fn cancel(&mut self, scene: &mut Scene) {
        if let Some(g) = self.gesture.take() {
            if g.engaged && scene.artwork().is_some_and(|a| a.id == g.artwork) {
                let t = g.start;
                scene.update_transform(Some(t.position), Some(t.size), Some(t.rotation));
            }
        }
    }
}

/// Place a box of `size` (rotated by `rotation`) so that the point at
/// fraction `frac` of it lands on `fixed`.
fn anchored(fixed: Pos2, frac: Vec2, size: Vec2, rotation: f32) -> Pos2 {
    let unplaced = ArtworkTransform {
        position: Pos2::ZERO,
        size,
        rotation,
    };
    let offset = unplaced.local_to_canvas(vec2(frac.x * size.x, frac.y * size.y));
    fixed - offset.to_vec2()
}

/// Corners scale proportionally, edges along their own axis; the opposite
/// corner or edge stays put.
fn resize(start: &ArtworkTransform, handle: Handle, delta: Vec2) -> ArtworkTransform {
    let local = start.vector_to_local(delta);
    let a = handle.anchor();
    let grow = |frac: f32, d: f32| {
        if frac == 1.0 {
            d
        } else if frac == 0.0 {
            -d
        } else {
            0.0
        }
    };
    let (w0, h0) = (start.size.x, start.size.y);
    let raw = vec2(w0 + grow(a.x, local.x), h0 + grow(a.y, local.y));

    let size = if handle.is_corner() {
        // Project the raw size onto the start diagonal.
        let scale = (raw.x * w0 + raw.y * h0) / (w0 * w0 + h0 * h0);
        let min_scale = MIN_ARTWORK_SIDE / w0.min(h0);
        start.size * scale.max(min_scale)
    } else {
        vec2(raw.x.max(MIN_ARTWORK_SIDE), raw.y.max(MIN_ARTWORK_SIDE))
    };

    let fixed_frac = vec2(1.0 - a.x, 1.0 - a.y);
    let fixed = start.local_to_canvas(vec2(fixed_frac.x * w0, fixed_frac.y * h0));
    ArtworkTransform {
        position: anchored(fixed, fixed_frac, size, start.rotation),
        size,
        rotation: start.rotation,
    }
}

/// Rotation about the artwork's visual centre, following the pointer angle.
fn rotate(start: &ArtworkTransform, origin: Pos2, p: Pos2) -> ArtworkTransform {
    let center = start.center();
    let angle = |q: Pos2| (q.y - center.y).atan2(q.x - center.x);
    let rotation = start.rotation + (angle(p) - angle(origin)).to_degrees();
    ArtworkTransform {
        position: anchored(center, vec2(0.5, 0.5), start.size, rotation),
        size: start.size,
        rotation,
    }
}

/// Convenience for hosts that track the pointer in another space.
pub fn to_canvas(screen: Pos2, canvas_origin: Pos2, scale: f32) -> Pos2 {
    let s = if scale > 0.0 { scale } else { 1.0 };
    pos2((screen.x - canvas_origin.x) / s, (screen.y - canvas_origin.y) / s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::garment::{Garment, GarmentKey};
    use image::{Rgba, RgbaImage};
    use std::sync::Arc;

    fn scene_with_artwork() -> Scene {
        let mut s = Scene::new(Garment::builtin(GarmentKey::White));
        s.set_artwork(Arc::new(RgbaImage::from_pixel(40, 40, Rgba([0, 0, 0, 255]))));
        s
    }

    fn transform(s: &Scene) -> ArtworkTransform {
        s.artwork().unwrap().transform
    }

    fn close(a: Pos2, b: Pos2) -> bool {
        a.distance(b) < 1e-3
    }

    #[test]
    fn press_on_body_selects_and_drag_moves_exactly() {
        let mut s = scene_with_artwork();
        let mut c = TransformController::new();
        let start = transform(&s);
        let grab = start.center();

        assert_eq!(c.pointer_down(&mut s, grab), PointerAction::Began(GestureKind::Drag));
        assert_eq!(c.phase(&s), Phase::Selected);
        let cb_before = s.control_box().unwrap();

        assert!(c.pointer_move(&mut s, grab + vec2(20.0, -10.0)));
        assert_eq!(c.phase(&s), Phase::Dragging);
        let moved = transform(&s);
        assert_eq!(moved.position, start.position + vec2(20.0, -10.0));

        let cb = s.control_box().unwrap();
        assert!((cb.x - cb_before.x - 20.0).abs() < 1e-4);
        assert!((cb.y - cb_before.y + 10.0).abs() < 1e-4);
        assert!(c.pointer_up(&mut s));
        assert_eq!(c.phase(&s), Phase::Selected);
    }

    #[test]
    fn control_box_tracks_every_move() {
        let mut s = scene_with_artwork();
        let mut c = TransformController::new();
        s.update_transform(None, None, Some(33.0));
        let grab = transform(&s).center();
        c.pointer_down(&mut s, grab);
        for step in 1..=5 {
            c.pointer_move(&mut s, grab + vec2(step as f32 * 3.0, step as f32));
            let expected = transform(&s).bounds();
            assert!(s.control_box().unwrap().approx_eq(&expected, 1e-4));
        }
    }

    #[test]
    fn delete_glyph_press_deletes() {
        let mut s = scene_with_artwork();
        let mut c = TransformController::new();
        let center = transform(&s).center();
        c.pointer_down(&mut s, center);
        c.pointer_up(&mut s);

        let glyph = s.control_box().unwrap().delete_glyph_rect().center();
        assert_eq!(c.pointer_down(&mut s, glyph), PointerAction::Deleted);
        assert!(s.artwork().is_none());
        assert!(!s.state().selected);
        assert!(s.control_box().is_none());
        assert_eq!(c.phase(&s), Phase::Idle);
    }

    #[test]
    fn press_on_empty_canvas_deselects() {
        let mut s = scene_with_artwork();
        let mut c = TransformController::new();
        let center = transform(&s).center();
        c.pointer_down(&mut s, center);
        c.pointer_up(&mut s);
        assert!(s.is_selected());

        assert_eq!(c.pointer_down(&mut s, pos2(2.0, 2.0)), PointerAction::Deselected);
        assert!(!s.state().selected);
        assert!(s.control_box().is_none());
    }

    #[test]
    fn boundary_press_counts_as_artwork() {
        let mut s = scene_with_artwork();
        let mut c = TransformController::new();
        let t = transform(&s);
        let edge = pos2(t.position.x + t.size.x * 0.5, t.position.y + t.size.y);
        assert_eq!(c.pointer_down(&mut s, edge), PointerAction::Began(GestureKind::Drag));
        assert!(s.is_selected());
    }

    #[test]
    fn corner_resize_keeps_aspect_and_opposite_corner() {
        let mut s = scene_with_artwork();
        let mut c = TransformController::new();
        s.update_transform(None, None, Some(30.0));
        let center = transform(&s).center();
        c.pointer_down(&mut s, center);
        c.pointer_up(&mut s);

        let t0 = transform(&s);
        let fixed = t0.corners()[0];
        let grab = handle_position(&t0, Handle::BottomRight);
        assert_eq!(
            c.pointer_down(&mut s, grab),
            PointerAction::Began(GestureKind::Resize(Handle::BottomRight))
        );
        // Pull along the diagonal by half its length.
        let diagonal = t0.corners()[2] - t0.corners()[0];
        c.pointer_move(&mut s, grab + diagonal * 0.5);

        let t1 = transform(&s);
        assert!((t1.size.x - 120.0).abs() < 1e-3 && (t1.size.y - 120.0).abs() < 1e-3);
        assert!(close(t1.corners()[0], fixed));
        assert_eq!(t1.rotation, 30.0);
    }

    #[test]
    fn edge_resize_changes_one_axis() {
        let mut s = scene_with_artwork();
        let mut c = TransformController::new();
        let center = transform(&s).center();
        c.pointer_down(&mut s, center);
        c.pointer_up(&mut s);

        let t0 = transform(&s);
        let grab = handle_position(&t0, Handle::Left);
        c.pointer_down(&mut s, grab);
        c.pointer_move(&mut s, grab + vec2(-15.0, 30.0));

        let t1 = transform(&s);
        assert!((t1.size.x - 95.0).abs() < 1e-3);
        assert_eq!(t1.size.y, t0.size.y);
        assert!(close(t1.corners()[1], t0.corners()[1]));
    }

    #[test]
    fn resize_never_goes_below_minimum() {
        let mut s = scene_with_artwork();
        let mut c = TransformController::new();
        let center = transform(&s).center();
        c.pointer_down(&mut s, center);
        c.pointer_up(&mut s);

        let grab = handle_position(&transform(&s), Handle::BottomRight);
        c.pointer_down(&mut s, grab);
        c.pointer_move(&mut s, grab - vec2(500.0, 500.0));
        let t = transform(&s);
        assert!(t.size.x >= MIN_ARTWORK_SIDE && t.size.y >= MIN_ARTWORK_SIDE);
    }

    #[test]
    fn rotate_follows_pointer_without_snapping_and_keeps_centre() {
        let mut s = scene_with_artwork();
        let mut c = TransformController::new();
        let center = transform(&s).center();
        c.pointer_down(&mut s, center);
        c.pointer_up(&mut s);

        let t0 = transform(&s);
        let centre = t0.center();
        let grab = handle_position(&t0, Handle::Rotate);
        assert_eq!(c.pointer_down(&mut s, grab), PointerAction::Began(GestureKind::Rotate));

        let radius = centre.distance(grab);
        c.pointer_move(&mut s, centre + vec2(radius, 0.0));
        let t1 = transform(&s);
        assert!((t1.rotation - 90.0).abs() < 1e-3);
        assert!(close(t1.center(), centre));

        // 7 degrees past the start: no snap to 0/15/45.
        let a = (-83f32).to_radians();
        c.pointer_move(&mut s, centre + vec2(a.cos(), a.sin()) * radius);
        assert!((transform(&s).rotation - 7.0).abs() < 1e-3);
        assert_eq!(c.phase(&s), Phase::Rotating);
    }

    #[test]
    fn preview_ignores_pointer_and_drops_gestures() {
        let mut s = scene_with_artwork();
        let mut c = TransformController::new();
        let grab = transform(&s).center();
        c.pointer_down(&mut s, grab);
        s.set_preview(true);

        assert!(!c.pointer_move(&mut s, grab + vec2(5.0, 5.0)));
        assert!(!c.is_active());
        assert_eq!(c.pointer_down(&mut s, grab), PointerAction::Ignored);
        assert_eq!(c.phase(&s), Phase::Idle);
    }

    #[test]
    fn gesture_on_replaced_artwork_is_dropped() {
        let mut s = scene_with_artwork();
        let mut c = TransformController::new();
        let grab = transform(&s).center();
        c.pointer_down(&mut s, grab);
        s.set_artwork(Arc::new(RgbaImage::new(10, 10)));
        let placed = transform(&s);

        assert!(!c.pointer_move(&mut s, grab + vec2(30.0, 0.0)));
        assert_eq!(transform(&s), placed);
    }

    #[test]
    fn cancel_restores_the_start_transform() {
        let mut s = scene_with_artwork();
        let mut c = TransformController::new();
        let start = transform(&s);
        c.pointer_down(&mut s, start.center());
        c.pointer_move(&mut s, start.center() + vec2(12.0, 12.0));
        c.cancel(&mut s);
        assert_eq!(transform(&s).position, start.position);
        assert!(!c.is_active());
    }

    #[test]
    fn handles_only_hit_when_selected() {
        let mut s = scene_with_artwork();
        let rot = handle_position(&transform(&s), Handle::Rotate);
        assert_eq!(hit_test(&s, rot), Target::Canvas);
        s.set_selected(true);
        assert_eq!(hit_test(&s, rot), Target::Handle(Handle::Rotate));
    }
}
