// ============================================================================
// SCENE MODEL: garment, the single artwork entity, editor flags, control box
// ============================================================================
//
// The scene is the single source of truth for what the canvas shows. Every
// mutation goes through the methods below; each one leaves the editor
// invariants intact before it returns:
//
//   * `selected` is only ever true while an artwork exists
//   * the control box exists exactly when the artwork is selected, and always
//     matches the artwork's latest transform
//   * previewing hides selection without forgetting it

use egui::{Pos2, Rect, Vec2, pos2, vec2};
use uuid::Uuid;

use crate::assets::Bitmap;
use crate::garment::Garment;

/// Logical canvas size (the export multiplies this by the pixel ratio).
pub const CANVAS_WIDTH: f32 = 360.0;
pub const CANVAS_HEIGHT: f32 = 420.0;

/// Side of the square an incoming artwork is fitted into.
pub const DEFAULT_ARTWORK_EXTENT: f32 = 80.0;

/// Smallest width/height a resize gesture may produce.
pub const MIN_ARTWORK_SIDE: f32 = 4.0;

/// Tolerance used by hit tests so that clicks exactly on an edge count as inside.
const HIT_EPSILON: f32 = 1e-3;

/// The dashed print-area rectangle drawn over the garment.
pub fn guide_region() -> Rect {
    Rect::from_min_size(pos2(108.0, 130.0), vec2(140.0, 195.0))
}

pub fn canvas_rect() -> Rect {
    Rect::from_min_size(Pos2::ZERO, vec2(CANVAS_WIDTH, CANVAS_HEIGHT))
}

/// Stable identity of an artwork instance. A replaced artwork gets a new id,
/// so anything holding the old one (an in-flight gesture, a cached texture)
/// can tell it is stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ArtworkId(Uuid);

impl ArtworkId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ArtworkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position / size / rotation of the artwork.
///
/// `position` is the top-left corner of the unrotated box and is also the
/// rotation pivot. `rotation` is in degrees, clockwise on screen.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ArtworkTransform {
    pub position: Pos2,
    pub size: Vec2,
    pub rotation: f32,
}

impl ArtworkTransform {
    fn cos_sin(&self) -> (f32, f32) {
        let rad = self.rotation.to_radians();
        (rad.cos(), rad.sin())
    }

    /// Map a point in the artwork's local frame (0..w, 0..h) to canvas coords.
    pub fn local_to_canvas(&self, local: Vec2) -> Pos2 {
        let (cos, sin) = self.cos_sin();
        Pos2::new(
            self.position.x + local.x * cos - local.y * sin,
            self.position.y + local.x * sin + local.y * cos,
        )
    }

    /// Inverse of [`local_to_canvas`](Self::local_to_canvas).
    pub fn canvas_to_local(&self, p: Pos2) -> Vec2 {
        let (cos, sin) = self.cos_sin();
        let dx = p.x - self.position.x;
        let dy = p.y - self.position.y;
        Vec2::new(dx * cos + dy * sin, -dx * sin + dy * cos)
    }

    /// Rotate a canvas-space vector into the artwork's local axes.
    pub fn vector_to_local(&self, v: Vec2) -> Vec2 {
        let (cos, sin) = self.cos_sin();
        Vec2::new(v.x * cos + v.y * sin, -v.x * sin + v.y * cos)
    }

    /// Corners in canvas coords: [top-left, top-right, bottom-right, bottom-left].
    pub fn corners(&self) -> [Pos2; 4] {
        let (w, h) = (self.size.x, self.size.y);
        [
            self.local_to_canvas(Vec2::new(0.0, 0.0)),
            self.local_to_canvas(Vec2::new(w, 0.0)),
            self.local_to_canvas(Vec2::new(w, h)),
            self.local_to_canvas(Vec2::new(0.0, h)),
        ]
    }

    pub fn center(&self) -> Pos2 {
        self.local_to_canvas(self.size * 0.5)
    }

    /// Inclusive point-in-rotated-box test.
    pub fn contains(&self, p: Pos2) -> bool {
        let local = self.canvas_to_local(p);
        local.x >= -HIT_EPSILON
            && local.y >= -HIT_EPSILON
            && local.x <= self.size.x + HIT_EPSILON
            && local.y <= self.size.y + HIT_EPSILON
    }

    /// Axis-aligned bounds of the rotated box.
    pub fn bounds(&self) -> ControlBox {
        let corners = self.corners();
        let mut min = corners[0];
        let mut max = corners[0];
        for c in &corners[1..] {
            min = min.min(*c);
            max = max.max(*c);
        }
        ControlBox {
            x: min.x,
            y: min.y,
            width: max.x - min.x,
            height: max.y - min.y,
        }
    }
}

/// The single user-supplied image placed on the garment.
#[derive(Clone)]
pub struct Artwork {
    pub id: ArtworkId,
    pub bitmap: Bitmap,
    pub transform: ArtworkTransform,
    /// Cleared while previewing; pointer gestures ignore a non-draggable artwork.
    pub draggable: bool,
}

impl std::fmt::Debug for Artwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Artwork")
            .field("id", &self.id)
            .field("bitmap", &(self.bitmap.width(), self.bitmap.height()))
            .field("transform", &self.transform)
            .field("draggable", &self.draggable)
            .finish()
    }
}

/// Axis-aligned screen-space bounds of the artwork after rotation/scaling.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ControlBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl ControlBox {
    pub fn top_right(&self) -> Pos2 {
        pos2(self.x + self.width, self.y)
    }

    /// Where the delete glyph sits: an 18 px box hanging off the top-right corner.
    pub fn delete_glyph_rect(&self) -> Rect {
        let tr = self.top_right();
        Rect::from_min_size(pos2(tr.x - 5.0, tr.y - 20.0), Vec2::splat(18.0))
    }

    /// Component-wise comparison within `tolerance`.
    pub fn approx_eq(&self, other: &ControlBox, tolerance: f32) -> bool {
        (self.x - other.x).abs() <= tolerance
            && (self.y - other.y).abs() <= tolerance
            && (self.width - other.width).abs() <= tolerance
            && (self.height - other.height).abs() <= tolerance
    }
}

/// UI flags. `selected` is the underlying selection; while `previewing`
/// it is kept but never shown (see [`Scene::is_selected`]).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EditorState {
    pub selected: bool,
    pub previewing: bool,
    pub uploading: bool,
}

/// Complete compositional state of one editor session.
pub struct Scene {
    garment: Garment,
    artwork: Option<Artwork>,
    state: EditorState,
    control_box: Option<ControlBox>,
    /// Bumped by every mutation; renderers cache against it.
    generation: u64,
}

impl Scene {
    pub fn new(garment: Garment) -> Self {
        Self {
            garment,
            artwork: None,
            state: EditorState::default(),
            control_box: None,
            generation: 0,
        }
    }

    pub fn garment(&self) -> &Garment {
        &self.garment
    }

    pub fn artwork(&self) -> Option<&Artwork> {
        self.artwork.as_ref()
    }

    pub fn state(&self) -> EditorState {
        self.state
    }

    pub fn control_box(&self) -> Option<ControlBox> {
        self.control_box
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Selection as the user sees it: never while previewing.
    pub fn is_selected(&self) -> bool {
        self.state.selected && !self.state.previewing
    }

    /// Guide region, selection frame and delete glyph are only drawn in edit mode.
    pub fn shows_chrome(&self) -> bool {
        !self.state.previewing
    }

    /// Resolve an artwork id to its bitmap. Stale ids resolve to nothing.
    pub fn bitmap(&self, id: ArtworkId) -> Option<&Bitmap> {
        self.artwork
            .as_ref()
            .filter(|a| a.id == id)
            .map(|a| &a.bitmap)
    }

    fn touch(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    /// Swap in a different garment (the external selection changed).
    pub fn set_garment(&mut self, garment: Garment) {
        self.garment = garment;
        self.touch();
    }

    /// Replace the artwork with a new bitmap at the default placement.
    /// Any previous artwork, its selection and its control box are dropped.
    pub fn set_artwork(&mut self, bitmap: Bitmap) -> ArtworkId {
        let transform = default_placement(bitmap.width(), bitmap.height());
        let id = ArtworkId::new();
        self.artwork = Some(Artwork {
            id,
            bitmap,
            transform,
            draggable: !self.state.previewing,
        });
        self.state.selected = false;
        self.control_box = None;
        self.touch();
        tracing::info!(%id, "artwork placed at {:?}", transform);
        id
    }

    /// Change any subset of the artwork transform. Returns false (and does
    /// nothing) when there is no artwork.
    pub fn update_transform(
        &mut self,
        position: Option<Pos2>,
        size: Option<Vec2>,
        rotation: Option<f32>,
    ) -> bool {
        let Some(artwork) = self.artwork.as_mut() else {
            return false;
        };
        let t = &mut artwork.transform;
        if let Some(p) = position {
            t.position = p;
        }
        if let Some(s) = size {
            t.size = Vec2::new(s.x.max(MIN_ARTWORK_SIDE), s.y.max(MIN_ARTWORK_SIDE));
        }
        if let Some(r) = rotation {
            t.rotation = normalize_degrees(r);
        }
        self.refresh_control_box();
        self.touch();
        true
    }

    /// Remove the artwork together with its selection and control box.
    pub fn delete_artwork(&mut self) -> Option<Artwork> {
        let removed = self.artwork.take();
        self.state.selected = false;
        self.control_box = None;
        self.touch();
        if let Some(a) = &removed {
            tracing::info!(id = %a.id, "artwork deleted");
        }
        removed
    }

    pub fn set_preview(&mut self, previewing: bool) {
        if self.state.previewing == previewing {
            return;
        }
        self.state.previewing = previewing;
        if let Some(artwork) = self.artwork.as_mut() {
            artwork.draggable = !previewing;
        }
        self.touch();
        tracing::debug!(previewing, "preview toggled");
    }

    /// Select or deselect the artwork. Selecting without an artwork is refused.
    pub fn set_selected(&mut self, selected: bool) -> bool {
        if selected && self.artwork.is_none() {
            return false;
        }
        if self.state.selected != selected {
            self.state.selected = selected;
            self.touch();
        }
        self.refresh_control_box();
        true
    }

    pub fn set_uploading(&mut self, uploading: bool) {
        if self.state.uploading != uploading {
            self.state.uploading = uploading;
            self.touch();
        }
    }

    fn refresh_control_box(&mut self) {
        self.control_box = match (&self.artwork, self.state.selected) {
            (Some(a), true) => Some(a.transform.bounds()),
            _ => None,
        };
    }
}

/// Fit the bitmap inside the default square, keep its aspect, centre it in the guide.
pub fn default_placement(width: u32, height: u32) -> ArtworkTransform {
    let (w, h) = (width.max(1) as f32, height.max(1) as f32);
    let scale = DEFAULT_ARTWORK_EXTENT / w.max(h);
    let size = Vec2::new(
        (w * scale).max(MIN_ARTWORK_SIDE),
        (h * scale).max(MIN_ARTWORK_SIDE),
    );
    let center = guide_region().center();
    ArtworkTransform {
        position: center - size * 0.5,
        size,
        rotation: 0.0,
    }
}

/// Wrap degrees into (-180, 180].
pub fn normalize_degrees(deg: f32) -> f32 {
    let mut d = deg % 360.0;
    if d <= -180.0 {
        d += 360.0;
    } else if d > 180.0 {
        d -= 360.0;
    }
    d
}
