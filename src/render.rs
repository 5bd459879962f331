// ============================================================================
// SCENE RENDERER: scene → display list (`Frame`) → RGBA raster
// ============================================================================
//
// `compose` decides *what* is drawn: it is a pure function of the scene and is
// where preview mode drops every editing layer. `rasterize` decides *how*: it
// paints a frame at any pixel scale on the CPU, resolving artwork bitmaps by id
// through the scene each time.

use egui::{Pos2, Rect, Vec2, pos2, vec2};
use image::RgbaImage;

use crate::assets::Bitmap;
use crate::ops::shapes::{
    PixelBounds, fill_coverage, paint_region, sdf_box, sdf_circle, sdf_line_segment, stroke_coverage,
};
use crate::ops::transform::{HANDLE_RADIUS, Handle, handle_position};
use crate::scene::{ArtworkId, ArtworkTransform, CANVAS_HEIGHT, CANVAS_WIDTH, Scene, guide_region};

/// `#a855f7`
pub const PURPLE: [u8; 4] = [168, 85, 247, 255];
/// `#ef4444`
pub const DELETE_RED: [u8; 4] = [239, 68, 68, 255];
pub const WHITE: [u8; 4] = [255, 255, 255, 255];

const GUIDE_DASH: f32 = 6.0;
const GUIDE_GAP: f32 = 4.0;
const STROKE_WIDTH: f32 = 1.0;
const GLYPH_STROKE_WIDTH: f32 = 2.0;
const GLYPH_INSET: f32 = 4.0;

/// Draw layers, back to front.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FrameLayer {
    Garment,
    GuideRegion,
    Artwork,
    SelectionFrame,
    DeleteGlyph,
}

impl FrameLayer {
    /// Editing affordances, never part of a preview or an export.
    pub fn is_chrome(&self) -> bool {
        matches!(
            self,
            FrameLayer::GuideRegion | FrameLayer::SelectionFrame | FrameLayer::DeleteGlyph
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Primitive {
    /// The scene's garment bitmap stretched into `placement`.
    Garment { placement: Rect },
    /// An artwork bitmap, looked up by id at raster time.
    Bitmap { artwork: ArtworkId, transform: ArtworkTransform },
    Segments {
        segments: Vec<(Pos2, Pos2)>,
        width: f32,
        color: [u8; 4],
    },
    Disc {
        center: Pos2,
        radius: f32,
        fill: [u8; 4],
        stroke: [u8; 4],
        stroke_width: f32,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct FrameItem {
    pub layer: FrameLayer,
    pub primitive: Primitive,
}

/// One drawn frame in canvas coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub size: Vec2,
    pub items: Vec<FrameItem>,
}

impl Frame {
    fn push(&mut self, layer: FrameLayer, primitive: Primitive) {
        self.items.push(FrameItem { layer, primitive });
    }

    pub fn has_layer(&self, layer: FrameLayer) -> bool {
        self.items.iter().any(|i| i.layer == layer)
    }

    pub fn has_chrome(&self) -> bool {
        self.items.iter().any(|i| i.layer.is_chrome())
    }
}

/// Split the outline of `rect` into dash segments.
fn dashed_rect(rect: Rect, dash: f32, gap: f32) -> Vec<(Pos2, Pos2)> {
    let corners = [rect.left_top(), rect.right_top(), rect.right_bottom(), rect.left_bottom()];
    let mut out = Vec::new();
    // The dash pattern continues around corners.
    let mut phase = 0.0f32;
    for i in 0..4 {
        let (a, b) = (corners[i], corners[(i + 1) % 4]);
        let len = a.distance(b);
        if len <= 0.0 {
            continue;
        }
        let dir = (b - a) / len;
        let mut t = 0.0;
        while t < len {
            let period_pos = phase % (dash + gap);
            let step = if period_pos < dash {
                let run = (dash - period_pos).min(len - t);
                out.push((a + dir * t, a + dir * (t + run)));
                run
            } else {
                (dash + gap - period_pos).min(len - t)
            };
            t += step;
            phase += step;
        }
    }
    out
}

pub fn compose(scene: &Scene) -> Frame {
    let mut frame = Frame {
        size: vec2(CANVAS_WIDTH, CANVAS_HEIGHT),
        items: Vec::new(),
    };
    frame.push(
        FrameLayer::Garment,
        Primitive::Garment {
            placement: scene.garment().placement,
        },
    );

    if scene.shows_chrome() {
        frame.push(
            FrameLayer::GuideRegion,
            Primitive::Segments {
                segments: dashed_rect(guide_region(), GUIDE_DASH, GUIDE_GAP),
                width: STROKE_WIDTH,
                color: PURPLE,
            },
        );
    }

    let Some(artwork) = scene.artwork() else {
        return frame;
    };
    let t = artwork.transform;
    frame.push(
        FrameLayer::Artwork,
        Primitive::Bitmap {
            artwork: artwork.id,
            transform: t,
        },
    );

    if !scene.is_selected() {
        return frame;
    }
    let c = t.corners();
    frame.push(
        FrameLayer::SelectionFrame,
        Primitive::Segments {
            segments: vec![(c[0], c[1]), (c[1], c[2]), (c[2], c[3]), (c[3], c[0])],
            width: STROKE_WIDTH,
            color: PURPLE,
        },
    );
    for handle in Handle::RESIZE.into_iter().chain([Handle::Rotate]) {
        frame.push(
            FrameLayer::SelectionFrame,
            Primitive::Disc {
                center: handle_position(&t, handle),
                radius: HANDLE_RADIUS,
                fill: WHITE,
                stroke: PURPLE,
                stroke_width: STROKE_WIDTH,
            },
        );
    }

    if let Some(cb) = scene.control_box() {
        let r = cb.delete_glyph_rect().shrink(GLYPH_INSET);
        frame.push(
            FrameLayer::DeleteGlyph,
            Primitive::Segments {
                segments: vec![
                    (r.left_top(), r.right_bottom()),
                    (r.right_top(), r.left_bottom()),
                ],
                width: GLYPH_STROKE_WIDTH,
                color: DELETE_RED,
            },
        );
    }
    frame
}

/// Bilinear sample at continuous texel coords, edges clamped. Interpolates
/// premultiplied colour so transparent texels don't bleed.
fn sample_bilinear(img: &RgbaImage, u: f32, v: f32) -> [u8; 4] {
    let (w, h) = img.dimensions();
    let x = (u - 0.5).clamp(0.0, (w - 1) as f32);
    let y = (v - 0.5).clamp(0.0, (h - 1) as f32);
    let (x0, y0) = (x.floor() as u32, y.floor() as u32);
    let (x1, y1) = ((x0 + 1).min(w - 1), (y0 + 1).min(h - 1));
    let (fx, fy) = (x - x0 as f32, y - y0 as f32);

    let mut acc = [0.0f32; 4];
    for (px, py, wgt) in [
        (x0, y0, (1.0 - fx) * (1.0 - fy)),
        (x1, y0, fx * (1.0 - fy)),
        (x0, y1, (1.0 - fx) * fy),
        (x1, y1, fx * fy),
    ] {
        let p = img.get_pixel(px, py).0;
        let a = p[3] as f32 / 255.0;
        acc[0] += p[0] as f32 * a * wgt;
        acc[1] += p[1] as f32 * a * wgt;
        acc[2] += p[2] as f32 * a * wgt;
        acc[3] += a * wgt;
    }
    if acc[3] <= 0.0 {
        return [0, 0, 0, 0];
    }
    let to_u8 = |c: f32| c.round().clamp(0.0, 255.0) as u8;
    [
        to_u8(acc[0] / acc[3]),
        to_u8(acc[1] / acc[3]),
        to_u8(acc[2] / acc[3]),
        to_u8(acc[3] * 255.0),
    ]
}

fn draw_bitmap(img: &mut RgbaImage, bitmap: &Bitmap, t: &ArtworkTransform, scale: f32) {
    // Nothing to sample from an empty bitmap.
    if t.size.x <= 0.0 || t.size.y <= 0.0 || bitmap.width() == 0 || bitmap.height() == 0 {
        return;
    }
    let b = t.bounds();
    let bounds = PixelBounds::from_extent(
        b.x * scale,
        b.y * scale,
        (b.x + b.width) * scale,
        (b.y + b.height) * scale,
        1.0,
        img.width(),
        img.height(),
    );
    let (bw, bh) = (bitmap.width() as f32, bitmap.height() as f32);
    let half = t.size * 0.5;
    paint_region(img, bounds, |px, py| {
        let local = t.canvas_to_local(pos2(px / scale, py / scale));
        let d = sdf_box(local.x - half.x, local.y - half.y, half.x, half.y) * scale;
        let coverage = fill_coverage(d);
        if coverage <= 0.0 {
            return None;
        }
        let color = sample_bilinear(bitmap, local.x / t.size.x * bw, local.y / t.size.y * bh);
        Some((color, coverage))
    });
}

fn draw_segments(img: &mut RgbaImage, segments: &[(Pos2, Pos2)], width: f32, color: [u8; 4], scale: f32) {
    let half = width * scale * 0.5;
    for &(a, b) in segments {
        let (a, b) = (pos2(a.x * scale, a.y * scale), pos2(b.x * scale, b.y * scale));
        let bounds = PixelBounds::from_extent(
            a.x.min(b.x),
            a.y.min(b.y),
            a.x.max(b.x),
            a.y.max(b.y),
            half + 1.0,
            img.width(),
            img.height(),
        );
        paint_region(img, bounds, |px, py| {
            let d = sdf_line_segment(px, py, a.x, a.y, b.x, b.y) - half;
            let coverage = fill_coverage(d);
            (coverage > 0.0).then_some((color, coverage))
        });
    }
}

fn draw_disc(img: &mut RgbaImage, center: Pos2, radius: f32, fill: [u8; 4], stroke: [u8; 4], stroke_width: f32, scale: f32) {
    let c = pos2(center.x * scale, center.y * scale);
    let r = radius * scale;
    let sw = stroke_width * scale;
    let bounds = PixelBounds::from_extent(c.x - r, c.y - r, c.x + r, c.y + r, sw + 1.0, img.width(), img.height());
    // Fill first, then the ring on top.
    paint_region(img, bounds, |px, py| {
        let coverage = fill_coverage(sdf_circle(px - c.x, py - c.y, r));
        (coverage > 0.0).then_some((fill, coverage))
    });
    paint_region(img, bounds, |px, py| {
        let coverage = stroke_coverage(sdf_circle(px - c.x, py - c.y, r), sw);
        (coverage > 0.0).then_some((stroke, coverage))
    });
}

/// Paint `frame` at `scale` device pixels per canvas unit. Transparent where
/// nothing is drawn.
pub fn rasterize(frame: &Frame, scene: &Scene, scale: f32) -> RgbaImage {
    let scale = if scale.is_finite() && scale > 0.0 { scale } else { 1.0 };
    let w = (frame.size.x * scale).round().max(1.0) as u32;
    let h = (frame.size.y * scale).round().max(1.0) as u32;
    let mut img = RgbaImage::new(w, h);

    for item in &frame.items {
        match &item.primitive {
            Primitive::Garment { placement } => {
                let t = ArtworkTransform {
                    position: placement.min,
                    size: placement.size(),
                    rotation: 0.0,
                };
                draw_bitmap(&mut img, &scene.garment().bitmap, &t, scale);
            }
            Primitive::Bitmap { artwork, transform } => match scene.bitmap(*artwork) {
                Some(bitmap) => draw_bitmap(&mut img, bitmap, transform, scale),
                None => tracing::trace!(%artwork, "stale artwork id in frame, skipped"),
            },
            Primitive::Segments { segments, width, color } => {
                draw_segments(&mut img, segments, *width, *color, scale);
            }
            Primitive::Disc {
                center,
                radius,
                fill,
                stroke,
                stroke_width,
            } => draw_disc(&mut img, *center, *radius, *fill, *stroke, *stroke_width, scale),
        }
    }
    img
}

/// `compose` + `rasterize`.
pub fn render(scene: &Scene, scale: f32) -> RgbaImage {
    rasterize(&compose(scene), scene, scale)
}
