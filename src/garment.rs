// ============================================================================
// GARMENT CATALOG: selection keys, bitmap resolution, built-in mockups
// ============================================================================

use std::path::{Path, PathBuf};
use std::sync::Arc;

use egui::{Rect, Vec2};
use image::RgbaImage;

use crate::assets::{self, Bitmap};
use crate::ops::shapes::{
    PixelBounds, fill_coverage, paint_region, sdf_ellipse, sdf_rounded_box, unrotate,
};
use crate::scene::canvas_rect;

/// Intrinsic size of a garment mockup bitmap.
pub const GARMENT_INTRINSIC: Vec2 = Vec2 { x: 480.0, y: 680.0 };
/// Intrinsic-to-canvas scale of the mockup.
pub const GARMENT_SCALE: f32 = 0.7;

/// The fixed set of garments a design can be placed on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum GarmentKey {
    Black,
    Navy,
    Maroon,
    DarkGrey,
    #[default]
    White,
}

impl GarmentKey {
    pub fn all() -> &'static [GarmentKey] {
        &[
            GarmentKey::Black,
            GarmentKey::Navy,
            GarmentKey::Maroon,
            GarmentKey::DarkGrey,
            GarmentKey::White,
        ]
    }

    /// Resolve an external selection parameter. Unknown or missing keys fall back to white.
    pub fn parse(key: Option<&str>) -> Self {
        let Some(key) = key else {
            return GarmentKey::White;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "black" => GarmentKey::Black,
            "navy" => GarmentKey::Navy,
            "maroon" => GarmentKey::Maroon,
            "darkgrey" => GarmentKey::DarkGrey,
            "white" => GarmentKey::White,
            other => {
                tracing::debug!("unknown garment key {other:?}, using white");
                GarmentKey::White
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GarmentKey::Black => "black",
            GarmentKey::Navy => "navy",
            GarmentKey::Maroon => "maroon",
            GarmentKey::DarkGrey => "darkgrey",
            GarmentKey::White => "white",
        }
    }

    /// File name of the mockup bitmap for this key.
    pub fn resource_name(&self) -> String {
        format!("{}.png", self.as_str())
    }

    /// Fabric colour used for the built-in mockup.
    pub fn fabric_color(&self) -> [u8; 3] {
        match self {
            GarmentKey::Black => [28, 28, 32],
            GarmentKey::Navy => [31, 42, 84],
            GarmentKey::Maroon => [112, 26, 40],
            GarmentKey::DarkGrey => [74, 76, 82],
            GarmentKey::White => [246, 246, 244],
        }
    }
}

impl std::fmt::Display for GarmentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a garment bitmap came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GarmentSource {
    Builtin,
    File(PathBuf),
}

/// Resolved background mockup. Immutable; replaced wholesale on reselection.
#[derive(Clone)]
pub struct Garment {
    pub key: GarmentKey,
    pub bitmap: Bitmap,
    pub source: GarmentSource,
    /// Where the bitmap lands on the canvas.
    pub placement: Rect,
}

impl std::fmt::Debug for Garment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Garment")
            .field("key", &self.key)
            .field("source", &self.source)
            .field("placement", &self.placement)
            .finish()
    }
}

impl Garment {
    pub fn from_bitmap(key: GarmentKey, bitmap: Bitmap, source: GarmentSource) -> Self {
        Self {
            key,
            bitmap,
            source,
            placement: default_placement(),
        }
    }

    /// Procedurally drawn mockup, always available.
    pub fn builtin(key: GarmentKey) -> Self {
        let bitmap = Arc::new(render_mockup(key.fabric_color()));
        Self::from_bitmap(key, bitmap, GarmentSource::Builtin)
    }

    /// Load `<key>.png` from `dir` when present and decodable, else the built-in mockup.
    pub fn resolve(key: GarmentKey, dir: Option<&Path>) -> Self {
        if let Some(dir) = dir {
            let path = dir.join(key.resource_name());
            match assets::load_path(&path) {
                Ok(bitmap) => {
                    tracing::info!("garment {key} loaded from {}", path.display());
                    return Self::from_bitmap(key, bitmap, GarmentSource::File(path));
                }
                Err(e) => {
                    tracing::warn!("garment {key}: {e}; using built-in mockup");
                }
            }
        }
        Self::builtin(key)
    }
}

/// Intrinsic size scaled down and centred on the canvas.
pub fn default_placement() -> Rect {
    Rect::from_center_size(canvas_rect().center(), GARMENT_INTRINSIC * GARMENT_SCALE)
}

/// Signed distance to a t-shirt silhouette in intrinsic (480 x 680) coords.
fn tshirt_sdf(x: f32, y: f32) -> f32 {
    let body = sdf_rounded_box(x - 240.0, y - 405.0, 145.0, 265.0, 14.0);
    let shoulders = sdf_rounded_box(x - 240.0, y - 175.0, 165.0, 45.0, 30.0);

    // Sleeves run down and outwards from the shoulders.
    let sleeve_angle = 43f32.to_radians();
    let (lx, ly) = unrotate(x - 118.0, y - 225.0, std::f32::consts::PI - sleeve_angle);
    let left = sdf_rounded_box(lx, ly, 92.0, 52.0, 10.0);
    let (rx, ry) = unrotate(x - 362.0, y - 225.0, sleeve_angle);
    let right = sdf_rounded_box(rx, ry, 92.0, 52.0, 10.0);

    let neck = sdf_ellipse(x - 240.0, y - 128.0, 62.0, 42.0);

    body.min(shoulders).min(left).min(right).max(-neck)
}

/// Draw the built-in mockup: fabric fill with soft vertical shading and a
/// darker seam line along the silhouette.
fn render_mockup(fabric: [u8; 3]) -> RgbaImage {
    let (w, h) = (GARMENT_INTRINSIC.x as u32, GARMENT_INTRINSIC.y as u32);
    let mut img = RgbaImage::new(w, h);
    let bounds = PixelBounds { x0: 0, y0: 0, x1: w, y1: h };
    let shade = |c: u8, f: f32| (c as f32 * f).round().clamp(0.0, 255.0) as u8;

    paint_region(&mut img, bounds, |x, y| {
        let d = tshirt_sdf(x, y);
        let coverage = fill_coverage(d);
        if coverage <= 0.0 {
            return None;
        }
        // Slightly darker towards the hem and near the outline.
        let mut f = 1.0 - 0.08 * (y / h as f32);
        if d > -3.0 {
            f *= 0.82;
        }
        let color = [shade(fabric[0], f), shade(fabric[1], f), shade(fabric[2], f), 255];
        Some((color, coverage))
    });
    img
}
