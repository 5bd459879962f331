// ============================================================================
// SDF PRIMITIVES: signed distance helpers + coverage-based pixel painting
// ============================================================================
//
// Everything the renderer and the built-in garment mockups draw is expressed
// as a signed distance (negative = inside) evaluated at pixel centres and
// converted to anti-aliased coverage with a one-pixel smoothstep.

use image::RgbaImage;
use rayon::prelude::*;

/// SDF for a box centred at origin with half-extents (hx, hy).
#[inline]
pub fn sdf_box(px: f32, py: f32, hx: f32, hy: f32) -> f32 {
    let dx = px.abs() - hx;
    let dy = py.abs() - hy;
    let outside = (dx.max(0.0) * dx.max(0.0) + dy.max(0.0) * dy.max(0.0)).sqrt();
    let inside = dx.max(dy).min(0.0);
    outside + inside
}

/// SDF for a rounded box.
#[inline]
pub fn sdf_rounded_box(px: f32, py: f32, hx: f32, hy: f32, r: f32) -> f32 {
    let r = r.min(hx).min(hy);
    sdf_box(px, py, hx - r, hy - r) - r
}

/// SDF for an ellipse (approximation).
#[inline]
pub fn sdf_ellipse(px: f32, py: f32, rx: f32, ry: f32) -> f32 {
    // Normalise point to circle space
    let nx = px / rx;
    let ny = py / ry;
    let len = (nx * nx + ny * ny).sqrt();
    if len < 1e-8 {
        return -rx.min(ry);
    }
    // Distance from normalised circle surface, scaled back
    let scale = (rx * rx * ny * ny + ry * ry * nx * nx).sqrt() / (rx * ry * len);
    (len - 1.0) / scale
}

#[inline]
pub fn sdf_circle(px: f32, py: f32, r: f32) -> f32 {
    (px * px + py * py).sqrt() - r
}

/// Distance to a line segment (unsigned).
#[inline]
pub fn sdf_line_segment(px: f32, py: f32, ax: f32, ay: f32, bx: f32, by: f32) -> f32 {
    let dx = bx - ax;
    let dy = by - ay;
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq > 0.0 {
        (((px - ax) * dx + (py - ay) * dy) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let cx = ax + t * dx;
    let cy = ay + t * dy;
    ((px - cx) * (px - cx) + (py - cy) * (py - cy)).sqrt()
}

/// Rotate (px, py) by `-angle` radians, i.e. into a frame rotated by `angle`.
#[inline]
pub fn unrotate(px: f32, py: f32, angle: f32) -> (f32, f32) {
    let (sin, cos) = angle.sin_cos();
    (px * cos + py * sin, -px * sin + py * cos)
}

/// Smoothstep between edge0 and edge1.
#[inline]
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Anti-aliased coverage of a filled shape.
#[inline]
pub fn fill_coverage(d: f32) -> f32 {
    smoothstep(0.5, -0.5, d)
}

/// Anti-aliased coverage of an outline of `width` centred on the shape edge.
#[inline]
pub fn stroke_coverage(d: f32, width: f32) -> f32 {
    fill_coverage(d.abs() - width * 0.5)
}

/// Source-over blend of `src` (scaled by `coverage`) onto one RGBA pixel.
#[inline]
pub fn blend_pixel(dst: &mut [u8], src: [u8; 4], coverage: f32) {
    let sa = src[3] as f32 / 255.0 * coverage.clamp(0.0, 1.0);
    if sa <= 0.0 {
        return;
    }
    let da = dst[3] as f32 / 255.0;
    if sa >= 1.0 || da == 0.0 {
        dst[0] = src[0];
        dst[1] = src[1];
        dst[2] = src[2];
        dst[3] = (sa * 255.0).round() as u8;
        return;
    }
    let out_a = sa + da * (1.0 - sa);
    let inv = 1.0 / out_a;
    for c in 0..3 {
        dst[c] = ((src[c] as f32 * sa + dst[c] as f32 * da * (1.0 - sa)) * inv)
            .round()
            .clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

/// Integer pixel bounds `[x0, x1) x [y0, y1)` clamped to the image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelBounds {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl PixelBounds {
    /// Bounds covering the float box, padded by `pad` pixels and clamped to `w x h`.
    pub fn from_extent(min_x: f32, min_y: f32, max_x: f32, max_y: f32, pad: f32, w: u32, h: u32) -> Self {
        let x0 = ((min_x - pad).floor().max(0.0) as u32).min(w);
        let y0 = ((min_y - pad).floor().max(0.0) as u32).min(h);
        let x1 = ((max_x + pad).ceil().max(0.0) as u32).min(w);
        let y1 = ((max_y + pad).ceil().max(0.0) as u32).min(h);
        Self { x0, y0, x1, y1 }
    }

    pub fn is_empty(&self) -> bool {
        self.x1 <= self.x0 || self.y1 <= self.y0
    }
}

/// Run `shader` at every pixel centre inside `bounds`, in parallel by rows,
/// and blend what it returns (`colour`, `coverage`) onto the image.
pub fn paint_region<F>(img: &mut RgbaImage, bounds: PixelBounds, shader: F)
where
    F: Fn(f32, f32) -> Option<([u8; 4], f32)> + Sync,
{
    if bounds.is_empty() {
        return;
    }
    let row_bytes = img.width() as usize * 4;
    let raw: &mut [u8] = img;
    raw.par_chunks_mut(row_bytes)
        .enumerate()
        .skip(bounds.y0 as usize)
        .take((bounds.y1 - bounds.y0) as usize)
        .for_each(|(y, row)| {
            let py = y as f32 + 0.5;
            for x in bounds.x0..bounds.x1 {
                let px = x as f32 + 0.5;
                if let Some((color, coverage)) = shader(px, py) {
                    let off = x as usize * 4;
                    blend_pixel(&mut row[off..off + 4], color, coverage);
                }
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn box_distance_signs() {
        assert!(sdf_box(0.0, 0.0, 5.0, 5.0) < 0.0);
        assert_eq!(sdf_box(7.0, 0.0, 5.0, 5.0), 2.0);
        assert_eq!(sdf_box(5.0, 0.0, 5.0, 5.0), 0.0);
    }

    #[test]
    fn segment_distance_clamps_to_endpoints() {
        assert_eq!(sdf_line_segment(5.0, 3.0, 0.0, 0.0, 10.0, 0.0), 3.0);
        assert_eq!(sdf_line_segment(13.0, 4.0, 0.0, 0.0, 10.0, 0.0), 5.0);
        // Degenerate segment behaves like a point.
        assert_eq!(sdf_line_segment(3.0, 4.0, 0.0, 0.0, 0.0, 0.0), 5.0);
    }

    #[test]
    fn opaque_full_coverage_replaces_pixel() {
        let mut px = [1, 2, 3, 255];
        blend_pixel(&mut px, [200, 100, 50, 255], 1.0);
        assert_eq!(px, [200, 100, 50, 255]);
    }

    #[test]
    fn zero_coverage_is_noop() {
        let mut px = [1, 2, 3, 255];
        blend_pixel(&mut px, [200, 100, 50, 255], 0.0);
        assert_eq!(px, [1, 2, 3, 255]);
    }

    #[test]
    fn paint_region_respects_bounds() {
        let mut img = RgbaImage::new(8, 8);
        let bounds = PixelBounds { x0: 2, y0: 2, x1: 4, y1: 4 };
        paint_region(&mut img, bounds, |_, _| Some(([255, 0, 0, 255], 1.0)));
        assert_eq!(*img.get_pixel(2, 2), Rgba([255, 0, 0, 255]));
        assert_eq!(*img.get_pixel(3, 3), Rgba([255, 0, 0, 255]));
        assert_eq!(*img.get_pixel(4, 4), Rgba([0, 0, 0, 0]));
        assert_eq!(*img.get_pixel(1, 2), Rgba([0, 0, 0, 0]));
    }
}
