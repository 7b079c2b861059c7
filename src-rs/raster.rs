//! Pixel backend for [`Composite`]: resize, dim, and paint shapes into an RGBA buffer.
//!
//! Shapes are painted in record coordinates. Every primitive is clipped to the canvas in
//! `f64` before any integer pixel index is formed, so out-of-range geometry is cut off
//! instead of wrapping.

use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::imageops::FilterType;
use image::{DynamicImage, Rgba, RgbaImage};
use thiserror::Error;

use crate::overlay::{Composite, Style};
use crate::select::Primitive;

/// Largest canvas side the raster backend will allocate.
pub const MAX_CANVAS_SIDE: u32 = 16_384;

const GLYPH_PX: i32 = 8;

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("canvas {width}x{height} exceeds {MAX_CANVAS_SIDE}px per side")]
    CanvasTooLarge { width: f64, height: f64 },
}

/// Paint `composite` over `base`, which is stretched to the composite canvas.
pub fn rasterize(composite: &Composite, base: &DynamicImage) -> Result<RgbaImage, RasterError> {
    let (canvas_w, canvas_h) = composite.canvas_size();
    if canvas_w > MAX_CANVAS_SIDE || canvas_h > MAX_CANVAS_SIDE {
        return Err(RasterError::CanvasTooLarge {
            width: composite.width,
            height: composite.height,
        });
    }
    let mut img = base
        .resize_exact(canvas_w, canvas_h, FilterType::Triangle)
        .to_rgba8();

    let (right, bottom) = (f64::from(canvas_w), f64::from(canvas_h));
    let [r, g, b] = Style::SCRIM;
    fill_area(
        &mut img,
        0.0,
        0.0,
        right,
        bottom,
        Rgba([r, g, b, composite.scrim_alpha()]),
    );
    stroke_rect(
        &mut img,
        0.0,
        0.0,
        right,
        bottom,
        Style::FRAME_STROKE,
        Rgba(Style::FRAME),
    );

    let color = Rgba(Style::HIGHLIGHT);
    for primitive in &composite.primitives {
        draw_primitive(&mut img, primitive, color);
    }
    Ok(img)
}

fn draw_primitive(img: &mut RgbaImage, primitive: &Primitive, color: Rgba<u8>) {
    match primitive {
        Primitive::Rect {
            x,
            y,
            width,
            height,
        } => {
            if !(*width > 0.0 && *height > 0.0) {
                return;
            }
            stroke_rect(
                img,
                *x,
                *y,
                x + width,
                y + height,
                Style::BOX_STROKE,
                color,
            );
        }
        Primitive::Label { x, y, text } => {
            let scale = (Style::LABEL_PX / f64::from(GLYPH_PX)).round().max(1.0) as i32;
            // SVG anchors text at the baseline; the bitmap font anchors at the top.
            let top = y - f64::from(GLYPH_PX * scale);
            draw_bitmap_text(img, *x, top, text, color, scale);
        }
        Primitive::Point { cx, cy, radius } => draw_disc(img, *cx, *cy, *radius, color),
        Primitive::Line { x0, y0, x1, y1 } => {
            draw_thick_line(img, *x0, *y0, *x1, *y1, color, Style::LINK_STROKE)
        }
    }
}

/// Column (or row) index for a record-space coordinate, clipped to `0..=limit`.
fn clip_index(value: f64, limit: u32) -> u32 {
    // NaN casts to 0.
    value.round().clamp(0.0, f64::from(limit)) as u32
}

fn blend_pixel(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    match src[3] {
        0 => dst,
        255 => Rgba([src[0], src[1], src[2], dst[3]]),
        alpha => {
            let a = f64::from(alpha) / 255.0;
            let mix = |d: u8, s: u8| (f64::from(d) * (1.0 - a) + f64::from(s) * a).round() as u8;
            let out_a = (f64::from(dst[3]) + f64::from(alpha) * (1.0 - a))
                .round()
                .min(255.0) as u8;
            Rgba([mix(dst[0], src[0]), mix(dst[1], src[1]), mix(dst[2], src[2]), out_a])
        }
    }
}

/// Blend `color` over the pixels covered by `[left, right) × [top, bottom)`.
fn fill_area(
    img: &mut RgbaImage,
    left: f64,
    top: f64,
    right: f64,
    bottom: f64,
    color: Rgba<u8>,
) {
    let (w, h) = img.dimensions();
    let (x0, x1) = (clip_index(left, w), clip_index(right, w));
    let (y0, y1) = (clip_index(top, h), clip_index(bottom, h));
    for y in y0..y1 {
        for x in x0..x1 {
            let dst = *img.get_pixel(x, y);
            img.put_pixel(x, y, blend_pixel(dst, color));
        }
    }
}

/// Outline of the rectangle with corners `(left, top)` and `(right, bottom)`, the stroke
/// straddling each edge like an SVG stroke.
fn stroke_rect(
    img: &mut RgbaImage,
    left: f64,
    top: f64,
    right: f64,
    bottom: f64,
    stroke: f64,
    color: Rgba<u8>,
) {
    let half = stroke.max(1.0) / 2.0;
    let (outer_l, outer_r) = (left - half, right + half);
    fill_area(img, outer_l, top - half, outer_r, top + half, color);
    fill_area(img, outer_l, bottom - half, outer_r, bottom + half, color);
    // Side bands stop where the top and bottom bands begin.
    let (inner_t, inner_b) = (top + half, (bottom - half).max(top + half));
    fill_area(img, left - half, inner_t, left + half, inner_b, color);
    fill_area(img, right - half, inner_t, right + half, inner_b, color);
}

fn draw_disc(img: &mut RgbaImage, cx: f64, cy: f64, radius: f64, color: Rgba<u8>) {
    if !(cx.is_finite() && cy.is_finite() && radius.is_finite()) {
        return;
    }
    let (w, h) = img.dimensions();
    let radius = radius.max(0.5);
    let x0 = clip_index((cx - radius).floor(), w);
    let x1 = clip_index((cx + radius).ceil() + 1.0, w);
    let y0 = clip_index((cy - radius).floor(), h);
    let y1 = clip_index((cy + radius).ceil() + 1.0, h);
    let r2 = radius * radius;
    for y in y0..y1 {
        for x in x0..x1 {
            let dx = f64::from(x) - cx;
            let dy = f64::from(y) - cy;
            if dx * dx + dy * dy <= r2 {
                let dst = *img.get_pixel(x, y);
                img.put_pixel(x, y, blend_pixel(dst, color));
            }
        }
    }
}

/// Cut the segment down to the part inside `[lo, hi]²`; `None` when nothing is left.
fn clip_segment(
    (x1, y1): (f64, f64),
    (x2, y2): (f64, f64),
    (lo_x, hi_x): (f64, f64),
    (lo_y, hi_y): (f64, f64),
) -> Option<((f64, f64), (f64, f64))> {
    let (dx, dy) = (x2 - x1, y2 - y1);
    let (mut t0, mut t1) = (0.0_f64, 1.0_f64);
    for (p, q) in [
        (-dx, x1 - lo_x),
        (dx, hi_x - x1),
        (-dy, y1 - lo_y),
        (dy, hi_y - y1),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            t0 = t0.max(r);
        } else {
            t1 = t1.min(r);
        }
        if t0 > t1 {
            return None;
        }
    }
    Some((
        (x1 + dx * t0, y1 + dy * t0),
        (x1 + dx * t1, y1 + dy * t1),
    ))
}

fn draw_thick_line(
    img: &mut RgbaImage,
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    color: Rgba<u8>,
    width: f64,
) {
    if ![x1, y1, x2, y2].iter().all(|v| v.is_finite()) {
        return;
    }
    let radius = (width.max(1.0) / 2.0).max(0.6);
    let (w, h) = img.dimensions();
    let Some(((x1, y1), (x2, y2))) = clip_segment(
        (x1, y1),
        (x2, y2),
        (-radius, f64::from(w) + radius),
        (-radius, f64::from(h) + radius),
    ) else {
        return;
    };
    let (dx, dy) = (x2 - x1, y2 - y1);
    let steps = (dx * dx + dy * dy).sqrt().ceil().max(1.0) as u32;
    for step in 0..=steps {
        let t = f64::from(step) / f64::from(steps);
        draw_disc(img, x1 + dx * t, y1 + dy * t, radius, color);
    }
}

fn draw_bitmap_text(
    img: &mut RgbaImage,
    x: f64,
    y: f64,
    text: &str,
    color: Rgba<u8>,
    scale: i32,
) {
    let (w, h) = img.dimensions();
    let (w, h) = (w as i32, h as i32);
    let advance = GLYPH_PX * scale;
    if !(x.is_finite() && y.is_finite()) {
        return;
    }
    // Anything further out than one text line from the canvas never reaches it.
    let reach = f64::from(advance);
    if y >= f64::from(h) || y + reach <= 0.0 || x >= f64::from(w) {
        return;
    }
    let top = y.round() as i32;
    let mut cursor_x = x.round().max(-f64::from(i32::MAX / 2)) as i32;
    for ch in text.chars() {
        if cursor_x >= w {
            break;
        }
        if cursor_x.saturating_add(advance) <= 0 {
            cursor_x = cursor_x.saturating_add(advance);
            continue;
        }
        let Some(glyph) = BASIC_FONTS.get(ch).or_else(|| BASIC_FONTS.get('?')) else {
            cursor_x += advance;
            continue;
        };
        for (row, bits) in (0..).zip(glyph.iter()) {
            for col in 0..GLYPH_PX {
                if (*bits >> col) & 1 == 0 {
                    continue;
                }
                let (px, py) = (cursor_x + col * scale, top + row * scale);
                for ty in py.max(0)..(py + scale).min(h) {
                    for tx in px.max(0)..(px + scale).min(w) {
                        let (tx, ty) = (tx as u32, ty as u32);
                        let dst = *img.get_pixel(tx, ty);
                        img.put_pixel(tx, ty, blend_pixel(dst, color));
                    }
                }
            }
        }
        cursor_x += advance;
    }
}
