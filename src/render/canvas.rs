//! Software raster surface the HUD renderers draw on.
//!
//! Coordinates are `f32` pixels; shapes are sampled at pixel centers and
//! composited source-over. Text goes through embedded-graphics mono fonts.

use anyhow::{anyhow, Context, Result};
use embedded_graphics::{
    mono_font::{ascii::FONT_6X10, ascii::FONT_10X20, MonoFont, MonoTextStyle},
    pixelcolor::Rgb888,
    prelude::*,
    text::{Baseline, Text},
};
use image::{Rgba, RgbaImage};
use std::path::Path;

/// Straight (non-premultiplied) color with alpha in [0, 1].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn with_alpha(self, a: f32) -> Self {
        Self {
            a: a.clamp(0.0, 1.0),
            ..self
        }
    }

    fn to_rgb888(self) -> Rgb888 {
        Rgb888::new(self.r, self.g, self.b)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FontSize {
    Small,
    Large,
}

impl FontSize {
    fn font(self) -> &'static MonoFont<'static> {
        match self {
            FontSize::Small => &FONT_6X10,
            FontSize::Large => &FONT_10X20,
        }
    }
}

pub struct Canvas {
    image: RgbaImage,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!("canvas must be non-empty, got {}x{}", width, height));
        }
        Ok(Self {
            image: RgbaImage::new(width, height),
        })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x < self.width() && y < self.height() {
            Some(self.image.get_pixel(x, y).0)
        } else {
            None
        }
    }

    pub fn clear(&mut self, color: Color) {
        let alpha = (color.a.clamp(0.0, 1.0) * 255.0).round() as u8;
        for pixel in self.image.pixels_mut() {
            *pixel = Rgba([color.r, color.g, color.b, alpha]);
        }
    }

    /// Composite `color` over the pixel at (x, y), scaled by `coverage`.
    pub fn blend(&mut self, x: i32, y: i32, color: Color, coverage: f32) {
        if x < 0 || y < 0 || x >= self.width() as i32 || y >= self.height() as i32 {
            return;
        }
        let src_a = (color.a * coverage).clamp(0.0, 1.0);
        if src_a <= 0.0 {
            return;
        }
        let dst = self.image.get_pixel_mut(x as u32, y as u32);
        let dst_a = dst.0[3] as f32 / 255.0;
        let out_a = src_a + dst_a * (1.0 - src_a);
        if out_a <= 0.0 {
            return;
        }
        let mix = |s: u8, d: u8| -> u8 {
            let value = (s as f32 * src_a + d as f32 * dst_a * (1.0 - src_a)) / out_a;
            value.round().clamp(0.0, 255.0) as u8
        };
        *dst = Rgba([
            mix(color.r, dst.0[0]),
            mix(color.g, dst.0[1]),
            mix(color.b, dst.0[2]),
            (out_a * 255.0).round() as u8,
        ]);
    }

    pub fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Color) {
        let (x0, x1) = self.span_x(x, x + w);
        let (y0, y1) = self.span_y(y, y + h);
        for py in y0..y1 {
            for px in x0..x1 {
                self.blend(px, py, color, 1.0);
            }
        }
    }

    pub fn fill_ellipse(&mut self, cx: f32, cy: f32, rx: f32, ry: f32, color: Color) {
        self.shade_ellipse(cx, cy, rx, ry, |_| color.a, color);
    }

    /// Ellipse filled with a circular radial gradient centred on (cx, cy):
    /// full `color` inside `inner`, fading linearly to transparent at `outer`.
    #[allow(clippy::too_many_arguments)]
    pub fn fill_radial_ellipse(
        &mut self,
        cx: f32,
        cy: f32,
        rx: f32,
        ry: f32,
        inner: f32,
        outer: f32,
        color: Color,
    ) {
        let span = (outer - inner).max(f32::EPSILON);
        self.shade_ellipse(
            cx,
            cy,
            rx,
            ry,
            |dist| {
                let t = ((dist - inner) / span).clamp(0.0, 1.0);
                color.a * (1.0 - t)
            },
            color,
        );
    }

    fn shade_ellipse<F>(&mut self, cx: f32, cy: f32, rx: f32, ry: f32, alpha_at: F, color: Color)
    where
        F: Fn(f32) -> f32,
    {
        if !(rx > 0.0 && ry > 0.0) || !cx.is_finite() || !cy.is_finite() {
            return;
        }
        let (x0, x1) = self.span_x(cx - rx, cx + rx);
        let (y0, y1) = self.span_y(cy - ry, cy + ry);
        for py in y0..y1 {
            let dy = py as f32 + 0.5 - cy;
            for px in x0..x1 {
                let dx = px as f32 + 0.5 - cx;
                if (dx / rx).powi(2) + (dy / ry).powi(2) > 1.0 {
                    continue;
                }
                let alpha = alpha_at((dx * dx + dy * dy).sqrt());
                self.blend(px, py, color.with_alpha(alpha), 1.0);
            }
        }
    }

    pub fn fill_round_rect(&mut self, x: f32, y: f32, w: f32, h: f32, radius: f32, color: Color) {
        if !(w > 0.0 && h > 0.0) {
            return;
        }
        let radius = radius.clamp(0.0, w.min(h) / 2.0);
        let (x0, x1) = self.span_x(x, x + w);
        let (y0, y1) = self.span_y(y, y + h);
        for py in y0..y1 {
            let sy = py as f32 + 0.5;
            for px in x0..x1 {
                let sx = px as f32 + 0.5;
                // Distance outside the inner rectangle the corners are rounded around.
                let qx = (x + radius - sx).max(sx - (x + w - radius)).max(0.0);
                let qy = (y + radius - sy).max(sy - (y + h - radius)).max(0.0);
                if qx * qx + qy * qy <= radius * radius {
                    self.blend(px, py, color, 1.0);
                }
            }
        }
    }

    /// Soft shadow under a rounded rectangle: stacked, growing translucent
    /// layers approximating a blur of `blur` pixels, shifted down by `offset_y`.
    #[allow(clippy::too_many_arguments)]
    pub fn round_rect_shadow(
        &mut self,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        radius: f32,
        blur: f32,
        offset_y: f32,
        color: Color,
    ) {
        let steps = (blur / 4.0).ceil().max(1.0) as u32;
        let layer = color.with_alpha(color.a / steps as f32);
        for i in 0..steps {
            let grow = blur * (i as f32 + 1.0) / steps as f32 / 2.0;
            self.fill_round_rect(
                x - grow,
                y + offset_y - grow,
                w + grow * 2.0,
                h + grow * 2.0,
                radius + grow,
                layer,
            );
        }
    }

    /// Fill a convex polygon by scanline.
    pub fn fill_convex(&mut self, points: &[(f32, f32)], color: Color) {
        if points.len() < 3 || points.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
            return;
        }
        let min_y = points.iter().map(|p| p.1).fold(f32::INFINITY, f32::min);
        let max_y = points.iter().map(|p| p.1).fold(f32::NEG_INFINITY, f32::max);
        let (y0, y1) = self.span_y(min_y, max_y);
        for py in y0..y1 {
            let sy = py as f32 + 0.5;
            let mut lo = f32::INFINITY;
            let mut hi = f32::NEG_INFINITY;
            for (i, a) in points.iter().enumerate() {
                let b = points[(i + 1) % points.len()];
                if (a.1 <= sy && b.1 > sy) || (b.1 <= sy && a.1 > sy) {
                    let t = (sy - a.1) / (b.1 - a.1);
                    let x = a.0 + t * (b.0 - a.0);
                    lo = lo.min(x);
                    hi = hi.max(x);
                }
            }
            if lo > hi {
                continue;
            }
            let (x0, x1) = self.span_x(lo, hi);
            for px in x0..x1 {
                self.blend(px, py, color, 1.0);
            }
        }
    }

    pub fn draw_line(&mut self, from: (f32, f32), to: (f32, f32), thickness: f32, color: Color) {
        let dx = to.0 - from.0;
        let dy = to.1 - from.1;
        let len = (dx * dx + dy * dy).sqrt();
        if !len.is_finite() || len == 0.0 {
            return;
        }
        let half = thickness.max(1.0) / 2.0;
        let (nx, ny) = (-dy / len * half, dx / len * half);
        self.fill_convex(
            &[
                (from.0 + nx, from.1 + ny),
                (to.0 + nx, to.1 + ny),
                (to.0 - nx, to.1 - ny),
                (from.0 - nx, from.1 - ny),
            ],
            color,
        );
    }

    /// Draw `text` with its top-left corner at (x, y).
    pub fn draw_text(&mut self, text: &str, x: i32, y: i32, size: FontSize, color: Color) {
        let style = MonoTextStyle::new(size.font(), color.to_rgb888());
        let mut target = CanvasTarget {
            canvas: self,
            alpha: color.a,
        };
        let _ = Text::with_baseline(text, Point::new(x, y), style, Baseline::Top).draw(&mut target);
    }

    /// Draw `text` horizontally centred on `cx`.
    pub fn draw_text_centered(&mut self, text: &str, cx: f32, y: i32, size: FontSize, color: Color) {
        let width = text_width(text, size) as f32;
        self.draw_text(text, (cx - width / 2.0).round() as i32, y, size, color);
    }

    pub fn save_png(&self, path: &Path) -> Result<()> {
        self.image
            .save_with_format(path, image::ImageFormat::Png)
            .with_context(|| format!("write {}", path.display()))
    }

    fn span_x(&self, from: f32, to: f32) -> (i32, i32) {
        clamp_span(from, to, self.width())
    }

    fn span_y(&self, from: f32, to: f32) -> (i32, i32) {
        clamp_span(from, to, self.height())
    }
}

/// Rendered width of `text` in pixels.
pub fn text_width(text: &str, size: FontSize) -> u32 {
    let font = size.font();
    let advance = font.character_size.width + font.character_spacing;
    text.chars().count() as u32 * advance
}

/// Pixel index range whose centres fall within [from, to).
fn clamp_span(from: f32, to: f32, limit: u32) -> (i32, i32) {
    if !from.is_finite() || !to.is_finite() {
        return (0, 0);
    }
    let start = (from - 0.5).ceil().max(0.0) as i32;
    let end = ((to - 0.5).ceil().max(0.0) as i32).min(limit as i32);
    (start, end.max(start))
}

struct CanvasTarget<'a> {
    canvas: &'a mut Canvas,
    alpha: f32,
}

impl OriginDimensions for CanvasTarget<'_> {
    fn size(&self) -> Size {
        Size::new(self.canvas.width(), self.canvas.height())
    }
}

impl DrawTarget for CanvasTarget<'_> {
    type Color = Rgb888;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(coord, color) in pixels {
            let color = Color::rgba(color.r(), color.g(), color.b(), self.alpha);
            self.canvas.blend(coord.x, coord.y, color, 1.0);
        }
        Ok(())
    }
}
