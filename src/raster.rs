//! Pixel rasters backing the canvas layers.
//!
//! Layers store straight (non-premultiplied) RGBA8 pixels in an
//! [`image::RgbaImage`], sized in physical pixels, while callers address
//! them in logical coordinates scaled by the device pixel ratio.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A point in logical canvas coordinates.
pub type Point = [f32; 2];

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid color {0:?}, expected #rrggbb or #rrggbbaa")]
pub struct ColorParseError(pub String);

/// Straight-alpha RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Self = Self::rgba(0, 0, 0, 0);
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const WHITE: Self = Self::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_hex(self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }

    pub fn to_pixel(self) -> Rgba<u8> {
        Rgba([self.r, self.g, self.b, self.a])
    }

    pub fn from_pixel(pixel: &Rgba<u8>) -> Self {
        let [r, g, b, a] = pixel.0;
        Self { r, g, b, a }
    }
}

impl FromStr for Color {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ColorParseError(s.to_string());
        let hex = s.strip_prefix('#').ok_or_else(err)?;
        if !hex.is_ascii() || !(hex.len() == 6 || hex.len() == 8) {
            return Err(err());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| err());
        let a = if hex.len() == 8 { channel(6)? } else { 255 };
        Ok(Self::rgba(channel(0)?, channel(2)?, channel(4)?, a))
    }
}

impl TryFrom<String> for Color {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_hex()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// How a source color combines with the destination pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlendMode {
    /// Source over destination.
    #[default]
    Normal,
    /// Darkening blend: color channels multiply where the destination is opaque.
    Multiply,
    /// Removes destination alpha by the source alpha; source color is ignored.
    DestinationOut,
}

#[inline]
fn unit_to_u8(v: f32) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Blend `src` into `dst` with an extra `alpha` factor in [0, 1]
/// (coverage times opacity).
#[inline]
pub fn blend_pixel(dst: &mut Rgba<u8>, src: Color, alpha: f32, mode: BlendMode) {
    let sa = (src.a as f32 / 255.0) * alpha.clamp(0.0, 1.0);
    if sa <= 0.0 {
        return;
    }
    let da = dst[3] as f32 / 255.0;

    if mode == BlendMode::DestinationOut {
        let out_a = da * (1.0 - sa);
        dst[3] = unit_to_u8(out_a);
        if dst[3] == 0 {
            *dst = Color::TRANSPARENT.to_pixel();
        }
        return;
    }

    let out_a = sa + da * (1.0 - sa);
    if out_a <= f32::EPSILON {
        *dst = Color::TRANSPARENT.to_pixel();
        return;
    }

    let src_channels = [src.r, src.g, src.b];
    for (c, s) in src_channels.into_iter().enumerate() {
        let s = s as f32 / 255.0;
        let d = dst[c] as f32 / 255.0;
        let mixed = match mode {
            BlendMode::Multiply => (1.0 - da) * s + da * s * d,
            _ => s,
        };
        dst[c] = unit_to_u8((sa * mixed + da * (1.0 - sa) * d) / out_a);
    }
    dst[3] = unit_to_u8(out_a);
}

/// Immutable full-frame copy of a layer's pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot(Arc<RgbaImage>);

impl Snapshot {
    pub fn image(&self) -> &RgbaImage {
        &self.0
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.0.dimensions()
    }
}

/// A raster with a logical size and a device scale factor.
#[derive(Debug, Clone)]
pub struct Layer {
    logical: (u32, u32),
    scale: f32,
    pixels: RgbaImage,
}

/// Physical pixel extent of a logical length at a given scale.
pub fn physical_extent(logical: u32, scale: f32) -> u32 {
    (logical as f32 * scale).round().max(0.0) as u32
}

impl Layer {
    /// Create a transparent layer of `width × height` logical pixels.
    pub fn new(width: u32, height: u32, scale: f32) -> Self {
        let scale = if scale.is_finite() && scale > 0.0 { scale } else { 1.0 };
        Self {
            logical: (width, height),
            scale,
            pixels: RgbaImage::new(physical_extent(width, scale), physical_extent(height, scale)),
        }
    }

    pub fn logical_size(&self) -> (u32, u32) {
        self.logical
    }

    pub fn physical_size(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn image(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn image_mut(&mut self) -> &mut RgbaImage {
        &mut self.pixels
    }

    /// Map a logical point to physical pixel space.
    #[inline]
    pub fn to_physical(&self, point: Point) -> Point {
        [point[0] * self.scale, point[1] * self.scale]
    }

    pub fn clear(&mut self) {
        self.fill(Color::TRANSPARENT);
    }

    pub fn fill(&mut self, color: Color) {
        let px = color.to_pixel();
        for p in self.pixels.pixels_mut() {
            *p = px;
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot(Arc::new(self.pixels.clone()))
    }

    /// Overwrite every pixel with the snapshot's contents.
    ///
    /// Returns false and leaves the layer untouched when the snapshot was
    /// taken at another size.
    pub fn restore(&mut self, snapshot: &Snapshot) -> bool {
        if snapshot.dimensions() != self.pixels.dimensions() {
            return false;
        }
        self.pixels.copy_from_slice(snapshot.image().as_raw());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_formats_hex_colors() {
        let c: Color = "#1a1a2e".parse().unwrap();
        assert_eq!(c, Color::rgb(0x1a, 0x1a, 0x2e));
        assert_eq!(c.to_hex(), "#1a1a2e");

        let translucent: Color = "#ff000080".parse().unwrap();
        assert_eq!(translucent.a, 0x80);
        assert_eq!(translucent.to_hex(), "#ff000080");

        assert!("ffffff".parse::<Color>().is_err());
        assert!("#fff".parse::<Color>().is_err());
        assert!("#gg0000".parse::<Color>().is_err());
    }

    #[test]
    fn color_serializes_as_hex_string() {
        let json = serde_json::to_string(&Color::rgb(255, 0, 16)).unwrap();
        assert_eq!(json, "\"#ff0010\"");
        let back: Color = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Color::rgb(255, 0, 16));
    }

    #[test]
    fn normal_blend_over_transparent_keeps_source() {
        let mut px = Rgba([0, 0, 0, 0]);
        blend_pixel(&mut px, Color::rgb(200, 100, 50), 1.0, BlendMode::Normal);
        assert_eq!(px, Rgba([200, 100, 50, 255]));
    }

    #[test]
    fn normal_blend_half_alpha_over_opaque() {
        let mut px = Rgba([100, 100, 100, 255]);
        blend_pixel(&mut px, Color::rgb(200, 0, 0), 0.5, BlendMode::Normal);
        assert_eq!(px, Rgba([150, 50, 50, 255]));
    }

    #[test]
    fn multiply_darkens_opaque_destination() {
        let mut px = Rgba([255, 128, 0, 255]);
        blend_pixel(&mut px, Color::rgb(128, 128, 128), 1.0, BlendMode::Multiply);
        assert_eq!(px, Rgba([128, 64, 0, 255]));
    }

    #[test]
    fn multiply_over_transparent_acts_like_normal() {
        let mut px = Rgba([0, 0, 0, 0]);
        blend_pixel(&mut px, Color::rgb(10, 20, 30), 1.0, BlendMode::Multiply);
        assert_eq!(px, Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn destination_out_removes_alpha() {
        let mut px = Rgba([10, 20, 30, 255]);
        blend_pixel(&mut px, Color::BLACK, 0.5, BlendMode::DestinationOut);
        assert_eq!(px[3], 128);
        assert_eq!(&px.0[..3], &[10, 20, 30]);

        blend_pixel(&mut px, Color::BLACK, 1.0, BlendMode::DestinationOut);
        assert_eq!(px, Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn layer_uses_physical_pixels() {
        let layer = Layer::new(100, 50, 2.0);
        assert_eq!(layer.logical_size(), (100, 50));
        assert_eq!(layer.physical_size(), (200, 100));
        assert_eq!(layer.to_physical([10.0, 5.0]), [20.0, 10.0]);
    }

    #[test]
    fn snapshot_restore_roundtrip() {
        let mut layer = Layer::new(4, 4, 1.0);
        layer.fill(Color::WHITE);
        let snap = layer.snapshot();
        layer.clear();
        assert!(layer.restore(&snap));
        assert_eq!(layer.image(), snap.image());

        let other = Layer::new(2, 2, 1.0).snapshot();
        assert!(!layer.restore(&other));
    }
}
