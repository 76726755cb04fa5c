use image::{RgbImage, RgbaImage};

use crate::raster::{BlendMode, Color, blend_pixel};

/// Paint `top` over `bottom` (source-over) into a new raster.
///
/// Both rasters must share dimensions; layers of one canvas always do.
pub fn composite(bottom: &RgbaImage, top: &RgbaImage) -> RgbaImage {
    assert_eq!(bottom.dimensions(), top.dimensions());

    let mut output = bottom.clone();
    for (dst, src) in output.pixels_mut().zip(top.pixels()) {
        blend_pixel(dst, Color::from_pixel(src), 1.0, BlendMode::Normal);
    }
    output
}

/// Drop alpha by painting the image over an opaque backdrop.
pub fn flatten(image: &RgbaImage, backdrop: Color) -> RgbImage {
    let mut out = RgbImage::new(image.width(), image.height());
    for (dst, src) in out.pixels_mut().zip(image.pixels()) {
        let mut px = Color { a: 255, ..backdrop }.to_pixel();
        blend_pixel(&mut px, Color::from_pixel(src), 1.0, BlendMode::Normal);
        dst.0 = [px[0], px[1], px[2]];
    }
    out
}
