//! Grayscale conversion, polarity detection and contrast stretch applied to
//! the composite before it is handed to the recognition engine.

use image::RgbaImage;
use log::debug;

pub const DARK_THRESHOLD: f32 = 128.0;
pub const STRETCH_LOW: f32 = 100.0;
pub const STRETCH_HIGH: f32 = 155.0;
pub const STRETCH_AMOUNT: f32 = 30.0;

#[inline]
pub fn luminance(r: u8, g: u8, b: u8) -> f32 {
    0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32
}

/// Dark and light pixel tally of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Polarity {
    pub dark: u64,
    pub light: u64,
}

impl Polarity {
    pub fn measure(image: &RgbaImage) -> Self {
        image.pixels().fold(Self::default(), |mut acc, p| {
            if luminance(p[0], p[1], p[2]) < DARK_THRESHOLD {
                acc.dark += 1;
            } else {
                acc.light += 1;
            }
            acc
        })
    }

    /// Majority-dark images are inverted so text ends up dark on light.
    pub fn should_invert(&self) -> bool {
        self.dark > self.light
    }
}

/// Push values outside the middle band further toward black or white.
#[inline]
pub fn stretch(gray: f32) -> f32 {
    if gray < STRETCH_LOW {
        (gray - STRETCH_AMOUNT).max(0.0)
    } else if gray > STRETCH_HIGH {
        (gray + STRETCH_AMOUNT).min(255.0)
    } else {
        gray
    }
}

/// Rewrite `image` in place; returns whether it was inverted.
pub fn preprocess_in_place(image: &mut RgbaImage) -> bool {
    let invert = Polarity::measure(image).should_invert();
    for p in image.pixels_mut() {
        let mut gray = luminance(p[0], p[1], p[2]);
        if invert {
            gray = 255.0 - gray;
        }
        let v = stretch(gray).round().clamp(0.0, 255.0) as u8;
        p[0] = v;
        p[1] = v;
        p[2] = v;
    }
    debug!(
        "preprocessed {}x{} image (inverted: {invert})",
        image.width(),
        image.height()
    );
    invert
}

/// Preprocessed copy of `image` plus the invert decision.
pub fn preprocess(image: &RgbaImage) -> (RgbaImage, bool) {
    let mut out = image.clone();
    let inverted = preprocess_in_place(&mut out);
    (out, inverted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn filled(w: u32, h: u32, px: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba(px))
    }

    #[test]
    fn all_white_is_not_inverted() {
        let image = filled(8, 8, [255, 255, 255, 255]);
        let polarity = Polarity::measure(&image);
        assert_eq!(polarity, Polarity { dark: 0, light: 64 });
        assert!(!polarity.should_invert());
    }

    #[test]
    fn majority_dark_is_inverted() {
        let mut image = filled(10, 1, [255, 255, 255, 255]);
        for x in 0..6 {
            image.put_pixel(x, 0, Rgba([20, 20, 20, 255]));
        }
        assert!(Polarity::measure(&image).should_invert());

        let (out, inverted) = preprocess(&image);
        assert!(inverted);
        // 20 -> 235 inverted -> 255 stretched; 255 -> 0 inverted -> 0.
        assert_eq!(out.get_pixel(0, 0), &Rgba([255, 255, 255, 255]));
        assert_eq!(out.get_pixel(9, 0), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn even_split_is_not_inverted() {
        let mut image = filled(2, 1, [255, 255, 255, 255]);
        image.put_pixel(0, 0, Rgba([0, 0, 0, 255]));
        assert!(!Polarity::measure(&image).should_invert());
    }

    #[test]
    fn stretch_bands() {
        assert_eq!(stretch(10.0), 0.0);
        assert_eq!(stretch(99.0), 69.0);
        assert_eq!(stretch(100.0), 100.0);
        assert_eq!(stretch(128.0), 128.0);
        assert_eq!(stretch(155.0), 155.0);
        assert_eq!(stretch(156.0), 186.0);
        assert_eq!(stretch(240.0), 255.0);
    }

    #[test]
    fn binarized_image_is_stable() {
        let mut image = filled(4, 4, [255, 255, 255, 255]);
        image.put_pixel(1, 1, Rgba([0, 0, 0, 255]));
        image.put_pixel(2, 1, Rgba([0, 0, 0, 255]));

        let (once, inverted) = preprocess(&image);
        assert!(!inverted);
        assert_eq!(once, image);

        let (twice, _) = preprocess(&once);
        assert_eq!(twice, once);
    }

    #[test]
    fn writes_gray_and_keeps_alpha() {
        let mut image = filled(3, 1, [255, 255, 255, 255]);
        image.put_pixel(0, 0, Rgba([200, 100, 50, 77]));
        let (out, inverted) = preprocess(&image);
        assert!(!inverted);
        // 0.299*200 + 0.587*100 + 0.114*50 = 124.2, inside the untouched band.
        assert_eq!(out.get_pixel(0, 0), &Rgba([124, 124, 124, 77]));
        assert_eq!(out.get_pixel(2, 0), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn lone_dark_pixel_is_inverted() {
        let image = filled(1, 1, [200, 100, 50, 77]);
        let (out, inverted) = preprocess(&image);
        assert!(inverted);
        // 255 - 124.2 = 130.8, still inside the untouched band.
        assert_eq!(out.get_pixel(0, 0), &Rgba([131, 131, 131, 77]));
    }
}
