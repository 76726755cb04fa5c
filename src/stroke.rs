//! Stroke rasterization on the drawing layer.
//!
//! Each pointer event paints one shape: a filled dot on pointer down and a
//! straight capped segment for every move. Shapes are rasterized into a
//! coverage mask with a one-pixel anti-aliased edge, then blended into the
//! layer with the tool's blend mode. Tools with blur first paint a soft
//! shadow from a box-blurred copy of the mask.

use log::debug;

use crate::raster::{Layer, Point, blend_pixel};
use crate::tools::{LineCap, Paint, ToolSettings};

/// Per-pixel coverage over a clipped rectangle of the layer.
struct Mask {
    x0: u32,
    y0: u32,
    width: u32,
    height: u32,
    alpha: Vec<f32>,
}

impl Mask {
    fn index(&self, x: u32, y: u32) -> usize {
        (y * self.width + x) as usize
    }
}

#[derive(Debug, Clone, Copy)]
enum Shape {
    Dot { center: Point, radius: f32 },
    Segment { from: Point, to: Point, half_width: f32, cap: LineCap },
}

impl Shape {
    /// Bounding box in physical pixels as (min, max).
    fn bounds(&self) -> (Point, Point) {
        match *self {
            Shape::Dot { center, radius } => (
                [center[0] - radius, center[1] - radius],
                [center[0] + radius, center[1] + radius],
            ),
            Shape::Segment { from, to, half_width, .. } => (
                [from[0].min(to[0]) - half_width, from[1].min(to[1]) - half_width],
                [from[0].max(to[0]) + half_width, from[1].max(to[1]) + half_width],
            ),
        }
    }

    /// Coverage of the pixel whose center is `p`.
    fn coverage(&self, p: Point) -> f32 {
        match *self {
            Shape::Dot { center, radius } => {
                edge(radius - distance(p, center))
            }
            Shape::Segment { from, to, half_width, cap } => {
                let axis = [to[0] - from[0], to[1] - from[1]];
                let len = (axis[0] * axis[0] + axis[1] * axis[1]).sqrt();
                let dir = [axis[0] / len, axis[1] / len];
                let rel = [p[0] - from[0], p[1] - from[1]];
                let along = rel[0] * dir[0] + rel[1] * dir[1];
                let across = (rel[0] * dir[1] - rel[1] * dir[0]).abs();
                let overshoot = (-along).max(along - len).max(0.0);
                match cap {
                    LineCap::Round => {
                        let d = (across * across + overshoot * overshoot).sqrt();
                        edge(half_width - d)
                    }
                    LineCap::Square => {
                        edge(half_width - across).min(edge(half_width - overshoot))
                    }
                }
            }
        }
    }
}

#[inline]
fn distance(a: Point, b: Point) -> f32 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt()
}

/// Map a signed distance inside the shape edge to coverage over one pixel.
#[inline]
fn edge(inside: f32) -> f32 {
    (inside + 0.5).clamp(0.0, 1.0)
}

fn rasterize(shape: &Shape, margin: u32, layer: &Layer) -> Option<Mask> {
    let (w, h) = layer.physical_size();
    if w == 0 || h == 0 {
        return None;
    }
    let (min, max) = shape.bounds();
    let margin = margin as f32 + 1.0;
    let x0 = (min[0] - margin).floor().max(0.0) as u32;
    let y0 = (min[1] - margin).floor().max(0.0) as u32;
    let x1 = ((max[0] + margin).ceil().max(0.0) as u32).min(w);
    let y1 = ((max[1] + margin).ceil().max(0.0) as u32).min(h);
    if x0 >= x1 || y0 >= y1 {
        return None;
    }

    let (width, height) = (x1 - x0, y1 - y0);
    let mut alpha = Vec::with_capacity((width * height) as usize);
    for y in y0..y1 {
        for x in x0..x1 {
            alpha.push(shape.coverage([x as f32 + 0.5, y as f32 + 0.5]));
        }
    }
    Some(Mask { x0, y0, width, height, alpha })
}

/// Separable box blur of the mask, zero outside its bounds.
fn box_blur(mask: &Mask, radius: u32) -> Vec<f32> {
    if radius == 0 {
        return mask.alpha.clone();
    }
    let r = radius as i64;
    let window = (2 * r + 1) as f32;
    let (w, h) = (mask.width as i64, mask.height as i64);
    let sample = |buf: &[f32], x: i64, y: i64| -> f32 {
        if x < 0 || y < 0 || x >= w || y >= h {
            0.0
        } else {
            buf[(y * w + x) as usize]
        }
    };

    let mut horizontal = vec![0.0; mask.alpha.len()];
    for y in 0..h {
        let mut sum: f32 = (-r..=r).map(|dx| sample(&mask.alpha, dx, y)).sum();
        for x in 0..w {
            horizontal[(y * w + x) as usize] = sum / window;
            sum += sample(&mask.alpha, x + r + 1, y) - sample(&mask.alpha, x - r, y);
        }
    }

    let mut out = vec![0.0; mask.alpha.len()];
    for x in 0..w {
        let mut sum: f32 = (-r..=r).map(|dy| sample(&horizontal, x, dy)).sum();
        for y in 0..h {
            out[(y * w + x) as usize] = sum / window;
            sum += sample(&horizontal, x, y + r + 1) - sample(&horizontal, x, y - r);
        }
    }
    out
}

fn apply(layer: &mut Layer, mask: &Mask, alpha: &[f32], paint: &Paint) {
    let image = layer.image_mut();
    for y in 0..mask.height {
        for x in 0..mask.width {
            let a = alpha[mask.index(x, y)];
            if a <= 0.0 {
                continue;
            }
            let px = image.get_pixel_mut(mask.x0 + x, mask.y0 + y);
            blend_pixel(px, paint.color, a * paint.opacity, paint.blend);
        }
    }
}

fn paint_shape(layer: &mut Layer, shape: Shape, paint: &Paint) {
    let blur_radius = (paint.blur / 2.0).ceil().max(0.0) as u32;
    let Some(mask) = rasterize(&shape, blur_radius, layer) else {
        return;
    };
    if blur_radius > 0 {
        let shadow = box_blur(&mask, blur_radius);
        apply(layer, &mask, &shadow, paint);
    }
    apply(layer, &mask, &mask.alpha, paint);
}

/// Paint a filled circle of diameter `paint.width` (logical) at `center`.
pub fn paint_dot(layer: &mut Layer, center: Point, paint: &Paint) {
    let radius = paint.width * layer.scale() / 2.0;
    if radius <= 0.0 {
        return;
    }
    let center = layer.to_physical(center);
    paint_shape(layer, Shape::Dot { center, radius }, paint);
}

/// Paint a capped segment of width `paint.width` (logical).
///
/// Zero-length segments paint nothing.
pub fn paint_segment(layer: &mut Layer, from: Point, to: Point, paint: &Paint) {
    let half_width = paint.width * layer.scale() / 2.0;
    let (from, to) = (layer.to_physical(from), layer.to_physical(to));
    if half_width <= 0.0 || distance(from, to) < 1e-3 {
        return;
    }
    paint_shape(
        layer,
        Shape::Segment { from, to, half_width, cap: paint.cap },
        paint,
    );
}

/// Turns pointer positions into paint on a layer under the active tool.
#[derive(Debug, Clone, Default)]
pub struct StrokeRenderer {
    pub tools: ToolSettings,
    last: Option<Point>,
}

impl StrokeRenderer {
    pub fn new(tools: ToolSettings) -> Self {
        Self { tools, last: None }
    }

    pub fn is_stroking(&self) -> bool {
        self.last.is_some()
    }

    pub fn last_position(&self) -> Option<Point> {
        self.last
    }

    pub fn begin_stroke(&mut self, layer: &mut Layer, point: Point) {
        debug!(
            "begin {} stroke at ({:.1}, {:.1}) size {:.1}",
            self.tools.tool,
            point[0],
            point[1],
            self.tools.effective_size()
        );
        self.last = Some(point);
        paint_dot(layer, point, &self.tools.paint());
    }

    pub fn continue_stroke(&mut self, layer: &mut Layer, point: Point) {
        let Some(last) = self.last else {
            return;
        };
        paint_segment(layer, last, point, &self.tools.paint());
        self.last = Some(point);
    }

    /// Finish the stroke. Returns true if one was in progress.
    pub fn end_stroke(&mut self) -> bool {
        self.last.take().is_some()
    }

    /// Drop an in-progress stroke without reporting it.
    pub fn cancel(&mut self) {
        self.last = None;
    }
}
