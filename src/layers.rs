//! Background and drawing layers, their history and the pointer interface
//! that turns input into strokes.

use image::imageops::{self, FilterType};
use image::RgbaImage;
use log::{debug, info};
use thiserror::Error;

use crate::composite;
use crate::export::{self, ExportError, ExportFormat};
use crate::history::HistoryRing;
use crate::raster::{Color, Layer, Point, Snapshot};
use crate::stroke::StrokeRenderer;
use crate::tools::ToolSettings;

/// Fill color of the background layer outside the fitted image.
pub const FALLBACK_BACKGROUND: Color = Color::rgb(0x1a, 0x1a, 0x2e);

#[derive(Debug, Error)]
pub enum CanvasError {
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("image has no pixels")]
    EmptyImage,
}

/// Placement of a fitted image inside a target, in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FitRect {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

/// Scale `image` to fit inside `target` preserving aspect ratio and center
/// it. The constraining dimension fills the target exactly.
pub fn fit_rect(image: (u32, u32), target: (u32, u32)) -> Option<FitRect> {
    let (iw, ih) = image;
    let (tw, th) = target;
    if iw == 0 || ih == 0 || tw == 0 || th == 0 {
        return None;
    }

    // iw/ih > tw/th without going through floats.
    let wider = iw as u64 * th as u64 > tw as u64 * ih as u64;
    let rect = if wider {
        let height = ((tw as f64 * ih as f64 / iw as f64).round() as u32).clamp(1, th);
        FitRect { x: 0, y: ((th - height) / 2) as i64, width: tw, height }
    } else {
        let width = ((th as f64 * iw as f64 / ih as f64).round() as u32).clamp(1, tw);
        FitRect { x: ((tw - width) / 2) as i64, y: 0, width, height: th }
    };
    Some(rect)
}

/// Two equally sized layers plus the undo history of the drawing layer.
#[derive(Debug)]
pub struct LayeredCanvas {
    background: Layer,
    drawing: Layer,
    background_image: Option<RgbaImage>,
    history: HistoryRing<Snapshot>,
    stroke: StrokeRenderer,
    /// Bumped on every pixel change so presenters know when to re-upload.
    generation: u64,
}

impl LayeredCanvas {
    pub fn new(width: u32, height: u32, scale: f32, tools: ToolSettings, history_capacity: usize) -> Self {
        let mut background = Layer::new(width, height, scale);
        background.fill(FALLBACK_BACKGROUND);
        let drawing = Layer::new(width, height, scale);

        let mut history = HistoryRing::new(history_capacity);
        history.push(drawing.snapshot());

        Self {
            background,
            drawing,
            background_image: None,
            history,
            stroke: StrokeRenderer::new(tools),
            generation: 0,
        }
    }

    pub fn logical_size(&self) -> (u32, u32) {
        self.drawing.logical_size()
    }

    pub fn physical_size(&self) -> (u32, u32) {
        self.drawing.physical_size()
    }

    pub fn scale(&self) -> f32 {
        self.drawing.scale()
    }

    pub fn background(&self) -> &Layer {
        &self.background
    }

    pub fn drawing(&self) -> &Layer {
        &self.drawing
    }

    pub fn has_background_image(&self) -> bool {
        self.background_image.is_some()
    }

    pub fn history(&self) -> &HistoryRing<Snapshot> {
        &self.history
    }

    pub fn tools(&self) -> &ToolSettings {
        &self.stroke.tools
    }

    pub fn tools_mut(&mut self) -> &mut ToolSettings {
        &mut self.stroke.tools
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_stroking(&self) -> bool {
        self.stroke.is_stroking()
    }

    fn touch(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    fn reset_history(&mut self) {
        self.history.reset();
        self.history.push(self.drawing.snapshot());
    }

    /// Reallocate both layers. Drawing content and history are discarded
    /// and the background image, if any, is fitted to the new size.
    ///
    /// Returns false when nothing changed.
    pub fn resize(&mut self, width: u32, height: u32, scale: f32) -> bool {
        if (width, height) == self.logical_size() && scale == self.scale() {
            return false;
        }
        self.stroke.cancel();
        self.background = Layer::new(width, height, scale);
        self.drawing = Layer::new(width, height, scale);
        self.redraw_background();
        self.reset_history();
        self.touch();
        debug!("canvas resized to {width}x{height} @ {scale}");
        true
    }

    fn redraw_background(&mut self) {
        self.background.fill(FALLBACK_BACKGROUND);
        let Some(source) = &self.background_image else {
            return;
        };
        let Some(rect) = fit_rect(source.dimensions(), self.background.physical_size()) else {
            return;
        };
        let scaled = imageops::resize(source, rect.width, rect.height, FilterType::Triangle);
        imageops::overlay(self.background.image_mut(), &scaled, rect.x, rect.y);
    }

    /// Replace the background image and draw it letterboxed.
    pub fn set_background(&mut self, image: RgbaImage) -> Result<(), CanvasError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(CanvasError::EmptyImage);
        }
        info!("background image set ({}x{})", image.width(), image.height());
        self.background_image = Some(image);
        self.redraw_background();
        self.touch();
        Ok(())
    }

    /// Decode `bytes` and use the result as background. The canvas is left
    /// untouched on error.
    pub fn load_background(&mut self, bytes: &[u8]) -> Result<(), CanvasError> {
        let image = image::load_from_memory(bytes)?.to_rgba8();
        self.set_background(image)
    }

    pub fn clear_drawing(&mut self) {
        self.stroke.cancel();
        self.drawing.clear();
        self.history.push(self.drawing.snapshot());
        self.touch();
    }

    /// Back to the initial state: no image, blank drawing, one history entry.
    pub fn clear_all(&mut self) {
        self.stroke.cancel();
        self.background_image = None;
        self.background.fill(FALLBACK_BACKGROUND);
        self.drawing.clear();
        self.reset_history();
        self.touch();
        info!("canvas cleared");
    }

    pub fn composite(&self) -> RgbaImage {
        composite::composite(self.background.image(), self.drawing.image())
    }

    pub fn export_image(&self, format: ExportFormat, quality: f32) -> Result<Vec<u8>, ExportError> {
        export::encode(&self.composite(), format, quality)
    }

    pub fn undo(&mut self) -> bool {
        let restored = match self.history.undo() {
            Some(snapshot) => self.drawing.restore(snapshot),
            None => false,
        };
        if restored {
            self.stroke.cancel();
            self.touch();
        }
        restored
    }

    pub fn redo(&mut self) -> bool {
        let restored = match self.history.redo() {
            Some(snapshot) => self.drawing.restore(snapshot),
            None => false,
        };
        if restored {
            self.stroke.cancel();
            self.touch();
        }
        restored
    }

    pub fn pointer_down(&mut self, point: Point) {
        if self.stroke.is_stroking() {
            self.pointer_up();
        }
        self.stroke.begin_stroke(&mut self.drawing, point);
        self.touch();
    }

    pub fn pointer_move(&mut self, point: Point) {
        if !self.stroke.is_stroking() {
            return;
        }
        self.stroke.continue_stroke(&mut self.drawing, point);
        self.touch();
    }

    /// Finish the active stroke and record it. Returns false when there was
    /// no stroke.
    pub fn pointer_up(&mut self) -> bool {
        if !self.stroke.end_stroke() {
            return false;
        }
        self.history.push(self.drawing.snapshot());
        true
    }

    pub fn pointer_leave(&mut self) -> bool {
        self.pointer_up()
    }
}
