//! The application model: canvas, recognition and notices behind the
//! commands the shell dispatches.

use std::fmt;

use chrono::Utc;
use image::RgbaImage;
use log::info;

use crate::export;
use crate::layers::LayeredCanvas;
use crate::notices::Notices;
use crate::recognition::{self, Presentation, Progress, RecognitionBackend, RecognitionError, RecognitionPipeline};
use crate::settings::Settings;
use crate::shortcuts::Command;
use crate::tools::Tool;

/// Asynchronous input produced by the platform layer.
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformEvent {
    ImageBytes { name: String, bytes: Vec<u8> },
    Warning(String),
    Failed(String),
}

/// Outcome of asking the platform for a clipboard image.
#[derive(Debug, Clone, PartialEq)]
pub enum ClipboardImage {
    Ready(RgbaImage),
    /// The read completes later through [`Platform::poll_events`].
    Pending,
    Empty,
}

/// Side effects the document needs from its host.
pub trait Platform {
    /// Store `bytes` under `name`; returns where they went.
    fn save_file(&mut self, name: &str, mime: &str, bytes: &[u8]) -> anyhow::Result<String>;

    fn copy_text(&mut self, text: &str) -> anyhow::Result<()>;

    /// Clipboard image, possibly delivered later as
    /// [`PlatformEvent::ImageBytes`].
    fn paste_image(&mut self) -> anyhow::Result<ClipboardImage>;

    /// Ask the user for an image; the bytes arrive later through
    /// [`Platform::poll_events`].
    fn open_image_picker(&mut self) -> anyhow::Result<()>;

    fn poll_events(&mut self) -> Vec<PlatformEvent>;
}

pub struct Document {
    pub canvas: LayeredCanvas,
    pub notices: Notices,
    recognition: RecognitionPipeline,
    result: Option<Presentation>,
    settings: Settings,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("canvas", &self.canvas)
            .field("result", &self.result)
            .field("recognizing", &self.recognition.is_busy())
            .finish()
    }
}

impl Document {
    pub fn new(
        settings: Settings,
        size: (u32, u32),
        scale: f32,
        backend: Box<dyn RecognitionBackend>,
    ) -> Self {
        let canvas = LayeredCanvas::new(
            size.0,
            size.1,
            scale,
            settings.tool_settings(),
            settings.history_capacity,
        );
        Self {
            canvas,
            notices: Notices::default(),
            recognition: RecognitionPipeline::new(backend),
            result: None,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn result(&self) -> Option<&Presentation> {
        self.result.as_ref()
    }

    pub fn is_recognizing(&self) -> bool {
        self.recognition.is_busy()
    }

    pub fn progress(&self) -> Option<&Progress> {
        self.recognition.progress()
    }

    /// One-line status for the window title.
    pub fn status(&self) -> String {
        let tools = self.canvas.tools();
        let mut status = format!(
            "{} {} px {} {:.0}%",
            tools.tool,
            tools.size(),
            tools.color.to_hex(),
            tools.opacity() * 100.0
        );
        if let Some(progress) = self.progress() {
            status.push_str(&format!(" | {} ({:.0}%)", progress.phase, progress.fraction * 100.0));
        } else if let Some(result) = &self.result {
            status.push_str(&format!(" | {} words, {}% confidence", result.word_count, result.confidence));
        }
        status
    }

    pub fn execute(&mut self, command: Command, platform: &mut dyn Platform) {
        match command {
            Command::Undo => self.undo(),
            Command::Redo => self.redo(),
            Command::ExportImage => self.export_image(platform),
            Command::ExtractText => self.extract_text(),
            Command::CopyText => self.copy_text(platform),
            Command::SaveText => self.save_text(platform),
            Command::PasteImage => self.paste_image(platform),
            Command::ClearAll => self.clear_all(),
            Command::OpenImage => {
                if let Err(e) = platform.open_image_picker() {
                    self.notices.error(format!("Failed to open image: {e:#}"));
                }
            }
            Command::SelectTool(tool) => self.select_tool(tool),
            Command::IncreaseSize => self.canvas.tools_mut().increase_size(),
            Command::DecreaseSize => self.canvas.tools_mut().decrease_size(),
            Command::SetColor(color) => self.canvas.tools_mut().color = color,
            Command::SetOpacity(opacity) => self.canvas.tools_mut().set_opacity(opacity),
            Command::IncreaseOpacity => self.canvas.tools_mut().increase_opacity(),
            Command::DecreaseOpacity => self.canvas.tools_mut().decrease_opacity(),
        }
    }

    pub fn undo(&mut self) {
        if self.canvas.undo() {
            self.notices.success("Undo");
        }
    }

    pub fn redo(&mut self) {
        if self.canvas.redo() {
            self.notices.success("Redo");
        }
    }

    pub fn clear_all(&mut self) {
        self.canvas.clear_all();
        self.notices.success("Canvas cleared");
    }

    pub fn select_tool(&mut self, tool: Tool) {
        self.canvas.tools_mut().tool = tool;
        let message = match tool {
            Tool::Eraser => "Eraser selected".to_string(),
            _ => format!("{tool} tool selected"),
        };
        self.notices.success(message);
    }

    pub fn load_image_bytes(&mut self, bytes: &[u8]) {
        match self.canvas.load_background(bytes) {
            Ok(()) => self.notices.success("Image loaded successfully"),
            Err(e) => self.notices.error(format!("Failed to load image: {e}")),
        }
    }

    pub fn load_image(&mut self, image: RgbaImage) {
        match self.canvas.set_background(image) {
            Ok(()) => self.notices.success("Image loaded successfully"),
            Err(e) => self.notices.error(format!("Failed to load image: {e}")),
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_image_path(&mut self, path: &std::path::Path) {
        match std::fs::read(path) {
            Ok(bytes) => {
                info!("loading image {}", path.display());
                self.load_image_bytes(&bytes);
            }
            Err(e) => self
                .notices
                .error(format!("Failed to load image {}: {e}", path.display())),
        }
    }

    pub fn paste_image(&mut self, platform: &mut dyn Platform) {
        match platform.paste_image() {
            Ok(ClipboardImage::Ready(image)) => self.load_image(image),
            Ok(ClipboardImage::Pending) => {}
            Ok(ClipboardImage::Empty) => self.notices.warning("No image in clipboard"),
            Err(e) => self.notices.error(format!("Failed to paste image: {e:#}")),
        }
    }

    pub fn export_image(&mut self, platform: &mut dyn Platform) {
        let format = self.settings.export_format;
        let saved = self
            .canvas
            .export_image(format, self.settings.export_quality)
            .map_err(anyhow::Error::from)
            .and_then(|bytes| {
                let name = export::image_file_name(format, Utc::now());
                platform.save_file(&name, format.mime_type(), &bytes)
            });
        match saved {
            Ok(location) => {
                info!("image exported to {location}");
                self.notices.success("Image saved");
            }
            Err(e) => self.notices.error(format!("Failed to save image: {e:#}")),
        }
    }

    pub fn extract_text(&mut self) {
        match self.recognition.submit(&self.canvas.composite()) {
            Ok(_) => {}
            Err(RecognitionError::Busy) => self.notices.warning("OCR is already processing"),
            Err(e) => self.recognition_failed(&e),
        }
    }

    fn recognition_failed(&mut self, error: &RecognitionError) {
        self.result = Some(Presentation::failed());
        self.notices.error(format!("Failed to extract text: {error}"));
    }

    fn exportable_text(&mut self, action: &str) -> Option<String> {
        let text = self
            .result
            .as_ref()
            .and_then(|r| recognition::exportable_text(&r.text))
            .map(str::to_string);
        if text.is_none() {
            self.notices.warning(format!("No text to {action}"));
        }
        text
    }

    pub fn copy_text(&mut self, platform: &mut dyn Platform) {
        let Some(text) = self.exportable_text("copy") else {
            return;
        };
        match platform.copy_text(&text) {
            Ok(()) => self.notices.success("Text copied to clipboard"),
            Err(e) => self.notices.error(format!("Failed to copy text: {e:#}")),
        }
    }

    pub fn save_text(&mut self, platform: &mut dyn Platform) {
        let Some(text) = self.exportable_text("save") else {
            return;
        };
        let name = export::text_file_name(Utc::now());
        match platform.save_file(&name, "text/plain", text.as_bytes()) {
            Ok(location) => {
                info!("text saved to {location}");
                self.notices.success("Text file saved");
            }
            Err(e) => self.notices.error(format!("Failed to save text: {e:#}")),
        }
    }

    /// Apply finished background work. Returns true when something the
    /// user can see changed.
    pub fn update(&mut self, platform: &mut dyn Platform) -> bool {
        let mut changed = false;

        if let Some(outcome) = self.recognition.poll() {
            match outcome {
                Ok(recognition) => {
                    let shown = Presentation::new(&recognition);
                    if shown.has_text() {
                        self.notices.success(format!("Extracted {} words", shown.word_count));
                    } else {
                        self.notices.warning("No text found in image");
                    }
                    info!("recognized text:\n{}", shown.text);
                    self.result = Some(shown);
                }
                Err(e) => self.recognition_failed(&e),
            }
            changed = true;
        }

        for event in platform.poll_events() {
            match event {
                PlatformEvent::ImageBytes { name, bytes } => {
                    info!("loading image {name}");
                    self.load_image_bytes(&bytes);
                }
                PlatformEvent::Warning(message) => self.notices.warning(message),
                PlatformEvent::Failed(message) => self.notices.error(message),
            }
            changed = true;
        }

        changed || self.recognition.is_busy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::ExportFormat;
    use crate::notices::{Notice, NoticeLevel};
    use crate::raster::Color;
    use crate::recognition::{Recognition, Reporter, NO_TEXT_PLACEHOLDER};
    use image::Rgba;

    #[derive(Default)]
    struct RecordingPlatform {
        saved: Vec<(String, String, Vec<u8>)>,
        copied: Vec<String>,
        clipboard_image: Option<RgbaImage>,
        clipboard_pending: bool,
        pending: Vec<PlatformEvent>,
        fail: bool,
    }

    impl Platform for RecordingPlatform {
        fn save_file(&mut self, name: &str, mime: &str, bytes: &[u8]) -> anyhow::Result<String> {
            if self.fail {
                anyhow::bail!("disk full");
            }
            self.saved.push((name.to_string(), mime.to_string(), bytes.to_vec()));
            Ok(name.to_string())
        }

        fn copy_text(&mut self, text: &str) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("clipboard busy");
            }
            self.copied.push(text.to_string());
            Ok(())
        }

        fn paste_image(&mut self) -> anyhow::Result<ClipboardImage> {
            if self.clipboard_pending {
                return Ok(ClipboardImage::Pending);
            }
            Ok(self.clipboard_image.take().map_or(ClipboardImage::Empty, ClipboardImage::Ready))
        }

        fn open_image_picker(&mut self) -> anyhow::Result<()> {
            Ok(())
        }

        fn poll_events(&mut self) -> Vec<PlatformEvent> {
            std::mem::take(&mut self.pending)
        }
    }

    /// Finishes every job immediately with a fixed text.
    struct InstantBackend(&'static str);

    impl RecognitionBackend for InstantBackend {
        fn start(&self, _png: Vec<u8>, reporter: Reporter) -> Result<(), RecognitionError> {
            reporter.finish(Ok(Recognition { text: self.0.to_string(), confidence: 88.0 }));
            Ok(())
        }
    }

    /// Never finishes while the reporter is alive.
    struct StalledBackend(std::cell::RefCell<Vec<Reporter>>);

    impl RecognitionBackend for StalledBackend {
        fn start(&self, _png: Vec<u8>, reporter: Reporter) -> Result<(), RecognitionError> {
            self.0.borrow_mut().push(reporter);
            Ok(())
        }
    }

    fn document(text: &'static str) -> Document {
        Document::new(Settings::default(), (32, 16), 1.0, Box::new(InstantBackend(text)))
    }

    fn last_notice(doc: &mut Document) -> Option<Notice> {
        doc.notices.drain().last()
    }

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        export::encode(&RgbaImage::from_pixel(w, h, Rgba([255, 0, 0, 255])), ExportFormat::Png, 1.0).unwrap()
    }

    #[test]
    fn extract_then_copy_and_save() {
        let mut doc = document("  Hello OCR world ");
        let mut platform = RecordingPlatform::default();

        doc.execute(Command::ExtractText, &mut platform);
        assert!(doc.update(&mut platform));
        let result = doc.result().unwrap();
        assert_eq!(result.text, "Hello OCR world");
        assert_eq!(result.confidence, 88);
        assert_eq!(last_notice(&mut doc).unwrap().message, "Extracted 3 words");

        doc.execute(Command::CopyText, &mut platform);
        assert_eq!(platform.copied, ["Hello OCR world"]);

        doc.execute(Command::SaveText, &mut platform);
        let (name, mime, bytes) = &platform.saved[0];
        assert!(name.starts_with("ocr-text-") && name.ends_with(".txt"));
        assert_eq!(mime, "text/plain");
        assert_eq!(bytes.as_slice(), b"Hello OCR world");
    }

    #[test]
    fn empty_recognition_refuses_copy() {
        let mut doc = document("   ");
        let mut platform = RecordingPlatform::default();
        doc.extract_text();
        doc.update(&mut platform);
        assert_eq!(doc.result().unwrap().text, NO_TEXT_PLACEHOLDER);
        assert_eq!(last_notice(&mut doc).unwrap().level, NoticeLevel::Warning);

        doc.copy_text(&mut platform);
        assert!(platform.copied.is_empty());
        assert_eq!(last_notice(&mut doc).unwrap().message, "No text to copy");

        doc.save_text(&mut platform);
        assert!(platform.saved.is_empty());
        assert_eq!(last_notice(&mut doc).unwrap().message, "No text to save");
    }

    #[test]
    fn busy_submission_warns() {
        let backend = StalledBackend(Default::default());
        let mut doc = Document::new(Settings::default(), (8, 8), 1.0, Box::new(backend));
        let mut platform = RecordingPlatform::default();
        doc.extract_text();
        assert!(doc.is_recognizing());
        doc.extract_text();
        let notice = last_notice(&mut doc).unwrap();
        assert_eq!(notice.level, NoticeLevel::Warning);
        assert_eq!(notice.message, "OCR is already processing");
        assert!(doc.update(&mut platform));
        assert!(doc.is_recognizing());
    }

    #[test]
    fn export_image_saves_png() {
        let mut doc = document("");
        let mut platform = RecordingPlatform::default();
        doc.execute(Command::ExportImage, &mut platform);

        let (name, mime, bytes) = &platform.saved[0];
        assert!(name.starts_with("ocr-canvas-") && name.ends_with(".png"));
        assert_eq!(mime, "image/png");
        let decoded = image::load_from_memory(bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 16));
        assert_eq!(last_notice(&mut doc).unwrap().message, "Image saved");
    }

    #[test]
    fn save_failure_is_reported() {
        let mut doc = document("");
        let mut platform = RecordingPlatform { fail: true, ..Default::default() };
        doc.export_image(&mut platform);
        let notice = last_notice(&mut doc).unwrap();
        assert_eq!(notice.level, NoticeLevel::Error);
        assert!(notice.message.contains("disk full"));
    }

    #[test]
    fn images_arrive_from_platform_and_clipboard() {
        let mut doc = document("");
        let mut platform = RecordingPlatform {
            pending: vec![PlatformEvent::ImageBytes { name: "a.png".into(), bytes: png_bytes(4, 4) }],
            ..Default::default()
        };
        assert!(doc.update(&mut platform));
        assert!(doc.canvas.has_background_image());

        doc.clear_all();
        platform.clipboard_image = Some(RgbaImage::from_pixel(2, 2, Rgba([0, 0, 255, 255])));
        doc.execute(Command::PasteImage, &mut platform);
        assert!(doc.canvas.has_background_image());

        doc.execute(Command::PasteImage, &mut platform);
        assert_eq!(last_notice(&mut doc).unwrap().message, "No image in clipboard");
    }

    #[test]
    fn pending_paste_resolves_through_events() {
        let mut doc = document("");
        let mut platform = RecordingPlatform { clipboard_pending: true, ..Default::default() };
        doc.execute(Command::PasteImage, &mut platform);
        assert!(doc.notices.is_empty());
        assert!(!doc.canvas.has_background_image());

        platform.pending.push(PlatformEvent::Warning("No image in clipboard".into()));
        doc.update(&mut platform);
        assert_eq!(last_notice(&mut doc).unwrap().level, NoticeLevel::Warning);

        doc.execute(Command::PasteImage, &mut platform);
        platform.pending.push(PlatformEvent::ImageBytes { name: "pasted.png".into(), bytes: png_bytes(3, 3) });
        doc.update(&mut platform);
        assert!(doc.canvas.has_background_image());
        assert_eq!(last_notice(&mut doc).unwrap().message, "Image loaded successfully");
    }

    #[test]
    fn undecodable_image_keeps_canvas() {
        let mut doc = document("");
        doc.load_image_bytes(b"GIF89a");
        assert!(!doc.canvas.has_background_image());
        assert_eq!(last_notice(&mut doc).unwrap().level, NoticeLevel::Error);
    }

    #[test]
    fn tool_and_size_commands() {
        let mut doc = document("");
        let mut platform = RecordingPlatform::default();
        doc.execute(Command::SelectTool(Tool::Marker), &mut platform);
        assert_eq!(doc.canvas.tools().tool, Tool::Marker);
        assert_eq!(last_notice(&mut doc).unwrap().message, "Marker tool selected");

        doc.execute(Command::IncreaseSize, &mut platform);
        assert_eq!(doc.canvas.tools().size(), 10);
        doc.execute(Command::DecreaseSize, &mut platform);
        doc.execute(Command::DecreaseSize, &mut platform);
        assert_eq!(doc.canvas.tools().size(), 6);
        assert!(doc.status().starts_with("Marker 6 px"));
    }

    #[test]
    fn color_and_opacity_commands_reach_new_strokes() {
        let mut doc = document("");
        let mut platform = RecordingPlatform::default();
        doc.execute(Command::SelectTool(Tool::Pen), &mut platform);
        doc.execute(Command::SetColor(Color::rgb(255, 0, 0)), &mut platform);
        doc.execute(Command::SetOpacity(0.5), &mut platform);
        assert_eq!(doc.canvas.tools().color, Color::rgb(255, 0, 0));
        assert!(doc.status().contains("#ff0000 50%"), "{}", doc.status());

        doc.canvas.pointer_down([8.5, 8.5]);
        doc.canvas.pointer_up();
        let px = *doc.canvas.drawing().image().get_pixel(8, 8);
        assert_eq!([px[0], px[1], px[2]], [255, 0, 0]);
        assert!((127..=128).contains(&px[3]), "alpha {}", px[3]);

        doc.execute(Command::IncreaseOpacity, &mut platform);
        assert!((doc.canvas.tools().opacity() - 0.6).abs() < 1e-6);
        doc.execute(Command::DecreaseOpacity, &mut platform);
        doc.execute(Command::DecreaseOpacity, &mut platform);
        assert!((doc.canvas.tools().opacity() - 0.4).abs() < 1e-6);
    }

    #[test]
    fn undo_notice_only_when_something_changed() {
        let mut doc = document("");
        let mut platform = RecordingPlatform::default();
        doc.execute(Command::Undo, &mut platform);
        assert!(doc.notices.is_empty());

        doc.canvas.pointer_down([4.0, 4.0]);
        doc.canvas.pointer_up();
        doc.execute(Command::Undo, &mut platform);
        assert_eq!(last_notice(&mut doc).unwrap().message, "Undo");
        doc.execute(Command::Redo, &mut platform);
        assert_eq!(last_notice(&mut doc).unwrap().message, "Redo");
    }
}
