use crate::app_state::State;
use crate::notices::{Instant, window_title};
use crate::texture::CanvasTexture;

const WINDOW_TITLE: &str = "OCR Canvas";

impl State {
    pub fn update(&mut self) {
        self.document.update(&mut self.platform);

        let now = Instant::now();
        self.notice_board.post(self.document.notices.drain(), now);
        let title = window_title(WINDOW_TITLE, &self.document.status(), self.notice_board.current(now));
        if title != self.title {
            self.window.set_title(&title);
            self.title = title;
        }

        self.update_texture();
    }

    fn update_texture(&mut self) {
        let canvas = &self.document.canvas;
        if self.uploaded == Some(canvas.generation()) {
            return;
        }
        if self.canvas_texture.size() != canvas.physical_size() {
            self.canvas_texture =
                CanvasTexture::new(&self.gpu.device, &self.gpu.texture_layout, canvas.physical_size());
        }
        self.canvas_texture.upload(&self.gpu.queue, &canvas.composite());
        self.uploaded = Some(canvas.generation());
    }
}
