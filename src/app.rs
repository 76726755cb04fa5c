use std::sync::Arc;

use anyhow::Context;
use winit::{
    application::ApplicationHandler,
    event::*,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use crate::app_state::State;
use crate::settings::Settings;

#[cfg(target_os = "macos")]
use winit::platform::macos::WindowAttributesExtMacOS;

/// Id of the page element the canvas is mounted into on the web.
#[cfg(target_arch = "wasm32")]
pub const MOUNT_ELEMENT_ID: &str = "ocr-canvas";

struct App {
    settings: Settings,
    state: Option<State>,
}

#[cfg(target_arch = "wasm32")]
fn mount_canvas(window: &Window) -> anyhow::Result<()> {
    use winit::dpi::PhysicalSize;
    use winit::platform::web::WindowExtWebSys;

    let js_err = |e: wasm_bindgen::JsValue| anyhow::anyhow!("{e:?}");
    let canvas = window.canvas().context("window has no canvas")?;
    let web_window = web_sys::window().context("no browser window")?;
    let document = web_window.document().context("no document")?;
    let mount = document
        .get_element_by_id(MOUNT_ELEMENT_ID)
        .with_context(|| format!("no #{MOUNT_ELEMENT_ID} element on the page"))?;
    mount
        .append_child(&web_sys::Element::from(canvas.clone()))
        .map_err(js_err)?;

    let style = canvas.style();
    style.set_property("width", "100%").map_err(js_err)?;
    style.set_property("height", "100%").map_err(js_err)?;
    style.set_property("display", "block").map_err(js_err)?;

    let ratio = web_window.device_pixel_ratio();
    let width = mount.client_width().max(1) as f64 * ratio;
    let height = mount.client_height().max(1) as f64 * ratio;
    log::info!("mounting canvas at {width}x{height} (DPR: {ratio})");
    let _ = window.request_inner_size(PhysicalSize::new(width as u32, height as u32));
    Ok(())
}

impl App {
    fn init(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let mut window_attributes = Window::default_attributes().with_title("OCR Canvas");

        #[cfg(target_os = "macos")]
        {
            window_attributes = window_attributes
                .with_titlebar_transparent(true)
                .with_title_hidden(false)
                .with_fullsize_content_view(true);
        }

        let window = event_loop
            .create_window(window_attributes)
            .context("failed to create window")?;

        #[cfg(target_arch = "wasm32")]
        mount_canvas(&window)?;

        let state = pollster::block_on(State::new(Arc::new(window), self.settings.clone()))?;
        self.state = Some(state);
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_none() {
            if let Err(e) = self.init(event_loop) {
                log::error!("startup failed: {e:#}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let Some(state) = &mut self.state else {
            return;
        };
        if window_id != state.window().id() || state.input(&event) {
            return;
        }
        match event {
            WindowEvent::CloseRequested
            | WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state: ElementState::Pressed,
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        ..
                    },
                ..
            } => event_loop.exit(),
            WindowEvent::Resized(physical_size) => {
                log::info!("WindowEvent::Resized: {}x{}", physical_size.width, physical_size.height);
                state.resize(physical_size);
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                let size = state.window().inner_size();
                state.resize(size);
            }
            WindowEvent::RedrawRequested => {
                state.update();
                match state.render() {
                    Ok(_) => {}
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => state.resize(state.size),
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("GPU out of memory");
                        event_loop.exit();
                    }
                    Err(e) => log::warn!("render failed: {e:?}"),
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.window().request_redraw();
        }
    }
}

pub async fn run() -> anyhow::Result<()> {
    cfg_if::cfg_if! {
        if #[cfg(target_arch = "wasm32")] {
            std::panic::set_hook(Box::new(console_error_panic_hook::hook));
            console_log::init_with_level(log::Level::Info)
                .map_err(|e| anyhow::anyhow!("couldn't initialize logger: {e}"))?;
        } else {
            env_logger::init();
        }
    }

    let settings = Settings::load_or_default();
    let event_loop = EventLoop::new().context("failed to create event loop")?;
    let mut app = App { settings, state: None };

    event_loop.run_app(&mut app).context("event loop failed")?;
    Ok(())
}
