use winit::event::*;
use winit::keyboard::{Key, ModifiersState, NamedKey};

use crate::app_state::{State, logical_size};
use crate::raster::Point;
use crate::shortcuts::{self, KeyName, KeyPress, ModifierStyle};
use crate::state::PointerSource;

fn command_modifier(modifiers: ModifiersState) -> bool {
    ModifierStyle::host().is_command(modifiers.control_key(), modifiers.super_key())
}

fn key_press(event: &KeyEvent, modifiers: ModifiersState) -> Option<KeyPress> {
    let key = match &event.logical_key {
        Key::Named(NamedKey::Enter) => KeyName::Enter,
        Key::Named(NamedKey::Backspace) => KeyName::Backspace,
        Key::Character(s) => KeyName::Char(s.chars().next()?),
        _ => return None,
    };
    Some(KeyPress {
        key,
        modifier: command_modifier(modifiers),
        shift: modifiers.shift_key(),
    })
}

impl State {
    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.gpu.config.width = new_size.width;
            self.gpu.config.height = new_size.height;
            self.gpu
                .surface
                .configure(&self.gpu.device, &self.gpu.config);

            let (width, height) = logical_size(new_size, self.window.scale_factor());
            let scale = self.window.scale_factor() as f32;
            if self.document.canvas.resize(width, height, scale) {
                self.input.active = None;
            }
        }
    }

    fn to_logical(&self, x: f64, y: f64) -> Point {
        let scale = self.window.scale_factor();
        [(x / scale) as f32, (y / scale) as f32]
    }

    fn pointer_pressed(&mut self, source: PointerSource, point: Point) {
        if self.input.active.is_some() {
            return;
        }
        self.input.active = Some(source);
        self.document.canvas.pointer_down(point);
    }

    fn pointer_moved(&mut self, source: PointerSource, point: Point) {
        if self.input.active == Some(source) {
            self.document.canvas.pointer_move(point);
        }
    }

    fn pointer_released(&mut self, source: PointerSource) {
        if self.input.active == Some(source) {
            self.input.active = None;
            self.document.canvas.pointer_up();
        }
    }

    /// Feed a window event to the document. Returns true when consumed.
    pub fn input(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::ModifiersChanged(modifiers) => {
                self.input.modifiers = modifiers.state();
                false
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                match state {
                    ElementState::Pressed => self.pointer_pressed(PointerSource::Mouse, self.input.pointer),
                    ElementState::Released => self.pointer_released(PointerSource::Mouse),
                }
                true
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.input.pointer = self.to_logical(position.x, position.y);
                self.pointer_moved(PointerSource::Mouse, self.input.pointer);
                true
            }
            WindowEvent::CursorLeft { .. } => {
                if self.input.active == Some(PointerSource::Mouse) {
                    self.input.active = None;
                    self.document.canvas.pointer_leave();
                }
                true
            }
            WindowEvent::Touch(touch) => {
                let source = PointerSource::Touch(touch.id);
                let point = self.to_logical(touch.location.x, touch.location.y);
                match touch.phase {
                    TouchPhase::Started => self.pointer_pressed(source, point),
                    TouchPhase::Moved => self.pointer_moved(source, point),
                    TouchPhase::Ended | TouchPhase::Cancelled => self.pointer_released(source),
                }
                true
            }
            // Browsers deliver drops to the page listeners in `platform::web`.
            #[cfg(not(target_arch = "wasm32"))]
            WindowEvent::DroppedFile(path) => {
                self.document.load_image_path(path);
                true
            }
            WindowEvent::KeyboardInput {
                event: key_event, ..
            } => {
                if key_event.state != ElementState::Pressed {
                    return false;
                }
                let Some(press) = key_press(key_event, self.input.modifiers) else {
                    return false;
                };
                match shortcuts::command_for(&press) {
                    Some(command) => {
                        log::debug!("{press:?} -> {command:?}");
                        self.document.execute(command, &mut self.platform);
                        true
                    }
                    None => false,
                }
            }
            _ => false,
        }
    }
}
