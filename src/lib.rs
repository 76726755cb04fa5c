pub mod composite;
pub mod document;
pub mod export;
pub mod history;
pub mod layers;
pub mod notices;
pub mod platform;
pub mod preprocess;
pub mod raster;
pub mod recognition;
pub mod settings;
pub mod shortcuts;
pub mod stroke;
pub mod tools;

mod app;
mod app_state;
mod event_handler;
mod renderer;
mod state;
mod texture;
mod update_logic;
mod vertex;

// Re-export the main public interface
pub use app::run;
pub use document::Document;
pub use layers::LayeredCanvas;

// Re-export for WASM compatibility
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg_attr(target_arch = "wasm32", wasm_bindgen(start))]
pub async fn start() {
    if let Err(e) = run().await {
        log::error!("{e:#}");
    }
}
