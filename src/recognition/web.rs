//! Browser recognition through a page-provided JavaScript function.
//!
//! The page defines `ocrCanvasRecognize(pngBytes, onProgress)` returning a
//! promise of `{ text, confidence }`; `onProgress(fraction, status)` may be
//! called any number of times while it runs.

use js_sys::{Function, Promise, Reflect, Uint8Array};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{spawn_local, JsFuture};

use super::{Progress, Recognition, RecognitionBackend, RecognitionError, Reporter};

pub const BRIDGE_FUNCTION: &str = "ocrCanvasRecognize";

#[derive(Debug, Default)]
pub struct WebBackend;

fn js_error(value: JsValue) -> RecognitionError {
    let message = value
        .as_string()
        .or_else(|| value.dyn_ref::<js_sys::Error>().map(|e| String::from(e.message())))
        .unwrap_or_else(|| format!("{value:?}"));
    RecognitionError::Engine(message)
}

fn bridge() -> Result<Function, RecognitionError> {
    Reflect::get(&js_sys::global(), &JsValue::from_str(BRIDGE_FUNCTION))
        .map_err(js_error)?
        .dyn_into::<Function>()
        .map_err(|_| RecognitionError::Engine(format!("{BRIDGE_FUNCTION} is not defined on the page")))
}

fn read_result(value: &JsValue) -> Result<Recognition, RecognitionError> {
    let text = Reflect::get(value, &JsValue::from_str("text"))
        .map_err(js_error)?
        .as_string()
        .ok_or_else(|| RecognitionError::Engine("result has no text".into()))?;
    let confidence = Reflect::get(value, &JsValue::from_str("confidence"))
        .map_err(js_error)?
        .as_f64()
        .unwrap_or(0.0) as f32;
    Ok(Recognition { text, confidence })
}

impl RecognitionBackend for WebBackend {
    fn start(&self, png: Vec<u8>, reporter: Reporter) -> Result<(), RecognitionError> {
        let function = bridge()?;
        let sink = reporter.progress_sink();
        let on_progress = Closure::wrap(Box::new(move |fraction: f64, _status: JsValue| {
            sink.report(Progress::recognizing(fraction as f32));
        }) as Box<dyn FnMut(f64, JsValue)>);

        let bytes = Uint8Array::from(png.as_slice());
        let promise: Promise = function
            .call2(&JsValue::NULL, &bytes, on_progress.as_ref().unchecked_ref())
            .map_err(js_error)?
            .dyn_into()
            .map_err(|_| RecognitionError::Engine(format!("{BRIDGE_FUNCTION} did not return a promise")))?;

        spawn_local(async move {
            let result = JsFuture::from(promise)
                .await
                .map_err(js_error)
                .and_then(|value| read_result(&value));
            drop(on_progress);
            reporter.finish(result);
        });
        Ok(())
    }
}
