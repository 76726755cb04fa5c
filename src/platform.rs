//! Host side effects: files, clipboard and the image picker.

use crate::document::{ClipboardImage, Platform, PlatformEvent};

cfg_if::cfg_if! {
    if #[cfg(target_arch = "wasm32")] {
        pub use web::WebPlatform as HostPlatform;
    } else {
        pub use native::NativePlatform as HostPlatform;
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::borrow::Cow;
    use std::path::{Path, PathBuf};

    use anyhow::{Context, bail};
    use image::RgbaImage;

    use super::*;

    /// Writes exports into a directory and talks to the system clipboard.
    pub struct NativePlatform {
        export_dir: PathBuf,
        clipboard: Option<arboard::Clipboard>,
    }

    impl NativePlatform {
        pub fn new(export_dir: impl Into<PathBuf>) -> Self {
            Self {
                export_dir: export_dir.into(),
                clipboard: None,
            }
        }

        fn clipboard(&mut self) -> anyhow::Result<&mut arboard::Clipboard> {
            if self.clipboard.is_none() {
                self.clipboard = Some(arboard::Clipboard::new().context("cannot open clipboard")?);
            }
            self.clipboard.as_mut().context("clipboard unavailable")
        }
    }

    impl Platform for NativePlatform {
        fn save_file(&mut self, name: &str, _mime: &str, bytes: &[u8]) -> anyhow::Result<String> {
            std::fs::create_dir_all(&self.export_dir)
                .with_context(|| format!("cannot create {}", self.export_dir.display()))?;
            let path = self.export_dir.join(name);
            std::fs::write(&path, bytes).with_context(|| format!("cannot write {}", path.display()))?;
            Ok(path.display().to_string())
        }

        fn copy_text(&mut self, text: &str) -> anyhow::Result<()> {
            self.clipboard()?
                .set_text(text.to_string())
                .context("cannot write clipboard")
        }

        /// Raw clipboard image first, then clipboard text naming an image file.
        fn paste_image(&mut self) -> anyhow::Result<ClipboardImage> {
            let clipboard = self.clipboard()?;
            match clipboard.get_image() {
                Ok(data) => {
                    let bytes: Cow<'_, [u8]> = data.bytes;
                    let image = RgbaImage::from_raw(data.width as u32, data.height as u32, bytes.into_owned())
                        .context("clipboard image has an unexpected size")?;
                    return Ok(ClipboardImage::Ready(image));
                }
                Err(arboard::Error::ContentNotAvailable) => {}
                Err(e) => return Err(e).context("cannot read clipboard"),
            }

            let Ok(text) = clipboard.get_text() else {
                return Ok(ClipboardImage::Empty);
            };
            let path = Path::new(text.trim());
            if !path.is_file() {
                return Ok(ClipboardImage::Empty);
            }
            let image = image::open(path).with_context(|| format!("cannot open {}", path.display()))?;
            Ok(ClipboardImage::Ready(image.to_rgba8()))
        }

        fn open_image_picker(&mut self) -> anyhow::Result<()> {
            bail!("no file picker here; drop an image onto the window or paste one")
        }

        fn poll_events(&mut self) -> Vec<PlatformEvent> {
            Vec::new()
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn save_file_writes_into_export_dir() {
            let dir = std::env::temp_dir().join(format!("ocr-canvas-export-{}", uuid::Uuid::new_v4()));
            let mut platform = NativePlatform::new(&dir);
            let location = platform.save_file("ocr-text-x.txt", "text/plain", b"hello").unwrap();
            assert_eq!(std::fs::read(dir.join("ocr-text-x.txt")).unwrap(), b"hello");
            assert!(location.ends_with("ocr-text-x.txt"));
            std::fs::remove_dir_all(&dir).ok();
        }

        #[test]
        fn picker_is_unavailable() {
            let mut platform = NativePlatform::new(".");
            assert!(platform.open_image_picker().is_err());
            assert!(platform.poll_events().is_empty());
        }
    }
}

#[cfg(target_arch = "wasm32")]
mod web {
    use std::cell::RefCell;
    use std::rc::Rc;

    use anyhow::anyhow;
    use js_sys::{Array, Promise, Uint8Array};
    use wasm_bindgen::prelude::*;
    use wasm_bindgen::JsCast;
    use wasm_bindgen_futures::{spawn_local, JsFuture};
    use web_sys::{
        Blob, BlobPropertyBag, ClipboardEvent, ClipboardItem, DataTransfer, DragEvent, Event, File, FileReader,
        HtmlAnchorElement, HtmlInputElement, Url,
    };

    use super::*;

    type Inbox = Rc<RefCell<Vec<PlatformEvent>>>;
    type Listener = Closure<dyn FnMut(Event)>;

    fn js_err(value: JsValue) -> anyhow::Error {
        anyhow!("{}", value.as_string().unwrap_or_else(|| format!("{value:?}")))
    }

    fn document() -> anyhow::Result<web_sys::Document> {
        web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| anyhow!("no document"))
    }

    fn is_image(file: &File) -> bool {
        file.type_().starts_with("image/")
    }

    /// First image among pasted items.
    fn pasted_image(data: &DataTransfer) -> Option<File> {
        let items = data.items();
        (0..items.length())
            .filter_map(|i| items.get(i))
            .filter(|item| item.kind() == "file" && item.type_().starts_with("image/"))
            .find_map(|item| item.get_as_file().ok().flatten())
    }

    /// Read `file` and queue its bytes for the document.
    fn read_file(inbox: &Inbox, file: File) {
        let reader = match FileReader::new() {
            Ok(reader) => reader,
            Err(e) => {
                inbox
                    .borrow_mut()
                    .push(PlatformEvent::Failed(format!("Failed to load image: {}", js_err(e))));
                return;
            }
        };
        let name = file.name();
        let loaded = reader.clone();
        let target = Rc::clone(inbox);
        let on_load = Closure::once_into_js(move || {
            let event = match loaded.result() {
                Ok(buffer) => PlatformEvent::ImageBytes {
                    name,
                    bytes: Uint8Array::new(&buffer).to_vec(),
                },
                Err(e) => PlatformEvent::Failed(format!("Failed to load image: {}", js_err(e))),
            };
            target.borrow_mut().push(event);
        });
        reader.set_onload(Some(on_load.unchecked_ref()));
        if let Err(e) = reader.read_as_array_buffer(&file) {
            inbox
                .borrow_mut()
                .push(PlatformEvent::Failed(format!("Failed to load image: {}", js_err(e))));
        }
    }

    async fn read_clipboard_image(read: Promise) -> anyhow::Result<Option<Vec<u8>>> {
        let items: Array = JsFuture::from(read)
            .await
            .map_err(js_err)?
            .dyn_into()
            .map_err(|_| anyhow!("clipboard returned no items"))?;
        for item in items.iter() {
            let item: ClipboardItem = item.dyn_into().map_err(|_| anyhow!("not a clipboard item"))?;
            let Some(kind) = item
                .types()
                .iter()
                .filter_map(|t| t.as_string())
                .find(|t| t.starts_with("image/"))
            else {
                continue;
            };
            let blob: Blob = JsFuture::from(item.get_type(&kind))
                .await
                .map_err(js_err)?
                .dyn_into()
                .map_err(|_| anyhow!("clipboard {kind} is not a blob"))?;
            let buffer = JsFuture::from(blob.array_buffer()).await.map_err(js_err)?;
            return Ok(Some(Uint8Array::new(&buffer).to_vec()));
        }
        Ok(None)
    }

    /// Downloads through an anchor, talks to the async clipboard API and
    /// queues picked, pasted and dropped images in an inbox drained once
    /// per frame.
    pub struct WebPlatform {
        inbox: Inbox,
        listeners: Vec<(&'static str, Listener)>,
    }

    impl Default for WebPlatform {
        fn default() -> Self {
            Self::new()
        }
    }

    impl WebPlatform {
        pub fn new() -> Self {
            let mut platform = Self {
                inbox: Inbox::default(),
                listeners: Vec::new(),
            };
            if let Err(e) = platform.listen_for_images() {
                log::warn!("paste and drop are unavailable: {e:#}");
            }
            platform
        }

        /// Page-wide `paste`, `dragover` and `drop` handlers.
        fn listen_for_images(&mut self) -> anyhow::Result<()> {
            let document = document()?;

            let inbox = Rc::clone(&self.inbox);
            let on_paste: Listener = Closure::wrap(Box::new(move |event: Event| {
                let file = event
                    .dyn_ref::<ClipboardEvent>()
                    .and_then(|e| e.clipboard_data())
                    .and_then(|data| pasted_image(&data));
                if let Some(file) = file {
                    event.prevent_default();
                    read_file(&inbox, file);
                }
            }) as Box<dyn FnMut(Event)>);

            let on_drag_over: Listener =
                Closure::wrap(Box::new(|event: Event| event.prevent_default()) as Box<dyn FnMut(Event)>);

            let inbox = Rc::clone(&self.inbox);
            let on_drop: Listener = Closure::wrap(Box::new(move |event: Event| {
                event.prevent_default();
                let file = event
                    .dyn_ref::<DragEvent>()
                    .and_then(|e| e.data_transfer())
                    .and_then(|data| data.files())
                    .and_then(|files| files.get(0));
                match file {
                    Some(file) if is_image(&file) => read_file(&inbox, file),
                    _ => inbox
                        .borrow_mut()
                        .push(PlatformEvent::Warning("Please drop an image file".into())),
                }
            }) as Box<dyn FnMut(Event)>);

            for (kind, listener) in [("paste", on_paste), ("dragover", on_drag_over), ("drop", on_drop)] {
                document
                    .add_event_listener_with_callback(kind, listener.as_ref().unchecked_ref())
                    .map_err(js_err)?;
                self.listeners.push((kind, listener));
            }
            Ok(())
        }
    }

    impl Drop for WebPlatform {
        fn drop(&mut self) {
            let Ok(document) = document() else {
                return;
            };
            for (kind, listener) in &self.listeners {
                let _ = document.remove_event_listener_with_callback(kind, listener.as_ref().unchecked_ref());
            }
        }
    }

    impl Platform for WebPlatform {
        fn save_file(&mut self, name: &str, mime: &str, bytes: &[u8]) -> anyhow::Result<String> {
            let parts = Array::of1(&Uint8Array::from(bytes));
            let options = BlobPropertyBag::new();
            options.set_type(mime);
            let blob = Blob::new_with_u8_array_sequence_and_options(&parts, &options).map_err(js_err)?;
            let url = Url::create_object_url_with_blob(&blob).map_err(js_err)?;

            let document = document()?;
            let anchor: HtmlAnchorElement = document
                .create_element("a")
                .map_err(js_err)?
                .dyn_into()
                .map_err(|_| anyhow!("not an anchor element"))?;
            anchor.set_href(&url);
            anchor.set_download(name);
            if let Some(body) = document.body() {
                body.append_child(&anchor).map_err(js_err)?;
                anchor.click();
                body.remove_child(&anchor).map_err(js_err)?;
            } else {
                anchor.click();
            }
            Url::revoke_object_url(&url).map_err(js_err)?;
            Ok(name.to_string())
        }

        fn copy_text(&mut self, text: &str) -> anyhow::Result<()> {
            let window = web_sys::window().ok_or_else(|| anyhow!("no window"))?;
            let promise = window.navigator().clipboard().write_text(text);
            let inbox = Rc::clone(&self.inbox);
            spawn_local(async move {
                if let Err(e) = JsFuture::from(promise).await {
                    inbox
                        .borrow_mut()
                        .push(PlatformEvent::Failed(format!("Failed to copy text: {}", js_err(e))));
                }
            });
            Ok(())
        }

        /// Asks the async clipboard API; the image or a warning arrives
        /// through the inbox.
        fn paste_image(&mut self) -> anyhow::Result<ClipboardImage> {
            let window = web_sys::window().ok_or_else(|| anyhow!("no window"))?;
            let read = window.navigator().clipboard().read();
            let inbox = Rc::clone(&self.inbox);
            spawn_local(async move {
                let event = match read_clipboard_image(read).await {
                    Ok(Some(bytes)) => PlatformEvent::ImageBytes { name: "clipboard".into(), bytes },
                    Ok(None) => PlatformEvent::Warning("No image in clipboard".into()),
                    Err(e) => PlatformEvent::Failed(format!("Failed to paste image: {e:#}")),
                };
                inbox.borrow_mut().push(event);
            });
            Ok(ClipboardImage::Pending)
        }

        fn open_image_picker(&mut self) -> anyhow::Result<()> {
            let input: HtmlInputElement = document()?
                .create_element("input")
                .map_err(js_err)?
                .dyn_into()
                .map_err(|_| anyhow!("not an input element"))?;
            input.set_type("file");
            input.set_accept("image/*");

            let inbox = Rc::clone(&self.inbox);
            let picked = input.clone();
            let on_change = Closure::once_into_js(move || {
                if let Some(file) = picked.files().and_then(|files| files.get(0)) {
                    read_file(&inbox, file);
                }
            });
            input.set_onchange(Some(on_change.unchecked_ref()));
            input.click();
            Ok(())
        }

        fn poll_events(&mut self) -> Vec<PlatformEvent> {
            std::mem::take(&mut *self.inbox.borrow_mut())
        }
    }
}
