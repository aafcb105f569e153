use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, HtmlCanvasElement, HtmlElement, PointerEvent, Window};

use crate::state::UiFlags;

pub fn get_element<T: JsCast>(document: &Document, id: &str) -> Result<T, JsValue> {
    let element = document
        .get_element_by_id(id)
        .ok_or_else(|| JsValue::from_str(&format!("Missing element: {id}")))?;
    element
        .dyn_into::<T>()
        .map_err(|_| JsValue::from_str(&format!("Invalid element type: {id}")))
}

pub fn set_hidden(element: &HtmlElement, hidden: bool) {
    let class_list = element.class_list();
    let result = if hidden {
        class_list.add_1("hidden")
    } else {
        class_list.remove_1("hidden")
    };
    if let Err(error) = result {
        web_sys::console::warn_1(&error);
    }
}

fn set_hidden_by_id(document: &Document, id: &str, hidden: bool) {
    if let Ok(element) = get_element::<HtmlElement>(document, id) {
        set_hidden(&element, hidden);
    }
}

/// Push the UI flags into the page. Each flag owns one element.
pub fn sync_ui(document: &Document, ui: &UiFlags) {
    set_hidden_by_id(document, "loading", !ui.loading);
    set_hidden_by_id(document, "shimmer", !ui.shimmer);
    set_hidden_by_id(document, "banner", !ui.banner);
    set_hidden_by_id(document, "modal", !ui.modal);
    set_hidden_by_id(document, "menu", !ui.menu);
}

/// Blocking alert with the raw error or status message, the application's
/// only failure surface.
pub fn alert(window: &Window, message: &str) {
    let _ = window.alert_with_message(message);
}

pub fn set_timeout(window: &Window, millis: i32, callback: impl FnOnce() + 'static) {
    let closure = Closure::once_into_js(callback);
    let _ = window.set_timeout_with_callback_and_timeout_and_arguments_0(
        closure.unchecked_ref::<js_sys::Function>(),
        millis,
    );
}

/// Pointer event position in surface coordinates.
pub fn event_to_surface_point(canvas: &HtmlCanvasElement, event: &PointerEvent) -> Option<(f64, f64)> {
    let rect = canvas.get_bounding_client_rect();
    if rect.width() <= 0.0 || rect.height() <= 0.0 {
        return None;
    }
    let x = event.client_x() as f64 - rect.left();
    let y = event.client_y() as f64 - rect.top();
    if x.is_finite() && y.is_finite() {
        Some((x, y))
    } else {
        None
    }
}
