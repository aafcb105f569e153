use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{Document, HtmlImageElement, Window};

use crate::api;
use crate::dom::{alert, sync_ui};
use crate::markup::{parse_scene, serialize_scene};
use crate::render::redraw;
use crate::state::State;
use crate::surface::{ImageObject, Mutation, SceneObject};

pub type SharedState = Rc<RefCell<State>>;

pub const GENERIC_FAILURE: &str = "Sorry, something went wrong.";

pub fn set_loading(state: &SharedState, document: &Document, on: bool) {
    {
        state.borrow_mut().ui.loading = on;
    }
    sync_ui(document, &state.borrow().ui);
}

/// The autosave hook behind every mutation event: serialize the whole scene
/// and overwrite the remote canvas field. Rapid event bursts each fire their
/// own overwrite; ordering is whatever the transport delivers.
pub fn autosave(window: &Window, document: &Document, state: &SharedState, mutation: Mutation) {
    let markup = {
        let state_ref = state.borrow();
        serialize_scene(
            &state_ref.objects,
            state_ref.surface_width,
            state_ref.surface_height,
        )
    };
    web_sys::console::debug_1(&format!("{}: saving canvas", mutation.as_str()).into());
    set_loading(state, document, true);

    let window = window.clone();
    let document = document.clone();
    let state = state.clone();
    spawn_local(async move {
        if let Err(error) = api::save_canvas(&window, markup).await {
            alert(&window, &error);
        }
        set_loading(&state, &document, false);
    });
}

/// Replace the scene with a serialized payload (the saved canvas or a shared
/// snapshot). A payload that does not parse leaves the scene alone.
pub fn load_canvas(window: &Window, document: &Document, state: &SharedState, payload: &str) {
    {
        let mut state_ref = state.borrow_mut();
        state_ref.ui.shimmer = true;
        state_ref.ui.loading = true;
    }
    sync_ui(document, &state.borrow().ui);

    match parse_scene(payload) {
        Some(objects) => {
            let mut state_ref = state.borrow_mut();
            state_ref.objects = objects;
            state_ref.selected = None;
        }
        None => alert(window, GENERIC_FAILURE),
    }

    {
        let mut state_ref = state.borrow_mut();
        state_ref.ui.shimmer = false;
        state_ref.ui.loading = false;
    }
    sync_ui(document, &state.borrow().ui);
    prefetch_images(state);
    redraw(&state.borrow());
}

/// Start decoding any scene images we have not seen yet; each finished
/// decode repaints.
pub fn prefetch_images(state: &SharedState) {
    let missing: Vec<String> = {
        let state_ref = state.borrow();
        state_ref
            .objects
            .iter()
            .filter_map(|object| match object {
                SceneObject::Image(image) if !state_ref.images.contains_key(&image.url) => {
                    Some(image.url.clone())
                }
                _ => None,
            })
            .collect()
    };
    for url in missing {
        let Ok(element) = HtmlImageElement::new() else {
            continue;
        };
        element.set_src(&url);
        let state_for_load = state.clone();
        let onload = Closure::<dyn FnMut()>::new(move || {
            redraw(&state_for_load.borrow());
        });
        element.set_onload(Some(onload.as_ref().unchecked_ref()));
        onload.forget();
        state.borrow_mut().images.insert(url, element);
    }
}

/// Place a freshly uploaded image on the surface. Its size is adopted from
/// the decoded bitmap, then the addition autosaves like any other object.
pub fn add_uploaded_image(window: &Window, document: &Document, state: &SharedState, url: String) {
    let Ok(element) = HtmlImageElement::new() else {
        alert(window, GENERIC_FAILURE);
        return;
    };
    element.set_src(&url);
    {
        let mut state_ref = state.borrow_mut();
        state_ref.objects.push(SceneObject::Image(ImageObject {
            url: url.clone(),
            x: 40.0,
            y: 40.0,
            width: 0.0,
            height: 0.0,
        }));
        state_ref.images.insert(url.clone(), element.clone());
    }

    let window = window.clone();
    let document = document.clone();
    let state = state.clone();
    let element_for_load = element.clone();
    let onload = Closure::<dyn FnMut()>::new(move || {
        {
            let mut state_ref = state.borrow_mut();
            for object in state_ref.objects.iter_mut() {
                if let SceneObject::Image(image) = object {
                    if image.url == url && image.width == 0.0 {
                        image.width = f64::from(element_for_load.natural_width());
                        image.height = f64::from(element_for_load.natural_height());
                    }
                }
            }
        }
        redraw(&state.borrow());
        autosave(&window, &document, &state, Mutation::Added);
    });
    element.set_onload(Some(onload.as_ref().unchecked_ref()));
    onload.forget();
}

/// Load the shared snapshot picked in the modal. Adopting it makes it the
/// caller's canvas, so the load is followed by a save.
pub fn load_selected_share(window: &Window, document: &Document, state: &SharedState) {
    let payload = {
        let mut state_ref = state.borrow_mut();
        state_ref.ui.modal = false;
        state_ref
            .shared_index
            .and_then(|index| state_ref.shared.get(index))
            .map(|record| record.canvas.clone())
    };
    sync_ui(document, &state.borrow().ui);
    if let Some(payload) = payload {
        load_canvas(window, document, state, &payload);
        autosave(window, document, state, Mutation::Added);
    }
}
