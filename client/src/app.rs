use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{
    CanvasRenderingContext2d, Document, Element, Event, HtmlButtonElement, HtmlCanvasElement,
    HtmlElement, HtmlInputElement, MessageEvent, PointerEvent, Window,
};

use inkpad_shared::{validate_signup, LoginRequest, SignupRequest, UserProfile};

use crate::actions::{
    add_uploaded_image, autosave, load_canvas, load_selected_share, set_loading, SharedState,
    GENERIC_FAILURE,
};
use crate::api;
use crate::dom::{alert, event_to_surface_point, get_element, set_hidden, set_timeout, sync_ui};
use crate::geometry::{drag_scale_factor, hit_test, object_bounds, scale_handle_hit, scale_object, translate_object};
use crate::render::redraw;
use crate::state::{PointerMode, State, View};
use crate::surface::{surface_width_for, BrushPath, Mutation};

const BANNER_HIDE_MILLIS: i32 = 8000;

#[wasm_bindgen]
pub fn run() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("No window"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("No document"))?;

    let canvas: HtmlCanvasElement = get_element(&document, "surface")?;
    let ctx = canvas
        .get_context("2d")?
        .ok_or_else(|| JsValue::from_str("No 2d context"))?
        .dyn_into::<CanvasRenderingContext2d>()?;
    let state: SharedState = Rc::new(RefCell::new(State::new(canvas.clone(), ctx)));

    apply_surface_size(&window, &state);
    sync_ui(&document, &state.borrow().ui);

    wire_auth(&window, &document, &state)?;
    wire_toolbar(&window, &document, &state)?;
    wire_share_and_modal(&window, &document, &state)?;
    wire_pointer(&window, &document, &state, &canvas)?;
    wire_resize(&window, &state)?;

    // Resume an existing session if the cookie is still good.
    let window_for_init = window.clone();
    let document_for_init = document.clone();
    let state_for_init = state.clone();
    spawn_local(async move {
        match api::fetch_profile(&window_for_init).await {
            Ok(Some(profile)) => {
                enter_canvas(&window_for_init, &document_for_init, &state_for_init, profile);
            }
            Ok(None) => {
                show_view(&document_for_init, View::Login);
                clear_busy(&document_for_init, &state_for_init);
            }
            Err(error) => {
                alert(&window_for_init, &error);
                show_view(&document_for_init, View::Login);
                clear_busy(&document_for_init, &state_for_init);
            }
        }
    });
    Ok(())
}

fn clear_busy(document: &Document, state: &SharedState) {
    {
        let mut state_ref = state.borrow_mut();
        state_ref.ui.shimmer = false;
        state_ref.ui.loading = false;
    }
    sync_ui(document, &state.borrow().ui);
}

fn apply_surface_size(window: &Window, state: &SharedState) {
    let window_width = window
        .inner_width()
        .ok()
        .and_then(|value| value.as_f64())
        .unwrap_or(1024.0);
    let mut state_ref = state.borrow_mut();
    state_ref.surface_width = surface_width_for(window_width);
    state_ref.canvas.set_width(state_ref.surface_width as u32);
    state_ref.canvas.set_height(state_ref.surface_height as u32);
}

fn show_view(document: &Document, view: View) {
    for (id, candidate) in [
        ("login-view", View::Login),
        ("signup-view", View::Signup),
        ("canvas-view", View::Canvas),
    ] {
        if let Ok(element) = get_element::<HtmlElement>(document, id) {
            set_hidden(&element, candidate != view);
        }
    }
}

fn input_value(document: &Document, id: &str) -> String {
    get_element::<HtmlInputElement>(document, id)
        .map(|input| input.value())
        .unwrap_or_default()
}

fn clear_input(document: &Document, id: &str) {
    if let Ok(input) = get_element::<HtmlInputElement>(document, id) {
        input.set_value("");
    }
}

fn enter_canvas(window: &Window, document: &Document, state: &SharedState, profile: UserProfile) {
    show_view(document, View::Canvas);
    let saved_canvas = profile.canvas.clone();
    {
        let mut state_ref = state.borrow_mut();
        state_ref.user = Some(profile);
    }
    clear_busy(document, state);
    redraw(&state.borrow());

    if let Some(payload) = saved_canvas {
        {
            state.borrow_mut().ui.banner = true;
        }
        sync_ui(document, &state.borrow().ui);
        let document_for_timer = document.clone();
        let state_for_timer = state.clone();
        set_timeout(window, BANNER_HIDE_MILLIS, move || {
            state_for_timer.borrow_mut().ui.banner = false;
            sync_ui(&document_for_timer, &state_for_timer.borrow().ui);
        });
        load_canvas(window, document, state, &payload);
    }
    refresh_shared(window, document, state);
}

fn refresh_shared(window: &Window, document: &Document, state: &SharedState) {
    let window = window.clone();
    let document = document.clone();
    let state = state.clone();
    spawn_local(async move {
        match api::fetch_shared(&window).await {
            Ok(canvases) => {
                state.borrow_mut().shared = canvases;
                render_shared_list(&document, &state);
            }
            Err(error) => alert(&window, &error),
        }
    });
}

fn render_shared_list(document: &Document, state: &SharedState) {
    let Ok(list) = get_element::<HtmlElement>(document, "shared-list") else {
        return;
    };
    list.set_inner_html("");
    let state_ref = state.borrow();
    for (index, record) in state_ref.shared.iter().enumerate() {
        let Ok(item) = document.create_element("li") else {
            continue;
        };
        item.set_text_content(Some(&record.user));
        let _ = item.set_attribute("data-index", &index.to_string());
        let selected = if state_ref.shared_index == Some(index) {
            "true"
        } else {
            "false"
        };
        let _ = item.set_attribute("aria-selected", selected);
        let _ = list.append_child(&item);
    }
}

fn on_click(
    document: &Document,
    id: &str,
    handler: impl FnMut() + 'static,
) -> Result<(), JsValue> {
    let button: HtmlButtonElement = get_element(document, id)?;
    let mut handler = handler;
    let closure = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
        event.prevent_default();
        handler();
    });
    button.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref())?;
    closure.forget();
    Ok(())
}

fn wire_auth(window: &Window, document: &Document, state: &SharedState) -> Result<(), JsValue> {
    {
        let document = document.clone();
        on_click(&document.clone(), "goto-signup", move || {
            show_view(&document, View::Signup);
        })?;
    }
    {
        let document = document.clone();
        on_click(&document.clone(), "goto-login", move || {
            show_view(&document, View::Login);
        })?;
    }

    {
        let window = window.clone();
        let document = document.clone();
        let state = state.clone();
        on_click(&document.clone(), "login-button", move || {
            let request = LoginRequest {
                email: input_value(&document, "login-email"),
                password: input_value(&document, "login-password"),
            };
            set_loading(&state, &document, true);
            let window = window.clone();
            let document = document.clone();
            let state = state.clone();
            spawn_local(async move {
                match api::login(&window, &request).await {
                    Ok(profile) => enter_canvas(&window, &document, &state, profile),
                    Err(error) => {
                        alert(&window, &error);
                        set_loading(&state, &document, false);
                    }
                }
            });
        })?;
    }

    {
        let window = window.clone();
        let document = document.clone();
        let state = state.clone();
        on_click(&document.clone(), "signup-button", move || {
            let request = SignupRequest {
                email: input_value(&document, "signup-email"),
                password: input_value(&document, "signup-password"),
                confirm_password: input_value(&document, "signup-confirm"),
            };
            // Same checks the server runs, surfaced before any request.
            if let Err(error) = validate_signup(
                request.email.trim(),
                &request.password,
                &request.confirm_password,
            ) {
                alert(&window, &error.to_string());
                return;
            }
            set_loading(&state, &document, true);
            let window = window.clone();
            let document = document.clone();
            let state = state.clone();
            spawn_local(async move {
                match api::signup(&window, &request).await {
                    Ok(profile) => enter_canvas(&window, &document, &state, profile),
                    Err(error) => {
                        alert(&window, &error);
                        set_loading(&state, &document, false);
                    }
                }
            });
        })?;
    }

    {
        let window = window.clone();
        on_click(document, "federated-button", move || {
            if let Err(error) = api::open_federated_popup(&window) {
                alert(&window, &error);
            }
        })?;
    }

    // The popup pings us once the provider round-trip finished.
    {
        let window_for_message = window.clone();
        let document_for_message = document.clone();
        let state_for_message = state.clone();
        let closure = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
            if event.data().as_string().as_deref() != Some("inkpad:login") {
                return;
            }
            let window = window_for_message.clone();
            let document = document_for_message.clone();
            let state = state_for_message.clone();
            spawn_local(async move {
                match api::fetch_profile(&window).await {
                    Ok(Some(profile)) => enter_canvas(&window, &document, &state, profile),
                    Ok(None) => alert(&window, GENERIC_FAILURE),
                    Err(error) => alert(&window, &error),
                }
            });
        });
        window.add_event_listener_with_callback("message", closure.as_ref().unchecked_ref())?;
        closure.forget();
    }

    {
        let window = window.clone();
        let document = document.clone();
        let state = state.clone();
        on_click(&document.clone(), "logout-button", move || {
            let window = window.clone();
            let document = document.clone();
            let state = state.clone();
            spawn_local(async move {
                if let Err(error) = api::logout(&window).await {
                    alert(&window, &error);
                    return;
                }
                {
                    let mut state_ref = state.borrow_mut();
                    state_ref.user = None;
                    state_ref.objects.clear();
                    state_ref.shared.clear();
                    state_ref.shared_index = None;
                    state_ref.selected = None;
                    state_ref.ui.menu = false;
                    state_ref.ui.modal = false;
                }
                sync_ui(&document, &state.borrow().ui);
                show_view(&document, View::Login);
            });
        })?;
    }
    Ok(())
}

fn wire_toolbar(window: &Window, document: &Document, state: &SharedState) -> Result<(), JsValue> {
    {
        let color_input: HtmlInputElement = get_element(document, "color-input")?;
        let state = state.clone();
        let input_for_closure = color_input.clone();
        let closure = Closure::<dyn FnMut(Event)>::new(move |_event: Event| {
            state.borrow_mut().brush.color = input_for_closure.value();
        });
        color_input.add_event_listener_with_callback("input", closure.as_ref().unchecked_ref())?;
        closure.forget();
    }

    {
        let document = document.clone();
        let state = state.clone();
        on_click(&document.clone(), "mode-button", move || {
            let drawing = {
                let mut state_ref = state.borrow_mut();
                state_ref.drawing_mode = !state_ref.drawing_mode;
                if state_ref.drawing_mode {
                    state_ref.selected = None;
                }
                state_ref.drawing_mode
            };
            if let Ok(button) = get_element::<HtmlButtonElement>(&document, "mode-button") {
                let _ = button.set_attribute("aria-pressed", if drawing { "true" } else { "false" });
                button.set_text_content(Some(if drawing { "Draw" } else { "Select" }));
            }
            redraw(&state.borrow());
        })?;
    }

    {
        let upload_input: HtmlInputElement = get_element(document, "upload-input")?;
        let window = window.clone();
        let document = document.clone();
        let state = state.clone();
        let input_for_closure = upload_input.clone();
        let closure = Closure::<dyn FnMut(Event)>::new(move |_event: Event| {
            let Some(file) = input_for_closure.files().and_then(|files| files.get(0)) else {
                return;
            };
            input_for_closure.set_value("");
            set_loading(&state, &document, true);
            let window = window.clone();
            let document = document.clone();
            let state = state.clone();
            spawn_local(async move {
                match api::upload_image(&window, &file).await {
                    Ok(url) => add_uploaded_image(&window, &document, &state, url),
                    Err(error) => alert(&window, &error),
                }
                set_loading(&state, &document, false);
            });
        });
        upload_input.add_event_listener_with_callback("change", closure.as_ref().unchecked_ref())?;
        closure.forget();
    }

    {
        let document = document.clone();
        let state = state.clone();
        on_click(&document.clone(), "menu-button", move || {
            {
                let mut state_ref = state.borrow_mut();
                state_ref.ui.menu = !state_ref.ui.menu;
            }
            sync_ui(&document, &state.borrow().ui);
        })?;
    }

    {
        let banner: HtmlElement = get_element(document, "banner")?;
        let document = document.clone();
        let state = state.clone();
        let closure = Closure::<dyn FnMut(Event)>::new(move |_event: Event| {
            state.borrow_mut().ui.banner = false;
            sync_ui(&document, &state.borrow().ui);
        });
        banner.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref())?;
        closure.forget();
    }
    Ok(())
}

fn wire_share_and_modal(
    window: &Window,
    document: &Document,
    state: &SharedState,
) -> Result<(), JsValue> {
    {
        let window = window.clone();
        let document = document.clone();
        let state = state.clone();
        on_click(&document.clone(), "share-button", move || {
            let email = input_value(&document, "share-email");
            if email.trim().is_empty() {
                return;
            }
            let canvas = {
                let state_ref = state.borrow();
                crate::markup::serialize_scene(
                    &state_ref.objects,
                    state_ref.surface_width,
                    state_ref.surface_height,
                )
            };
            set_loading(&state, &document, true);
            let window = window.clone();
            let document = document.clone();
            let state = state.clone();
            spawn_local(async move {
                match api::share_canvas(&window, email.clone(), canvas).await {
                    Ok(()) => {
                        alert(&window, &format!("Successfully shared canvas with {email}!"));
                        clear_input(&document, "share-email");
                    }
                    Err(_) => alert(&window, GENERIC_FAILURE),
                }
                set_loading(&state, &document, false);
            });
        })?;
    }

    {
        let document = document.clone();
        let state = state.clone();
        on_click(&document.clone(), "shared-button", move || {
            {
                let mut state_ref = state.borrow_mut();
                state_ref.shared_index = None;
                state_ref.ui.modal = true;
                state_ref.ui.menu = false;
            }
            sync_ui(&document, &state.borrow().ui);
            render_shared_list(&document, &state);
        })?;
    }

    {
        let document = document.clone();
        let state = state.clone();
        on_click(&document.clone(), "modal-close", move || {
            {
                state.borrow_mut().ui.modal = false;
            }
            sync_ui(&document, &state.borrow().ui);
        })?;
    }

    {
        let list: HtmlElement = get_element(document, "shared-list")?;
        let document = document.clone();
        let state = state.clone();
        let closure = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
            let Some(target) = event.target().and_then(|t| t.dyn_into::<Element>().ok()) else {
                return;
            };
            let Some(index) = target
                .get_attribute("data-index")
                .and_then(|value| value.parse::<usize>().ok())
            else {
                return;
            };
            state.borrow_mut().shared_index = Some(index);
            render_shared_list(&document, &state);
        });
        list.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref())?;
        closure.forget();
    }

    {
        let window = window.clone();
        let document = document.clone();
        let state = state.clone();
        on_click(&document.clone(), "shared-load", move || {
            load_selected_share(&window, &document, &state);
        })?;
    }
    Ok(())
}

fn wire_pointer(
    window: &Window,
    document: &Document,
    state: &SharedState,
    canvas: &HtmlCanvasElement,
) -> Result<(), JsValue> {
    {
        let state = state.clone();
        let canvas_for_closure = canvas.clone();
        let closure = Closure::<dyn FnMut(PointerEvent)>::new(move |event: PointerEvent| {
            let Some((x, y)) = event_to_surface_point(&canvas_for_closure, &event) else {
                return;
            };
            let _ = canvas_for_closure.set_pointer_capture(event.pointer_id());
            {
                let mut guard = state.borrow_mut();
                let state_ref = &mut *guard;
                if state_ref.drawing_mode {
                    state_ref.pointer = PointerMode::Drawing {
                        path: BrushPath::begin(&state_ref.brush, x, y),
                    };
                } else {
                    let handle_grab = state_ref
                        .selected
                        .and_then(|index| state_ref.objects.get(index))
                        .and_then(object_bounds)
                        .filter(|bounds| scale_handle_hit(bounds, x, y));
                    if let (Some(index), Some(bounds)) = (state_ref.selected, handle_grab) {
                        state_ref.pointer = PointerMode::Scaling {
                            index,
                            anchor: (bounds.min_x, bounds.min_y),
                            last: (x, y),
                        };
                    } else if let Some(index) = hit_test(&state_ref.objects, x, y) {
                        state_ref.selected = Some(index);
                        state_ref.pointer = PointerMode::Moving {
                            index,
                            last: (x, y),
                        };
                    } else {
                        state_ref.selected = None;
                        state_ref.pointer = PointerMode::Idle;
                    }
                }
            }
            redraw(&state.borrow());
        });
        canvas.add_event_listener_with_callback("pointerdown", closure.as_ref().unchecked_ref())?;
        closure.forget();
    }

    {
        let window = window.clone();
        let document = document.clone();
        let state = state.clone();
        let canvas_for_closure = canvas.clone();
        let closure = Closure::<dyn FnMut(PointerEvent)>::new(move |event: PointerEvent| {
            let Some((x, y)) = event_to_surface_point(&canvas_for_closure, &event) else {
                return;
            };
            let (dirty, mutation) = {
                let mut guard = state.borrow_mut();
                let state_ref = &mut *guard;
                match &mut state_ref.pointer {
                    PointerMode::Idle => (false, None),
                    PointerMode::Drawing { path } => {
                        path.extend(x, y);
                        (true, None)
                    }
                    PointerMode::Moving { index, last } => {
                        let (dx, dy) = (x - last.0, y - last.1);
                        *last = (x, y);
                        if let Some(object) = state_ref.objects.get_mut(*index) {
                            translate_object(object, dx, dy);
                        }
                        (true, Some(Mutation::Moving))
                    }
                    PointerMode::Scaling {
                        index,
                        anchor,
                        last,
                    } => {
                        let factor = drag_scale_factor(*anchor, *last, (x, y));
                        let anchor = *anchor;
                        *last = (x, y);
                        if let Some(object) = state_ref.objects.get_mut(*index) {
                            scale_object(object, anchor, factor);
                        }
                        (true, Some(Mutation::Scaling))
                    }
                }
            };
            if !dirty {
                return;
            }
            redraw(&state.borrow());
            // Move and scale events each overwrite the remote canvas,
            // exactly as often as they fire.
            if let Some(mutation) = mutation {
                autosave(&window, &document, &state, mutation);
            }
        });
        canvas.add_event_listener_with_callback("pointermove", closure.as_ref().unchecked_ref())?;
        closure.forget();
    }

    {
        let window = window.clone();
        let document = document.clone();
        let state = state.clone();
        let closure = Closure::<dyn FnMut(PointerEvent)>::new(move |_event: PointerEvent| {
            let finished_stroke = {
                let mut guard = state.borrow_mut();
                let state_ref = &mut *guard;
                match std::mem::replace(&mut state_ref.pointer, PointerMode::Idle) {
                    PointerMode::Drawing { path } if !path.points.is_empty() => {
                        state_ref.objects.push(crate::surface::SceneObject::Path(path));
                        true
                    }
                    _ => false,
                }
            };
            redraw(&state.borrow());
            if finished_stroke {
                autosave(&window, &document, &state, Mutation::Added);
            }
        });
        canvas.add_event_listener_with_callback("pointerup", closure.as_ref().unchecked_ref())?;
        closure.forget();
    }
    Ok(())
}

fn wire_resize(window: &Window, state: &SharedState) -> Result<(), JsValue> {
    let window_for_closure = window.clone();
    let state = state.clone();
    let closure = Closure::<dyn FnMut(Event)>::new(move |_event: Event| {
        apply_surface_size(&window_for_closure, &state);
        redraw(&state.borrow());
    });
    window.add_event_listener_with_callback("resize", closure.as_ref().unchecked_ref())?;
    closure.forget();
    Ok(())
}
