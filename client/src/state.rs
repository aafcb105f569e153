use std::collections::HashMap;

use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, HtmlImageElement};

use inkpad_shared::{SharedCanvas, UserProfile};

use crate::surface::{Brush, BrushPath, SceneObject, SURFACE_HEIGHT};

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum View {
    Login,
    Signup,
    Canvas,
}

/// What the pointer is currently doing on the surface.
pub enum PointerMode {
    Idle,
    /// Brush stroke in progress; it joins the scene on pointer-up.
    Drawing { path: BrushPath },
    Moving {
        index: usize,
        last: (f64, f64),
    },
    Scaling {
        index: usize,
        anchor: (f64, f64),
        last: (f64, f64),
    },
}

/// The view-layer booleans the page binds to.
#[derive(Clone, Copy, Default)]
pub struct UiFlags {
    pub loading: bool,
    pub shimmer: bool,
    pub banner: bool,
    pub modal: bool,
    pub menu: bool,
}

pub struct State {
    pub canvas: HtmlCanvasElement,
    pub ctx: CanvasRenderingContext2d,
    pub objects: Vec<SceneObject>,
    /// Decoded raster images keyed by URL; rendering skips entries that are
    /// still loading.
    pub images: HashMap<String, HtmlImageElement>,
    pub brush: Brush,
    /// Mirrors the original drawing-mode toggle: true for the freehand
    /// brush, false for select/move/scale.
    pub drawing_mode: bool,
    pub pointer: PointerMode,
    pub selected: Option<usize>,
    pub user: Option<UserProfile>,
    pub shared: Vec<SharedCanvas>,
    pub shared_index: Option<usize>,
    pub ui: UiFlags,
    pub surface_width: f64,
    pub surface_height: f64,
}

impl State {
    pub fn new(canvas: HtmlCanvasElement, ctx: CanvasRenderingContext2d) -> Self {
        Self {
            canvas,
            ctx,
            objects: Vec::new(),
            images: HashMap::new(),
            brush: Brush::default(),
            drawing_mode: true,
            pointer: PointerMode::Idle,
            selected: None,
            user: None,
            shared: Vec::new(),
            shared_index: None,
            ui: UiFlags {
                loading: true,
                shimmer: true,
                ..UiFlags::default()
            },
            surface_width: 0.0,
            surface_height: SURFACE_HEIGHT,
        }
    }
}
