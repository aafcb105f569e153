use web_sys::CanvasRenderingContext2d;

use crate::geometry::{object_bounds, Bounds, HANDLE_SIZE};
use crate::state::{PointerMode, State};
use crate::surface::{BrushPath, SceneObject, SURFACE_BACKGROUND};

fn draw_dot(ctx: &CanvasRenderingContext2d, x: f64, y: f64, color: &str, width: f64) {
    ctx.set_fill_style_str(color);
    ctx.begin_path();
    let _ = ctx.arc(x, y, width / 2.0, 0.0, std::f64::consts::PI * 2.0);
    ctx.fill();
}

fn draw_path(ctx: &CanvasRenderingContext2d, path: &BrushPath) {
    let Some((&(first_x, first_y), rest)) = path.points.split_first() else {
        return;
    };
    if rest.is_empty() {
        draw_dot(ctx, first_x, first_y, &path.color, path.width);
        return;
    }
    ctx.set_stroke_style_str(&path.color);
    ctx.set_line_width(path.width);
    ctx.set_line_cap("round");
    ctx.set_line_join("round");
    ctx.begin_path();
    ctx.move_to(first_x, first_y);
    for &(x, y) in rest {
        ctx.line_to(x, y);
    }
    ctx.stroke();
}

fn draw_object(state: &State, object: &SceneObject) {
    match object {
        SceneObject::Path(path) => draw_path(&state.ctx, path),
        SceneObject::Image(image) => {
            let Some(element) = state.images.get(&image.url) else {
                return;
            };
            if !element.complete() {
                return;
            }
            let _ = state.ctx.draw_image_with_html_image_element_and_dw_and_dh(
                element,
                image.x,
                image.y,
                image.width,
                image.height,
            );
        }
    }
}

pub fn redraw(state: &State) {
    let ctx = &state.ctx;
    ctx.set_fill_style_str(SURFACE_BACKGROUND);
    ctx.fill_rect(0.0, 0.0, state.surface_width, state.surface_height);

    for object in &state.objects {
        draw_object(state, object);
    }
    if let PointerMode::Drawing { path } = &state.pointer {
        draw_path(ctx, path);
    }
    if !state.drawing_mode {
        if let Some(bounds) = state
            .selected
            .and_then(|index| state.objects.get(index))
            .and_then(object_bounds)
        {
            draw_selection_overlay(ctx, &bounds);
        }
    }
}

fn draw_selection_overlay(ctx: &CanvasRenderingContext2d, bounds: &Bounds) {
    ctx.save();
    ctx.set_line_width(1.5);
    ctx.set_stroke_style_str("rgba(26, 31, 42, 0.65)");
    ctx.stroke_rect(bounds.min_x, bounds.min_y, bounds.width(), bounds.height());

    // Single scale handle at the bottom-right corner.
    ctx.set_fill_style_str("rgba(26, 31, 42, 0.85)");
    ctx.fill_rect(
        bounds.max_x - HANDLE_SIZE / 2.0,
        bounds.max_y - HANDLE_SIZE / 2.0,
        HANDLE_SIZE,
        HANDLE_SIZE,
    );
    ctx.restore();
}
