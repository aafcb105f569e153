//! Hit-testing and transform math over scene objects.

use crate::surface::SceneObject;

/// Side of the square scale handle drawn at the selection's bottom-right
/// corner, in surface pixels.
pub const HANDLE_SIZE: f64 = 10.0;

/// Extra slop around thin strokes so they stay clickable.
const HIT_SLOP: f64 = 4.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

pub fn object_bounds(object: &SceneObject) -> Option<Bounds> {
    match object {
        SceneObject::Path(path) => {
            let (&(first_x, first_y), rest) = path.points.split_first()?;
            let mut bounds = Bounds {
                min_x: first_x,
                min_y: first_y,
                max_x: first_x,
                max_y: first_y,
            };
            for &(x, y) in rest {
                bounds.min_x = bounds.min_x.min(x);
                bounds.min_y = bounds.min_y.min(y);
                bounds.max_x = bounds.max_x.max(x);
                bounds.max_y = bounds.max_y.max(y);
            }
            let pad = path.width / 2.0;
            bounds.min_x -= pad;
            bounds.min_y -= pad;
            bounds.max_x += pad;
            bounds.max_y += pad;
            Some(bounds)
        }
        SceneObject::Image(image) => Some(Bounds {
            min_x: image.x,
            min_y: image.y,
            max_x: image.x + image.width,
            max_y: image.y + image.height,
        }),
    }
}

/// Topmost object under the point, matching paint order.
pub fn hit_test(objects: &[SceneObject], x: f64, y: f64) -> Option<usize> {
    for (index, object) in objects.iter().enumerate().rev() {
        let hit = match object {
            SceneObject::Path(path) => {
                let reach = path.width / 2.0 + HIT_SLOP;
                path_hit(&path.points, x, y, reach)
            }
            SceneObject::Image(_) => object_bounds(object)
                .map(|bounds| bounds.contains(x, y))
                .unwrap_or(false),
        };
        if hit {
            return Some(index);
        }
    }
    None
}

fn path_hit(points: &[(f64, f64)], x: f64, y: f64, reach: f64) -> bool {
    match points {
        [] => false,
        [only] => distance(*only, (x, y)) <= reach,
        _ => points
            .windows(2)
            .any(|pair| distance_to_segment((x, y), pair[0], pair[1]) <= reach),
    }
}

fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

fn distance_to_segment(point: (f64, f64), from: (f64, f64), to: (f64, f64)) -> f64 {
    let length_sq = (to.0 - from.0).powi(2) + (to.1 - from.1).powi(2);
    if length_sq == 0.0 {
        return distance(point, from);
    }
    let t = ((point.0 - from.0) * (to.0 - from.0) + (point.1 - from.1) * (to.1 - from.1))
        / length_sq;
    let t = t.clamp(0.0, 1.0);
    let nearest = (from.0 + t * (to.0 - from.0), from.1 + t * (to.1 - from.1));
    distance(point, nearest)
}

/// Whether the point grabs the selection's scale handle.
pub fn scale_handle_hit(bounds: &Bounds, x: f64, y: f64) -> bool {
    (x - bounds.max_x).abs() <= HANDLE_SIZE && (y - bounds.max_y).abs() <= HANDLE_SIZE
}

pub fn translate_object(object: &mut SceneObject, dx: f64, dy: f64) {
    match object {
        SceneObject::Path(path) => {
            for point in &mut path.points {
                point.0 += dx;
                point.1 += dy;
            }
        }
        SceneObject::Image(image) => {
            image.x += dx;
            image.y += dy;
        }
    }
}

/// Uniform scale about an anchor point (the selection's top-left corner
/// while dragging the bottom-right handle).
pub fn scale_object(object: &mut SceneObject, anchor: (f64, f64), factor: f64) {
    match object {
        SceneObject::Path(path) => {
            for point in &mut path.points {
                point.0 = anchor.0 + (point.0 - anchor.0) * factor;
                point.1 = anchor.1 + (point.1 - anchor.1) * factor;
            }
            path.width *= factor;
        }
        SceneObject::Image(image) => {
            image.x = anchor.0 + (image.x - anchor.0) * factor;
            image.y = anchor.1 + (image.y - anchor.1) * factor;
            image.width *= factor;
            image.height *= factor;
        }
    }
}

/// Incremental factor for a handle drag: ratio of the pointer's distance to
/// the anchor now versus at the previous event, clamped so a pass through
/// the anchor cannot flip or collapse the object.
pub fn drag_scale_factor(anchor: (f64, f64), last: (f64, f64), current: (f64, f64)) -> f64 {
    let last_distance = distance(anchor, last);
    let current_distance = distance(anchor, current);
    if last_distance < 1.0 {
        return 1.0;
    }
    (current_distance / last_distance).clamp(0.05, 20.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{Brush, BrushPath, ImageObject};

    fn path(points: &[(f64, f64)]) -> SceneObject {
        let mut iter = points.iter().copied();
        let (x, y) = iter.next().unwrap();
        let mut path = BrushPath::begin(&Brush::default(), x, y);
        path.points.extend(iter);
        SceneObject::Path(path)
    }

    fn image(x: f64, y: f64, width: f64, height: f64) -> SceneObject {
        SceneObject::Image(ImageObject {
            url: "/uploads/users/u/images/i".into(),
            x,
            y,
            width,
            height,
        })
    }

    #[test]
    fn bounds_include_stroke_width() {
        let bounds = object_bounds(&path(&[(10.0, 10.0), (20.0, 10.0)])).unwrap();
        assert_eq!(bounds.min_y, 7.5);
        assert_eq!(bounds.max_y, 12.5);
    }

    #[test]
    fn hit_prefers_topmost_object() {
        let objects = vec![image(0.0, 0.0, 100.0, 100.0), image(50.0, 50.0, 100.0, 100.0)];
        assert_eq!(hit_test(&objects, 75.0, 75.0), Some(1));
        assert_eq!(hit_test(&objects, 10.0, 10.0), Some(0));
        assert_eq!(hit_test(&objects, 300.0, 300.0), None);
    }

    #[test]
    fn segment_hit_respects_reach() {
        let objects = vec![path(&[(0.0, 0.0), (100.0, 0.0)])];
        assert_eq!(hit_test(&objects, 50.0, 5.0), Some(0));
        assert_eq!(hit_test(&objects, 50.0, 30.0), None);
    }

    #[test]
    fn translate_moves_every_point() {
        let mut object = path(&[(0.0, 0.0), (10.0, 0.0)]);
        translate_object(&mut object, 5.0, -2.0);
        let SceneObject::Path(path) = object else {
            unreachable!()
        };
        assert_eq!(path.points, vec![(5.0, -2.0), (15.0, -2.0)]);
    }

    #[test]
    fn scale_about_anchor_scales_size_and_position() {
        let mut object = image(10.0, 10.0, 20.0, 20.0);
        scale_object(&mut object, (10.0, 10.0), 2.0);
        let SceneObject::Image(image) = object else {
            unreachable!()
        };
        assert_eq!((image.x, image.y), (10.0, 10.0));
        assert_eq!((image.width, image.height), (40.0, 40.0));
    }

    #[test]
    fn drag_scale_factor_is_distance_ratio() {
        let factor = drag_scale_factor((0.0, 0.0), (10.0, 0.0), (20.0, 0.0));
        assert!((factor - 2.0).abs() < 1e-9);
        // Degenerate drags near the anchor do not explode.
        assert_eq!(drag_scale_factor((0.0, 0.0), (0.1, 0.0), (50.0, 0.0)), 1.0);
    }

    #[test]
    fn scale_handle_sits_at_bottom_right() {
        let bounds = object_bounds(&image(0.0, 0.0, 100.0, 80.0)).unwrap();
        assert!(scale_handle_hit(&bounds, 98.0, 78.0));
        assert!(!scale_handle_hit(&bounds, 50.0, 40.0));
    }
}
