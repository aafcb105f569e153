//! Scene model for the drawing surface. Everything in here is plain data so
//! the serialization and geometry code can be exercised off the browser.

pub const DEFAULT_BRUSH_COLOR: &str = "#677dea";
pub const DEFAULT_BRUSH_WIDTH: f64 = 5.0;
pub const SURFACE_BACKGROUND: &str = "#efefef";
pub const SURFACE_HEIGHT: f64 = 600.0;

/// Freehand stroke captured from pointer events.
#[derive(Clone, Debug, PartialEq)]
pub struct BrushPath {
    pub points: Vec<(f64, f64)>,
    pub color: String,
    pub width: f64,
}

/// Uploaded raster image placed on the surface. Width/height stay zero until
/// the browser has decoded the image.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageObject {
    pub url: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SceneObject {
    Path(BrushPath),
    Image(ImageObject),
}

/// The mutation kinds that trigger an autosave, one per canvas event the
/// application reacts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mutation {
    Added,
    Moving,
    Scaling,
}

impl Mutation {
    pub fn as_str(self) -> &'static str {
        match self {
            Mutation::Added => "object:added",
            Mutation::Moving => "object:moving",
            Mutation::Scaling => "object:scaling",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Brush {
    pub color: String,
    pub width: f64,
}

impl Default for Brush {
    fn default() -> Self {
        Self {
            color: DEFAULT_BRUSH_COLOR.to_string(),
            width: DEFAULT_BRUSH_WIDTH,
        }
    }
}

impl BrushPath {
    pub fn begin(brush: &Brush, x: f64, y: f64) -> Self {
        Self {
            points: vec![(x, y)],
            color: brush.color.clone(),
            width: brush.width,
        }
    }

    pub fn extend(&mut self, x: f64, y: f64) {
        if let Some(&(last_x, last_y)) = self.points.last() {
            // Pointer events fire faster than the brush needs; skip
            // sub-pixel jitter.
            if (x - last_x).abs() < 0.5 && (y - last_y).abs() < 0.5 {
                return;
            }
        }
        self.points.push((x, y));
    }
}

/// Responsive surface width rule: narrow windows keep a small margin, wide
/// windows cap at 1400.
pub fn surface_width_for(window_width: f64) -> f64 {
    if window_width < 1024.0 {
        window_width - 30.0
    } else {
        (window_width - 120.0).min(1400.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extend_skips_subpixel_jitter() {
        let mut path = BrushPath::begin(&Brush::default(), 10.0, 10.0);
        path.extend(10.2, 10.1);
        path.extend(14.0, 10.0);
        assert_eq!(path.points, vec![(10.0, 10.0), (14.0, 10.0)]);
    }

    #[test]
    fn begin_copies_brush_settings() {
        let brush = Brush {
            color: "#112233".into(),
            width: 9.0,
        };
        let path = BrushPath::begin(&brush, 1.0, 2.0);
        assert_eq!(path.color, "#112233");
        assert_eq!(path.width, 9.0);
    }

    #[test]
    fn narrow_windows_keep_a_margin() {
        assert_eq!(surface_width_for(800.0), 770.0);
    }

    #[test]
    fn wide_windows_cap_at_1400() {
        assert_eq!(surface_width_for(1200.0), 1080.0);
        assert_eq!(surface_width_for(2000.0), 1400.0);
    }
}
