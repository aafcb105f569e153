//! The serialized-canvas payload: an SVG document the rest of the
//! application (and the server) treats as an opaque string. Serialization
//! walks the scene; parsing scans the markup for the element shapes we emit
//! and skips anything else.

use crate::surface::{BrushPath, ImageObject, SceneObject};

pub fn serialize_scene(objects: &[SceneObject], width: f64, height: f64) -> String {
    let mut markup = format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">"
    );
    for object in objects {
        match object {
            SceneObject::Path(path) => serialize_path(&mut markup, path),
            SceneObject::Image(image) => serialize_image(&mut markup, image),
        }
    }
    markup.push_str("</svg>");
    markup
}

fn serialize_path(markup: &mut String, path: &BrushPath) {
    let Some((&(first_x, first_y), rest)) = path.points.split_first() else {
        return;
    };
    if rest.is_empty() {
        // A tap leaves a dot; a single-point path would render as nothing.
        markup.push_str(&format!(
            "<circle cx=\"{first_x}\" cy=\"{first_y}\" r=\"{}\" fill=\"{}\" />",
            path.width / 2.0,
            escape_attr(&path.color)
        ));
        return;
    }
    let mut data = format!("M {first_x} {first_y}");
    for &(x, y) in rest {
        data.push_str(&format!(" L {x} {y}"));
    }
    markup.push_str(&format!(
        "<path d=\"{data}\" stroke=\"{}\" stroke-width=\"{}\" fill=\"none\" stroke-linecap=\"round\" stroke-linejoin=\"round\" />",
        escape_attr(&path.color),
        path.width
    ));
}

fn serialize_image(markup: &mut String, image: &ImageObject) {
    markup.push_str(&format!(
        "<image href=\"{}\" x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" />",
        escape_attr(&image.url),
        image.x,
        image.y,
        image.width,
        image.height
    ));
}

/// Parse a payload back into scene objects. Returns `None` when the string
/// is not one of our SVG documents; elements we do not emit are skipped.
pub fn parse_scene(markup: &str) -> Option<Vec<SceneObject>> {
    let trimmed = markup.trim();
    let svg_start = trimmed.find("<svg")?;
    let body = &trimmed[svg_start..];
    body.find('>')?;

    let mut objects = Vec::new();
    let mut rest = body;
    while let Some(start) = rest.find('<') {
        rest = &rest[start..];
        let Some(end) = rest.find('>') else { break };
        let element = &rest[..=end];
        if let Some(object) = parse_element(element) {
            objects.push(object);
        }
        rest = &rest[end + 1..];
    }
    Some(objects)
}

fn parse_element(element: &str) -> Option<SceneObject> {
    if element.starts_with("<path") {
        let data = attr(element, "d")?;
        let points = parse_path_data(&data)?;
        Some(SceneObject::Path(BrushPath {
            points,
            color: attr(element, "stroke").unwrap_or_else(|| "#000000".to_string()),
            width: attr_f64(element, "stroke-width").unwrap_or(1.0),
        }))
    } else if element.starts_with("<circle") {
        let cx = attr_f64(element, "cx")?;
        let cy = attr_f64(element, "cy")?;
        let r = attr_f64(element, "r")?;
        Some(SceneObject::Path(BrushPath {
            points: vec![(cx, cy)],
            color: attr(element, "fill").unwrap_or_else(|| "#000000".to_string()),
            width: r * 2.0,
        }))
    } else if element.starts_with("<image") {
        let url = attr(element, "href").or_else(|| attr(element, "xlink:href"))?;
        Some(SceneObject::Image(ImageObject {
            url,
            x: attr_f64(element, "x")?,
            y: attr_f64(element, "y")?,
            width: attr_f64(element, "width")?,
            height: attr_f64(element, "height")?,
        }))
    } else {
        None
    }
}

fn parse_path_data(data: &str) -> Option<Vec<(f64, f64)>> {
    let mut points = Vec::new();
    let mut coords = Vec::new();
    for token in data.split_whitespace() {
        match token {
            "M" | "L" => {}
            _ => coords.push(token.parse::<f64>().ok()?),
        }
    }
    if coords.len() < 2 || coords.len() % 2 != 0 {
        return None;
    }
    for pair in coords.chunks(2) {
        points.push((pair[0], pair[1]));
    }
    Some(points)
}

fn attr(element: &str, name: &str) -> Option<String> {
    let marker = format!("{name}=\"");
    let mut search = element;
    loop {
        let start = search.find(&marker)?;
        // Make sure we matched a whole attribute name, not a suffix like
        // `stroke-width` when looking for `width`.
        let preceding = search[..start].chars().next_back();
        let value_start = start + marker.len();
        let value = &search[value_start..];
        let end = value.find('"')?;
        if preceding.is_none() || preceding == Some(' ') {
            return Some(unescape_attr(&value[..end]));
        }
        search = &search[value_start + end..];
    }
}

fn attr_f64(element: &str, name: &str) -> Option<f64> {
    attr(element, name)?.parse().ok()
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn unescape_attr(value: &str) -> String {
    value
        .replace("&quot;", "\"")
        .replace("&gt;", ">")
        .replace("&lt;", "<")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::Brush;

    fn sample_scene() -> Vec<SceneObject> {
        let mut path = BrushPath::begin(
            &Brush {
                color: "#677dea".into(),
                width: 5.0,
            },
            10.0,
            20.0,
        );
        path.extend(30.0, 40.0);
        path.extend(50.0, 45.0);
        vec![
            SceneObject::Path(path),
            SceneObject::Image(ImageObject {
                url: "/uploads/users/u1/images/abc?alt=media&kind=png".into(),
                x: 100.0,
                y: 120.0,
                width: 64.0,
                height: 48.0,
            }),
        ]
    }

    #[test]
    fn scene_survives_serialize_then_parse() {
        let scene = sample_scene();
        let markup = serialize_scene(&scene, 1400.0, 600.0);
        let parsed = parse_scene(&markup).unwrap();
        assert_eq!(parsed, scene);
    }

    #[test]
    fn single_point_stroke_becomes_a_dot() {
        let scene = vec![SceneObject::Path(BrushPath {
            points: vec![(7.0, 9.0)],
            color: "#112233".into(),
            width: 6.0,
        })];
        let markup = serialize_scene(&scene, 100.0, 100.0);
        assert!(markup.contains("<circle"));
        assert_eq!(parse_scene(&markup).unwrap(), scene);
    }

    #[test]
    fn ampersands_in_urls_round_trip() {
        let markup = serialize_scene(&sample_scene(), 100.0, 100.0);
        assert!(markup.contains("abc?alt=media&amp;kind=png"));
        let parsed = parse_scene(&markup).unwrap();
        let SceneObject::Image(image) = &parsed[1] else {
            panic!("expected image");
        };
        assert!(image.url.ends_with("abc?alt=media&kind=png"));
    }

    #[test]
    fn unknown_elements_are_skipped() {
        let markup = "<svg width=\"10\" height=\"10\"><rect width=\"5\" height=\"5\"/>\
                      <circle cx=\"1\" cy=\"2\" r=\"3\" fill=\"#000\"/></svg>";
        let parsed = parse_scene(markup).unwrap();
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn non_svg_payloads_are_rejected() {
        assert!(parse_scene("not markup at all").is_none());
        assert!(parse_scene("{\"objects\":[]}").is_none());
    }

    #[test]
    fn malformed_path_data_is_skipped() {
        let markup = "<svg><path d=\"M 1\" stroke=\"#000\" stroke-width=\"2\"/></svg>";
        assert_eq!(parse_scene(markup).unwrap().len(), 0);
    }

    #[test]
    fn empty_scene_is_a_bare_document() {
        let markup = serialize_scene(&[], 800.0, 600.0);
        assert_eq!(parse_scene(&markup).unwrap(), Vec::<SceneObject>::new());
    }
}
