//! WordprocessingML lookups over `roxmltree` nodes.

use roxmltree::Node;

pub(super) const W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
pub(super) const A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
pub(super) const WP: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
pub(super) const R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

pub(super) fn is(node: Node, ns: &str, name: &str) -> bool {
    node.tag_name().name() == name && node.tag_name().namespace() == Some(ns)
}

pub(super) fn is_w(node: Node, name: &str) -> bool {
    is(node, W, name)
}

pub(super) fn child<'a, 'i>(node: Node<'a, 'i>, name: &str) -> Option<Node<'a, 'i>> {
    node.children().find(|n| is_w(*n, name))
}

/// `w:val` of the named child, e.g. `<w:jc w:val="center"/>`.
pub(super) fn val<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    child(node, name)?.attribute((W, "val"))
}

/// On/off properties such as `<w:b/>`: present means on unless `w:val` is false.
pub(super) fn flag(node: Node, name: &str) -> Option<bool> {
    let el = child(node, name)?;
    Some(!matches!(el.attribute((W, "val")), Some("0" | "false" | "off")))
}

/// A twentieths-of-a-point attribute, in points.
pub(super) fn points(node: Node, attr: &str) -> Option<f32> {
    let twips: f32 = node.attribute((W, attr))?.parse().ok()?;
    Some(twips / 20.0)
}

/// `w:sz` is measured in half-points.
pub(super) fn font_size(rpr: Node) -> Option<f32> {
    let half_points: f32 = val(rpr, "sz")?.parse().ok()?;
    Some(half_points / 2.0)
}

pub(super) fn color(rpr: Node) -> Option<[u8; 3]> {
    let hex = val(rpr, "color")?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}

/// `w:spacing/@w:line` as a multiple of single spacing, for the `auto` rule only.
pub(super) fn auto_line_spacing(spacing: Node) -> Option<f32> {
    match spacing.attribute((W, "lineRule")) {
        None | Some("auto") => {
            let line: f32 = spacing.attribute((W, "line"))?.parse().ok()?;
            Some(line / 240.0)
        }
        Some(_) => None,
    }
}
