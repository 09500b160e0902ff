use std::collections::HashMap;
use std::io::{Read, Seek};

use roxmltree::Node;

use super::package::Package;
use super::xml::{self, W};
use crate::model::Alignment;

/// Major (headings) and minor (body) Latin typefaces from the theme.
pub(super) struct Theme {
    major: String,
    minor: String,
}

impl Theme {
    pub(super) fn load<R: Read + Seek>(pkg: &mut Package<R>) -> Self {
        let mut theme = Self {
            major: "Aptos Display".into(),
            minor: "Aptos".into(),
        };
        let Some(xml) = pkg.theme_part().and_then(|part| pkg.text(&part)) else {
            return theme;
        };
        let Ok(doc) = roxmltree::Document::parse(&xml) else {
            log::warn!("theme part is not well-formed, using default fonts");
            return theme;
        };
        let typeface = |node: Node| {
            node.children()
                .find(|n| xml::is(*n, xml::A, "latin"))
                .and_then(|n| n.attribute("typeface"))
                .filter(|tf| !tf.is_empty())
                .map(str::to_string)
        };
        for node in doc.descendants() {
            if xml::is(node, xml::A, "majorFont") {
                theme.major = typeface(node).unwrap_or(theme.major);
            } else if xml::is(node, xml::A, "minorFont") {
                theme.minor = typeface(node).unwrap_or(theme.minor);
            }
        }
        theme
    }

    /// Font named by a `w:rFonts` element, explicit or via the theme.
    pub(super) fn font(&self, rfonts: Node, inherited: &str) -> String {
        if let Some(ascii) = rfonts.attribute((W, "ascii")) {
            return ascii.to_string();
        }
        match rfonts.attribute((W, "asciiTheme")) {
            Some("majorHAnsi" | "majorAscii") => self.major.clone(),
            Some("minorHAnsi" | "minorAscii") => self.minor.clone(),
            _ => inherited.to_string(),
        }
    }
}

/// Run and paragraph properties shared by a style and direct formatting.
/// Every field is optional so layers can be stacked.
#[derive(Clone, Default)]
pub(super) struct Props {
    pub(super) font_size: Option<f32>,
    pub(super) font_name: Option<String>,
    pub(super) bold: Option<bool>,
    pub(super) italic: Option<bool>,
    pub(super) color: Option<[u8; 3]>,
    pub(super) space_before: Option<f32>,
    pub(super) space_after: Option<f32>,
    pub(super) line_spacing: Option<f32>,
    pub(super) alignment: Option<Alignment>,
}

impl Props {
    /// Read `w:rPr` into `self`, leaving unspecified properties alone.
    pub(super) fn read_run(&mut self, rpr: Node, theme: &Theme) {
        if let Some(size) = xml::font_size(rpr) {
            self.font_size = Some(size);
        }
        if let Some(rfonts) = xml::child(rpr, "rFonts") {
            let inherited = self.font_name.clone().unwrap_or_default();
            let font = theme.font(rfonts, &inherited);
            if !font.is_empty() {
                self.font_name = Some(font);
            }
        }
        if let Some(bold) = xml::flag(rpr, "b") {
            self.bold = Some(bold);
        }
        if let Some(italic) = xml::flag(rpr, "i") {
            self.italic = Some(italic);
        }
        if let Some(color) = xml::color(rpr) {
            self.color = Some(color);
        }
    }

    /// Read `w:pPr` spacing and justification into `self`.
    pub(super) fn read_paragraph(&mut self, ppr: Node) {
        if let Some(spacing) = xml::child(ppr, "spacing") {
            self.space_before = xml::points(spacing, "before").or(self.space_before);
            self.space_after = xml::points(spacing, "after").or(self.space_after);
            self.line_spacing = xml::auto_line_spacing(spacing).or(self.line_spacing);
        }
        if let Some(jc) = xml::val(ppr, "jc") {
            self.alignment = Some(match jc {
                "center" => Alignment::Center,
                "right" | "end" => Alignment::Right,
                "both" | "distribute" => Alignment::Justify,
                _ => Alignment::Left,
            });
        }
    }
}

pub(super) struct Styles {
    /// `w:docDefaults`, with the built-in fallbacks already applied.
    pub(super) defaults: Props,
    paragraph: HashMap<String, Props>,
}

impl Styles {
    pub(super) fn load<R: Read + Seek>(pkg: &mut Package<R>, theme: &Theme) -> Self {
        let mut styles = Self {
            defaults: Props {
                font_size: Some(12.0),
                font_name: Some(theme.minor.clone()),
                space_after: Some(8.0),
                line_spacing: Some(1.0),
                ..Props::default()
            },
            paragraph: HashMap::new(),
        };
        let Some(xml) = pkg.text("word/styles.xml") else {
            return styles;
        };
        let Ok(doc) = roxmltree::Document::parse(&xml) else {
            log::warn!("word/styles.xml is not well-formed, using defaults");
            return styles;
        };
        let root = doc.root_element();

        if let Some(defaults) = xml::child(root, "docDefaults") {
            if let Some(rpr) = xml::child(defaults, "rPrDefault").and_then(|n| xml::child(n, "rPr")) {
                styles.defaults.read_run(rpr, theme);
            }
            if let Some(ppr) = xml::child(defaults, "pPrDefault").and_then(|n| xml::child(n, "pPr")) {
                styles.defaults.read_paragraph(ppr);
            }
        }

        // Styles layer only what they set; inheritance through w:basedOn is resolved lazily.
        let mut raw: HashMap<String, (Option<String>, Props)> = HashMap::new();
        for style in root.children().filter(|n| xml::is_w(*n, "style")) {
            if style.attribute((W, "type")) != Some("paragraph") {
                continue;
            }
            let Some(id) = style.attribute((W, "styleId")) else {
                continue;
            };
            let mut props = Props::default();
            if let Some(ppr) = xml::child(style, "pPr") {
                props.read_paragraph(ppr);
            }
            if let Some(rpr) = xml::child(style, "rPr") {
                props.read_run(rpr, theme);
            }
            let based_on = xml::val(style, "basedOn").map(str::to_string);
            raw.insert(id.to_string(), (based_on, props));
        }
        for id in raw.keys() {
            styles.paragraph.insert(id.clone(), flatten(&raw, id));
        }
        styles
    }

    /// Effective properties of a paragraph style over the document defaults.
    pub(super) fn paragraph(&self, style_id: Option<&str>) -> Props {
        let mut props = self.defaults.clone();
        if let Some(style) = style_id.and_then(|id| self.paragraph.get(id)) {
            overlay(&mut props, style);
        }
        props
    }
}

fn overlay(base: &mut Props, top: &Props) {
    base.font_size = top.font_size.or(base.font_size);
    base.font_name = top.font_name.clone().or_else(|| base.font_name.take());
    base.bold = top.bold.or(base.bold);
    base.italic = top.italic.or(base.italic);
    base.color = top.color.or(base.color);
    base.space_before = top.space_before.or(base.space_before);
    base.space_after = top.space_after.or(base.space_after);
    base.line_spacing = top.line_spacing.or(base.line_spacing);
    base.alignment = top.alignment.or(base.alignment);
}

/// Merge a style with its `w:basedOn` ancestors, nearest last. Cycles stop the walk.
fn flatten(raw: &HashMap<String, (Option<String>, Props)>, id: &str) -> Props {
    let mut chain = Vec::new();
    let mut next = Some(id);
    while let Some(current) = next {
        if chain.contains(&current) || chain.len() > 16 {
            break;
        }
        let Some((based_on, _)) = raw.get(current) else {
            break;
        };
        chain.push(current);
        next = based_on.as_deref();
    }
    let mut props = Props::default();
    for style in chain.iter().rev() {
        if let Some((_, layer)) = raw.get(*style) {
            overlay(&mut props, layer);
        }
    }
    props
}
