use std::collections::HashMap;
use std::io::{Read, Seek};

use roxmltree::Node;

use super::numbering::Numbering;
use super::package::Package;
use super::styles::{Props, Styles, Theme};
use super::xml::{self, W};
use crate::model::{Alignment, EmbeddedImage, Paragraph, Run};

const EMU_PER_POINT: f32 = 12700.0;
/// Separator placed between the cells of a flattened table row.
pub(super) const CELL_GAP: &str = "    ";

/// Everything needed to turn body elements into model paragraphs.
pub(super) struct BodyReader<'p, R> {
    pub(super) package: &'p mut Package<R>,
    pub(super) theme: Theme,
    pub(super) styles: Styles,
    pub(super) numbering: Numbering,
    pub(super) rels: HashMap<String, String>,
}

impl<R: Read + Seek> BodyReader<'_, R> {
    pub(super) fn read(&mut self, body: Node) -> Vec<Paragraph> {
        let mut out = Vec::new();
        for node in body.children() {
            if xml::is_w(node, "p") {
                out.push(self.paragraph(node));
            } else if xml::is_w(node, "tbl") {
                out.extend(
                    node.children()
                        .filter(|n| xml::is_w(*n, "tr"))
                        .map(|row| self.table_row(row)),
                );
            }
        }
        out
    }

    fn blank_paragraph(&self, props: &Props) -> Paragraph {
        Paragraph {
            runs: Vec::new(),
            space_before: props.space_before.unwrap_or(0.0),
            space_after: props.space_after.unwrap_or(0.0),
            alignment: props.alignment.unwrap_or(Alignment::Left),
            indent_left: 0.0,
            indent_hanging: 0.0,
            list_label: String::new(),
            page_break_before: false,
            line_spacing: None,
            image: None,
        }
    }

    fn run(text: String, props: &Props) -> Run {
        Run {
            text,
            font_size: props.font_size.unwrap_or(12.0),
            font_name: props.font_name.clone().unwrap_or_default(),
            bold: props.bold.unwrap_or(false),
            italic: props.italic.unwrap_or(false),
            color: props.color,
        }
    }

    /// One line per row: cell texts joined with `CELL_GAP`.
    fn table_row(&self, row: Node) -> Paragraph {
        let props = self.styles.paragraph(None);
        let cells: Vec<String> = row
            .children()
            .filter(|n| xml::is_w(*n, "tc"))
            .map(|cell| {
                cell.children()
                    .filter(|n| xml::is_w(*n, "p"))
                    .map(|p| {
                        p.descendants()
                            .filter(|n| xml::is_w(*n, "t"))
                            .filter_map(|t| t.text())
                            .collect::<String>()
                    })
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect();
        let mut para = self.blank_paragraph(&props);
        para.runs.push(Self::run(cells.join(CELL_GAP), &props));
        para.space_after = 4.0;
        para
    }

    fn paragraph(&mut self, node: Node) -> Paragraph {
        let ppr = xml::child(node, "pPr");
        let mut props = self.styles.paragraph(ppr.and_then(|p| xml::val(p, "pStyle")));
        if let Some(ppr) = ppr {
            props.read_paragraph(ppr);
        }

        let mut para = self.blank_paragraph(&props);
        para.line_spacing = props
            .line_spacing
            .filter(|s| Some(*s) != self.styles.defaults.line_spacing);
        para.page_break_before = ppr.and_then(|p| xml::flag(p, "pageBreakBefore")).unwrap_or(false);

        if let Some(item) = ppr
            .and_then(|p| xml::child(p, "numPr"))
            .and_then(|num_pr| self.numbering.next_item(num_pr))
        {
            para.indent_left = item.indent_left;
            para.indent_hanging = item.hanging;
            para.list_label = item.label;
        }
        if let Some(ind) = ppr.and_then(|p| xml::child(p, "ind")) {
            if let Some(left) = xml::points(ind, "left").or_else(|| xml::points(ind, "start")) {
                para.indent_left = left;
            }
            if let Some(hanging) = xml::points(ind, "hanging") {
                para.indent_hanging = hanging;
            }
        }

        for run_node in runs_of(node) {
            let mut run_props = props.clone();
            if let Some(rpr) = xml::child(run_node, "rPr") {
                run_props.read_run(rpr, &self.theme);
            }
            let at_start = para.runs.is_empty();
            let text = run_text(run_node, at_start, &mut para.page_break_before);
            if !text.is_empty() {
                para.runs.push(Self::run(text, &run_props));
            }
        }

        para.image = self.drawing(node);
        para
    }

    /// First picture in the paragraph, sized by its `wp:extent`.
    fn drawing(&mut self, node: Node) -> Option<EmbeddedImage> {
        let containers = node
            .descendants()
            .filter(|n| xml::is(*n, xml::WP, "inline") || xml::is(*n, xml::WP, "anchor"));
        for container in containers {
            let Some(extent) = container.children().find(|n| xml::is(*n, xml::WP, "extent")) else {
                continue;
            };
            let emu = |attr: &str| {
                let v: f32 = extent.attribute(attr)?.parse().ok()?;
                Some(v / EMU_PER_POINT)
            };
            let (Some(width), Some(height)) = (emu("cx"), emu("cy")) else {
                continue;
            };
            let Some(rel_id) = container
                .descendants()
                .find(|n| xml::is(*n, xml::A, "blip"))
                .and_then(|blip| blip.attribute((xml::R, "embed")))
            else {
                continue;
            };
            let Some(data) = self.rels.get(rel_id).and_then(|part| self.package.bytes(part)) else {
                log::warn!("picture {rel_id} points at a missing part");
                continue;
            };
            return Some(EmbeddedImage {
                data,
                display_width: width,
                display_height: height,
            });
        }
        None
    }
}

/// `w:r` elements, looking through hyperlinks, insertions and smart tags.
fn runs_of<'a, 'i>(node: Node<'a, 'i>) -> Vec<Node<'a, 'i>> {
    let mut out = Vec::new();
    for child in node.children() {
        if xml::is_w(child, "r") {
            out.push(child);
        } else if ["hyperlink", "ins", "smartTag"].iter().any(|name| xml::is_w(child, name)) {
            out.extend(runs_of(child));
        }
    }
    out
}

/// Text of a run, with tabs and line breaks as characters. A page break that
/// comes before any paragraph text sets `page_break_before` instead.
fn run_text(run: Node, at_start: bool, page_break_before: &mut bool) -> String {
    let mut text = String::new();
    for child in run.children() {
        if xml::is_w(child, "t") {
            text.push_str(child.text().unwrap_or_default());
        } else if xml::is_w(child, "tab") {
            text.push('\t');
        } else if xml::is_w(child, "br") {
            let page = child.attribute((W, "type")) == Some("page");
            if page && text.is_empty() && at_start {
                *page_break_before = true;
            } else {
                text.push('\n');
            }
        }
    }
    text
}
