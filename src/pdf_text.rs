//! Text recovery from PDF content streams.
//!
//! Tracks just enough of the text state (line matrix, font size, leading) to
//! place every shown string, then rebuilds lines and paragraphs from positions.

use lopdf::content::Content;
use lopdf::{Document, Object, ObjectId};

use crate::error::Error;
use crate::winansi;

/// Line gap, in multiples of font size, above which a new paragraph starts.
const PARAGRAPH_GAP: f32 = 1.6;
/// TJ adjustments beyond this (thousandths of an em) read as a word space.
const TJ_SPACE_THRESHOLD: f32 = 200.0;

#[derive(Debug, Clone)]
struct Fragment {
    x: f32,
    y: f32,
    size: f32,
    text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: String,
    pub y: f32,
    pub font_size: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextParagraph {
    pub text: String,
    pub font_size: f32,
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn operand(operands: &[Object], idx: usize) -> f32 {
    operands.get(idx).and_then(number).unwrap_or(0.0)
}

#[derive(Default)]
struct TextState {
    x: f32,
    y: f32,
    font_size: f32,
    scale: f32,
    leading: f32,
}

impl TextState {
    fn next_line(&mut self) {
        self.y -= self.leading * self.scale.max(1.0);
    }

    fn fragment(&self, text: String) -> Option<Fragment> {
        if text.is_empty() {
            return None;
        }
        Some(Fragment {
            x: self.x,
            y: self.y,
            size: (self.font_size * self.scale).abs().max(1.0),
            text,
        })
    }
}

fn page_fragments(content: &Content) -> Vec<Fragment> {
    let mut fragments = Vec::new();
    let mut state = TextState {
        scale: 1.0,
        ..TextState::default()
    };

    for op in &content.operations {
        let args = &op.operands;
        match op.operator.as_str() {
            "BT" => {
                state.x = 0.0;
                state.y = 0.0;
                state.scale = 1.0;
            }
            "Tf" => state.font_size = operand(args, 1),
            "TL" => state.leading = operand(args, 0),
            "Td" => {
                state.x += operand(args, 0);
                state.y += operand(args, 1);
            }
            "TD" => {
                state.leading = -operand(args, 1);
                state.x += operand(args, 0);
                state.y += operand(args, 1);
            }
            "Tm" => {
                state.scale = operand(args, 3).abs().max(f32::EPSILON);
                state.x = operand(args, 4);
                state.y = operand(args, 5);
            }
            "T*" => state.next_line(),
            "Tj" => {
                if let Some(Object::String(bytes, _)) = args.first() {
                    fragments.extend(state.fragment(winansi::decode(bytes)));
                }
            }
            "'" => {
                state.next_line();
                if let Some(Object::String(bytes, _)) = args.first() {
                    fragments.extend(state.fragment(winansi::decode(bytes)));
                }
            }
            "\"" => {
                state.next_line();
                if let Some(Object::String(bytes, _)) = args.get(2) {
                    fragments.extend(state.fragment(winansi::decode(bytes)));
                }
            }
            "TJ" => {
                let Some(Object::Array(items)) = args.first() else {
                    continue;
                };
                let mut text = String::new();
                for item in items {
                    match item {
                        Object::String(bytes, _) => text.push_str(&winansi::decode(bytes)),
                        other => {
                            if number(other).is_some_and(|n| -n > TJ_SPACE_THRESHOLD)
                                && !text.ends_with(' ')
                            {
                                text.push(' ');
                            }
                        }
                    }
                }
                fragments.extend(state.fragment(text));
            }
            _ => {}
        }
    }
    fragments
}

/// Fragments on one baseline become one line, ordered left to right.
fn assemble_lines(mut fragments: Vec<Fragment>) -> Vec<TextLine> {
    fragments.sort_by(|a, b| b.y.total_cmp(&a.y));

    let mut rows: Vec<Vec<Fragment>> = Vec::new();
    for frag in fragments {
        match rows.last_mut() {
            Some(row) if (row[0].y - frag.y).abs() <= (row[0].size * 0.3).max(1.0) => row.push(frag),
            _ => rows.push(vec![frag]),
        }
    }

    rows.into_iter()
        .filter_map(|mut row| {
            row.sort_by(|a, b| a.x.total_cmp(&b.x));
            let mut text = String::new();
            let mut prev: Option<&Fragment> = None;
            for frag in &row {
                if let Some(p) = prev {
                    let estimated_end = p.x + p.text.chars().count() as f32 * p.size * 0.6;
                    let touching_space = p.text.ends_with(char::is_whitespace)
                        || frag.text.starts_with(char::is_whitespace);
                    if !touching_space && frag.x > estimated_end + p.size {
                        text.push(' ');
                    }
                }
                text.push_str(&frag.text);
                prev = Some(frag);
            }
            let text = text.trim().to_string();
            if text.is_empty() {
                return None;
            }
            Some(TextLine {
                text,
                y: row[0].y,
                font_size: row.iter().map(|f| f.size).fold(0.0, f32::max),
            })
        })
        .collect()
}

/// Most control characters means the page uses a multi-byte encoding we cannot map.
fn looks_undecodable(lines: &[TextLine]) -> bool {
    let (mut total, mut control) = (0usize, 0usize);
    for c in lines.iter().flat_map(|l| l.text.chars()) {
        total += 1;
        if c.is_control() {
            control += 1;
        }
    }
    total > 0 && control * 3 > total
}

fn fallback_lines(doc: &Document, page_number: u32) -> Vec<TextLine> {
    let text = match doc.extract_text(&[page_number]) {
        Ok(text) => text,
        Err(e) => {
            log::warn!("page {page_number}: text extraction failed: {e}");
            return Vec::new();
        }
    };
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .enumerate()
        .map(|(i, l)| TextLine {
            text: l.to_string(),
            // Spread lines far apart so each becomes its own paragraph.
            y: -(i as f32) * 100.0,
            font_size: 0.0,
        })
        .collect()
}

fn page_lines(doc: &Document, page_number: u32, page_id: ObjectId) -> Result<Vec<TextLine>, Error> {
    let data = doc.get_page_content(page_id)?;
    let content = Content::decode(&data)?;
    let lines = assemble_lines(page_fragments(&content));
    if looks_undecodable(&lines) {
        log::debug!("page {page_number}: falling back to lopdf text extraction");
        return Ok(fallback_lines(doc, page_number));
    }
    Ok(lines)
}

/// Text lines of every page, in page order.
pub fn extract_lines(doc: &Document) -> Result<Vec<Vec<TextLine>>, Error> {
    doc.get_pages()
        .into_iter()
        .map(|(number, id)| page_lines(doc, number, id))
        .collect()
}

/// Group consecutive lines into paragraphs by vertical gap and font size.
pub fn paragraphs(lines: &[TextLine]) -> Vec<TextParagraph> {
    let mut out: Vec<TextParagraph> = Vec::new();
    let mut prev: Option<&TextLine> = None;
    for line in lines {
        let continues = prev.is_some_and(|p| {
            let size = p.font_size.max(line.font_size).max(1.0);
            let same_size = (p.font_size - line.font_size).abs() < 0.5;
            same_size && (p.y - line.y) <= size * PARAGRAPH_GAP
        });
        match out.last_mut() {
            // A trailing '-' is text, not a soft hyphen.
            Some(para) if continues => {
                para.text.push(' ');
                para.text.push_str(&line.text);
            }
            _ => out.push(TextParagraph {
                text: line.text.clone(),
                font_size: line.font_size,
            }),
        }
        prev = Some(line);
    }
    out
}

/// MediaBox width and height of the first page, when it is stored directly on the page.
pub fn first_page_size(doc: &Document) -> Option<(f32, f32)> {
    let (_, page_id) = doc.get_pages().into_iter().next()?;
    let page = doc.get_object(page_id).ok()?.as_dict().ok()?;
    let media_box = page.get(b"MediaBox").ok()?.as_array().ok()?;
    let values: Vec<f32> = media_box.iter().filter_map(number).collect();
    match values.as_slice() {
        [x0, y0, x1, y1] => Some(((x1 - x0).abs(), (y1 - y0).abs())),
        _ => None,
    }
}
