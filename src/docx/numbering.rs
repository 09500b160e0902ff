use std::collections::HashMap;
use std::io::{Read, Seek};

use roxmltree::Node;

use super::package::Package;
use super::xml::{self, W};

struct Level {
    format: String,
    text: String,
    indent_left: f32,
    hanging: f32,
}

/// A resolved list item: where the text starts and what label precedes it.
pub(super) struct ListItem {
    pub(super) indent_left: f32,
    pub(super) hanging: f32,
    pub(super) label: String,
}

/// List definitions from `word/numbering.xml` plus running counters.
#[derive(Default)]
pub(super) struct Numbering {
    /// (numId, ilvl) -> level definition of the referenced abstractNum.
    levels: HashMap<(String, u8), Level>,
    counters: HashMap<(String, u8), u32>,
}

fn read_level(lvl: Node) -> Option<(u8, Level)> {
    let ilvl = lvl.attribute((W, "ilvl"))?.parse().ok()?;
    let ind = xml::child(lvl, "pPr").and_then(|ppr| xml::child(ppr, "ind"));
    let indent = |attr| ind.and_then(|n| xml::points(n, attr)).unwrap_or(0.0);
    Some((
        ilvl,
        Level {
            format: xml::val(lvl, "numFmt").unwrap_or("bullet").to_string(),
            text: xml::val(lvl, "lvlText").unwrap_or_default().to_string(),
            indent_left: indent("left"),
            hanging: indent("hanging"),
        },
    ))
}

impl Numbering {
    pub(super) fn load<R: Read + Seek>(pkg: &mut Package<R>) -> Self {
        let Some(text) = pkg.text("word/numbering.xml") else {
            return Self::default();
        };
        let Ok(doc) = roxmltree::Document::parse(&text) else {
            log::warn!("word/numbering.xml is not well-formed, ignoring lists");
            return Self::default();
        };
        let root = doc.root_element();

        let mut abstracts: HashMap<&str, Vec<Node>> = HashMap::new();
        for node in root.children().filter(|n| xml::is_w(*n, "abstractNum")) {
            if let Some(id) = node.attribute((W, "abstractNumId")) {
                let lvls = node.children().filter(|n| xml::is_w(*n, "lvl")).collect();
                abstracts.insert(id, lvls);
            }
        }

        let mut levels = HashMap::new();
        for num in root.children().filter(|n| xml::is_w(*n, "num")) {
            let (Some(num_id), Some(abstract_id)) =
                (num.attribute((W, "numId")), xml::val(num, "abstractNumId"))
            else {
                continue;
            };
            for lvl in abstracts.get(abstract_id).into_iter().flatten() {
                if let Some((ilvl, level)) = read_level(*lvl) {
                    levels.insert((num_id.to_string(), ilvl), level);
                }
            }
        }

        Self {
            levels,
            counters: HashMap::new(),
        }
    }

    /// Advance the counter for `numPr` and return the item it describes.
    pub(super) fn next_item(&mut self, num_pr: Node) -> Option<ListItem> {
        let num_id = xml::val(num_pr, "numId")?;
        let ilvl: u8 = xml::val(num_pr, "ilvl")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let key = (num_id.to_string(), ilvl);
        let level = self.levels.get(&key)?;

        // Starting an outer item restarts the counters below it.
        self.counters
            .retain(|(id, depth), _| id != num_id || *depth <= ilvl);
        let count = self.counters.entry(key).or_insert(0);
        *count += 1;

        let label = if level.format == "bullet" {
            "\u{2022}".to_string()
        } else {
            level.text.replace(&format!("%{}", ilvl + 1), &count.to_string())
        };
        Some(ListItem {
            indent_left: level.indent_left,
            hanging: level.hanging,
            label,
        })
    }
}
