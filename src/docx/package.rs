use std::collections::HashMap;
use std::io::{Read, Seek};

use crate::error::Error;

/// The ZIP container of a Word document, read part by part.
pub(super) struct Package<R> {
    zip: zip::ZipArchive<R>,
}

impl<R: Read + Seek> Package<R> {
    pub(super) fn new(zip: zip::ZipArchive<R>) -> Self {
        Self { zip }
    }

    pub(super) fn bytes(&mut self, name: &str) -> Option<Vec<u8>> {
        let mut entry = self.zip.by_name(name).ok()?;
        let mut data = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or_default());
        entry.read_to_end(&mut data).ok()?;
        Some(data)
    }

    /// Optional parts are `None` when absent or not UTF-8.
    pub(super) fn text(&mut self, name: &str) -> Option<String> {
        String::from_utf8(self.bytes(name)?).ok()
    }

    pub(super) fn main_document(&mut self) -> Result<String, Error> {
        let data = self
            .bytes("word/document.xml")
            .ok_or_else(|| Error::conversion("not a Word document: word/document.xml is missing"))?;
        String::from_utf8(data)
            .map_err(|_| Error::conversion("word/document.xml is not valid UTF-8"))
    }

    /// First `word/theme/*.xml` part, if any.
    pub(super) fn theme_part(&self) -> Option<String> {
        self.zip
            .file_names()
            .filter(|n| n.starts_with("word/theme/") && n.ends_with(".xml"))
            .min()
            .map(str::to_string)
    }

    /// Internal relationship targets of the main document, keyed by `r:id`,
    /// resolved to part names.
    pub(super) fn relationships(&mut self) -> HashMap<String, String> {
        let Some(xml) = self.text("word/_rels/document.xml.rels") else {
            return HashMap::new();
        };
        let Ok(doc) = roxmltree::Document::parse(&xml) else {
            log::warn!("document relationships are not well-formed, ignoring them");
            return HashMap::new();
        };
        doc.root_element()
            .children()
            .filter(|n| n.tag_name().name() == "Relationship")
            .filter(|n| n.attribute("TargetMode") != Some("External"))
            .filter_map(|n| {
                let id = n.attribute("Id")?;
                let target = n.attribute("Target")?;
                let part = match target.strip_prefix('/') {
                    Some(absolute) => absolute.to_string(),
                    None => format!("word/{target}"),
                };
                Some((id.to_string(), part))
            })
            .collect()
    }
}
