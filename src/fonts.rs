//! Font discovery, metrics, and embedding for the PDF renderer.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use pdf_writer::types::FontFlags;
use pdf_writer::{Name, Pdf, Rect, Ref};
use ttf_parser::Face;

use crate::model::Run;
use crate::winansi;

/// Extra font directories, as a platform path list.
const FONTS_ENV: &str = "EASY_CONVERT_FONTS";

/// First and last byte covered by the `Widths` array of a simple font.
const FIRST_CHAR: u8 = 32;
const LAST_CHAR: u8 = 255;

/// A face request: family name (lowercased) plus style.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct FontKey {
    family: String,
    bold: bool,
    italic: bool,
}

impl FontKey {
    pub(crate) fn new(family: &str, bold: bool, italic: bool) -> Self {
        Self {
            family: family.trim().to_lowercase(),
            bold,
            italic,
        }
    }

    /// Word font lists like `"Calibri;Arial"` use their first entry.
    pub(crate) fn for_run(run: &Run) -> Self {
        let family = run.font_name.split(';').next().unwrap_or_default();
        Self::new(family, run.bold, run.italic)
    }

    fn regular(&self) -> Self {
        Self::new(&self.family, false, false)
    }

    fn helvetica(&self) -> &'static [u8] {
        match (self.bold, self.italic) {
            (false, false) => b"Helvetica",
            (true, false) => b"Helvetica-Bold",
            (false, true) => b"Helvetica-Oblique",
            (true, true) => b"Helvetica-BoldOblique",
        }
    }
}

#[derive(Clone, Debug)]
struct FontLocation {
    path: PathBuf,
    face: u32,
}

impl FontLocation {
    /// A `FontFile2` stream holds exactly one sfnt, so collection members are out.
    fn embeddable(&self) -> bool {
        let collection = self
            .path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("ttc"));
        self.face == 0 && !collection
    }
}

#[derive(Default)]
struct FontIndex {
    faces: HashMap<FontKey, FontLocation>,
}

impl FontIndex {
    fn scan(roots: Vec<PathBuf>) -> Self {
        let mut index = Self::default();
        let mut pending = roots;
        while let Some(dir) = pending.pop() {
            let Ok(entries) = std::fs::read_dir(&dir) else {
                continue;
            };
            for path in entries.flatten().map(|e| e.path()) {
                if path.is_dir() {
                    pending.push(path);
                } else {
                    index.add_file(&path);
                }
            }
        }
        log::debug!("font index holds {} faces", index.faces.len());
        index
    }

    fn add_file(&mut self, path: &Path) {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        if !matches!(ext.as_deref(), Some("ttf" | "otf" | "ttc")) {
            return;
        }
        let Ok(data) = std::fs::read(path) else {
            return;
        };
        let count = ttf_parser::fonts_in_collection(&data).unwrap_or(1);
        for face in 0..count {
            let Ok(parsed) = Face::parse(&data, face) else {
                continue;
            };
            let Some(family) = family_name(&parsed) else {
                continue;
            };
            let key = FontKey::new(&family, parsed.is_bold(), parsed.is_italic());
            self.faces.entry(key).or_insert_with(|| FontLocation {
                path: path.to_path_buf(),
                face,
            });
        }
    }

    fn get(&self, key: &FontKey) -> Option<&FontLocation> {
        self.faces.get(key)
    }
}

/// Name ID 1 rather than 16, so "Aptos Display" stays apart from "Aptos".
fn family_name(face: &Face) -> Option<String> {
    face.names()
        .into_iter()
        .filter(|n| n.name_id == ttf_parser::name_id::FAMILY && n.is_unicode())
        .find_map(|n| n.to_string())
}

fn platform_font_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(list) = std::env::var_os(FONTS_ENV) {
        dirs.extend(std::env::split_paths(&list).filter(|p| !p.as_os_str().is_empty()));
    }
    if cfg!(target_os = "macos") {
        for dir in [
            "/Library/Fonts",
            "/System/Library/Fonts",
            "/System/Library/Fonts/Supplemental",
        ] {
            dirs.push(PathBuf::from(dir));
        }
    } else if cfg!(target_os = "windows") {
        let windir = std::env::var_os("WINDIR").unwrap_or_else(|| "C:\\Windows".into());
        dirs.push(PathBuf::from(windir).join("Fonts"));
    } else {
        dirs.push(PathBuf::from("/usr/share/fonts"));
        dirs.push(PathBuf::from("/usr/local/share/fonts"));
        if let Some(home) = std::env::var_os("HOME") {
            dirs.push(PathBuf::from(home).join(".local/share/fonts"));
        }
    }
    dirs
}

fn system_index() -> &'static FontIndex {
    static SYSTEM: OnceLock<FontIndex> = OnceLock::new();
    SYSTEM.get_or_init(|| FontIndex::scan(platform_font_dirs()))
}

/// Per-render lookup: `ConvertOptions::font_dirs` first, then the system index.
pub(crate) struct FontResolver {
    extra: FontIndex,
}

impl FontResolver {
    pub(crate) fn new(extra_dirs: &[PathBuf]) -> Self {
        let extra = match extra_dirs {
            [] => FontIndex::default(),
            dirs => FontIndex::scan(dirs.to_vec()),
        };
        Self { extra }
    }

    fn exact(&self, key: &FontKey) -> Option<&FontLocation> {
        self.extra.get(key).or_else(|| system_index().get(key))
    }

    /// A missing bold/italic face degrades to the regular one.
    fn locate(&self, key: &FontKey) -> Option<&FontLocation> {
        self.exact(key).or_else(|| {
            if key.bold || key.italic {
                self.exact(&key.regular())
            } else {
                None
            }
        })
    }
}

/// A font registered in the output PDF.
pub(crate) struct PdfFont {
    /// Resource name used in content streams, e.g. `F1`.
    pub(crate) resource: String,
    pub(crate) id: Ref,
    /// Advances in 1/1000 em, indexed from `FIRST_CHAR`.
    widths: Vec<f32>,
    /// Natural line height as a multiple of font size, when known.
    pub(crate) line_ratio: Option<f32>,
}

impl PdfFont {
    /// Width of `text` at `size`, in points.
    pub(crate) fn measure(&self, text: &str, size: f32) -> f32 {
        let units: f32 = winansi::encode(text)
            .into_iter()
            .filter_map(|b| b.checked_sub(FIRST_CHAR))
            .filter_map(|i| self.widths.get(usize::from(i)))
            .sum();
        units * size / 1000.0
    }

    /// Embed the face that best matches `key`, or fall back to the standard Helvetica.
    pub(crate) fn register(
        pdf: &mut Pdf,
        resolver: &FontResolver,
        key: &FontKey,
        resource: String,
        mut alloc: impl FnMut() -> Ref,
    ) -> Self {
        let id = alloc();
        let embedded = resolver
            .locate(key)
            .filter(|loc| loc.embeddable())
            .and_then(|loc| {
                let data = std::fs::read(&loc.path).ok()?;
                let face = Face::parse(&data, loc.face).ok()?;
                let refs = (alloc(), alloc());
                Some(write_truetype(pdf, id, refs, &face, &data))
            });

        match embedded {
            Some((widths, line_ratio)) => Self {
                resource,
                id,
                widths,
                line_ratio: Some(line_ratio),
            },
            None => {
                log::warn!(
                    "font {:?} (bold={}, italic={}) not found, using Helvetica",
                    key.family,
                    key.bold,
                    key.italic
                );
                pdf.type1_font(id)
                    .base_font(Name(key.helvetica()))
                    .encoding_predefined(Name(b"WinAnsiEncoding"));
                Self {
                    resource,
                    id,
                    widths: helvetica_widths(),
                    line_ratio: None,
                }
            }
        }
    }
}

/// Rough Helvetica advances, by character class.
fn helvetica_widths() -> Vec<f32> {
    (FIRST_CHAR..=LAST_CHAR)
        .map(|b| match winansi::decode_byte(b) {
            ' ' | 'I' | 'J' | 'f' | 'i' | 'j' | 'l' | 't' => 278.0,
            'M' | 'm' | 'w' => 833.0,
            '0'..='9' | 'a'..='z' => 556.0,
            'A'..='Z' => 667.0,
            c if c.is_ascii_punctuation() => 333.0,
            _ => 556.0,
        })
        .collect()
}

/// Write font dictionary, descriptor, and `FontFile2` for a TrueType face.
/// Returns the WinAnsi widths and the line height ratio.
fn write_truetype(
    pdf: &mut Pdf,
    font_id: Ref,
    (descriptor_id, file_id): (Ref, Ref),
    face: &Face,
    data: &[u8],
) -> (Vec<f32>, f32) {
    let units = f32::from(face.units_per_em());
    let scale = |v: f32| v / units * 1000.0;

    let widths: Vec<f32> = (FIRST_CHAR..=LAST_CHAR)
        .map(|b| {
            face.glyph_index(winansi::decode_byte(b))
                .and_then(|g| face.glyph_hor_advance(g))
                .map_or(0.0, |adv| scale(f32::from(adv)))
        })
        .collect();

    let bounds = face.global_bounding_box();
    let base_font: String = family_name(face)
        .unwrap_or_else(|| "Embedded".into())
        .split_whitespace()
        .collect();

    pdf.stream(file_id, data)
        .pair(Name(b"Length1"), i32::try_from(data.len()).unwrap_or(i32::MAX));

    pdf.font_descriptor(descriptor_id)
        .name(Name(base_font.as_bytes()))
        .flags(FontFlags::NON_SYMBOLIC)
        .bbox(Rect::new(
            scale(f32::from(bounds.x_min)),
            scale(f32::from(bounds.y_min)),
            scale(f32::from(bounds.x_max)),
            scale(f32::from(bounds.y_max)),
        ))
        .italic_angle(face.italic_angle())
        .ascent(scale(f32::from(face.ascender())))
        .descent(scale(f32::from(face.descender())))
        .cap_height(face.capital_height().map_or(700.0, |h| scale(f32::from(h))))
        .stem_v(80.0)
        .font_file2(file_id);

    {
        let mut dict = pdf.indirect(font_id).dict();
        dict.pair(Name(b"Type"), Name(b"Font"));
        dict.pair(Name(b"Subtype"), Name(b"TrueType"));
        dict.pair(Name(b"BaseFont"), Name(base_font.as_bytes()));
        dict.pair(Name(b"Encoding"), Name(b"WinAnsiEncoding"));
        dict.pair(Name(b"FirstChar"), i32::from(FIRST_CHAR));
        dict.pair(Name(b"LastChar"), i32::from(LAST_CHAR));
        dict.pair(Name(b"FontDescriptor"), descriptor_id);
        dict.insert(Name(b"Widths"))
            .array()
            .items(widths.iter().copied());
    }

    let height = f32::from(face.ascender()) - f32::from(face.descender()) + f32::from(face.line_gap());
    (widths, height / units)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(font_name: &str, bold: bool, italic: bool) -> Run {
        Run {
            text: String::new(),
            font_size: 11.0,
            font_name: font_name.into(),
            bold,
            italic,
            color: None,
        }
    }

    #[test]
    fn key_uses_first_family_of_a_list() {
        let key = FontKey::for_run(&run("Calibri;Arial", true, false));
        assert_eq!(key, FontKey::new("calibri", true, false));
        assert_eq!(key.helvetica(), b"Helvetica-Bold");
    }

    #[test]
    fn collection_members_are_not_embedded() {
        let loc = |path: &str, face| FontLocation {
            path: path.into(),
            face,
        };
        assert!(loc("/fonts/a.ttf", 0).embeddable());
        assert!(!loc("/fonts/a.TTC", 0).embeddable());
        assert!(!loc("/fonts/a.otf", 2).embeddable());
    }

    #[test]
    fn unknown_family_falls_back_to_helvetica() {
        let mut pdf = Pdf::new();
        let mut next = 10;
        let key = FontKey::new("No Such Font Family 1234", false, false);
        let font = PdfFont::register(&mut pdf, &FontResolver::new(&[]), &key, "F1".into(), || {
            next += 1;
            Ref::new(next)
        });
        assert_eq!(font.id, Ref::new(11));
        assert!(font.line_ratio.is_none());
        // I and i are both 278 units wide.
        assert!((font.measure("Ii", 10.0) - 5.56).abs() < 1e-3);
    }
}
