use std::collections::HashMap;
use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use pdf_writer::{Content, Filter, Name, Pdf, Rect, Ref, Str};

use crate::config::ConvertOptions;
use crate::error::Error;
use crate::fonts::{FontKey, FontResolver, PdfFont};
use crate::model::{Alignment, Document, Paragraph, Run};
use crate::raster::RasterImage;
use crate::winansi;

const DEFAULT_LINE_RATIO: f32 = 1.15;
const EMPTY_LINE_SIZE: f32 = 11.0;
const TAB_SPACES: &str = "    ";

pub(crate) fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    // Writing into a Vec cannot fail.
    let _ = encoder.write_all(data);
    encoder.finish().unwrap_or_default()
}

struct Piece {
    run: usize,
    text: String,
    width: f32,
    trimmed_width: f32,
    blank: bool,
}

#[derive(Default)]
struct Line {
    pieces: Vec<Piece>,
    forced_break: bool,
}

impl Line {
    fn last_visible(&self) -> Option<usize> {
        self.pieces.iter().rposition(|p| !p.blank)
    }

    /// Width without trailing whitespace.
    fn width(&self) -> f32 {
        let Some(last) = self.last_visible() else {
            return 0.0;
        };
        self.pieces[..last].iter().map(|p| p.width).sum::<f32>() + self.pieces[last].trimmed_width
    }

    fn inner_spaces(&self) -> usize {
        let Some(last) = self.last_visible() else {
            return 0;
        };
        self.pieces[..last]
            .iter()
            .map(|p| p.text.matches(' ').count())
            .sum::<usize>()
            + self.pieces[last].text.trim_end().matches(' ').count()
    }
}

/// Split text after each whitespace run, with `\n` as its own piece.
fn split_pieces(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut in_ws = false;
    for (i, c) in text.char_indices() {
        if c == '\n' {
            if start < i {
                out.push(&text[start..i]);
            }
            out.push("\n");
            start = i + 1;
            in_ws = false;
            continue;
        }
        let ws = c.is_whitespace();
        if in_ws && !ws {
            out.push(&text[start..i]);
            start = i;
        }
        in_ws = ws;
    }
    if start < text.len() {
        out.push(&text[start..]);
    }
    out
}

struct PageOut {
    content: Content,
    images: Vec<(String, Ref)>,
}

struct Renderer<'a> {
    doc: &'a Document,
    pdf: Pdf,
    next_id: i32,
    resolver: FontResolver,
    fonts: HashMap<FontKey, PdfFont>,
    pages: Vec<PageOut>,
    cursor_y: f32,
    fresh_page: bool,
    /// Characters dropped because WinAnsi has no slot for them.
    unencodable: usize,
}

impl<'a> Renderer<'a> {
    fn new(doc: &'a Document, options: &ConvertOptions) -> Self {
        let mut renderer = Self {
            doc,
            pdf: Pdf::new(),
            next_id: 3, // 1 = catalog, 2 = page tree
            resolver: FontResolver::new(&options.font_dirs),
            fonts: HashMap::new(),
            pages: Vec::new(),
            cursor_y: 0.0,
            fresh_page: true,
            unencodable: 0,
        };
        renderer.new_page();
        renderer
    }

    fn alloc(&mut self) -> Ref {
        let r = Ref::new(self.next_id);
        self.next_id += 1;
        r
    }

    fn new_page(&mut self) {
        self.pages.push(PageOut {
            content: Content::new(),
            images: Vec::new(),
        });
        self.cursor_y = self.doc.page_height - self.doc.margin_top;
        self.fresh_page = true;
    }

    fn page(&mut self) -> &mut PageOut {
        if self.pages.is_empty() {
            self.new_page();
        }
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    /// Move down by `height`, breaking the page first when it does not fit.
    fn reserve(&mut self, height: f32) {
        if !self.fresh_page && self.cursor_y - height < self.doc.margin_bottom {
            self.new_page();
        }
        self.fresh_page = false;
    }

    fn font(&mut self, run: &Run) -> &PdfFont {
        let key = FontKey::for_run(run);
        if !self.fonts.contains_key(&key) {
            let resource = format!("F{}", self.fonts.len() + 1);
            let next_id = &mut self.next_id;
            let font = PdfFont::register(&mut self.pdf, &self.resolver, &key, resource, || {
                let r = Ref::new(*next_id);
                *next_id += 1;
                r
            });
            self.fonts.insert(key.clone(), font);
        }
        &self.fonts[&key]
    }

    fn line_height(&mut self, run: &Run, spacing: f32) -> f32 {
        let ratio = self.font(run).line_ratio.unwrap_or(DEFAULT_LINE_RATIO);
        run.font_size * ratio * spacing
    }

    fn wrap(&mut self, para: &Paragraph, first_width: f32, width: f32) -> Vec<Line> {
        let mut lines = Vec::new();
        let mut line = Line::default();
        let mut line_width = 0.0;

        for (idx, run) in para.runs.iter().enumerate() {
            let text = run.text.replace('\t', TAB_SPACES);
            for piece in split_pieces(&text) {
                if piece == "\n" {
                    line.forced_break = true;
                    lines.push(std::mem::take(&mut line));
                    line_width = 0.0;
                    continue;
                }
                let blank = piece.trim().is_empty();
                if blank && line.pieces.is_empty() && !lines.is_empty() {
                    continue;
                }
                let piece_width = self.font(run).measure(piece, run.font_size);
                let avail = if lines.is_empty() { first_width } else { width };
                let word_width = self.font(run).measure(piece.trim_end(), run.font_size);
                if !blank && !line.pieces.is_empty() && line_width + word_width > avail {
                    lines.push(std::mem::take(&mut line));
                    line_width = 0.0;
                }
                line.pieces.push(Piece {
                    run: idx,
                    text: piece.to_string(),
                    width: piece_width,
                    trimmed_width: word_width,
                    blank,
                });
                line_width += piece_width;
            }
        }
        if !line.pieces.is_empty() || lines.is_empty() {
            lines.push(line);
        }
        lines
    }

    fn draw_text(&mut self, run: &Run, text: &str, x: f32, baseline: f32) {
        let name = self.font(run).resource.clone();
        let [r, g, b] = run.color.unwrap_or([0, 0, 0]);
        let bytes = winansi::encode(text);
        if bytes.len() < text.chars().count() {
            self.unencodable += text.chars().count() - bytes.len();
        }
        let content = &mut self.page().content;
        content.begin_text();
        content.set_font(Name(name.as_bytes()), run.font_size);
        content.set_fill_rgb(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0);
        content.next_line(x, baseline);
        content.show(Str(&bytes));
        content.end_text();
    }

    fn draw_image(&mut self, para: &Paragraph) {
        let Some(embedded) = &para.image else {
            return;
        };
        let raster = match RasterImage::decode(&embedded.data) {
            Ok(raster) => raster,
            Err(e) => {
                log::warn!("skipping embedded image: {e}");
                return;
            }
        };
        let max_w = self.doc.content_width();
        let max_h = (self.doc.page_height - self.doc.margin_top - self.doc.margin_bottom).max(1.0);
        let scale = (max_w / embedded.display_width)
            .min(max_h / embedded.display_height)
            .min(1.0);
        let (w, h) = (embedded.display_width * scale, embedded.display_height * scale);

        self.reserve(h);
        let x = match para.alignment {
            Alignment::Center => self.doc.margin_left + (max_w - w) / 2.0,
            Alignment::Right => self.doc.margin_left + max_w - w,
            _ => self.doc.margin_left + para.indent_left,
        };
        let y = self.cursor_y - h;
        self.cursor_y = y;

        let image_id = self.alloc();
        raster.write_xobject(&mut self.pdf, image_id);
        let page = self.page();
        let name = format!("Im{}", page.images.len() + 1);
        page.content.save_state();
        page.content.transform([w, 0.0, 0.0, h, x, y]);
        page.content.x_object(Name(name.as_bytes()));
        page.content.restore_state();
        page.images.push((name, image_id));
    }

    fn paragraph(&mut self, para: &Paragraph) {
        let doc = self.doc;
        if para.page_break_before && !self.fresh_page {
            self.new_page();
        }
        if !self.fresh_page {
            self.cursor_y -= para.space_before;
        }

        self.draw_image(para);

        let spacing = para.line_spacing.unwrap_or(doc.line_spacing);
        if para.runs.is_empty() {
            if para.image.is_none() {
                let height = EMPTY_LINE_SIZE * DEFAULT_LINE_RATIO * spacing;
                self.reserve(height);
                self.cursor_y -= height;
            }
            self.cursor_y -= para.space_after;
            return;
        }

        let left = doc.margin_left + para.indent_left;
        let first_left = if para.list_label.is_empty() {
            left - para.indent_hanging
        } else {
            left
        };
        let width = (doc.page_width - doc.margin_right - left).max(1.0);
        let first_width = (doc.page_width - doc.margin_right - first_left).max(1.0);

        let lines = self.wrap(para, first_width, width);
        let last = lines.len() - 1;

        for (i, line) in lines.iter().enumerate() {
            let mut height = 0.0f32;
            let mut size = 0.0f32;
            for piece in &line.pieces {
                let run = &para.runs[piece.run];
                height = height.max(self.line_height(run, spacing));
                size = size.max(run.font_size);
            }
            if line.pieces.is_empty() {
                height = self.line_height(&para.runs[0], spacing);
                size = para.runs[0].font_size;
            }

            self.reserve(height);
            let baseline = self.cursor_y - size * 0.8 * spacing.max(1.0);
            self.cursor_y -= height;

            let line_left = if i == 0 { first_left } else { left };
            let avail = if i == 0 { first_width } else { width };

            if i == 0 && !para.list_label.is_empty() {
                let label_x = left - para.indent_hanging.max(18.0);
                self.draw_text(&para.runs[0], &para.list_label, label_x, baseline);
            }

            let slack = (avail - line.width()).max(0.0);
            let justify = para.alignment == Alignment::Justify && i != last && !line.forced_break;
            let mut x = match para.alignment {
                Alignment::Center => line_left + slack / 2.0,
                Alignment::Right => line_left + slack,
                _ => line_left,
            };
            let spaces = line.inner_spaces();
            let word_spacing = if justify && spaces > 0 {
                slack / spaces as f32
            } else {
                0.0
            };
            if word_spacing > 0.0 {
                self.page().content.set_word_spacing(word_spacing);
            }

            // Adjacent pieces of the same run share one text object.
            let mut start = 0;
            while start < line.pieces.len() {
                let run_idx = line.pieces[start].run;
                let mut end = start;
                let mut text = String::new();
                let mut seg_width = 0.0;
                while end < line.pieces.len() && line.pieces[end].run == run_idx {
                    text.push_str(&line.pieces[end].text);
                    seg_width += line.pieces[end].width;
                    end += 1;
                }
                let run = &para.runs[run_idx];
                self.draw_text(run, &text, x, baseline);
                x += seg_width + word_spacing * text.matches(' ').count() as f32;
                start = end;
            }

            if word_spacing > 0.0 {
                self.page().content.set_word_spacing(0.0);
            }
        }

        self.cursor_y -= para.space_after;
    }

    fn finish(mut self) -> Vec<u8> {
        let catalog_id = Ref::new(1);
        let pages_id = Ref::new(2);

        let pages = std::mem::take(&mut self.pages);
        let mut page_ids = Vec::with_capacity(pages.len());
        let mut font_pairs: Vec<(String, Ref)> = self
            .fonts
            .values()
            .map(|f| (f.resource.clone(), f.id))
            .collect();
        font_pairs.sort();

        for page in pages {
            let page_id = self.alloc();
            let content_id = self.alloc();
            page_ids.push(page_id);

            self.pdf
                .stream(content_id, &deflate(&page.content.finish()))
                .filter(Filter::FlateDecode);

            let mut page_writer = self.pdf.page(page_id);
            page_writer
                .media_box(Rect::new(0.0, 0.0, self.doc.page_width, self.doc.page_height))
                .parent(pages_id)
                .contents(content_id);
            let mut resources = page_writer.resources();
            {
                let mut fonts = resources.fonts();
                for (name, font_ref) in &font_pairs {
                    fonts.pair(Name(name.as_bytes()), *font_ref);
                }
            }
            if !page.images.is_empty() {
                let mut x_objects = resources.x_objects();
                for (name, image_ref) in &page.images {
                    x_objects.pair(Name(name.as_bytes()), *image_ref);
                }
            }
        }

        self.pdf.catalog(catalog_id).pages(pages_id);
        self.pdf
            .pages(pages_id)
            .kids(page_ids.iter().copied())
            .count(page_ids.len() as i32);

        self.pdf.finish()
    }
}

pub fn render(doc: &Document, options: &ConvertOptions) -> Result<Vec<u8>, Error> {
    if !(doc.page_width > 0.0 && doc.page_height > 0.0) {
        return Err(Error::conversion(format!(
            "invalid page size {}x{}",
            doc.page_width, doc.page_height
        )));
    }
    let mut renderer = Renderer::new(doc, options);
    for para in &doc.paragraphs {
        renderer.paragraph(para);
    }
    log::debug!(
        "rendered {} paragraphs onto {} pages",
        doc.paragraphs.len(),
        renderer.pages.len()
    );
    if renderer.unencodable > 0 {
        log::warn!(
            "{} characters have no WinAnsi encoding and were left out of the PDF",
            renderer.unencodable
        );
    }
    Ok(renderer.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_keeps_whitespace_with_the_word() {
        assert_eq!(split_pieces("Hello  big world"), vec!["Hello  ", "big ", "world"]);
        assert_eq!(split_pieces(" lead"), vec![" ", "lead"]);
        assert_eq!(split_pieces("a\nb"), vec!["a", "\n", "b"]);
    }

    fn run(text: &str) -> Run {
        Run {
            text: text.into(),
            font_size: 10.0,
            font_name: "No Such Font Family 1234".into(),
            bold: false,
            italic: false,
            color: None,
        }
    }

    fn paragraph(text: &str) -> Paragraph {
        Paragraph {
            runs: vec![run(text)],
            space_before: 0.0,
            space_after: 0.0,
            alignment: Alignment::Left,
            indent_left: 0.0,
            indent_hanging: 0.0,
            list_label: String::new(),
            page_break_before: false,
            line_spacing: None,
            image: None,
        }
    }

    fn document(paragraphs: Vec<Paragraph>) -> Document {
        Document {
            page_width: 200.0,
            page_height: 100.0,
            margin_top: 10.0,
            margin_bottom: 10.0,
            margin_left: 10.0,
            margin_right: 10.0,
            line_spacing: 1.0,
            paragraphs,
        }
    }

    #[test]
    fn long_paragraph_wraps_within_width() {
        let doc = document(vec![]);
        let mut renderer = Renderer::new(&doc, &ConvertOptions::default());
        let para = paragraph("lorem ipsum dolor sit amet consectetur adipiscing elit sed do");
        let lines = renderer.wrap(&para, 100.0, 100.0);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(line.width() <= 100.0 + 1e-3);
        }
        let rejoined: String = lines
            .iter()
            .flat_map(|l| l.pieces.iter().map(|p| p.text.as_str()))
            .collect();
        assert_eq!(rejoined, para.runs[0].text);
    }

    #[test]
    fn overflowing_content_starts_new_pages() {
        let paragraphs = (0..20).map(|i| paragraph(&format!("line {i}"))).collect();
        let doc = document(paragraphs);
        let mut renderer = Renderer::new(&doc, &ConvertOptions::default());
        for para in &doc.paragraphs {
            renderer.paragraph(para);
        }
        assert!(renderer.pages.len() > 1);
    }

    #[test]
    fn page_break_before_forces_a_page() {
        let mut second = paragraph("second");
        second.page_break_before = true;
        let doc = document(vec![paragraph("first"), second]);
        let mut renderer = Renderer::new(&doc, &ConvertOptions::default());
        for para in &doc.paragraphs {
            renderer.paragraph(para);
        }
        assert_eq!(renderer.pages.len(), 2);
    }

    #[test]
    fn unencodable_characters_are_counted() {
        let doc = document(vec![paragraph("Привет мир"), paragraph("café €5")]);
        let mut renderer = Renderer::new(&doc, &ConvertOptions::default());
        for para in &doc.paragraphs {
            renderer.paragraph(para);
        }
        assert_eq!(renderer.unencodable, 9);
    }

    #[test]
    fn render_emits_a_pdf() {
        let doc = document(vec![paragraph("hello")]);
        let bytes = render(&doc, &ConvertOptions::default()).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
    }
}
