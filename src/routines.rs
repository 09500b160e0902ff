use std::path::{Path, PathBuf};

use crate::config::ConvertOptions;
use crate::docx_writer::{self, DocxParagraph};
use crate::error::Error;
use crate::raster::{self, RasterImage};
use crate::{docx, output, pdf, pdf_text};

/// A single (source format, target format) conversion.
///
/// Implementations only produce bytes; placing them at the output path is
/// shared by every routine through [`Converter::convert`].
pub trait Converter: Send + Sync {
    fn name(&self) -> &'static str;

    fn render(&self, source: &Path, options: &ConvertOptions) -> Result<Vec<u8>, Error>;

    fn convert(&self, source: &Path, output: &Path, options: &ConvertOptions) -> Result<(), Error> {
        let bytes = self.render(source, options)?;
        output::write_atomic(output, &bytes)
    }
}

/// DOCX → PDF through the document model and the paginating renderer.
#[derive(Debug, Default, Clone, Copy)]
pub struct WordToPdf;

impl Converter for WordToPdf {
    fn name(&self) -> &'static str {
        "word-to-pdf"
    }

    fn render(&self, source: &Path, options: &ConvertOptions) -> Result<Vec<u8>, Error> {
        let doc = docx::parse(source)?;
        pdf::render(&doc, options)
    }
}

/// PDF → DOCX. Only text survives; layout is reduced to paragraphs.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfToWord;

impl Converter for PdfToWord {
    fn name(&self) -> &'static str {
        "pdf-to-word"
    }

    fn render(&self, source: &Path, _options: &ConvertOptions) -> Result<Vec<u8>, Error> {
        let doc = lopdf::Document::load(source)?;
        if doc.is_encrypted() {
            return Err(Error::conversion("PDF is encrypted"));
        }

        let pages = pdf_text::extract_lines(&doc)?;
        let mut paragraphs = Vec::new();
        for (index, lines) in pages.iter().enumerate() {
            let page_paragraphs = pdf_text::paragraphs(lines);
            if page_paragraphs.is_empty() {
                log::debug!("page {}: no text recovered", index + 1);
            }
            for (i, para) in page_paragraphs.into_iter().enumerate() {
                paragraphs.push(DocxParagraph {
                    text: para.text,
                    font_size: (para.font_size > 0.0).then_some(para.font_size),
                    page_break_before: index > 0 && i == 0,
                });
            }
        }
        log::debug!(
            "recovered {} paragraphs from {} pages",
            paragraphs.len(),
            pages.len()
        );

        docx_writer::write(&paragraphs, pdf_text::first_page_size(&doc))
    }
}

/// PNG/JPEG → PDF, one page per image.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageToPdf;

impl ImageToPdf {
    /// Combine several images into one PDF. Images that fail to decode are
    /// skipped; at least one must succeed.
    pub fn render_many(&self, sources: &[PathBuf], options: &ConvertOptions) -> Result<Vec<u8>, Error> {
        let mut images = Vec::with_capacity(sources.len());
        for source in sources {
            match RasterImage::open(source) {
                Ok(img) => images.push(img),
                Err(e) => log::warn!("skipping {}: {e}", source.display()),
            }
        }
        if images.is_empty() {
            return Err(Error::conversion("no valid images to merge"));
        }
        Ok(raster::images_to_pdf(&images, options.page_size, options.margin))
    }
}

impl Converter for ImageToPdf {
    fn name(&self) -> &'static str {
        "image-to-pdf"
    }

    fn render(&self, source: &Path, options: &ConvertOptions) -> Result<Vec<u8>, Error> {
        let img = RasterImage::open(source)?;
        Ok(raster::images_to_pdf(&[img], options.page_size, options.margin))
    }
}
