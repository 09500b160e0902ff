use std::io::{Cursor, Write};

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use zip::write::SimpleFileOptions;

use crate::error::Error;

const WML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

/// A paragraph to be written into `word/document.xml`.
#[derive(Debug, Clone, PartialEq)]
pub struct DocxParagraph {
    pub text: String,
    /// Points; `None` leaves the size to the document default.
    pub font_size: Option<f32>,
    pub page_break_before: bool,
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), Error> {
    writer
        .write_event(event)
        .map_err(|e| Error::conversion(format!("XML write error: {e}")))
}

fn start(writer: &mut Writer<Vec<u8>>, tag: BytesStart<'_>) -> Result<(), Error> {
    emit(writer, Event::Start(tag))
}

fn end(writer: &mut Writer<Vec<u8>>, name: &str) -> Result<(), Error> {
    emit(writer, Event::End(BytesEnd::new(name)))
}

fn empty(writer: &mut Writer<Vec<u8>>, tag: BytesStart<'_>) -> Result<(), Error> {
    emit(writer, Event::Empty(tag))
}

fn twips(points: f32) -> String {
    ((points * 20.0).round() as i64).to_string()
}

/// XML 1.0 admits no C0 controls besides tab, newline and carriage return.
fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r') || (c >= ' ' && !matches!(c, '\u{FFFE}' | '\u{FFFF}'))
}

fn write_paragraph(writer: &mut Writer<Vec<u8>>, para: &DocxParagraph) -> Result<(), Error> {
    let text: String = para.text.chars().filter(|c| is_xml_char(*c)).collect();
    if text.len() != para.text.len() {
        log::debug!("dropped characters XML cannot carry from {:?}", para.text);
    }

    start(writer, BytesStart::new("w:p"))?;
    if para.page_break_before {
        start(writer, BytesStart::new("w:pPr"))?;
        empty(writer, BytesStart::new("w:pageBreakBefore"))?;
        end(writer, "w:pPr")?;
    }
    if !text.is_empty() {
        start(writer, BytesStart::new("w:r"))?;
        if let Some(size) = para.font_size.filter(|s| *s > 0.0) {
            let half_points = ((size * 2.0).round() as i64).to_string();
            start(writer, BytesStart::new("w:rPr"))?;
            empty(
                writer,
                BytesStart::new("w:sz").with_attributes([("w:val", half_points.as_str())]),
            )?;
            end(writer, "w:rPr")?;
        }
        start(
            writer,
            BytesStart::new("w:t").with_attributes([("xml:space", "preserve")]),
        )?;
        emit(writer, Event::Text(BytesText::new(&text)))?;
        end(writer, "w:t")?;
        end(writer, "w:r")?;
    }
    end(writer, "w:p")
}

fn document_xml(paragraphs: &[DocxParagraph], page_size: Option<(f32, f32)>) -> Result<Vec<u8>, Error> {
    let mut writer = Writer::new(Vec::new());
    emit(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))),
    )?;
    start(
        &mut writer,
        BytesStart::new("w:document").with_attributes([("xmlns:w", WML_NS)]),
    )?;
    start(&mut writer, BytesStart::new("w:body"))?;

    for para in paragraphs {
        write_paragraph(&mut writer, para)?;
    }

    let (width, height) = page_size.unwrap_or((612.0, 792.0));
    let (width, height) = (twips(width), twips(height));
    start(&mut writer, BytesStart::new("w:sectPr"))?;
    empty(
        &mut writer,
        BytesStart::new("w:pgSz").with_attributes([("w:w", width.as_str()), ("w:h", height.as_str())]),
    )?;
    empty(
        &mut writer,
        BytesStart::new("w:pgMar").with_attributes([
            ("w:top", "1440"),
            ("w:right", "1440"),
            ("w:bottom", "1440"),
            ("w:left", "1440"),
        ]),
    )?;
    end(&mut writer, "w:sectPr")?;

    end(&mut writer, "w:body")?;
    end(&mut writer, "w:document")?;
    Ok(writer.into_inner())
}

/// Package paragraphs as a minimal WordprocessingML document.
pub fn write(paragraphs: &[DocxParagraph], page_size: Option<(f32, f32)>) -> Result<Vec<u8>, Error> {
    let document = document_xml(paragraphs, page_size)?;

    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, data) in [
        ("[Content_Types].xml", CONTENT_TYPES.as_bytes()),
        ("_rels/.rels", PACKAGE_RELS.as_bytes()),
        ("word/document.xml", document.as_slice()),
    ] {
        zip.start_file(name, options)?;
        zip.write_all(data)?;
    }
    Ok(zip.finish()?.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn para(text: &str) -> DocxParagraph {
        DocxParagraph {
            text: text.into(),
            font_size: None,
            page_break_before: false,
        }
    }

    #[test]
    fn text_is_escaped() {
        let xml = document_xml(&[para("Tom & Jerry <3")], None).unwrap();
        let xml = String::from_utf8(xml).unwrap();
        assert!(xml.contains("Tom &amp; Jerry &lt;3"));
        assert!(roxmltree::Document::parse(&xml).is_ok());
    }

    #[test]
    fn control_characters_are_dropped() {
        let xml = document_xml(&[para("Hello\u{1}World\u{1f}\tend")], None).unwrap();
        let xml = String::from_utf8(xml).unwrap();
        assert!(xml.contains("HelloWorld\tend"));
        assert!(roxmltree::Document::parse(&xml).is_ok());
    }

    #[test]
    fn page_break_and_size_are_written() {
        let mut p = para("Chapter 2");
        p.page_break_before = true;
        p.font_size = Some(18.0);
        let xml = String::from_utf8(document_xml(&[p], Some((595.0, 842.0))).unwrap()).unwrap();
        assert!(xml.contains("<w:pageBreakBefore/>"));
        assert!(xml.contains(r#"<w:sz w:val="36"/>"#));
        assert!(xml.contains(r#"w:w="11900""#));
    }

    #[test]
    fn package_reads_back() {
        let bytes = write(&[para("one"), para("two")], None).unwrap();
        let zip = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let doc = crate::docx::parse_archive(zip).unwrap();
        assert_eq!(doc.text(), "one\ntwo");
    }
}
