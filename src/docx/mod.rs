//! DOCX reader: WordprocessingML into the layout model.

mod body;
mod numbering;
mod package;
mod styles;
mod xml;

use std::io::{Read, Seek};
use std::path::Path;

use crate::error::Error;
use crate::model::Document;

use body::BodyReader;
use numbering::Numbering;
use package::Package;
use styles::{Styles, Theme};

/// Letter, 1in margins: what Word assumes when `w:sectPr` is silent.
const DEFAULT_PAGE: (f32, f32) = (612.0, 792.0);
const DEFAULT_MARGIN: f32 = 72.0;

pub fn parse(path: &Path) -> Result<Document, Error> {
    let file = std::fs::File::open(path)?;
    parse_archive(zip::ZipArchive::new(file)?)
}

pub fn parse_archive<R: Read + Seek>(zip: zip::ZipArchive<R>) -> Result<Document, Error> {
    let mut package = Package::new(zip);
    let main = package.main_document()?;
    let doc = roxmltree::Document::parse(&main)?;
    let body = xml::child(doc.root_element(), "body")
        .ok_or_else(|| Error::conversion("not a Word document: missing w:body"))?;

    let theme = Theme::load(&mut package);
    let styles = Styles::load(&mut package, &theme);
    let numbering = Numbering::load(&mut package);
    let rels = package.relationships();

    // The last section's properties apply to the whole document.
    let sect = xml::child(body, "sectPr");
    let page_size = sect.and_then(|s| xml::child(s, "pgSz"));
    let margins = sect.and_then(|s| xml::child(s, "pgMar"));
    let margin = |side| margins.and_then(|m| xml::points(m, side)).unwrap_or(DEFAULT_MARGIN);

    let line_spacing = styles.defaults.line_spacing.unwrap_or(1.0);
    let mut reader = BodyReader {
        package: &mut package,
        theme,
        styles,
        numbering,
        rels,
    };
    let paragraphs = reader.read(body);
    log::debug!("read {} paragraphs", paragraphs.len());

    Ok(Document {
        page_width: page_size
            .and_then(|p| xml::points(p, "w"))
            .unwrap_or(DEFAULT_PAGE.0),
        page_height: page_size
            .and_then(|p| xml::points(p, "h"))
            .unwrap_or(DEFAULT_PAGE.1),
        margin_top: margin("top"),
        margin_bottom: margin("bottom"),
        margin_left: margin("left"),
        margin_right: margin("right"),
        line_spacing,
        paragraphs,
    })
}

#[cfg(test)]
mod tests {
    use super::body::CELL_GAP;
    use super::xml::W;
    use super::*;
    use crate::model::Alignment;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    fn archive(parts: &[(&str, &str)]) -> zip::ZipArchive<Cursor<Vec<u8>>> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in parts {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(data.as_bytes()).unwrap();
        }
        let bytes = writer.finish().unwrap().into_inner();
        zip::ZipArchive::new(Cursor::new(bytes)).unwrap()
    }

    fn document(inner: &str) -> String {
        format!(
            r#"<w:document xmlns:w="{W}"><w:body>{inner}<w:sectPr><w:pgSz w:w="11906" w:h="16838"/><w:pgMar w:top="1440" w:bottom="1440" w:left="1800" w:right="1800"/></w:sectPr></w:body></w:document>"#
        )
    }

    fn read(inner: &str, extra: &[(&str, &str)]) -> Document {
        let main = document(inner);
        let mut parts = vec![("word/document.xml", main.as_str())];
        parts.extend_from_slice(extra);
        parse_archive(archive(&parts)).unwrap()
    }

    #[test]
    fn section_and_direct_formatting() {
        let doc = read(
            r#"<w:p><w:pPr><w:jc w:val="center"/></w:pPr><w:r><w:rPr><w:b/><w:sz w:val="28"/></w:rPr><w:t>Quarterly</w:t></w:r><w:r><w:t xml:space="preserve"> report</w:t></w:r></w:p>"#,
            &[],
        );
        assert_eq!(doc.page_width, 595.3);
        assert_eq!(doc.margin_left, 90.0);
        let para = &doc.paragraphs[0];
        assert_eq!(para.alignment, Alignment::Center);
        assert_eq!(para.text(), "Quarterly report");
        assert!(para.runs[0].bold);
        assert_eq!(para.runs[0].font_size, 14.0);
        assert!(!para.runs[1].bold);
        assert_eq!(para.runs[1].font_size, 12.0);
    }

    #[test]
    fn explicit_false_toggle_is_off() {
        let styles = format!(
            r#"<w:styles xmlns:w="{W}"><w:style w:type="paragraph" w:styleId="Strong"><w:rPr><w:b/></w:rPr></w:style></w:styles>"#
        );
        let doc = read(
            r#"<w:p><w:pPr><w:pStyle w:val="Strong"/></w:pPr><w:r><w:rPr><w:b w:val="0"/></w:rPr><w:t>plain</w:t></w:r><w:r><w:t>bold</w:t></w:r></w:p>"#,
            &[("word/styles.xml", &styles)],
        );
        assert!(!doc.paragraphs[0].runs[0].bold);
        assert!(doc.paragraphs[0].runs[1].bold);
    }

    #[test]
    fn styles_inherit_through_based_on() {
        let styles = format!(
            r#"<w:styles xmlns:w="{W}"><w:docDefaults><w:rPrDefault><w:rPr><w:rFonts w:ascii="Georgia"/><w:sz w:val="20"/></w:rPr></w:rPrDefault></w:docDefaults><w:style w:type="paragraph" w:styleId="Heading"><w:rPr><w:sz w:val="32"/><w:color w:val="1F3864"/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="Heading2"><w:basedOn w:val="Heading"/><w:pPr><w:jc w:val="right"/></w:pPr></w:style></w:styles>"#
        );
        let doc = read(
            r#"<w:p><w:pPr><w:pStyle w:val="Heading2"/></w:pPr><w:r><w:t>Outlook</w:t></w:r></w:p><w:p><w:r><w:t>body</w:t></w:r></w:p>"#,
            &[("word/styles.xml", &styles)],
        );
        let heading = &doc.paragraphs[0];
        assert_eq!(heading.alignment, Alignment::Right);
        assert_eq!(heading.runs[0].font_size, 16.0);
        assert_eq!(heading.runs[0].color, Some([0x1F, 0x38, 0x64]));
        assert_eq!(heading.runs[0].font_name, "Georgia");
        assert_eq!(doc.paragraphs[1].runs[0].font_size, 10.0);
    }

    #[test]
    fn tables_flatten_to_rows() {
        let doc = read(
            r#"<w:tbl><w:tr><w:tc><w:p><w:r><w:t>Name</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>Total</w:t></w:r></w:p></w:tc></w:tr><w:tr><w:tc><w:p><w:r><w:t>North</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>42</w:t></w:r></w:p></w:tc></w:tr></w:tbl>"#,
            &[],
        );
        assert_eq!(doc.paragraphs.len(), 2);
        assert_eq!(doc.paragraphs[0].text(), format!("Name{CELL_GAP}Total"));
        assert_eq!(doc.paragraphs[1].text(), format!("North{CELL_GAP}42"));
    }

    #[test]
    fn leading_page_break_moves_paragraph() {
        let doc = read(
            r#"<w:p><w:r><w:br w:type="page"/><w:t>Appendix</w:t></w:r></w:p><w:p><w:r><w:t>a</w:t><w:br/><w:t>b</w:t></w:r></w:p>"#,
            &[],
        );
        assert!(doc.paragraphs[0].page_break_before);
        assert_eq!(doc.paragraphs[0].text(), "Appendix");
        assert!(!doc.paragraphs[1].page_break_before);
        assert_eq!(doc.paragraphs[1].text(), "a\nb");
    }

    #[test]
    fn numbered_items_count_and_restart() {
        let numbering = format!(
            r#"<w:numbering xmlns:w="{W}"><w:abstractNum w:abstractNumId="0"><w:lvl w:ilvl="0"><w:numFmt w:val="decimal"/><w:lvlText w:val="%1."/><w:pPr><w:ind w:left="720" w:hanging="360"/></w:pPr></w:lvl><w:lvl w:ilvl="1"><w:numFmt w:val="lowerLetter"/><w:lvlText w:val="%2)"/></w:lvl></w:abstractNum><w:num w:numId="1"><w:abstractNumId w:val="0"/></w:num></w:numbering>"#
        );
        let item = |lvl: u8| {
            format!(
                r#"<w:p><w:pPr><w:numPr><w:ilvl w:val="{lvl}"/><w:numId w:val="1"/></w:numPr></w:pPr><w:r><w:t>item</w:t></w:r></w:p>"#
            )
        };
        let inner = [item(0), item(1), item(1), item(0), item(1)].concat();
        let doc = read(&inner, &[("word/numbering.xml", &numbering)]);
        let labels: Vec<_> = doc.paragraphs.iter().map(|p| p.list_label.as_str()).collect();
        assert_eq!(labels, ["1.", "1)", "2)", "2.", "1)"]);
        assert_eq!(doc.paragraphs[0].indent_left, 36.0);
        assert_eq!(doc.paragraphs[0].indent_hanging, 18.0);
    }

    #[test]
    fn missing_document_part_is_a_conversion_failure() {
        let err = parse_archive(archive(&[("readme.txt", "hi")])).err().unwrap();
        assert!(err.to_string().contains("word/document.xml"));
    }
}
