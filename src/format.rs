use std::fmt;
use std::io::Read;
use std::path::Path;

use crate::error::Error;

/// Formats the detector can classify an input file as.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SupportedFormat {
    Docx,
    Doc,
    Pdf,
    Png,
    Jpeg,
}

/// Formats a conversion can produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum TargetFormat {
    Pdf,
    Docx,
}

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const CFB_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const PDF_MAGIC: &[u8] = b"%PDF-";
const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];

impl SupportedFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "docx" => Some(Self::Docx),
            "doc" => Some(Self::Doc),
            "pdf" => Some(Self::Pdf),
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            _ => None,
        }
    }

    fn signature(self) -> &'static [u8] {
        match self {
            Self::Docx => ZIP_MAGIC,
            Self::Doc => CFB_MAGIC,
            Self::Pdf => PDF_MAGIC,
            Self::Png => PNG_MAGIC,
            Self::Jpeg => JPEG_MAGIC,
        }
    }

    fn from_signature(header: &[u8]) -> Option<Self> {
        [Self::Docx, Self::Doc, Self::Pdf, Self::Png, Self::Jpeg]
            .into_iter()
            .find(|f| header.starts_with(f.signature()))
    }

    pub fn is_image(self) -> bool {
        matches!(self, Self::Png | Self::Jpeg)
    }
}

impl fmt::Display for SupportedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Docx => "DOCX",
            Self::Doc => "DOC",
            Self::Pdf => "PDF",
            Self::Png => "PNG",
            Self::Jpeg => "JPEG",
        })
    }
}

impl TargetFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
        }
    }

    /// Default target for a source: PDFs become Word documents, everything else becomes PDF.
    pub fn default_for(source: SupportedFormat) -> Self {
        match source {
            SupportedFormat::Pdf => Self::Docx,
            _ => Self::Pdf,
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pdf => "PDF",
            Self::Docx => "DOCX",
        })
    }
}

fn read_header(path: &Path) -> Result<Vec<u8>, Error> {
    let file = std::fs::File::open(path)
        .map_err(|e| Error::conversion(format!("cannot read {}: {e}", path.display())))?;
    let mut header = Vec::with_capacity(8);
    file.take(8).read_to_end(&mut header)?;
    Ok(header)
}

/// Classify `path` by extension, confirmed against the file's magic bytes.
pub fn detect(path: &Path) -> Result<SupportedFormat, Error> {
    let header = read_header(path)?;
    let sniffed = SupportedFormat::from_signature(&header);

    let by_extension = path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(SupportedFormat::from_extension);

    match (by_extension, sniffed) {
        (Some(ext), Some(sig)) if ext == sig => Ok(ext),
        (Some(ext), _) => Err(Error::UnsupportedFormat(format!(
            "{} has a .{} extension but its content is not {ext}",
            path.display(),
            path.extension().and_then(|e| e.to_str()).unwrap_or_default(),
        ))),
        (None, Some(sig)) => Ok(sig),
        (None, None) => Err(Error::UnsupportedFormat(format!(
            "{} is not a recognised document or image",
            path.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn write(dir: &Path, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn extension_lookup_is_case_insensitive() {
        assert_eq!(SupportedFormat::from_extension("DOCX"), Some(SupportedFormat::Docx));
        assert_eq!(SupportedFormat::from_extension("jpg"), Some(SupportedFormat::Jpeg));
        assert_eq!(SupportedFormat::from_extension("JPEG"), Some(SupportedFormat::Jpeg));
        assert_eq!(SupportedFormat::from_extension("txt"), None);
    }

    #[test]
    fn detects_each_format() {
        let dir = tempfile::tempdir().unwrap();
        let cases: [(&str, &[u8], SupportedFormat); 5] = [
            ("a.docx", b"PK\x03\x04rest", SupportedFormat::Docx),
            ("a.doc", CFB_MAGIC, SupportedFormat::Doc),
            ("a.pdf", b"%PDF-1.7\n", SupportedFormat::Pdf),
            ("a.png", PNG_MAGIC, SupportedFormat::Png),
            ("a.jpeg", &[0xFF, 0xD8, 0xFF, 0xE0], SupportedFormat::Jpeg),
        ];
        for (name, bytes, expected) in cases {
            let path = write(dir.path(), name, bytes);
            assert_eq!(detect(&path).unwrap(), expected, "{name}");
        }
    }

    #[test]
    fn signature_mismatch_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "fake.pdf", b"just some text");
        let err = detect(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
    }

    #[test]
    fn no_extension_falls_back_to_signature() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "scan", PNG_MAGIC);
        assert_eq!(detect(&path).unwrap(), SupportedFormat::Png);

        let path = write(dir.path(), "notes.txt", b"hello");
        assert_eq!(detect(&path).unwrap_err().kind(), ErrorKind::UnsupportedFormat);
    }

    #[test]
    fn missing_file_fails_conversion() {
        let dir = tempfile::tempdir().unwrap();
        let err = detect(&dir.path().join("absent.docx")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConversionFailed);
    }

    #[test]
    fn default_targets() {
        assert_eq!(TargetFormat::default_for(SupportedFormat::Pdf), TargetFormat::Docx);
        assert_eq!(TargetFormat::default_for(SupportedFormat::Docx), TargetFormat::Pdf);
        assert_eq!(TargetFormat::default_for(SupportedFormat::Png), TargetFormat::Pdf);
    }
}
