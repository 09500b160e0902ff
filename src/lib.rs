mod config;
mod dispatch;
mod docx;
mod docx_writer;
mod error;
mod fonts;
mod format;
mod job;
mod model;
mod output;
mod pdf;
mod pdf_text;
mod raster;
mod routines;
mod winansi;

pub use config::{Config, ConvertOptions, PageSize};
pub use dispatch::{Dispatcher, RoutingTable};
pub use error::{Error, ErrorKind};
pub use format::{SupportedFormat, TargetFormat, detect};
pub use job::{ConversionRequest, ConversionResult, JobRunner, JobState};
pub use output::OutputLock;
pub use routines::{Converter, ImageToPdf, PdfToWord, WordToPdf};

use std::path::{Path, PathBuf};

fn run_with_defaults(input: &Path, target: TargetFormat, output: &Path) -> Result<(), Error> {
    JobRunner::new(Config::default()).try_run(&ConversionRequest::new(input, target, output))
}

pub fn convert_docx_to_pdf(input: &Path, output: &Path) -> Result<(), Error> {
    run_with_defaults(input, TargetFormat::Pdf, output)
}

pub fn convert_pdf_to_docx(input: &Path, output: &Path) -> Result<(), Error> {
    run_with_defaults(input, TargetFormat::Docx, output)
}

pub fn convert_image_to_pdf(input: &Path, output: &Path) -> Result<(), Error> {
    run_with_defaults(input, TargetFormat::Pdf, output)
}

/// One PDF page per input image; undecodable images are skipped.
///
/// Goes through the same output lock and overwrite check as
/// [`JobRunner::run_merge`].
pub fn merge_images_to_pdf(inputs: &[PathBuf], output: &Path) -> Result<(), Error> {
    JobRunner::new(Config::default()).try_merge(inputs, output)
}
