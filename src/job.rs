use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;

use crate::config::Config;
use crate::dispatch::{Dispatcher, RoutingTable};
use crate::error::{Error, ErrorKind};
use crate::format::{self, SupportedFormat, TargetFormat};
use crate::output::{self, OutputLock};
use crate::routines::ImageToPdf;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Detecting,
    Dispatching,
    Converting,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }
}

/// One conversion to perform. Fixed once built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversionRequest {
    source_path: PathBuf,
    target_format: TargetFormat,
    output_path: PathBuf,
}

impl ConversionRequest {
    pub fn new(
        source_path: impl Into<PathBuf>,
        target_format: TargetFormat,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source_path: source_path.into(),
            target_format,
            output_path: output_path.into(),
        }
    }

    /// Output goes to `<output_dir>/<stem>.<ext>`, or next to the source
    /// when no directory is given.
    pub fn with_default_output(
        source_path: impl Into<PathBuf>,
        target_format: TargetFormat,
        output_dir: Option<&Path>,
    ) -> Self {
        let source_path = source_path.into();
        let mut name = source_path
            .file_stem()
            .unwrap_or(source_path.as_os_str())
            .to_os_string();
        name.push(".");
        name.push(target_format.extension());
        let dir = output_dir
            .map(Path::to_path_buf)
            .or_else(|| source_path.parent().map(Path::to_path_buf))
            .unwrap_or_default();
        let output_path = dir.join(name);
        Self {
            source_path,
            target_format,
            output_path,
        }
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn target_format(&self) -> TargetFormat {
        self.target_format
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }
}

/// Outcome of a job, handed back to the caller.
#[derive(Clone, Debug)]
pub struct ConversionResult {
    pub success: bool,
    /// For a merge, the first input image.
    pub source_path: PathBuf,
    pub output_path: PathBuf,
    pub error_kind: Option<ErrorKind>,
    pub message: Option<String>,
    pub state: JobState,
    /// Every state the job passed through, starting at `Pending`.
    pub history: Vec<JobState>,
}

struct Job {
    source: PathBuf,
    output: PathBuf,
    history: Vec<JobState>,
}

impl Job {
    fn new(source: &Path, output: &Path) -> Self {
        Self {
            source: source.to_path_buf(),
            output: output.to_path_buf(),
            history: vec![JobState::Pending],
        }
    }

    fn state(&self) -> JobState {
        self.history.last().copied().unwrap_or(JobState::Pending)
    }

    fn advance(&mut self, next: JobState) {
        log::debug!(
            "job {}: {:?} -> {:?}",
            self.output.display(),
            self.state(),
            next
        );
        self.history.push(next);
    }

    fn finish(mut self, outcome: Result<(), Error>) -> ConversionResult {
        match outcome {
            Ok(()) => {
                self.advance(JobState::Succeeded);
                ConversionResult {
                    success: true,
                    source_path: self.source,
                    output_path: self.output,
                    error_kind: None,
                    message: None,
                    state: JobState::Succeeded,
                    history: self.history,
                }
            }
            Err(e) => {
                log::debug!("job {} failed in {:?}: {e}", self.output.display(), self.state());
                self.advance(JobState::Failed);
                ConversionResult {
                    success: false,
                    source_path: self.source,
                    output_path: self.output,
                    error_kind: Some(e.kind()),
                    message: Some(e.to_string()),
                    state: JobState::Failed,
                    history: self.history,
                }
            }
        }
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn first_or_empty(paths: &[PathBuf]) -> &Path {
    paths.first().map(PathBuf::as_path).unwrap_or(Path::new(""))
}

/// Drives requests through detection, routing and conversion.
#[derive(Debug)]
pub struct JobRunner {
    config: Config,
    dispatcher: Dispatcher,
}

impl JobRunner {
    pub fn new(config: Config) -> Self {
        let dispatcher = Dispatcher::new(RoutingTable::standard(&config));
        Self { config, dispatcher }
    }

    pub fn with_dispatcher(config: Config, dispatcher: Dispatcher) -> Self {
        Self { config, dispatcher }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn run(&self, request: &ConversionRequest) -> ConversionResult {
        let mut job = Job::new(request.source_path(), request.output_path());
        let outcome = self.execute(&mut job, request);
        job.finish(outcome)
    }

    /// [`JobRunner::run`] for callers that want the error itself.
    pub(crate) fn try_run(&self, request: &ConversionRequest) -> Result<(), Error> {
        let mut job = Job::new(request.source_path(), request.output_path());
        self.execute(&mut job, request)
    }

    /// Convert `source` to the default target for its detected format: DOCX
    /// for PDF input, PDF for everything else.
    ///
    /// The output is `output` when given, otherwise `<stem>.<ext>` in
    /// `output_dir` or next to the source.
    pub fn run_default_target(
        &self,
        source: &Path,
        output: Option<&Path>,
        output_dir: Option<&Path>,
    ) -> ConversionResult {
        let mut job = Job::new(source, output.unwrap_or(Path::new("")));
        let outcome = self.execute_default_target(&mut job, source, output, output_dir);
        job.finish(outcome)
    }

    fn execute_default_target(
        &self,
        job: &mut Job,
        source: &Path,
        output: Option<&Path>,
        output_dir: Option<&Path>,
    ) -> Result<(), Error> {
        job.advance(JobState::Detecting);
        let format = format::detect(source)?;
        let target = TargetFormat::default_for(format);
        log::debug!("{} detected as {format}, converting to {target}", source.display());

        let request = match output {
            Some(output) => ConversionRequest::new(source, target, output),
            None => ConversionRequest::with_default_output(source, target, output_dir),
        };
        job.output = request.output_path().to_path_buf();
        self.convert_detected(job, &request, format)
    }

    fn execute(&self, job: &mut Job, request: &ConversionRequest) -> Result<(), Error> {
        job.advance(JobState::Detecting);
        let format = format::detect(request.source_path())?;
        log::debug!("{} detected as {format}", request.source_path().display());
        self.convert_detected(job, request, format)
    }

    fn convert_detected(
        &self,
        job: &mut Job,
        request: &ConversionRequest,
        format: SupportedFormat,
    ) -> Result<(), Error> {
        let source = request.source_path();
        let output = request.output_path();

        job.advance(JobState::Dispatching);
        let converter = self.dispatcher.route(format, request.target_format())?;
        if same_file(source, output) {
            return Err(Error::output(output, "output would overwrite the source"));
        }

        job.advance(JobState::Converting);
        let _lock = OutputLock::acquire(output)?;
        log::info!(
            "converting {} -> {} ({})",
            source.display(),
            output.display(),
            converter.name()
        );
        let source = source.to_path_buf();
        let options = self.config.options.clone();
        let bytes = self.bounded(move || converter.render(&source, &options))?;
        output::write_atomic(output, &bytes)
    }

    /// Run `work` on a worker thread, giving up after the configured timeout.
    /// A worker that outlives the timeout keeps running but its result is dropped.
    fn bounded<F>(&self, work: F) -> Result<Vec<u8>, Error>
    where
        F: FnOnce() -> Result<Vec<u8>, Error> + Send + 'static,
    {
        let Some(limit) = self.config.timeout else {
            return work();
        };
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("easy-convert-worker".into())
            .spawn(move || {
                let _ = tx.send(work());
            })
            .map_err(|e| Error::conversion(format!("cannot start worker: {e}")))?;

        match rx.recv_timeout(limit) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                log::warn!("conversion exceeded {}s, abandoning it", limit.as_secs_f32());
                Err(Error::Timeout(limit))
            }
            Err(RecvTimeoutError::Disconnected) => {
                Err(Error::conversion("conversion worker panicked"))
            }
        }
    }

    /// Convert every routable file directly inside `input_dir`.
    ///
    /// Files that cannot be detected or have no route to `target` are
    /// skipped and get no result.
    pub fn run_batch(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        target: TargetFormat,
    ) -> Result<Vec<ConversionResult>, Error> {
        let entries = std::fs::read_dir(input_dir).map_err(|e| {
            Error::conversion(format!("cannot read directory {}: {e}", input_dir.display()))
        })?;
        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .collect();
        files.sort();

        std::fs::create_dir_all(output_dir).map_err(|e| Error::output(output_dir, e))?;

        let mut results = Vec::new();
        for path in files {
            match format::detect(&path) {
                Ok(fmt) if self.dispatcher.supports(fmt, target) => {
                    let request =
                        ConversionRequest::with_default_output(&path, target, Some(output_dir));
                    results.push(self.run(&request));
                }
                Ok(fmt) => log::info!("skipping {}: no route from {fmt} to {target}", path.display()),
                Err(e) => log::info!("skipping {}: {e}", path.display()),
            }
        }
        Ok(results)
    }

    /// Combine `images` into a single PDF at `output`, one page per image.
    pub fn run_merge(&self, images: &[PathBuf], output: &Path) -> ConversionResult {
        let mut job = Job::new(first_or_empty(images), output);
        let outcome = self.execute_merge(&mut job, images, output);
        job.finish(outcome)
    }

    /// [`JobRunner::run_merge`] for callers that want the error itself.
    pub(crate) fn try_merge(&self, images: &[PathBuf], output: &Path) -> Result<(), Error> {
        let mut job = Job::new(first_or_empty(images), output);
        self.execute_merge(&mut job, images, output)
    }

    fn execute_merge(&self, job: &mut Job, images: &[PathBuf], output: &Path) -> Result<(), Error> {
        job.advance(JobState::Detecting);
        let mut sources = Vec::with_capacity(images.len());
        let mut first_format = None;
        for path in images {
            match format::detect(path) {
                Ok(fmt) if fmt.is_image() => {
                    first_format.get_or_insert(fmt);
                    sources.push(path.clone());
                }
                Ok(fmt) => log::warn!("skipping {}: {fmt} is not an image", path.display()),
                Err(e) => log::warn!("skipping {}: {e}", path.display()),
            }
        }
        let Some(format) = first_format else {
            return Err(Error::conversion("no PNG or JPEG inputs to merge"));
        };

        job.advance(JobState::Dispatching);
        self.dispatcher.route(format, TargetFormat::Pdf)?;
        if sources.iter().any(|s| same_file(s, output)) {
            return Err(Error::output(output, "output would overwrite an input"));
        }

        job.advance(JobState::Converting);
        let _lock = OutputLock::acquire(output)?;
        log::info!("merging {} images -> {}", sources.len(), output.display());
        let options = self.config.options.clone();
        let bytes = self.bounded(move || ImageToPdf.render_many(&sources, &options))?;
        output::write_atomic(output, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_output_replaces_extension() {
        let req = ConversionRequest::with_default_output("in/report.docx", TargetFormat::Pdf, None);
        assert_eq!(req.output_path(), Path::new("in/report.pdf"));

        let req = ConversionRequest::with_default_output(
            "in/scan.pdf",
            TargetFormat::Docx,
            Some(Path::new("out")),
        );
        assert_eq!(req.output_path(), Path::new("out/scan.docx"));
    }

    #[test]
    fn missing_source_fails_during_detection() {
        let dir = tempfile::tempdir().unwrap();
        let runner = JobRunner::new(Config::default());
        let result = runner.run(&ConversionRequest::new(
            dir.path().join("absent.docx"),
            TargetFormat::Pdf,
            dir.path().join("absent.pdf"),
        ));
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ErrorKind::ConversionFailed));
        assert_eq!(
            result.history,
            [JobState::Pending, JobState::Detecting, JobState::Failed]
        );
    }

    #[test]
    fn legacy_doc_has_no_route() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("old.doc");
        std::fs::write(&src, [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1, 0, 0]).unwrap();
        let runner = JobRunner::new(Config::default());
        let result = runner.run(&ConversionRequest::with_default_output(&src, TargetFormat::Pdf, None));
        assert_eq!(result.error_kind, Some(ErrorKind::NoRouteAvailable));
        assert_eq!(result.history.last(), Some(&JobState::Failed));
        assert!(!dir.path().join("old.pdf").exists());
    }

    #[test]
    fn output_equal_to_source_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("loop.png");
        image::RgbImage::new(2, 2).save(&src).unwrap();
        let before = std::fs::read(&src).unwrap();

        let runner = JobRunner::new(Config::default());
        let result = runner.run(&ConversionRequest::new(&src, TargetFormat::Pdf, &src));
        assert_eq!(result.error_kind, Some(ErrorKind::OutputWriteError));
        assert_eq!(std::fs::read(&src).unwrap(), before);
    }

    #[test]
    fn default_target_follows_the_detected_format() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("scan.png");
        image::RgbImage::new(3, 2).save(&src).unwrap();

        let runner = JobRunner::new(Config::default());
        let result = runner.run_default_target(&src, None, None);
        assert!(result.success, "{:?}", result.message);
        assert_eq!(result.output_path, dir.path().join("scan.pdf"));
        assert_eq!(
            result.history,
            [
                JobState::Pending,
                JobState::Detecting,
                JobState::Dispatching,
                JobState::Converting,
                JobState::Succeeded,
            ]
        );
    }

    #[test]
    fn default_target_reports_undetectable_sources() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("notes.txt");
        std::fs::write(&src, b"plain text").unwrap();

        let runner = JobRunner::new(Config::default());
        let result = runner.run_default_target(&src, None, Some(dir.path()));
        assert_eq!(result.error_kind, Some(ErrorKind::UnsupportedFormat));
        assert_eq!(result.history.last(), Some(&JobState::Failed));
    }

    #[test]
    fn merge_of_non_images_fails_conversion() {
        let dir = tempfile::tempdir().unwrap();
        let notes = dir.path().join("notes.txt");
        let old = dir.path().join("old.doc");
        std::fs::write(&notes, b"plain text").unwrap();
        std::fs::write(&old, [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1, 0, 0]).unwrap();
        let out = dir.path().join("album.pdf");

        let runner = JobRunner::new(Config::default());
        let result = runner.run_merge(&[notes, old], &out);
        assert_eq!(result.error_kind, Some(ErrorKind::ConversionFailed));
        assert!(!out.exists());
    }

    #[test]
    fn bounded_without_timeout_runs_inline() {
        let runner = JobRunner::new(Config::default().with_timeout(None));
        assert_eq!(runner.bounded(|| Ok(vec![1, 2, 3])).unwrap(), [1, 2, 3]);
    }

    #[test]
    fn terminal_states() {
        assert!(JobState::Succeeded.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(!JobState::Converting.is_terminal());
    }
}
