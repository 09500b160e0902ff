use clap::Parser;
use easy_convert::{
    Config, ConversionRequest, ConversionResult, ConvertOptions, JobRunner, PageSize, TargetFormat,
};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "easy-convert",
    version,
    about = "Convert DOCX to PDF, PDF to DOCX, and images to PDF"
)]
struct Args {
    /// Input files, or a single directory to convert in batch
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
    /// Target format (defaults to docx for PDF input, pdf otherwise)
    #[arg(short = 't', long = "to", value_enum)]
    to: Option<TargetFormat>,
    /// Output file (single input only)
    #[arg(short = 'o', long, value_name = "FILE")]
    output: Option<PathBuf>,
    /// Output directory (required for a directory input)
    #[arg(short = 'd', long, value_name = "DIR")]
    output_dir: Option<PathBuf>,
    /// Combine all image inputs into this one PDF
    #[arg(short = 'm', long, value_name = "FILE")]
    merge: Option<PathBuf>,
    /// A4, letter, or WxH in inches
    #[arg(short = 's', long, default_value = "A4", value_parser = PageSize::parse)]
    page_size: PageSize,
    /// Margin around image pages, in inches
    #[arg(long, default_value_t = 0.5, value_name = "INCHES")]
    margin: f32,
    /// Per-job timeout in seconds, 0 disables it
    #[arg(long, default_value_t = 300, value_name = "SECS")]
    timeout: u64,
    /// Do not convert PNG/JPEG inputs
    #[arg(long)]
    no_images: bool,
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {message}");
    std::process::exit(1);
}

fn report(result: &ConversionResult) -> bool {
    if result.success {
        println!(
            "Converted: {} -> {}",
            result.source_path.display(),
            result.output_path.display()
        );
    } else {
        eprintln!(
            "Error: {}",
            result.message.as_deref().unwrap_or("conversion failed")
        );
    }
    result.success
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let options = ConvertOptions::default()
        .with_page_size(args.page_size)
        .with_margin_inches(args.margin);
    let timeout = (args.timeout > 0).then(|| Duration::from_secs(args.timeout));
    let config = Config::default()
        .with_options(options)
        .with_timeout(timeout)
        .with_image_routes(!args.no_images);
    let runner = JobRunner::new(config);

    if let Some(merged) = &args.merge {
        let result = runner.run_merge(&args.inputs, merged);
        if !report(&result) {
            std::process::exit(1);
        }
        return;
    }

    if let [input] = args.inputs.as_slice()
        && input.is_dir()
    {
        let Some(output_dir) = &args.output_dir else {
            fail("--output-dir is required when converting a directory");
        };
        let target = args.to.unwrap_or(TargetFormat::Pdf);
        let results = match runner.run_batch(input, output_dir, target) {
            Ok(results) => results,
            Err(e) => fail(e),
        };
        if results.is_empty() {
            println!("No files in {} convert to {target}", input.display());
        }
        let failed = results.iter().filter(|r| !r.success).count();
        for result in &results {
            report(result);
        }
        if failed > 0 {
            std::process::exit(1);
        }
        return;
    }

    if args.output.is_some() && args.inputs.len() > 1 {
        fail("--output can only be used with a single input");
    }

    let mut ok = true;
    for input in &args.inputs {
        if !input.is_file() {
            eprintln!("Error: file not found: {}", input.display());
            ok = false;
            continue;
        }
        let result = match args.to {
            Some(target) => {
                let request = match &args.output {
                    Some(output) => ConversionRequest::new(input, target, output),
                    None => ConversionRequest::with_default_output(
                        input,
                        target,
                        args.output_dir.as_deref(),
                    ),
                };
                runner.run(&request)
            }
            None => runner.run_default_target(
                input,
                args.output.as_deref(),
                args.output_dir.as_deref(),
            ),
        };
        ok &= report(&result);
    }
    if !ok {
        std::process::exit(1);
    }
}
