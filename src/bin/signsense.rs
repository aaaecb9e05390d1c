use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use signsense::{
    AnalysisReport, AssetManifest, Extractors, Locale, ReportEngine, build_analysis_prompt,
    inspect_pdf_path, parse_analysis_response,
};

#[derive(Parser, Debug)]
#[command(name = "signsense", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,

    /// Raise log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render an analysis JSON file into the two-page PDF report.
    Render(RenderArgs),
    /// Print the plain text extracted from a .pdf, .docx or .txt file.
    Extract(InputArgs),
    /// Print the analysis prompt built from a contract file.
    Prompt(InputArgs),
    /// Print page count, version and title of a PDF.
    Inspect(InputArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Analysis JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Input is raw model output; the JSON object is located inside it.
    #[arg(long, default_value_t = false)]
    raw: bool,

    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Output file name; sanitized and forced to `.pdf`.
    #[arg(long, default_value = "signsense-report")]
    filename: String,

    /// Language tag for labels (en, es, fr, de).
    #[arg(long, default_value = "en")]
    locale: String,

    /// Asset manifest JSON (icons and display font).
    #[arg(long)]
    assets: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    no_compress: bool,
}

#[derive(Parser, Debug)]
struct InputArgs {
    #[arg(long = "in")]
    in_path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Extract(args) => cmd_extract(args),
        Command::Prompt(args) => cmd_prompt(args),
        Command::Inspect(args) => cmd_inspect(args),
    }
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&args.in_path)
        .with_context(|| format!("read analysis '{}'", args.in_path.display()))?;
    let report = if args.raw {
        parse_analysis_response(&raw)
    } else {
        AnalysisReport::from_json_str(&raw)
    }
    .with_context(|| format!("parse analysis '{}'", args.in_path.display()))?;

    let mut builder = ReportEngine::builder()
        .locale(Locale::from_tag(&args.locale))
        .compress(!args.no_compress);
    if let Some(path) = &args.assets {
        let manifest = AssetManifest::from_path(path)
            .with_context(|| format!("load asset manifest '{}'", path.display()))?;
        builder = builder.assets(manifest);
    }
    let engine = builder.build()?;

    let rendered = engine
        .render(&report, &args.filename, None)
        .context("render report")?;
    for degradation in &rendered.degradations {
        eprintln!(
            "warning: {} {} skipped: {}",
            degradation.kind.as_str(),
            degradation.asset,
            degradation.message
        );
    }
    let path = rendered
        .save(&args.out_dir)
        .with_context(|| format!("write report into '{}'", args.out_dir.display()))?;
    eprintln!(
        "wrote {} ({} bytes, {:.1} ms)",
        path.display(),
        rendered.bytes.len(),
        rendered.metrics.total_render_ms
    );
    Ok(())
}

fn cmd_extract(args: InputArgs) -> anyhow::Result<()> {
    let text = Extractors::default()
        .extract_path(&args.in_path)
        .with_context(|| format!("extract text from '{}'", args.in_path.display()))?;
    println!("{text}");
    Ok(())
}

fn cmd_prompt(args: InputArgs) -> anyhow::Result<()> {
    let text = Extractors::default()
        .extract_path(&args.in_path)
        .with_context(|| format!("extract text from '{}'", args.in_path.display()))?;
    println!("{}", build_analysis_prompt(&text));
    Ok(())
}

fn cmd_inspect(args: InputArgs) -> anyhow::Result<()> {
    let report = inspect_pdf_path(&args.in_path)
        .with_context(|| format!("inspect '{}'", args.in_path.display()))?;
    println!("pages: {}", report.page_count);
    println!("version: {}", report.pdf_version);
    println!("encrypted: {}", report.encrypted);
    println!("bytes: {}", report.file_size_bytes);
    if let Some(title) = report.title {
        println!("title: {title}");
    }
    Ok(())
}
