//! segpdf CLI - inspect segmented PDF pages

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;

use segpdf::{DecodeConfig, DecodeMode, DocumentParser, DocumentSession, TocEntry};

#[derive(Parser)]
#[command(name = "segpdf")]
#[command(author = "iyulab")]
#[command(version)]
#[command(about = "Segment PDF pages into cells, shapes and bitmaps", long_about = None)]
struct Cli {
    /// Decode configuration (JSON); missing keys take their defaults
    #[arg(long, global = true, value_name = "JSON", env = "SEGPDF_CONFIG")]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show document information
    Info {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Decode one page to JSON
    Page {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Page number (1-based)
        #[arg(value_name = "N")]
        page: usize,

        /// Engine output format
        #[arg(long, value_enum, default_value = "structured")]
        mode: Mode,

        /// Include per-stage timings
        #[arg(long)]
        timings: bool,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Print the table of contents
    Toc {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Decode every page to JSON files
    Dump {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output directory
        #[arg(short, long, value_name = "DIR")]
        output: PathBuf,

        /// Engine output format
        #[arg(long, value_enum, default_value = "structured")]
        mode: Mode,
    },

    /// Show version information
    Version,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Field-accessor records
    Structured,
    /// Tabular JSON records
    Serialized,
}

impl From<Mode> for DecodeMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Structured => DecodeMode::Structured,
            Mode::Serialized => DecodeMode::Serialized,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let result = load_config(cli.config.as_deref()).and_then(|config| match cli.command {
        Commands::Info { input } => cmd_info(&input),
        Commands::Page {
            input,
            page,
            mode,
            timings,
            output,
        } => cmd_page(&input, page, mode.into(), timings, output.as_deref(), &config),
        Commands::Toc { input } => cmd_toc(&input),
        Commands::Dump {
            input,
            output,
            mode,
        } => cmd_dump(&input, &output, mode.into(), &config),
        Commands::Version => {
            cmd_version();
            Ok(())
        }
    });

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<DecodeConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            log::info!("decode config from {}", path.display());
            Ok(DecodeConfig::from_json_file(path)?)
        }
        None => Ok(DecodeConfig::default()),
    }
}

fn open(parser: &DocumentParser, input: &Path) -> Result<DocumentSession, Box<dyn std::error::Error>> {
    Ok(parser.open(input)?)
}

fn cmd_info(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let format = segpdf::detect_format_from_path(input)?;
    let parser = DocumentParser::new();
    let mut session = open(&parser, input)?;
    let pages = session.number_of_pages()?;

    println!("{}", "Document Information".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    println!("{}: {}", "File".bold(), input.display());
    println!("{}: {}", "Format".bold(), format);
    println!("{}: {}", "Handle".bold(), session.handle());
    println!("{}: {}", "Pages".bold(), pages);

    if pages > 0 {
        let first = session.get_page(1, DecodeMode::Structured, &DecodeConfig::chars_only())?;
        let geometry = first.geometry();
        println!();
        println!("{}", "Page 1 Boxes".cyan().bold());
        println!("{}", "─".repeat(40).dimmed());
        println!("{}: {:?}", "Media".bold(), geometry.media_bbox.to_array());
        println!("{}: {:?}", "Crop".bold(), geometry.crop_bbox.to_array());
        println!("{}: {:?}", "Bleed".bold(), geometry.bleed_bbox.to_array());
        println!("{}: {:?}", "Trim".bold(), geometry.trim_bbox.to_array());
        println!("{}: {:?}", "Art".bold(), geometry.art_bbox.to_array());
        println!("{}: {}", "Rotation".bold(), geometry.angle);
    }

    if let Some(meta) = session.get_meta()? {
        println!();
        println!("{}", "Metadata".cyan().bold());
        println!("{}", "─".repeat(40).dimmed());
        for (key, value) in &meta.data {
            println!("{}: {}", key.bold(), value);
        }
    }

    if let Some(toc) = session.get_table_of_contents()? {
        println!();
        println!("{}: {}", "Bookmarks".bold(), toc.total_entries());
    }

    session.unload();
    Ok(())
}

fn cmd_page(
    input: &Path,
    page_no: usize,
    mode: DecodeMode,
    with_timings: bool,
    output: Option<&Path>,
    config: &DecodeConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let parser = DocumentParser::new();
    let mut session = open(&parser, input)?;

    let json = if with_timings {
        let (page, timings) = session.get_page_with_timings(page_no, mode, config)?;
        serde_json::to_string_pretty(&json!({ "page": page, "timings": timings }))?
    } else {
        session.get_page(page_no, mode, config)?.to_json(true)?
    };
    session.unload();

    if let Some(path) = output {
        fs::write(path, &json)?;
        println!("{} {}", "Saved to".green(), path.display());
    } else {
        println!("{}", json);
    }

    Ok(())
}

fn print_toc(entry: &TocEntry, depth: usize) {
    for child in &entry.children {
        let page = child
            .page
            .map(|p| format!(" (p. {})", p))
            .unwrap_or_default();
        println!("{}{}{}", "  ".repeat(depth), child.title, page.dimmed());
        print_toc(child, depth + 1);
    }
}

fn cmd_toc(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let parser = DocumentParser::new();
    let mut session = open(&parser, input)?;

    match session.get_table_of_contents()? {
        Some(toc) => print_toc(&toc, 0),
        None => println!("{}", "No table of contents".yellow()),
    }

    session.unload();
    Ok(())
}

fn cmd_dump(
    input: &Path,
    output: &Path,
    mode: DecodeMode,
    config: &DecodeConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    fs::create_dir_all(output)?;

    let parser = DocumentParser::new();
    let mut session = open(&parser, input)?;
    let total = session.number_of_pages()?;

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    for page in session.iterate_pages(mode, config)? {
        let (page_no, page) = page?;
        pb.set_message(format!("page {}", page_no));
        page.save(output.join(format!("page_{:04}.json", page_no)))?;
        pb.inc(1);
    }
    pb.finish_with_message("Done!");

    let evicted = session.unload_pages(1..total + 1)?;
    log::debug!("evicted {} pages", evicted);
    session.unload();

    println!(
        "\n{} {} pages written to {}",
        "Done!".green().bold(),
        total,
        output.display()
    );
    Ok(())
}

fn cmd_version() {
    println!("{} {}", "segpdf".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("Page-oriented PDF segmentation tool");
    println!();
    println!("Repository: {}", "https://github.com/iyulab/segpdf".dimmed());
    println!("License: MIT");
}
