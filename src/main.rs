//! CLI entry point for `mhtml-inline`.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{CommandFactory, Parser, Subcommand};
use humansize::{format_size, BINARY};

use mhtml_inline::catalog;
use mhtml_inline::config::{self as app_config, Config};
use mhtml_inline::model::Archive;
use mhtml_inline::response::{self, Outcome, Rendered};
use mhtml_inline::rewrite::InlineOptions;

#[derive(Parser)]
#[command(
    name = "mhtml-inline",
    version,
    about = "Turn MHTML web-page archives into standalone HTML"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file (overrides the standard location)
    #[arg(long, value_name = "FILE", env = app_config::CONFIG_ENV, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode an archive and write standalone HTML
    Render {
        /// Archive file, or an entry name when --dir is given
        file: String,
        /// Write the body here instead of stdout
        #[arg(short, long, value_name = "OUT")]
        output: Option<PathBuf>,
        /// Resolve FILE as an entry of this catalog directory
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,
        /// Base URL for relative resource references (repeatable)
        #[arg(long = "hint", value_name = "URL")]
        hints: Vec<String>,
        /// Fail instead of writing the raw archive when it cannot be decoded
        #[arg(long)]
        no_fallback: bool,
        /// Print response headers to stderr
        #[arg(long)]
        show_headers: bool,
    },
    /// List the parts of an archive
    Parts {
        file: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// List labelled archives in a directory
    List {
        #[arg(default_value = ".")]
        dir: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref path) => app_config::load_config_from(path),
        None => app_config::load_config(),
    };

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Render {
            file,
            output,
            dir,
            hints,
            no_fallback,
            show_headers,
        } => {
            let fallback = config.render.fallback_to_raw && !no_fallback;
            let target = RenderTarget {
                file: &file,
                dir: dir.as_deref(),
                output: output.as_deref(),
            };
            cmd_render(&target, &hints, fallback, show_headers, &config)
        }
        Commands::Parts { file, json } => cmd_parts(&file, json),
        Commands::List { dir, json } => cmd_list(&dir, json, &config),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = app_config::log_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mhtml-inline.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mhtml-inline", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::stdout().write_all(&buf)?;
    Ok(())
}

struct RenderTarget<'a> {
    file: &'a str,
    dir: Option<&'a Path>,
    output: Option<&'a Path>,
}

/// Decode and inline one archive.
fn cmd_render(
    target: &RenderTarget<'_>,
    hints: &[String],
    fallback: bool,
    show_headers: bool,
    config: &Config,
) -> anyhow::Result<()> {
    let path = match target.dir {
        Some(dir) => catalog::resolve_entry(dir, target.file)?,
        None => PathBuf::from(target.file),
    };
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }
    let raw = std::fs::read(&path)?;

    // Command-line hints are tried before configured ones.
    let mut location_hints = hints.to_vec();
    location_hints.extend(config.render.inline_options().location_hints);
    let options = InlineOptions { location_hints };

    let start = Instant::now();
    let rendered = if fallback {
        response::render(&raw, &options)
    } else {
        let inlined = mhtml_inline::decode_and_inline_with(&raw, &options)
            .map_err(|e| anyhow::anyhow!("{}: {e}", path.display()))?;
        Rendered::html(inlined.html, inlined.report)
    };
    let elapsed = start.elapsed();

    if show_headers {
        for (name, value) in &rendered.headers {
            eprintln!("{name}: {value}");
        }
        eprintln!();
    }

    match target.output {
        Some(out) => std::fs::write(out, &rendered.body)?,
        None => std::io::stdout().write_all(&rendered.body)?,
    }

    match rendered.outcome {
        Outcome::Inlined(report) => tracing::info!(
            file = %path.display(),
            inlined = report.inlined(),
            stylesheets = report.stylesheets_injected,
            unresolved = report.unresolved,
            elapsed_ms = elapsed.as_millis() as u64,
            "Rendered archive"
        ),
        Outcome::Raw(ref e) => eprintln!(
            "  {}: {e}; wrote the raw archive ({})",
            path.display(),
            format_size(rendered.body.len(), BINARY)
        ),
    }

    Ok(())
}

/// Parse an archive and describe its parts.
fn cmd_parts(path: &Path, json: bool) -> anyhow::Result<()> {
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }
    let raw = std::fs::read(path)?;
    let archive = mhtml_inline::parser::parse_archive(&raw)
        .map_err(|e| anyhow::anyhow!("{}: {e}", path.display()))?;

    if json {
        print_parts_json(path, &archive)
    } else {
        print_parts_table(path, &archive);
        Ok(())
    }
}

/// Print an archive's parts as a human-readable table.
fn print_parts_table(path: &Path, archive: &Archive) {
    println!();
    println!("  {:<20} {}", "File", path.display());
    if let Some(ref location) = archive.snapshot_location {
        println!("  {:<20} {}", "Snapshot location", location);
    }
    println!("  {:<20} {}", "Parts", archive.parts.len());
    println!();

    println!(
        "  {:<3} {:<4} {:<24} {:>10}  {}",
        "", "#", "Type", "Size", "Content-ID / Content-Location"
    );
    println!("  {}", "-".repeat(90));

    for (i, part) in archive.parts.iter().enumerate() {
        let marker = if i == archive.primary_html { "*" } else { "" };
        let name = part
            .content_id
            .as_deref()
            .map(|id| format!("<{id}>"))
            .or_else(|| part.content_location.clone())
            .unwrap_or_default();
        let name_trunc: String = name.chars().take(60).collect();
        println!(
            "  {:<3} {:<4} {:<24} {:>10}  {}",
            marker,
            i,
            part.media_type,
            format_size(part.body.len(), BINARY),
            name_trunc
        );
    }

    if !archive.issues.is_empty() {
        println!();
        for issue in &archive.issues {
            println!("  ! {issue}");
        }
    }
    println!();
}

/// Print an archive's parts as JSON.
fn print_parts_json(path: &Path, archive: &Archive) -> anyhow::Result<()> {
    let parts: Vec<serde_json::Value> = archive
        .parts
        .iter()
        .enumerate()
        .map(|(i, p)| {
            serde_json::json!({
                "index": i,
                "media_type": p.media_type,
                "charset": p.charset,
                "size": p.body.len(),
                "content_id": p.content_id,
                "content_location": p.content_location,
                "primary": i == archive.primary_html,
            })
        })
        .collect();

    let output = serde_json::json!({
        "file": path.to_string_lossy(),
        "snapshot_location": archive.snapshot_location,
        "part_count": archive.parts.len(),
        "parts": parts,
        "issues": archive.issues.iter().map(ToString::to_string).collect::<Vec<_>>(),
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// List labelled archives in a directory.
fn cmd_list(dir: &Path, json: bool, config: &Config) -> anyhow::Result<()> {
    let entries = catalog::scan(dir, &config.catalog)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!();
    println!("  {} archive(s) in {}", entries.len(), dir.display());
    println!();
    if entries.is_empty() {
        return Ok(());
    }

    println!("  {:<40} {}", "Label", "File");
    println!("  {}", "-".repeat(90));
    for entry in &entries {
        let label_trunc: String = entry.label.chars().take(39).collect();
        println!("  {:<40} {}", label_trunc, entry.filename);
    }
    println!();
    Ok(())
}
