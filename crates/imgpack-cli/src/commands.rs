use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context};
use colored::Colorize;
use imgpack_archive::{ArchiveConfig, ImageArchive, LoadReport, ParseMode};
use serde::Serialize;
use tracing::{debug, warn};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref(), cli.strict)?;
    debug!(?config, "resolved archive config");
    match cli.command {
        Command::Pack(args) => cmd_pack(args, config, cli.format),
        Command::Unpack(args) => cmd_unpack(args, config, cli.format),
        Command::List(args) => cmd_list(args, config, cli.format),
        Command::Remove(args) => cmd_remove(args, config, cli.format),
    }
}

fn load_config(path: Option<&Path>, strict: bool) -> anyhow::Result<ArchiveConfig> {
    let mut config = match path {
        Some(path) => ArchiveConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ArchiveConfig::default(),
    };
    if strict {
        config.parse_mode = ParseMode::Strict;
    }
    Ok(config)
}

fn open(index: &Path, config: ArchiveConfig) -> anyhow::Result<(ImageArchive, LoadReport)> {
    ImageArchive::open_with(index, config)
        .with_context(|| format!("opening archive {}", index.display()))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn kib(bytes: u64) -> u64 {
    (bytes + 512) / 1024
}

fn report_skipped(report: &LoadReport) {
    for skipped in &report.skipped {
        println!(
            "  {} line {}: {}",
            "skipped".yellow(),
            skipped.line,
            skipped.reason
        );
    }
}

#[derive(Serialize)]
struct PackSummary {
    images_loaded: usize,
    images_skipped: usize,
    unique_payloads: usize,
    index: PathBuf,
    blob: PathBuf,
    index_size: u64,
    blob_size: u64,
    seconds: f64,
}

fn cmd_pack(args: PackArgs, config: ArchiveConfig, format: OutputFormat) -> anyhow::Result<()> {
    let started = Instant::now();
    let archive = ImageArchive::with_config(config);
    let report = archive
        .add_dir(&args.src)
        .with_context(|| format!("reading source directory {}", args.src.display()))?;
    let files = archive
        .persist(&args.dst, &args.name)
        .with_context(|| format!("saving archive {} to {}", args.name, args.dst.display()))?;

    let summary = PackSummary {
        images_loaded: report.added,
        images_skipped: report.skipped.len(),
        unique_payloads: archive.unique_len(),
        index: files.index_path,
        blob: files.blob_path,
        index_size: files.index_size,
        blob_size: files.blob_size,
        seconds: started.elapsed().as_secs_f64(),
    };
    if format == OutputFormat::Json {
        return print_json(&summary);
    }

    println!("{} images loaded.", summary.images_loaded.to_string().bold());
    for skipped in &report.skipped {
        println!(
            "  {} {}: {}",
            "skipped".yellow(),
            skipped.path.display(),
            skipped.reason
        );
    }
    println!(
        "{} Saved {} ({} unique payloads)",
        "✓".green().bold(),
        summary.index.display(),
        summary.unique_payloads
    );
    println!("  Archive: {} KiB", kib(summary.blob_size));
    println!("  Index:   {} KiB", kib(summary.index_size));
    println!("  Worktime: {:.3} seconds", summary.seconds);
    Ok(())
}

#[derive(Serialize)]
struct UnpackSummary {
    written: usize,
    skipped_lines: usize,
    out: PathBuf,
}

fn cmd_unpack(args: UnpackArgs, config: ArchiveConfig, format: OutputFormat) -> anyhow::Result<()> {
    let (archive, report) = open(&args.index, config)?;
    let written = archive
        .export_dir(&args.out)
        .with_context(|| format!("writing images to {}", args.out.display()))?;

    let summary = UnpackSummary {
        written,
        skipped_lines: report.skipped.len(),
        out: args.out,
    };
    if format == OutputFormat::Json {
        return print_json(&summary);
    }
    report_skipped(&report);
    println!(
        "{} Wrote {} images to {}",
        "✓".green().bold(),
        summary.written,
        summary.out.display()
    );
    Ok(())
}

fn cmd_list(args: ListArgs, config: ArchiveConfig, format: OutputFormat) -> anyhow::Result<()> {
    let (archive, report) = open(&args.index, config)?;
    let entries = archive.entries();
    if format == OutputFormat::Json {
        return print_json(&entries);
    }

    report_skipped(&report);
    for entry in &entries {
        println!(
            "{} {} {} {}",
            entry.name.bold(),
            entry.offset,
            entry.length,
            entry.digest.short_hex().dimmed()
        );
    }
    println!(
        "{} entries, {} unique payloads, {} bytes",
        entries.len(),
        archive.unique_len(),
        archive.blob_len()
    );
    Ok(())
}

#[derive(Serialize)]
struct RemoveSummary {
    removed: Vec<String>,
    remaining: usize,
    blob_size: u64,
}

fn cmd_remove(args: RemoveArgs, config: ArchiveConfig, format: OutputFormat) -> anyhow::Result<()> {
    let (dir, base_name) = split_index_path(&args.index)?;
    let (archive, report) = open(&args.index, config)?;
    if !report.skipped.is_empty() {
        report_skipped(&report);
        if !args.force {
            bail!(
                "{} index lines could not be loaded from {}; rewriting would drop them \
                 (use --strict to see the first problem, or --force to rewrite anyway)",
                report.skipped.len(),
                args.index.display()
            );
        }
        warn!(
            dropped = report.skipped.len(),
            "rewriting archive without damaged entries"
        );
    }
    for name in &args.names {
        archive
            .remove(name)
            .with_context(|| format!("removing {name}"))?;
    }
    let files = archive
        .persist(&dir, &base_name)
        .with_context(|| format!("rewriting archive {}", args.index.display()))?;

    let summary = RemoveSummary {
        removed: args.names,
        remaining: files.entry_count,
        blob_size: files.blob_size,
    };
    if format == OutputFormat::Json {
        return print_json(&summary);
    }
    for name in &summary.removed {
        println!("  {} {}", "removed:".red(), name);
    }
    println!(
        "{} {} entries remain, archive is {} KiB",
        "✓".green().bold(),
        summary.remaining,
        kib(summary.blob_size)
    );
    Ok(())
}

/// Split `dir/base.ext` into `dir` and `base`.
fn split_index_path(index: &Path) -> anyhow::Result<(PathBuf, String)> {
    let base_name = index
        .file_stem()
        .and_then(|s| s.to_str())
        .with_context(|| format!("invalid index path {}", index.display()))?
        .to_string();
    let dir = match index.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((dir, base_name))
}
