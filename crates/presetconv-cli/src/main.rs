//! presetconv - Convert GP-5 presets to GP-50 and inspect preset binaries
//!
//! This tool parses GP-5 preset files, maps their parameters and effects
//! onto the GP-50 format, and writes verified GP-50 files. It also offers
//! analysis commands for reverse engineering unknown preset layouts.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use presetconv_core::analyzer::hexdump::find_pattern;
use presetconv_core::fsio::{self, WriteOptions};
use presetconv_core::{
    Analyzer, ConversionEngine, ConversionRuleSet, Error, FormatLayout, FormatParser, FormatTag,
    FormatWriter, HexDumper, ParserConfig, PresetModel, Validator,
};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, trace, warn, Level};
use tracing_subscriber::EnvFilter;

/// Extensions picked up when converting a directory
const SOURCE_EXTENSIONS: [&str; 2] = ["gp5", "preset"];

/// Convert GP-5 multi-effects presets to the GP-50 format
#[derive(Parser, Debug)]
#[command(name = "presetconv")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a preset file, or every preset in a directory
    Convert(ConvertArgs),
    /// Print a structural analysis of a binary
    Analyze {
        /// File to analyze
        file: PathBuf,
    },
    /// Compare two binaries byte by byte
    Compare {
        /// First file
        a: PathBuf,
        /// Second file
        b: PathBuf,
        /// Also print a side-by-side hex dump
        #[arg(long)]
        dump: bool,
    },
    /// Print a hex dump of a binary
    Dump(DumpArgs),
    /// Check whether a preset converts without losing effects
    Check {
        /// Preset to check
        file: PathBuf,
        /// Conversion rules (TOML)
        #[arg(long)]
        rules: Option<PathBuf>,
    },
    /// Print the parsed contents of a preset
    Info {
        /// Preset to inspect
        file: PathBuf,
    },
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Preset file or directory of presets
    input: PathBuf,

    /// Output file (single input) or directory (directory input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Conversion rules (TOML), defaults to the built-in GP-5 to GP-50 rules
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Do not back up files that get overwritten
    #[arg(long)]
    no_backup: bool,

    /// Overwrite existing output files
    #[arg(long)]
    force: bool,

    /// Reject presets that fail validation instead of warning
    #[arg(long)]
    strict: bool,

    /// Don't write files, just show what would be converted
    #[arg(long)]
    dry_run: bool,
}

#[derive(Args, Debug)]
struct DumpArgs {
    /// File to dump
    file: PathBuf,

    /// Maximum number of bytes to dump
    #[arg(long)]
    max_bytes: Option<usize>,

    /// Show the lines around this offset instead of the whole file
    #[arg(long, value_parser = parse_offset)]
    offset: Option<usize>,

    /// Context lines around --offset
    #[arg(long, default_value = "3")]
    context: usize,

    /// Bytes per line
    #[arg(long, default_value = "16")]
    width: usize,

    /// List offsets of this ASCII text instead of dumping
    #[arg(long)]
    find: Option<String>,
}

/// Running totals for a batch conversion
#[derive(Debug, Default)]
struct BatchStats {
    found: usize,
    converted: usize,
    failed: usize,
    warnings: usize,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .init();

    match &cli.command {
        Command::Convert(args) => run_convert(args),
        Command::Analyze { file } => run_analyze(file),
        Command::Compare { a, b, dump } => run_compare(a, b, *dump),
        Command::Dump(args) => run_dump(args),
        Command::Check { file, rules } => run_check(file, rules.as_deref()),
        Command::Info { file } => run_info(file),
    }
}

/// Builds the conversion engine from the optional rules file
fn load_engine(rules: Option<&Path>) -> Result<ConversionEngine> {
    let rules = match rules {
        Some(path) => ConversionRuleSet::load(path)
            .with_context(|| format!("Failed to load rules: {}", path.display()))?,
        None => ConversionRuleSet::gp5_to_gp50(),
    };
    Ok(ConversionEngine::new(rules, FormatLayout::gp50()))
}

fn run_convert(args: &ConvertArgs) -> Result<()> {
    if !args.input.exists() {
        bail!("Input does not exist: {}", args.input.display());
    }

    let engine = load_engine(args.rules.as_deref())?;
    let parser = FormatParser::new().with_config(ParserConfig::new().strict(args.strict));
    let writer = FormatWriter::new();

    if args.input.is_dir() {
        return convert_directory(args, &parser, &engine, &writer);
    }

    let output = match &args.output {
        Some(output) => output.clone(),
        None => default_output(&args.input),
    };
    let warnings = convert_file(args, &parser, &engine, &writer, &args.input, &output)?;
    for warning in &warnings {
        eprintln!("warning: {}", warning);
    }
    Ok(())
}

/// Converts every preset under a directory, continuing past failures
fn convert_directory(
    args: &ConvertArgs,
    parser: &FormatParser,
    engine: &ConversionEngine,
    writer: &FormatWriter,
) -> Result<()> {
    info!("Scanning directory: {}", args.input.display());

    let files = fsio::find_files(&args.input, &SOURCE_EXTENSIONS)
        .with_context(|| format!("Failed to list presets in {}", args.input.display()))?;

    let mut stats = BatchStats {
        found: files.len(),
        ..BatchStats::default()
    };

    for file in &files {
        let output = match &args.output {
            Some(dir) => {
                let relative = file.strip_prefix(&args.input).unwrap_or(file);
                default_output(&dir.join(relative))
            }
            None => default_output(file),
        };

        debug!("Processing preset: {}", file.display());
        match convert_file(args, parser, engine, writer, file, &output) {
            Ok(warnings) => {
                stats.converted += 1;
                stats.warnings += warnings.len();
            }
            Err(e) => {
                // Log error but continue with other files
                error!("Failed to convert {}: {:#}", file.display(), e);
                stats.failed += 1;
            }
        }
    }

    println!(
        "Summary: {} found, {} converted, {} failed, {} warnings",
        stats.found, stats.converted, stats.failed, stats.warnings
    );

    if stats.failed > 0 {
        bail!("{} of {} presets failed to convert", stats.failed, stats.found);
    }
    Ok(())
}

/// Converts one file and returns the compatibility warnings
fn convert_file(
    args: &ConvertArgs,
    parser: &FormatParser,
    engine: &ConversionEngine,
    writer: &FormatWriter,
    input: &Path,
    output: &Path,
) -> Result<Vec<String>> {
    let source = parser
        .parse_file(input)
        .with_context(|| format!("Failed to parse preset: {}", input.display()))?;

    if source.format() == FormatTag::Unrecognized {
        return Err(Error::UnrecognizedFormat)
            .with_context(|| format!("Cannot convert {}", input.display()));
    }

    let conversion = engine
        .convert_with_report(&source)
        .with_context(|| format!("Failed to convert preset: {}", input.display()))?;
    for warning in &conversion.warnings {
        warn!("{}: {}", input.display(), warning);
    }

    let bytes = writer
        .write(&conversion.preset)
        .with_context(|| format!("Failed to serialize preset: {}", input.display()))?;

    if args.dry_run {
        println!(
            "Would write: {} ({} bytes, '{}')",
            output.display(),
            bytes.len(),
            conversion.preset.name()
        );
        return Ok(conversion.warnings);
    }

    if output.exists() && !args.force {
        bail!(
            "File already exists: {} (use --force to overwrite)",
            output.display()
        );
    }

    let outcome = fsio::write_file(
        output,
        &bytes,
        WriteOptions {
            backup: !args.no_backup,
        },
    )
    .with_context(|| format!("Failed to write preset: {}", output.display()))?;

    if let Some(backup) = &outcome.backup {
        info!("Backup saved to {}", backup.display());
    }
    println!("Wrote {}", outcome.path.display());
    Ok(conversion.warnings)
}

/// `input` with its extension replaced by the GP-50 one
fn default_output(input: &Path) -> PathBuf {
    input.with_extension(FormatTag::Gp50.extension().unwrap_or("gp50"))
}

fn read(path: &Path) -> Result<Vec<u8>> {
    trace!("Reading {}", path.display());
    fsio::read_file(path).with_context(|| format!("Failed to read input file: {}", path.display()))
}

/// Bytes shown in the hex preview of `analyze`
const ANALYZE_PREVIEW_BYTES: usize = 256;

fn run_analyze(file: &Path) -> Result<()> {
    let data = read(file)?;
    print!("{}", render_analysis(file, &data));
    Ok(())
}

fn render_analysis(file: &Path, data: &[u8]) -> String {
    let report = Analyzer::new().analyze(data);
    let mut out = String::new();

    // Writing into a String cannot fail
    let _ = writeln!(out, "File: {}", file.display());
    let _ = writeln!(out, "Size: {} bytes", report.size);
    let _ = writeln!(out, "Signature: {}", report.signature);
    let _ = writeln!(out, "Header size guess: {}", report.header_size_guess);

    let dist = &report.distribution;
    let _ = writeln!(
        out,
        "Bytes: min {} max {} mean {:.2}, {} null ({:.1}%)",
        dist.min, dist.max, dist.mean, dist.null_bytes, dist.null_percentage
    );

    if !report.strings.is_empty() {
        let _ = writeln!(out, "\nStrings:");
        for s in &report.strings {
            let _ = writeln!(out, "  {}", s);
        }
    }

    if !report.patterns.is_empty() {
        let _ = writeln!(out, "\nRepeating patterns:");
        for pattern in &report.patterns {
            let _ = writeln!(out, "  {}  x{}", pattern.hex(), pattern.count);
        }
    }

    if !report.null_runs.is_empty() {
        let _ = writeln!(out, "\nNull runs:");
        for (start, end) in &report.null_runs {
            let _ = writeln!(out, "  0x{:04X}..0x{:04X} ({} bytes)", start, end, end - start);
        }
    }

    if !data.is_empty() {
        let _ = writeln!(out, "\nFirst {} bytes:", data.len().min(ANALYZE_PREVIEW_BYTES));
        let _ = writeln!(
            out,
            "{}",
            HexDumper::new().dump(data, 0, Some(ANALYZE_PREVIEW_BYTES))
        );
    }

    out
}

fn run_compare(a: &Path, b: &Path, dump: bool) -> Result<()> {
    let data_a = read(a)?;
    let data_b = read(b)?;
    let cmp = Analyzer::new().compare(&data_a, &data_b);

    println!("{}: {} bytes", a.display(), cmp.size_a);
    println!("{}: {} bytes", b.display(), cmp.size_b);
    println!("Size difference: {}", cmp.size_difference);
    println!("Differing bytes: {}", cmp.byte_differences);
    println!("Similarity: {:.2}%", cmp.similarity_percentage);

    if !cmp.first_differences.is_empty() {
        println!("\nFirst differences:");
        for diff in &cmp.first_differences {
            println!("  0x{:04X}: {:02X} != {:02X}", diff.offset, diff.a, diff.b);
        }
    }

    if dump {
        println!();
        println!("{}", HexDumper::new().dump_comparison(&data_a, &data_b, None));
    }
    Ok(())
}

fn run_dump(args: &DumpArgs) -> Result<()> {
    let data = read(&args.file)?;

    if let Some(text) = &args.find {
        let offsets = find_pattern(&data, text.as_bytes());
        if offsets.is_empty() {
            println!("'{}' not found", text);
        }
        for offset in offsets {
            println!("0x{:08X}", offset);
        }
        return Ok(());
    }

    let dumper = HexDumper::new().bytes_per_line(args.width);
    let dump = match args.offset {
        Some(offset) => {
            if offset >= data.len() {
                bail!(
                    "Offset 0x{:X} is past the end of {} ({} bytes)",
                    offset,
                    args.file.display(),
                    data.len()
                );
            }
            dumper.dump_around(&data, offset, args.context)
        }
        None => dumper.dump(&data, 0, args.max_bytes),
    };
    println!("{}", dump);
    Ok(())
}

fn run_check(file: &Path, rules: Option<&Path>) -> Result<()> {
    let engine = load_engine(rules)?;
    let source = parse(file)?;
    if source.format() == FormatTag::Unrecognized {
        return Err(Error::UnrecognizedFormat)
            .with_context(|| format!("Cannot check {}", file.display()));
    }

    let (compatible, warnings) = engine.check_compatibility(&source);
    for warning in &warnings {
        println!("warning: {}", warning);
    }

    let report = FormatParser::new()
        .registry()
        .get(source.format())
        .map(|layout| Validator::for_layout(layout).validate(&source));
    if let Some(report) = &report {
        for violation in &report.violations {
            println!("invalid: {}", violation);
        }
    }

    let valid = report.map(|r| r.is_valid()).unwrap_or(true);
    if compatible && valid {
        println!("{}: OK", file.display());
        Ok(())
    } else {
        bail!(
            "{}: {} compatibility warning(s), preset {}",
            file.display(),
            warnings.len(),
            if valid { "valid" } else { "invalid" }
        )
    }
}

fn run_info(file: &Path) -> Result<()> {
    let preset = parse(file)?;
    print_preset(&preset);
    Ok(())
}

fn parse(file: &Path) -> Result<PresetModel> {
    FormatParser::new()
        .parse_file(file)
        .with_context(|| format!("Failed to parse preset: {}", file.display()))
}

fn print_preset(preset: &PresetModel) {
    println!("Format: {}", preset.format());
    println!("Version: {}", preset.version());
    println!("Name: {}", preset.name());

    if let Some(raw) = preset.raw() {
        println!("Payload: {} bytes (not decoded)", raw.len());
        return;
    }

    println!("\nParameters:");
    for (key, value) in preset.parameters() {
        println!("  {} = {}", key, value);
    }

    println!("\nEffects:");
    for (i, effect) in preset.effects().iter().enumerate() {
        let state = match (effect.enabled, effect.bypass) {
            (_, true) => "bypassed",
            (true, false) => "on",
            (false, false) => "off",
        };
        println!("  {}. {} ({})", i + 1, effect.kind, state);
        for (name, value) in &effect.params {
            println!("       {} = {}", name, value);
        }
    }
}

/// Parses decimal or `0x`-prefixed hexadecimal offsets
fn parse_offset(s: &str) -> std::result::Result<usize, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid offset '{}': {}", s, e))
}
