//! # iconv-codec CLI - Streaming Codeset Converter
//!
//! Command-line front end for the transcoding library: decode a codeset to
//! UTF-8, encode UTF-8 into a codeset, convert between two codesets, or
//! probe which codesets the platform supports.

#[cfg(feature = "cli")]
use std::fs::File;
#[cfg(feature = "cli")]
use std::io::{self, BufReader, BufWriter, Read, Write};
#[cfg(feature = "cli")]
use std::path::PathBuf;
#[cfg(feature = "cli")]
use std::time::Instant;

#[cfg(feature = "cli")]
use anyhow::{Context, Result};
#[cfg(feature = "cli")]
use clap::{Args, Parser, Subcommand, ValueEnum};
#[cfg(feature = "cli")]
use serde::Serialize;
#[cfg(feature = "cli")]
use tracing::{debug, info};
#[cfg(feature = "cli")]
use tracing_subscriber::EnvFilter;

#[cfg(feature = "cli")]
use iconv_codec::{CodecInfo, ErrorPolicy, TranscoderConfig};

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI features disabled. Enable with --features cli");
    std::process::exit(1);
}

/// iconv-codec: convert text between Unicode and legacy codesets
#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "iconv-codec")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log progress to stderr (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format for the run summary
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// JSON file with transcoder settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Decode codeset bytes into UTF-8
    Decode(DecodeArgs),

    /// Encode UTF-8 text into a codeset
    Encode(EncodeArgs),

    /// Convert from one codeset to another
    Convert(ConvertArgs),

    /// Check whether codesets can be converted in both directions
    Probe(ProbeArgs),
}

#[cfg(feature = "cli")]
#[derive(Args)]
struct StreamArgs {
    /// Input file (stdin if not specified)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output file (stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// How to handle input that cannot be converted (strict, replace, ignore)
    #[arg(long, default_value = "strict")]
    errors: ErrorPolicy,
}

#[cfg(feature = "cli")]
#[derive(Args)]
struct DecodeArgs {
    /// Codeset of the input
    #[arg(short, long)]
    codeset: String,

    #[command(flatten)]
    stream: StreamArgs,
}

#[cfg(feature = "cli")]
#[derive(Args)]
struct EncodeArgs {
    /// Codeset of the output
    #[arg(short, long)]
    codeset: String,

    #[command(flatten)]
    stream: StreamArgs,
}

#[cfg(feature = "cli")]
#[derive(Args)]
struct ConvertArgs {
    /// Source codeset
    #[arg(short = 'f', long = "from")]
    from: String,

    /// Target codeset
    #[arg(short = 't', long = "to")]
    to: String,

    #[command(flatten)]
    stream: StreamArgs,
}

#[cfg(feature = "cli")]
#[derive(Args)]
struct ProbeArgs {
    /// Codesets to check
    #[arg(required = true)]
    codesets: Vec<String>,
}

#[cfg(feature = "cli")]
#[derive(Clone, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[cfg(feature = "cli")]
#[derive(Serialize)]
struct ConversionResult {
    command: &'static str,
    errors: ErrorPolicy,
    bytes_read: u64,
    bytes_written: u64,
    processing_time_ms: u64,
}

#[cfg(feature = "cli")]
#[derive(Serialize)]
struct ProbeResult {
    codeset: String,
    supported: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Counts bytes passing through a reader or writer
#[cfg(feature = "cli")]
struct Counted<T> {
    inner: T,
    count: u64,
}

#[cfg(feature = "cli")]
impl<T> Counted<T> {
    fn new(inner: T) -> Self {
        Self { inner, count: 0 }
    }
}

#[cfg(feature = "cli")]
impl<R: Read> Read for Counted<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count += n as u64;
        Ok(n)
    }
}

#[cfg(feature = "cli")]
impl<W: Write> Write for Counted<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(feature = "cli")]
fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Decode(ref args) => decode_command(args, &config, &cli)?,
        Commands::Encode(ref args) => encode_command(args, &config, &cli)?,
        Commands::Convert(ref args) => convert_command(args, &config, &cli)?,
        Commands::Probe(ref args) => probe_command(args, &config, &cli)?,
    }

    Ok(())
}

#[cfg(feature = "cli")]
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

#[cfg(feature = "cli")]
fn load_config(cli: &Cli) -> Result<TranscoderConfig> {
    match cli.config {
        Some(ref path) => {
            let config = TranscoderConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config: {}", path.display()))?;
            debug!(path = %path.display(), "loaded configuration");
            Ok(config)
        }
        None => Ok(TranscoderConfig::default()),
    }
}

#[cfg(all(feature = "cli", target_os = "linux"))]
fn open_codec(codeset: &str, config: &TranscoderConfig) -> Result<CodecInfo> {
    iconv_codec::lookup(codeset, config)
        .with_context(|| format!("Codeset {codeset} is not available"))
}

#[cfg(all(feature = "cli", not(target_os = "linux")))]
fn open_codec(codeset: &str, _config: &TranscoderConfig) -> Result<CodecInfo> {
    anyhow::bail!("Codeset {codeset} is not available: no iconv backend on this platform")
}

#[cfg(feature = "cli")]
fn open_input(args: &StreamArgs) -> Result<Counted<Box<dyn Read>>> {
    let input: Box<dyn Read> = match args.input {
        Some(ref path) => {
            debug!(path = %path.display(), "reading input file");
            let file = File::open(path)
                .with_context(|| format!("Failed to open input file: {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(io::stdin().lock()),
    };
    Ok(Counted::new(input))
}

#[cfg(feature = "cli")]
fn open_output(args: &StreamArgs) -> Result<Counted<Box<dyn Write>>> {
    let output: Box<dyn Write> = match args.output {
        Some(ref path) => {
            debug!(path = %path.display(), "writing output file");
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    Ok(Counted::new(output))
}

#[cfg(feature = "cli")]
fn decode_command(args: &DecodeArgs, config: &TranscoderConfig, cli: &Cli) -> Result<()> {
    let start_time = Instant::now();
    let codec = open_codec(&args.codeset, config)?;

    let input = open_input(&args.stream)?;
    let mut output = open_output(&args.stream)?;
    let mut reader = codec.reader(input, args.stream.errors)?;

    io::copy(&mut reader, &mut output)
        .with_context(|| format!("Failed to decode {}", args.codeset))?;
    output.flush().context("Failed to flush output")?;

    report(
        ConversionResult {
            command: "decode",
            errors: args.stream.errors,
            bytes_read: reader.into_inner().count,
            bytes_written: output.count,
            processing_time_ms: start_time.elapsed().as_millis() as u64,
        },
        cli,
    )
}

#[cfg(feature = "cli")]
fn encode_command(args: &EncodeArgs, config: &TranscoderConfig, cli: &Cli) -> Result<()> {
    let start_time = Instant::now();
    let codec = open_codec(&args.codeset, config)?;

    let mut input = open_input(&args.stream)?;
    let output = open_output(&args.stream)?;
    let mut writer = codec.writer(output, args.stream.errors)?;

    io::copy(&mut input, &mut writer)
        .with_context(|| format!("Failed to encode to {}", args.codeset))?;
    let output = writer.finish().context("Failed to finish output")?;

    report(
        ConversionResult {
            command: "encode",
            errors: args.stream.errors,
            bytes_read: input.count,
            bytes_written: output.count,
            processing_time_ms: start_time.elapsed().as_millis() as u64,
        },
        cli,
    )
}

#[cfg(feature = "cli")]
fn convert_command(args: &ConvertArgs, config: &TranscoderConfig, cli: &Cli) -> Result<()> {
    let start_time = Instant::now();
    info!(from = %args.from, to = %args.to, "converting");

    let source = open_codec(&args.from, config)?;
    let target = open_codec(&args.to, config)?;

    let input = open_input(&args.stream)?;
    let output = open_output(&args.stream)?;
    let mut reader = source.reader(input, args.stream.errors)?;
    let mut writer = target.writer(output, args.stream.errors)?;

    io::copy(&mut reader, &mut writer)
        .with_context(|| format!("Failed to convert from {} to {}", args.from, args.to))?;
    let output = writer.finish().context("Failed to finish output")?;

    report(
        ConversionResult {
            command: "convert",
            errors: args.stream.errors,
            bytes_read: reader.into_inner().count,
            bytes_written: output.count,
            processing_time_ms: start_time.elapsed().as_millis() as u64,
        },
        cli,
    )
}

#[cfg(feature = "cli")]
fn probe_command(args: &ProbeArgs, config: &TranscoderConfig, cli: &Cli) -> Result<()> {
    let results: Vec<ProbeResult> = args
        .codesets
        .iter()
        .map(|codeset| match open_codec(codeset, config) {
            Ok(_) => ProbeResult {
                codeset: codeset.clone(),
                supported: true,
                error: None,
            },
            Err(e) => ProbeResult {
                codeset: codeset.clone(),
                supported: false,
                error: Some(format!("{e:#}")),
            },
        })
        .collect();

    match cli.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        OutputFormat::Text => {
            for result in &results {
                match result.error {
                    None => println!("{:<20} supported", result.codeset),
                    Some(ref error) => println!("{:<20} unsupported ({})", result.codeset, error),
                }
            }
        }
    }

    if results.iter().any(|r| !r.supported) {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(feature = "cli")]
fn report(result: ConversionResult, cli: &Cli) -> Result<()> {
    match cli.format {
        OutputFormat::Json => {
            eprintln!("{}", serde_json::to_string_pretty(&result)?);
        }
        OutputFormat::Text => {
            info!(
                command = result.command,
                bytes_read = result.bytes_read,
                bytes_written = result.bytes_written,
                elapsed_ms = result.processing_time_ms,
                "done"
            );
        }
    }
    Ok(())
}
