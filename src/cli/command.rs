use std::path::PathBuf;

use clap::{Args, Parser as ClapParser, Subcommand, ValueEnum};
use lynx::process::extract::DEFAULT_BATCH_SIZE;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\nlynx ",
    env!("LYNX_VERSION"),
    "\nbuilt ",
    env!("BUILD_TIMESTAMP"),
);

#[derive(Debug, ClapParser)]
#[command(
    name         = env!("CARGO_PKG_NAME"),
    version      = env!("CARGO_PKG_VERSION"),
    long_version = LONG_VERSION,
    about        = "Tools for validating, extracting and splitting raw neural acquisition capture files",
    long_about   = None,
)]
pub struct Cli {
    /// Set the log level
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    pub loglevel: LogLevel,

    /// Treat rejected packets as fatal errors (fail on first rejection).
    #[arg(long, global = true)]
    pub strict: bool,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Show progress bars during operations.
    #[arg(long, global = true)]
    pub progress: bool,

    /// Choose an operation to perform.
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Extract timestamps, TTL and selected channels of a raw capture into flat files.
    Extract(ExtractArgs),

    /// Split a raw capture into per-epoch, per-group MDA containers.
    Epochs(EpochsArgs),

    /// Write selected channels of a raw capture, optionally windowed, to one MDA container.
    Mda(MdaArgs),

    /// Rebuild a zero-padded trace from a continuous-record file.
    Trace(TraceArgs),

    /// List the records of an event file.
    Events(EventsArgs),

    /// Print capture header and packet information
    Info(InfoArgs),
}

/// Options shared by every command that reads a raw capture.
#[derive(Debug, Args)]
pub struct PipelineArgs {
    /// Packets decoded per read.
    #[arg(long, value_name = "PACKETS", default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Stop once at least this many packets were accepted (checked per batch).
    #[arg(long, value_name = "PACKETS")]
    pub max_packets: Option<u64>,

    /// Stop once more than this many marker, CRC and timestamp errors were seen.
    #[arg(long, value_name = "ERRORS")]
    pub error_budget: Option<u64>,

    /// Skip packet checks and resynchronization (for known-clean recordings).
    #[arg(long)]
    pub no_validate: bool,

    /// Channel count to use instead of the header's -NumADChannels.
    #[arg(long, value_name = "COUNT")]
    pub channels: Option<usize>,

    /// Write a YAML summary of the run.
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ExtractArgs {
    /// Input raw capture (.nrd).
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Channels to extract, comma separated.
    #[arg(id = "channel", long = "channel", short = 'c', value_delimiter = ',', required = true)]
    pub channels: Vec<usize>,

    /// Prefix of the output file names.
    #[arg(long, value_name = "PREFIX", default_value = "")]
    pub prefix: String,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

#[derive(Debug, Args)]
pub struct EpochsArgs {
    /// Input raw capture (.nrd).
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Acquisition defaults file holding the "Epoch" lines.
    #[arg(long, value_name = "PATH")]
    pub defaults: PathBuf,

    /// YAML file mapping group numbers to channel lists.
    #[arg(long, value_name = "PATH")]
    pub groups: PathBuf,

    /// Epoch to write; repeat for more.
    #[arg(long = "epoch", value_name = "NAME", required = true)]
    pub epochs: Vec<String>,

    /// Prefix of the output file names.
    #[arg(long, value_name = "PREFIX", default_value = "")]
    pub prefix: String,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

#[derive(Debug, Args)]
pub struct MdaArgs {
    /// Input raw capture (.nrd).
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output MDA container.
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Channels to write, comma separated.
    #[arg(id = "channel", long = "channel", short = 'c', value_delimiter = ',', required = true)]
    pub channels: Vec<usize>,

    /// First timestamp to write (microseconds, inclusive).
    #[arg(long, value_name = "US")]
    pub start: Option<u64>,

    /// Last timestamp to write (microseconds, inclusive).
    #[arg(long, value_name = "US")]
    pub stop: Option<u64>,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

#[derive(Debug, Args)]
pub struct TraceArgs {
    /// Input continuous-record file (.ncs).
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output trace, 16-bit little-endian samples.
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Fraction of a packet duration a delta may exceed before it is a gap.
    #[arg(long, value_name = "FRACTION", default_value_t = 0.01)]
    pub gap_tolerance: f64,

    /// Write a YAML summary of the trace.
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct EventsArgs {
    /// Input event file (.nev).
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Also write the event times as a timestamp-only spike file.
    #[arg(long, value_name = "PATH")]
    pub spike_file: Option<PathBuf>,

    /// Only keep events whose string contains this text.
    #[arg(long, value_name = "TEXT")]
    pub matching: Option<String>,
}

#[derive(Debug, Args)]
pub struct InfoArgs {
    /// Input capture file.
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Run the packet checks over the whole file.
    #[arg(long)]
    pub check: bool,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    /// Disable logging output.
    Off,
    /// No output except errors.
    Error,
    /// Show warnings and errors.
    Warn,
    /// Show info, warnings and errors (default).
    Info,
    /// Show debug, info, warnings and errors.
    Debug,
    /// Show all log messages including trace.
    Trace,
}

impl LogLevel {
    /// Convert LogLevel to log::LevelFilter
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    /// Colorized human-readable text.
    Plain,
    /// Structured JSON per log record.
    Json,
}
