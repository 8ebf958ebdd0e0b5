use crate::process::validate::RejectionKind;

#[macro_export]
macro_rules! log_or_err {
    ($state:expr, $level:expr, $err:expr $(,)?) => {{
        if $level <= $state.fail_level {
            return Err($err.into());
        } else {
            match $level {
                ::log::Level::Error => ::log::error!("{}", $err),
                ::log::Level::Warn => ::log::warn!("{}", $err),
                ::log::Level::Info => ::log::info!("{}", $err),
                ::log::Level::Debug => ::log::debug!("{}", $err),
                ::log::Level::Trace => ::log::trace!("{}", $err),
            }
        }
    }};
}

#[derive(thiserror::Error, Debug)]
pub enum HeaderError {
    #[error("File header truncated: read {0} of 16384 bytes")]
    Truncated(usize),

    #[error("Header key -{0} not found")]
    MissingKey(String),

    #[error("Header key -{key} has a non-numeric value {value:?}")]
    InvalidValue { key: String, value: String },

    #[error("Header text is {0} bytes, more than fits in 16384")]
    TooLong(usize),
}

#[derive(thiserror::Error, Debug)]
pub enum LayoutError {
    #[error("A raw packet layout needs at least one channel")]
    NoChannels,

    #[error("Channel count {0} does not fit the packet size field")]
    TooManyChannels(usize),

    #[error("Channel {channel} out of range for a {channels}-channel layout")]
    ChannelOutOfRange { channel: usize, channels: usize },

    #[error("Packet carries {found} samples, layout expects {expected}")]
    PayloadMismatch { found: usize, expected: usize },
}

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Packet {index} of batch {batch} rejected: {kind} (timestamp {timestamp})")]
    Rejected {
        kind: RejectionKind,
        batch: u64,
        index: usize,
        timestamp: u64,
    },

    #[error(
        "Error budget exhausted: {errors} marker/CRC/timestamp errors exceed the budget of {budget}"
    )]
    BudgetExhausted { errors: u64, budget: u64 },
}

#[derive(thiserror::Error, Debug)]
pub enum TraceError {
    #[error("No continuous records to reconstruct")]
    Empty,

    #[error("Nominal sampling rate is zero")]
    ZeroSampleRate,

    #[error("Sampling rate varies across records ({first} Hz vs {other} Hz), not packing records")]
    VaryingSampleRate { first: u32, other: u32 },

    #[error("Gap tolerance must be a finite non-negative fraction, got {0}")]
    InvalidTolerance(f64),
}

#[derive(thiserror::Error, Debug)]
pub enum EpochError {
    #[error("None of the requested epochs were found in the defaults file")]
    NoEpochs,

    #[error("Malformed epoch line {line}: {text:?}")]
    MalformedLine { line: usize, text: String },

    #[error("Epoch {name} stops ({stop}) before it starts ({start})")]
    InvertedBounds { name: String, start: u64, stop: u64 },

    #[error("Channel group {0} has no channels")]
    EmptyGroup(u32),
}

#[derive(thiserror::Error, Debug)]
pub enum RecordError {
    #[error("Stream length {len} is not a multiple of the {width}-byte element size")]
    TrailingBytes { len: usize, width: usize },

    #[error("Container holds {0} packets, more than the header count field can store")]
    CountOverflow(u64),
}
