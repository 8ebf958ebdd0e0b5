/// Byte buffer to packet batch decoding.
///
/// Provides the [`PacketDecoder`](decode::PacketDecoder), a pure
/// reinterpretation of whole packets from an aligned buffer.
pub mod decode;

/// Realignment on the packet start marker.
///
/// Provides the [`Resynchronizer`](resync::Resynchronizer) used at stream
/// start and after every rejected packet.
pub mod resync;

/// Structural and ordering checks.
///
/// Provides the [`PacketValidator`](validate::PacketValidator) returning the
/// valid prefix of a batch and the [`RejectionKind`](validate::RejectionKind)
/// of the first failing packet.
pub mod validate;

/// The buffered extraction loop.
///
/// Provides the [`ExtractionPipeline`](extract::ExtractionPipeline), the
/// [`PacketSink`](extract::PacketSink) seam and the
/// [`ScalarStreams`](extract::ScalarStreams) demultiplexer.
pub mod extract;

/// Named time windows written to per-group MDA containers.
pub mod epoch;

/// Gap-aware reconstruction of continuous-record traces.
pub mod trace;
