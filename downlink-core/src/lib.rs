//! Core transport library for a simulated LEO satellite image downlink.
//!
//! Wires together an RF channel model (`channel`), a 12-bit pixel codec
//! (`codec`), a chunking image transmitter (`transmitter`), and a
//! concurrent image reassembler (`reassembler`) around a shared datagram
//! shape (`datagram`). `orbit` stands in for the real orbit-geometry oracle,
//! and `config`/`logging`/`errors` carry the ambient stack the rest of the
//! crate is built on.

pub mod channel;
pub mod codec;
pub mod config;
pub mod datagram;
pub mod errors;
pub mod logging;
pub mod orbit;
pub mod reassembler;
pub mod transmitter;

use ndarray::Array2;

/// Where a fully reassembled frame goes once the reassembler completes it.
/// Decoding the raw bytes through `codec::decode` and doing anything with
/// the resulting pixel grids (display, further analysis, discard) is the
/// caller's concern.
pub trait FrameSink {
    fn frame_ready(&mut self, frame_id: u64, raw_noisy: Vec<u8>, raw_fixed: Vec<u8>);
}

/// A `FrameSink` that just logs completion, useful as a default and in
/// tests that don't care about the reassembled bytes.
pub struct LoggingFrameSink<'a> {
    logger: &'a mut logging::DownlinkLogger,
}

impl<'a> LoggingFrameSink<'a> {
    pub fn new(logger: &'a mut logging::DownlinkLogger) -> Self {
        Self { logger }
    }
}

impl FrameSink for LoggingFrameSink<'_> {
    fn frame_ready(&mut self, frame_id: u64, raw_noisy: Vec<u8>, raw_fixed: Vec<u8>) {
        self.logger.info(
            "RX",
            format!(
                "frame {} reassembled: {} bytes noisy, {} bytes fixed",
                frame_id,
                raw_noisy.len(),
                raw_fixed.len()
            ),
        );
    }
}

/// An in-memory `FrameSink` that records every completed frame, for tests
/// and the CLI's non-interactive demo mode.
#[derive(Debug, Default)]
pub struct RecordingFrameSink {
    pub frames: Vec<(u64, Vec<u8>, Vec<u8>)>,
}

impl FrameSink for RecordingFrameSink {
    fn frame_ready(&mut self, frame_id: u64, raw_noisy: Vec<u8>, raw_fixed: Vec<u8>) {
        self.frames.push((frame_id, raw_noisy, raw_fixed));
    }
}

/// Decode a reassembled frame's fixed (majority-voted) bytes into a pixel
/// grid, using the codec's header/continuous auto-detection.
pub fn decode_frame(
    raw_fixed: &[u8],
    frame: &config::FrameConfig,
    codec_config: &config::CodecConfig,
) -> Result<Array2<u16>, errors::CodecError> {
    codec::decode(raw_fixed, frame.frame_width, frame.frame_height, codec_config)
}
