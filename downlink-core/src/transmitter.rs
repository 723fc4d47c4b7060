//! Image transmitter.
//!
//! Reads a frame from a raw file-like source, chunks it, replicates each
//! chunk `img_rep_copies` times, pushes every replica through the RF
//! channel model independently, and emits whatever survives through a
//! datagram sink. Ported from `satellite_leo.py::send_image_if_needed`.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;

use crate::channel::{ChannelPacket, Direction, RfChannel};
use crate::config::FrameConfig;
use crate::datagram::{ImgDatagram, PacketKind};
use crate::errors::TransmitError;
use crate::orbit::LinkState;

/// A seekable source of raw frames, each exactly `FRAME_BYTES` long.
/// Partial trailing frames are ignored.
pub trait RawFrameSource {
    /// Read the next frame, or `Ok(None)` at a clean end of stream.
    fn next_frame(&mut self, frame_bytes: usize) -> std::io::Result<Option<Vec<u8>>>;
}

/// In-memory frame source, useful for tests and the `--synthetic` CLI path.
pub struct MemoryFrameSource {
    frames: std::collections::VecDeque<Vec<u8>>,
}

impl MemoryFrameSource {
    pub fn new(frames: Vec<Vec<u8>>) -> Self {
        Self {
            frames: frames.into(),
        }
    }

    pub fn single(frame: Vec<u8>) -> Self {
        Self::new(vec![frame])
    }
}

impl RawFrameSource for MemoryFrameSource {
    fn next_frame(&mut self, frame_bytes: usize) -> std::io::Result<Option<Vec<u8>>> {
        match self.frames.pop_front() {
            Some(frame) if frame.len() == frame_bytes => Ok(Some(frame)),
            Some(frame) if frame.len() > frame_bytes => Ok(Some(frame[..frame_bytes].to_vec())),
            Some(_) => Ok(None), // short trailing frame, ignored
            None => Ok(None),
        }
    }
}

/// A `std::io::Read`-backed frame source, reading fixed-size frames off a
/// file (or any other reader) until a short/empty read ends the stream.
pub struct ReaderFrameSource<R> {
    reader: R,
}

impl<R: std::io::Read> ReaderFrameSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: std::io::Read> RawFrameSource for ReaderFrameSource<R> {
    fn next_frame(&mut self, frame_bytes: usize) -> std::io::Result<Option<Vec<u8>>> {
        let mut buf = vec![0u8; frame_bytes];
        let mut filled = 0;
        while filled < frame_bytes {
            let n = self.reader.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled == 0 {
            Ok(None)
        } else if filled < frame_bytes {
            Ok(None) // partial trailing frame, ignored
        } else {
            Ok(Some(buf))
        }
    }
}

/// Where transmitted datagrams go. A `crossbeam_channel::Sender` stands in
/// for the real datagram socket (no concrete transport is in scope).
pub trait DatagramSink {
    fn send(&mut self, datagram: ImgDatagram) -> Result<(), TransmitError>;
}

impl DatagramSink for crossbeam::channel::Sender<ImgDatagram> {
    fn send(&mut self, datagram: ImgDatagram) -> Result<(), TransmitError> {
        crossbeam::channel::Sender::send(self, datagram).map_err(|_| TransmitError::SinkDisconnected)
    }
}

/// Cumulative per-datagram counters, for telemetry rollups external to the
/// transmitter itself (e.g. the CLI demo's periodic link telemetry).
#[derive(Debug, Clone, Copy, Default)]
pub struct TransmitStats {
    pub attempted: u64,
    pub delivered: u64,
    pub corrupted: u64,
    pub duplicated: u64,
    /// Sum of the inter-chunk throttle (`img_chunk_delay_s`) the transmitter
    /// has scheduled so far. The transmitter itself never sleeps; a caller
    /// pacing real transmission against wall time reads this to know how
    /// much delay it should account for.
    pub scheduled_chunk_delay: std::time::Duration,
}

/// Chunks and transmits image frames through an `RfChannel`.
pub struct ImageTransmitter<S: RawFrameSource> {
    config: FrameConfig,
    source: S,
    next_frame_id: u64,
    stats: TransmitStats,
}

impl<S: RawFrameSource> ImageTransmitter<S> {
    pub fn new(config: FrameConfig, source: S) -> Self {
        Self {
            config,
            source,
            next_frame_id: 0,
            stats: TransmitStats::default(),
        }
    }

    /// Cumulative counters across every `send_next_frame` call so far.
    pub fn stats(&self) -> TransmitStats {
        self.stats
    }

    /// The pacing delay between consecutive chunks of a frame. Mirrors
    /// `RfChannel::propagation_delay`: a caller-controlled value rather than
    /// a real sleep, so chunking stays testable without wall-clock waits.
    pub fn chunk_delay(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.config.img_chunk_delay_s.max(0.0))
    }

    /// Transmit the next available frame, if visibility and downlink rate
    /// allow it. Returns `Ok(None)` if there was nothing to
    /// send this tick (not visible, zero rate, or end of raw source).
    pub fn send_next_frame(
        &mut self,
        link: LinkState,
        channel: &mut RfChannel,
        sink: &mut impl DatagramSink,
    ) -> Result<Option<u64>, TransmitError> {
        if !link.visible || link.rate_dl_mbps <= 0.0 {
            return Ok(None);
        }

        let frame_bytes = self.config.frame_bytes();
        let Some(frame) = self.source.next_frame(frame_bytes)? else {
            return Ok(None);
        };

        let frame_id = self.next_frame_id;
        self.next_frame_id += 1;

        let chunks: Vec<&[u8]> = frame.chunks(self.config.img_chunk_bytes).collect();
        let total = chunks.len();

        let chunk_delay = self.chunk_delay();

        for (idx, chunk) in chunks.into_iter().enumerate() {
            let payload_b64 = BASE64_STANDARD.encode(chunk);
            let last = idx + 1 == total;

            if idx > 0 {
                self.stats.scheduled_chunk_delay += chunk_delay;
            }

            for rep in 0..self.config.img_rep_copies as u32 {
                let datagram = ImgDatagram {
                    kind: PacketKind::Img,
                    frame_id,
                    chunk_idx: idx as u32,
                    last,
                    rep,
                    payload_b64: payload_b64.clone(),
                    corrupted: false,
                    duplicated: false,
                };

                self.stats.attempted += 1;
                if let Some(ChannelPacket::Img(delivered)) =
                    channel.propagate(datagram, link.elev_deg, Direction::Downlink)
                {
                    self.stats.delivered += 1;
                    if delivered.corrupted {
                        self.stats.corrupted += 1;
                    }
                    if delivered.duplicated {
                        self.stats.duplicated += 1;
                    }
                    sink.send(delivered)?;
                }
            }
        }

        Ok(Some(frame_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChannelConfig;

    fn perfect_channel() -> RfChannel {
        RfChannel::new(
            ChannelConfig {
                base_packet_loss: 0.0,
                base_bit_error: 0.0,
                base_duplicate: 0.0,
                burst_fade_start_prob: 0.0,
                ..ChannelConfig::default()
            },
            1,
        )
    }

    fn overhead_link() -> LinkState {
        LinkState {
            visible: true,
            elev_deg: 90.0,
            doppler_hz: 0.0,
            rate_dl_mbps: 20.0,
            rate_ul_mbps: 2.0,
            ts: 0.0,
        }
    }

    #[test]
    fn skips_transmission_when_not_visible() {
        let config = FrameConfig {
            frame_width: 4,
            frame_height: 4,
            img_chunk_bytes: 6,
            img_rep_copies: 2,
            ..FrameConfig::default()
        };
        let frame_bytes = config.frame_bytes();
        let mut tx = ImageTransmitter::new(config, MemoryFrameSource::single(vec![0u8; frame_bytes]));
        let mut channel = perfect_channel();
        let (sender, _receiver) = crossbeam::channel::unbounded::<ImgDatagram>();
        let mut sink = sender;

        let link = LinkState::not_visible(0.0);
        let result = tx.send_next_frame(link, &mut channel, &mut sink).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn emits_rep_copies_per_chunk_with_last_flag_only_on_final_chunk() {
        let config = FrameConfig {
            frame_width: 4,
            frame_height: 4,
            img_chunk_bytes: 6,
            img_rep_copies: 3,
            ..FrameConfig::default()
        };
        let frame_bytes = config.frame_bytes();
        let frame: Vec<u8> = (0..frame_bytes as u32).map(|i| (i % 256) as u8).collect();
        let mut tx = ImageTransmitter::new(config, MemoryFrameSource::single(frame));
        let mut channel = perfect_channel();
        let (sender, receiver) = crossbeam::channel::unbounded::<ImgDatagram>();
        let mut sink = sender;

        let frame_id = tx
            .send_next_frame(overhead_link(), &mut channel, &mut sink)
            .unwrap()
            .expect("frame should transmit");
        assert_eq!(frame_id, 0);
        drop(sink);

        let received: Vec<ImgDatagram> = receiver.iter().collect();
        let total_chunks = frame_bytes.div_ceil(6);
        assert_eq!(received.len(), total_chunks * 3);

        for dgram in &received {
            assert_eq!(dgram.frame_id, 0);
            let expect_last = dgram.chunk_idx as usize + 1 == total_chunks;
            assert_eq!(dgram.last, expect_last);
        }

        let last_count = received.iter().filter(|d| d.last).count();
        assert_eq!(last_count, 3); // 3 reps of the one final chunk
    }

    #[test]
    fn stats_track_attempts_and_deliveries_under_loss() {
        let config = FrameConfig {
            frame_width: 4,
            frame_height: 4,
            img_chunk_bytes: 6,
            img_rep_copies: 4,
            ..FrameConfig::default()
        };
        let frame_bytes = config.frame_bytes();
        let mut tx = ImageTransmitter::new(config, MemoryFrameSource::single(vec![0u8; frame_bytes]));

        let mut channel = RfChannel::new(
            ChannelConfig {
                base_packet_loss: 1.0,
                base_bit_error: 0.0,
                base_duplicate: 0.0,
                burst_fade_start_prob: 0.0,
                ..ChannelConfig::default()
            },
            9,
        );
        let (sender, _receiver) = crossbeam::channel::unbounded::<ImgDatagram>();
        let mut sink = sender;

        tx.send_next_frame(overhead_link(), &mut channel, &mut sink).unwrap();

        let stats = tx.stats();
        assert!(stats.attempted > 0);
        assert_eq!(stats.delivered, 0); // base_packet_loss=1.0 drops everything
    }

    #[test]
    fn scheduled_chunk_delay_accumulates_once_per_inter_chunk_gap() {
        let config = FrameConfig {
            frame_width: 4,
            frame_height: 4,
            img_chunk_bytes: 6,
            img_rep_copies: 1,
            img_chunk_delay_s: 0.1,
            ..FrameConfig::default()
        };
        let frame_bytes = config.frame_bytes();
        let total_chunks = frame_bytes.div_ceil(6);

        let mut tx = ImageTransmitter::new(config, MemoryFrameSource::single(vec![0u8; frame_bytes]));
        assert_eq!(tx.chunk_delay(), std::time::Duration::from_millis(100));

        let mut channel = perfect_channel();
        let (sender, _receiver) = crossbeam::channel::unbounded::<ImgDatagram>();
        let mut sink = sender;

        tx.send_next_frame(overhead_link(), &mut channel, &mut sink).unwrap();

        let expected = std::time::Duration::from_millis(100) * (total_chunks as u32 - 1);
        assert_eq!(tx.stats().scheduled_chunk_delay, expected);
    }
}
