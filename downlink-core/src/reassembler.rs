//! Image reassembler.
//!
//! Single ingestion entry point, `push`, guarded by one mutex covering both
//! the chunk map and `last_idx`. Ported from `bbu_leo.py::ImageReassembler`,
//! generalized so the reassembly clock is a caller-supplied `Instant` rather
//! than `time.time()`, which lets timeout eviction be tested without
//! sleeping.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use base64::alphabet;
use base64::engine::general_purpose::{DecodePaddingMode, GeneralPurposeConfig};
use base64::engine::GeneralPurpose;
use base64::Engine as _;

use crate::config::ReassemblyConfig;
use crate::datagram::ImgDatagram;
use crate::logging::DownlinkLogger;

struct ChunkState {
    reps: HashMap<u32, Vec<u8>>,
}

impl ChunkState {
    fn new() -> Self {
        Self {
            reps: HashMap::new(),
        }
    }
}

struct FrameState {
    chunks: HashMap<u32, ChunkState>,
    last_idx: Option<u32>,
    t0: Instant,
}

impl FrameState {
    fn new(now: Instant) -> Self {
        Self {
            chunks: HashMap::new(),
            last_idx: None,
            t0: now,
        }
    }

    fn is_complete(&self) -> Option<u32> {
        let last_idx = self.last_idx?;
        if (0..=last_idx).all(|i| self.chunks.contains_key(&i)) {
            Some(last_idx)
        } else {
            None
        }
    }
}

/// A frame evicted by the garbage-collection sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictedFrame {
    pub frame_id: u64,
    pub chunks_received: usize,
}

/// Builds a lenient (non-strict) base64 engine: tolerates padding variation
/// and accepts trailing bits, so a corrupted replica's payload decodes to
/// whatever bytes it can rather than failing outright.
fn lenient_base64() -> GeneralPurpose {
    let config = GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true);
    GeneralPurpose::new(&alphabet::STANDARD, config)
}

fn decode_payload(payload_b64: &str) -> Vec<u8> {
    lenient_base64().decode(payload_b64).unwrap_or_default()
}

/// Byte-wise majority vote across replicas, truncated to the shortest
/// replica. Ties broken by lowest byte value.
pub fn majority_vote_bytes(reps: &[Vec<u8>]) -> Vec<u8> {
    if reps.is_empty() {
        return Vec::new();
    }
    if reps.len() == 1 {
        return reps[0].clone();
    }

    let m = reps.iter().map(|r| r.len()).min().unwrap_or(0);
    let mut out = vec![0u8; m];

    for i in 0..m {
        let mut counts = [0u32; 256];
        for rep in reps {
            counts[rep[i] as usize] += 1;
        }
        let mut best_byte = 0u8;
        let mut best_count = 0u32;
        for (byte, &count) in counts.iter().enumerate() {
            if count > best_count {
                best_count = count;
                best_byte = byte as u8;
            }
        }
        out[i] = best_byte;
    }
    out
}

/// Stores multiple replicas per chunk and reassembles a frame once every
/// chunk index up to the `last`-flagged one has at least one replica.
pub struct ImageReassembler {
    frames: std::sync::Mutex<HashMap<u64, FrameState>>,
    max_age: Duration,
}

impl ImageReassembler {
    pub fn new(config: ReassemblyConfig) -> Self {
        Self {
            frames: std::sync::Mutex::new(HashMap::new()),
            max_age: Duration::from_secs_f64(config.reassembly_timeout_s.max(0.0)),
        }
    }

    /// Parse a JSON-encoded `ImgDatagram` and push it. Discards silently on
    /// any parse failure rather than blocking the rest of the frame.
    pub fn push_json(&self, raw: &[u8]) -> Option<(u64, Vec<u8>, Vec<u8>)> {
        let datagram: ImgDatagram = serde_json::from_slice(raw).ok()?;
        self.push(datagram)
    }

    /// Push an already-typed datagram, using the current time for GC
    /// bookkeeping.
    pub fn push(&self, datagram: ImgDatagram) -> Option<(u64, Vec<u8>, Vec<u8>)> {
        self.push_at(datagram, Instant::now())
    }

    /// Push an already-typed datagram at a caller-supplied instant (tests
    /// use this to simulate elapsed time without sleeping).
    pub fn push_at(&self, datagram: ImgDatagram, now: Instant) -> Option<(u64, Vec<u8>, Vec<u8>)> {
        let data = decode_payload(&datagram.payload_b64);
        let frame_id = datagram.frame_id;

        let mut frames = self.frames.lock().expect("reassembly mutex poisoned");

        let frame = frames.entry(frame_id).or_insert_with(|| FrameState::new(now));
        let chunk = frame
            .chunks
            .entry(datagram.chunk_idx)
            .or_insert_with(ChunkState::new);
        chunk.reps.insert(datagram.rep, data);

        if datagram.last {
            frame.last_idx = Some(datagram.chunk_idx);
        }

        let complete_last_idx = frame.is_complete();

        match complete_last_idx {
            Some(last_idx) => {
                let frame = frames.remove(&frame_id).expect("frame present under lock");
                drop(frames);
                let (noisy, fixed) = Self::build_outputs(&frame, last_idx);
                Some((frame_id, noisy, fixed))
            }
            None => None,
        }
    }

    /// Same as `push_at`, but additionally runs the opportunistic GC sweep
    /// on a non-completing push, logs each eviction, and returns them so the
    /// caller can report real timeout counts instead of discarding them.
    pub fn push_logged(
        &self,
        datagram: ImgDatagram,
        now: Instant,
        logger: &mut DownlinkLogger,
    ) -> (Option<(u64, Vec<u8>, Vec<u8>)>, Vec<EvictedFrame>) {
        let result = self.push_at(datagram, now);
        let evicted = if result.is_none() {
            let evicted = self.sweep_at(now);
            for frame in &evicted {
                logger.warn(
                    "GC",
                    format!(
                        "drop incomplete frame={} (timeout), chunks_received={}",
                        frame.frame_id, frame.chunks_received
                    ),
                );
            }
            evicted
        } else {
            Vec::new()
        };
        (result, evicted)
    }

    /// Evict any frame whose first datagram is older than `max_age_s`
    /// relative to `now`. Eviction is not retried.
    pub fn sweep_at(&self, now: Instant) -> Vec<EvictedFrame> {
        let mut frames = self.frames.lock().expect("reassembly mutex poisoned");
        let expired: Vec<u64> = frames
            .iter()
            .filter(|(_, state)| now.saturating_duration_since(state.t0) > self.max_age)
            .map(|(&id, _)| id)
            .collect();

        expired
            .into_iter()
            .map(|frame_id| {
                let state = frames.remove(&frame_id).expect("frame present under lock");
                EvictedFrame {
                    frame_id,
                    chunks_received: state.chunks.len(),
                }
            })
            .collect()
    }

    /// Number of in-flight (incomplete) frames currently tracked.
    pub fn pending_count(&self) -> usize {
        self.frames.lock().expect("reassembly mutex poisoned").len()
    }

    fn build_outputs(frame: &FrameState, last_idx: u32) -> (Vec<u8>, Vec<u8>) {
        let mut noisy = Vec::new();
        let mut fixed = Vec::new();

        for idx in 0..=last_idx {
            let chunk = frame.chunks.get(&idx).expect("completeness already checked");

            let noisy_chunk = chunk
                .reps
                .get(&0)
                .cloned()
                .unwrap_or_else(|| chunk.reps.values().next().cloned().unwrap_or_default());
            noisy.extend_from_slice(&noisy_chunk);

            let all_reps: Vec<Vec<u8>> = chunk.reps.values().cloned().collect();
            let fixed_chunk = majority_vote_bytes(&all_reps);
            fixed.extend_from_slice(&fixed_chunk);
        }

        (noisy, fixed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datagram::PacketKind;
    use base64::engine::general_purpose::STANDARD;

    fn dgram(frame_id: u64, chunk_idx: u32, last: bool, rep: u32, payload: &[u8]) -> ImgDatagram {
        ImgDatagram {
            kind: PacketKind::Img,
            frame_id,
            chunk_idx,
            last,
            rep,
            payload_b64: STANDARD.encode(payload),
            corrupted: false,
            duplicated: false,
        }
    }

    #[test]
    fn completes_exactly_once_for_any_replica_interleaving() {
        let reasm = ImageReassembler::new(ReassemblyConfig::default());
        let now = Instant::now();

        let mut completions = 0;
        // chunk 0: 2 reps, chunk 1 (last): 2 reps, interleaved arrival order.
        let pushes = [
            dgram(1, 1, true, 0, b"BBBBBB"),
            dgram(1, 0, false, 0, b"AAAAAA"),
            dgram(1, 0, false, 1, b"AAAAAA"),
            dgram(1, 1, true, 1, b"BBBBBB"),
        ];

        let mut last_result = None;
        for d in pushes {
            if let Some(result) = reasm.push_at(d, now) {
                completions += 1;
                last_result = Some(result);
            }
        }

        assert_eq!(completions, 1);
        let (frame_id, noisy, fixed) = last_result.unwrap();
        assert_eq!(frame_id, 1);
        assert_eq!(noisy.len(), fixed.len());
        assert_eq!(noisy, b"AAAAAABBBBBB");
        assert_eq!(fixed, b"AAAAAABBBBBB");
    }

    #[test]
    fn majority_vote_corrects_minority_corruption() {
        let clean = b"HELLO WORLD!";
        let mut corrupt_a = clean.to_vec();
        corrupt_a[0] = b'X';
        let mut corrupt_b = clean.to_vec();
        corrupt_b[5] = b'Y';

        let reps = vec![clean.to_vec(), corrupt_a, corrupt_b];
        let fixed = majority_vote_bytes(&reps);
        assert_eq!(fixed, clean);
    }

    #[test]
    fn majority_vote_ties_break_on_lowest_byte() {
        let reps = vec![vec![5u8], vec![2u8]];
        assert_eq!(majority_vote_bytes(&reps), vec![2u8]);
    }

    #[test]
    fn majority_vote_truncates_to_shortest_replica() {
        let reps = vec![vec![1, 2, 3, 4], vec![1, 2, 3]];
        assert_eq!(majority_vote_bytes(&reps), vec![1, 2, 3]);
    }

    #[test]
    fn idempotent_replica_overwrite() {
        let reasm = ImageReassembler::new(ReassemblyConfig::default());
        let now = Instant::now();

        reasm.push_at(dgram(2, 0, true, 0, b"FIRST!"), now);
        let pending_after_first = reasm.pending_count();

        let result = reasm.push_at(dgram(2, 0, true, 0, b"FIRST!"), now);
        assert!(result.is_some());
        assert_eq!(pending_after_first, 1);
    }

    #[test]
    fn malformed_replica_is_discarded_without_blocking_others() {
        let reasm = ImageReassembler::new(ReassemblyConfig::default());
        let now = Instant::now();

        // Missing required fields -> not valid JSON for ImgDatagram.
        let bad = br#"{"type":"IMG","frame_id":"not a number"}"#;
        assert!(reasm.push_json(bad).is_none());

        // A well-formed replica for the same frame still completes normally.
        let result = reasm.push_at(dgram(3, 0, true, 0, b"OK"), now);
        assert!(result.is_some());
    }

    #[test]
    fn timeout_eviction_reclaims_partial_frame() {
        let config = ReassemblyConfig {
            reassembly_timeout_s: 900.0,
        };
        let reasm = ImageReassembler::new(config);
        let t0 = Instant::now();

        // Send everything except the final chunk.
        reasm.push_at(dgram(9, 0, false, 0, b"AAAAAA"), t0);
        assert_eq!(reasm.pending_count(), 1);

        let later = t0 + Duration::from_secs(901);
        let evicted = reasm.sweep_at(later);
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].frame_id, 9);
        assert_eq!(reasm.pending_count(), 0);

        // A new frame with the same id starts fresh afterward.
        let result = reasm.push_at(dgram(9, 0, true, 0, b"BBBBBB"), later);
        assert!(result.is_some());
    }

    #[test]
    fn push_logged_reports_evictions_alongside_completions() {
        let config = ReassemblyConfig {
            reassembly_timeout_s: 900.0,
        };
        let reasm = ImageReassembler::new(config);
        let mut logger = DownlinkLogger::default();
        let t0 = Instant::now();

        // Partial frame, never completes.
        let (result, evicted) = reasm.push_logged(dgram(10, 0, false, 0, b"AAAAAA"), t0, &mut logger);
        assert!(result.is_none());
        assert!(evicted.is_empty()); // not stale yet

        let later = t0 + Duration::from_secs(901);
        let (result, evicted) = reasm.push_logged(dgram(11, 0, false, 0, b"BBBBBB"), later, &mut logger);
        assert!(result.is_none());
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].frame_id, 10);
        assert!(!logger.entries_for_subsystem("GC").is_empty());
    }

    #[test]
    fn base64_decode_failure_yields_empty_bytes_not_a_dropped_replica() {
        let reasm = ImageReassembler::new(ReassemblyConfig::default());
        let now = Instant::now();

        let mut bad = dgram(4, 0, true, 0, b"");
        bad.payload_b64 = "not valid base64 at all!!".to_string();

        let result = reasm.push_at(bad, now);
        let (_, noisy, fixed) = result.expect("still completes even though payload decodes empty");
        assert!(noisy.is_empty());
        assert!(fixed.is_empty());
    }
}
