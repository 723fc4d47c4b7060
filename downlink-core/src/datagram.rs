//! Wire datagram shapes.
//!
//! `ImgDatagram` is the only type the reassembler and transmitter actually
//! round-trip. `TmDatagram`/`TcDatagram` exist so the channel model's
//! per-type dispatch and uplink multipliers have real non-`IMG` callers to
//! exercise, matching the original satellite node's mixed traffic on the
//! same link; their own payload semantics (telemetry generation, telecommand
//! execution) are out of scope.

use serde::{Deserialize, Serialize};

/// One replicated chunk of an image frame, as carried over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImgDatagram {
    #[serde(rename = "type")]
    pub kind: PacketKind,
    pub frame_id: u64,
    pub chunk_idx: u32,
    pub last: bool,
    pub rep: u32,
    pub payload_b64: String,
    #[serde(default)]
    pub corrupted: bool,
    #[serde(default)]
    pub duplicated: bool,
}

/// Housekeeping telemetry datagram. Payload content is a placeholder; the
/// telemetry generator itself is out of scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TmDatagram {
    #[serde(rename = "type")]
    pub kind: PacketKind,
    pub seq: u32,
    pub ts: f64,
    pub elev_deg: f64,
    pub doppler_hz: f64,
    pub visible: bool,
    pub payload_len: usize,
    #[serde(default)]
    pub corrupted: bool,
    #[serde(default)]
    pub duplicated: bool,
}

/// Telecommand datagram. Queueing/execution is out of scope; this type only
/// exists so `Direction::Uplink` has a real caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TcDatagram {
    #[serde(rename = "type")]
    pub kind: PacketKind,
    pub cmd: String,
    pub ts: f64,
    #[serde(default)]
    pub corrupted: bool,
    #[serde(default)]
    pub duplicated: bool,
}

/// Discriminator carried in every datagram's `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PacketKind {
    #[serde(rename = "IMG")]
    Img,
    #[serde(rename = "TM")]
    Tm,
    #[serde(rename = "TC")]
    Tc,
}
