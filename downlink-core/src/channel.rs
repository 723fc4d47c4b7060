//! RF channel model.
//!
//! A pure stateful transformer of a datagram into `None` (dropped) or
//! `Some(delivered)`, with one piece of persistent state: a fade counter.
//! Ported from the original LEO simulation's `rf_channel_leo.py::propagate`,
//! generalized so the caller supplies the propagation delay as a value
//! instead of this module calling `thread::sleep` directly, which keeps the
//! loss/BER/fade math testable without real wall time.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::ChannelConfig;
use crate::datagram::{ImgDatagram, PacketKind, TcDatagram, TmDatagram};

const BASE64_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Uplink vs downlink; uplink carries its own loss/BER multipliers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Downlink,
    Uplink,
}

/// Any datagram the channel model can propagate. `Img` is the only variant
/// whose payload is actually mutated on corruption; `Tm`/`Tc` only carry the
/// `corrupted`/`duplicated` flags, matching the original `propagate()`'s
/// `dict`-shaped packets.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelPacket {
    Img(ImgDatagram),
    Tm(TmDatagram),
    Tc(TcDatagram),
}

impl ChannelPacket {
    pub fn kind(&self) -> PacketKind {
        match self {
            ChannelPacket::Img(_) => PacketKind::Img,
            ChannelPacket::Tm(_) => PacketKind::Tm,
            ChannelPacket::Tc(_) => PacketKind::Tc,
        }
    }

    fn set_corrupted(&mut self, value: bool) {
        match self {
            ChannelPacket::Img(p) => p.corrupted = value,
            ChannelPacket::Tm(p) => p.corrupted = value,
            ChannelPacket::Tc(p) => p.corrupted = value,
        }
    }

    fn set_duplicated(&mut self, value: bool) {
        match self {
            ChannelPacket::Img(p) => p.duplicated = value,
            ChannelPacket::Tm(p) => p.duplicated = value,
            ChannelPacket::Tc(p) => p.duplicated = value,
        }
    }
}

impl From<ImgDatagram> for ChannelPacket {
    fn from(p: ImgDatagram) -> Self {
        ChannelPacket::Img(p)
    }
}

impl From<TmDatagram> for ChannelPacket {
    fn from(p: TmDatagram) -> Self {
        ChannelPacket::Tm(p)
    }
}

impl From<TcDatagram> for ChannelPacket {
    fn from(p: TcDatagram) -> Self {
        ChannelPacket::Tc(p)
    }
}

/// `Clear -> Fading(n_remaining) -> Clear` state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FadeState {
    Clear,
    Fading { remaining: u32 },
}

/// Owns a seedable PRNG and a persistent fade counter. Must not be shared
/// across transmitters without its own guard — wrap in a `Mutex` at the
/// call site if concurrent access is required.
pub struct RfChannel {
    config: ChannelConfig,
    rng: ChaCha8Rng,
    fade: FadeState,
}

impl RfChannel {
    pub fn new(config: ChannelConfig, seed: u64) -> Self {
        Self {
            config,
            rng: ChaCha8Rng::seed_from_u64(seed),
            fade: FadeState::Clear,
        }
    }

    pub fn with_default_config(seed: u64) -> Self {
        Self::new(ChannelConfig::default(), seed)
    }

    /// Whether a fade burst is currently in progress. Exposed for
    /// telemetry rollups; has no effect on `propagate`'s own behavior.
    pub fn fade_active(&self) -> bool {
        matches!(self.fade, FadeState::Fading { .. })
    }

    /// Link quality `q` in `[0, 1]`, zero outside the visibility window.
    fn link_quality(&self, elev_deg: f64) -> f64 {
        if elev_deg <= self.config.elev_mask_deg {
            return 0.0;
        }
        let q = (elev_deg - self.config.elev_mask_deg) / (90.0 - self.config.elev_mask_deg);
        q.clamp(0.0, 1.0)
    }

    /// The propagation delay this packet should incur before transmission
    /// (shorter for `IMG` so frames complete in bounded wall time). Callers
    /// decide whether to actually sleep.
    pub fn propagation_delay(&self, kind: PacketKind) -> std::time::Duration {
        let secs = if kind == PacketKind::Img {
            self.config.img_propagation_delay_s
        } else {
            self.config.propagation_delay_s
        };
        std::time::Duration::from_secs_f64(secs.max(0.0))
    }

    /// Run one packet through the channel model. Returns `None` if the
    /// packet was dropped (fade or independent loss); otherwise returns the
    /// (possibly corrupted/duplicated) delivered packet.
    pub fn propagate(
        &mut self,
        packet: impl Into<ChannelPacket>,
        elev_deg: f64,
        direction: Direction,
    ) -> Option<ChannelPacket> {
        let mut packet = packet.into();
        let q = self.link_quality(elev_deg);

        // Fade state machine.
        if let FadeState::Fading { remaining } = self.fade {
            let remaining = remaining.saturating_sub(1);
            self.fade = if remaining == 0 {
                FadeState::Clear
            } else {
                FadeState::Fading { remaining }
            };
            return None;
        }

        let fade_start = self.config.burst_fade_start_prob * (1.0 + (1.0 - q) * 3.0);
        if self.rng.gen::<f64>() < fade_start {
            self.fade = FadeState::Fading {
                remaining: self.config.burst_fade_length_pkts,
            };
            return None;
        }

        // Independent loss.
        let mut loss_p = self.config.base_packet_loss * (1.0 - q).powf(1.6);
        if direction == Direction::Uplink {
            loss_p *= 1.15;
        }
        if self.rng.gen::<f64>() < loss_p {
            return None;
        }

        // Bit-error corruption.
        let mut ber_p = self.config.base_bit_error * (1.0 - q).powf(2.0);
        if direction == Direction::Uplink {
            ber_p *= 1.10;
        }
        let corrupted = self.rng.gen::<f64>() < ber_p;
        packet.set_corrupted(corrupted);

        if corrupted {
            if let ChannelPacket::Img(img) = &mut packet {
                let severity = 0.3 + (1.0 - q) * 0.7;
                corrupt_base64_payload(&mut img.payload_b64, severity, &mut self.rng);
            }
        }

        // Duplicate flag; delivering the duplicate is the transport's concern.
        let dup_p = self.config.base_duplicate * (2.0 - q);
        packet.set_duplicated(self.rng.gen::<f64>() < dup_p);

        Some(packet)
    }
}

/// Flip `max(1, floor(n * 0.002 * severity))` random characters of a
/// base64 string to another character from the alphabet, simulating symbol
/// errors after demodulation.
fn corrupt_base64_payload(payload: &mut String, severity: f64, rng: &mut impl Rng) {
    if payload.is_empty() {
        return;
    }
    let mut chars: Vec<u8> = payload.clone().into_bytes();
    let n = chars.len();
    let flips = ((n as f64) * 0.002 * severity).floor().max(1.0) as usize;

    for _ in 0..flips {
        let i = rng.gen_range(0..n);
        let c = BASE64_ALPHABET[rng.gen_range(0..BASE64_ALPHABET.len())];
        chars[i] = c;
    }
    *payload = String::from_utf8(chars).expect("base64 alphabet is valid ASCII/UTF-8");
}
