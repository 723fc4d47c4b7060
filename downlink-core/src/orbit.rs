//! Link-state interface consumed from the orbit oracle.
//!
//! Real orbit geometry — visibility windows, elevation, Doppler, link-rate
//! tables — is an external collaborator and out of scope here. This module
//! only defines the snapshot shape and a couple of deterministic stand-ins
//! used to drive the transport core in tests and the CLI demo.

use serde::{Deserialize, Serialize};

/// Immutable link-state snapshot, refreshed at >= 1 Hz by the real oracle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkState {
    pub visible: bool,
    pub elev_deg: f64,
    pub doppler_hz: f64,
    pub rate_dl_mbps: f64,
    pub rate_ul_mbps: f64,
    pub ts: f64,
}

impl LinkState {
    pub const fn not_visible(ts: f64) -> Self {
        Self {
            visible: false,
            elev_deg: 0.0,
            doppler_hz: 0.0,
            rate_dl_mbps: 0.0,
            rate_ul_mbps: 0.0,
            ts,
        }
    }
}

/// A synchronous oracle the core polls for the current link state.
pub trait LinkStateSource {
    fn get_state(&self) -> LinkState;
}

/// A fixed, always-visible link state, useful for unit tests that don't
/// care about visibility windows.
#[derive(Debug, Clone, Copy)]
pub struct ConstantOrbit(pub LinkState);

impl ConstantOrbit {
    pub fn visible_overhead() -> Self {
        Self(LinkState {
            visible: true,
            elev_deg: 90.0,
            doppler_hz: 0.0,
            rate_dl_mbps: 20.0,
            rate_ul_mbps: 2.0,
            ts: 0.0,
        })
    }
}

impl LinkStateSource for ConstantOrbit {
    fn get_state(&self) -> LinkState {
        self.0
    }
}

/// A scripted sequence of link states, advanced one step per call, holding
/// the last value once exhausted. Used by the CLI demo and by tests that
/// want to exercise a changing elevation profile without a real propagator.
#[derive(Debug, Clone)]
pub struct ScriptedOrbit {
    states: Vec<LinkState>,
    cursor: std::sync::atomic::AtomicUsize,
}

impl ScriptedOrbit {
    pub fn new(states: Vec<LinkState>) -> Self {
        assert!(!states.is_empty(), "ScriptedOrbit needs at least one state");
        Self {
            states,
            cursor: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// A simple rising-then-setting elevation pass, visible throughout.
    pub fn single_pass(steps: usize, max_elev_deg: f64, rate_dl_mbps: f64) -> Self {
        let states = (0..steps)
            .map(|i| {
                let phase = i as f64 / (steps.max(1) - 1).max(1) as f64;
                let elev_deg = max_elev_deg * (std::f64::consts::PI * phase).sin().max(0.0);
                LinkState {
                    visible: true,
                    elev_deg,
                    doppler_hz: 0.0,
                    rate_dl_mbps,
                    rate_ul_mbps: rate_dl_mbps / 10.0,
                    ts: i as f64,
                }
            })
            .collect();
        Self::new(states)
    }
}

impl LinkStateSource for ScriptedOrbit {
    fn get_state(&self) -> LinkState {
        use std::sync::atomic::Ordering;
        let idx = self.cursor.load(Ordering::Relaxed);
        let state = self.states[idx.min(self.states.len() - 1)];
        if idx + 1 < self.states.len() {
            self.cursor.store(idx + 1, Ordering::Relaxed);
        }
        state
    }
}

/// One overhead pass: visible for `[start_ts, end_ts)`, elevation rising to
/// `peak_elev_deg` at the window's midpoint and falling back to zero at its
/// edges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibilityWindow {
    pub start_ts: f64,
    pub end_ts: f64,
    pub peak_elev_deg: f64,
}

impl VisibilityWindow {
    fn contains(&self, ts: f64) -> bool {
        ts >= self.start_ts && ts < self.end_ts
    }

    fn elev_deg_at(&self, ts: f64) -> f64 {
        let span = (self.end_ts - self.start_ts).max(1e-9);
        let phase = (ts - self.start_ts) / span;
        self.peak_elev_deg * (std::f64::consts::PI * phase).sin().max(0.0)
    }
}

/// Orbit stand-in driven by a fixed table of visibility windows rather than
/// a literal state-per-tick script. Each call advances an internal virtual
/// clock by `dt_s` and reports whichever window (if any) contains the
/// current time, so a mission timeline expressed as a handful of pass
/// windows drives the CLI demo and tests without per-tick authoring.
#[derive(Debug)]
pub struct OrbitOracle {
    windows: Vec<VisibilityWindow>,
    dt_s: f64,
    rate_dl_mbps: f64,
    rate_ul_mbps: f64,
    clock: std::sync::Mutex<f64>,
}

impl OrbitOracle {
    pub fn new(windows: Vec<VisibilityWindow>, dt_s: f64, rate_dl_mbps: f64, rate_ul_mbps: f64) -> Self {
        Self {
            windows,
            dt_s,
            rate_dl_mbps,
            rate_ul_mbps,
            clock: std::sync::Mutex::new(0.0),
        }
    }

    fn window_at(&self, ts: f64) -> Option<VisibilityWindow> {
        self.windows.iter().find(|w| w.contains(ts)).copied()
    }
}

impl LinkStateSource for OrbitOracle {
    fn get_state(&self) -> LinkState {
        let ts = {
            let mut clock = self.clock.lock().expect("orbit clock poisoned");
            let ts = *clock;
            *clock += self.dt_s;
            ts
        };

        match self.window_at(ts) {
            Some(window) => LinkState {
                visible: true,
                elev_deg: window.elev_deg_at(ts),
                doppler_hz: 0.0,
                rate_dl_mbps: self.rate_dl_mbps,
                rate_ul_mbps: self.rate_ul_mbps,
                ts,
            },
            None => LinkState::not_visible(ts),
        }
    }
}
