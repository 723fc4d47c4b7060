mod config;
mod logging;
mod telemetry;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::{Context, Result};

use downlink_core::channel::RfChannel;
use downlink_core::decode_frame;
use downlink_core::logging::DownlinkLogger;
use downlink_core::orbit::{LinkStateSource, ScriptedOrbit};
use downlink_core::reassembler::{EvictedFrame, ImageReassembler};
use downlink_core::transmitter::{ImageTransmitter, MemoryFrameSource, ReaderFrameSource, TransmitStats};

use config::DownlinkScenario;
use logging::{FrameCompleteEvent, LogEvent, StatisticsEvent, StructuredLogger};
use telemetry::LinkTelemetryAggregator;

#[derive(Parser, Debug)]
#[command(author, version, about = "LEO satellite image downlink simulator", long_about = None)]
struct Cli {
    /// Path to TOML scenario configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Path to a raw 12-bit-packed image file to transmit, read frame by
    /// frame; if omitted, a deterministic synthetic frame is generated.
    #[arg(short, long)]
    raw_file: Option<PathBuf>,

    /// Enable verbose diagnostic output
    #[arg(short, long)]
    verbose: bool,
}

/// Deterministic synthetic frame for demo runs with no raw file: a ramp
/// pattern so the reassembled image is trivially checkable by eye.
fn synthetic_frame(width: usize, height: usize) -> Vec<u8> {
    let need = (width * height * 12) / 8;
    (0..need).map(|i| (i % 256) as u8).collect()
}

/// Messages the transmitter thread reports back to the main thread.
enum TxEvent {
    Stats(TransmitStats),
    FadeActivated,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Cli::parse();

    let scenario = match &args.config {
        Some(path) => {
            DownlinkScenario::from_file(path).wrap_err_with(|| format!("Failed to load scenario from {}", path))?
        }
        None => DownlinkScenario::default(),
    };

    let mut logger = StructuredLogger::new(scenario.terminal.logging.clone())?;

    logger.log(LogEvent::Info {
        message: format!(
            "downlink demo starting: {} pass(es) of {} steps, seed={}",
            scenario.terminal.pass_count, scenario.terminal.steps_per_pass, scenario.terminal.seed
        ),
    })?;

    if let Some(dir) = &scenario.terminal.output_dir {
        std::fs::create_dir_all(dir).wrap_err("failed to create output directory")?;
    }

    let (dgram_tx, dgram_rx) = crossbeam::channel::unbounded();
    let (completion_tx, completion_rx) = crossbeam::channel::unbounded();
    let (event_tx, event_rx) = crossbeam::channel::unbounded();
    let (eviction_tx, eviction_rx) = crossbeam::channel::unbounded::<EvictedFrame>();

    let tx_channel_config = scenario.channel;
    let tx_frame_config = scenario.frame;
    let tx_seed = scenario.terminal.seed;
    let pass_count = scenario.terminal.pass_count;
    let steps_per_pass = scenario.terminal.steps_per_pass;
    let max_elev_deg = scenario.terminal.max_elev_deg;
    let rate_dl_mbps = scenario.terminal.rate_dl_mbps;
    let raw_file = args.raw_file.clone();

    let transmitter_handle = std::thread::spawn(move || -> Result<()> {
        let mut channel = RfChannel::new(tx_channel_config, tx_seed);
        let mut dgram_tx = dgram_tx;

        for _ in 0..pass_count {
            let orbit = ScriptedOrbit::single_pass(steps_per_pass, max_elev_deg, rate_dl_mbps);

            let source: Box<dyn downlink_core::transmitter::RawFrameSource> = match &raw_file {
                Some(path) => {
                    let file = std::fs::File::open(path)?;
                    Box::new(ReaderFrameSource::new(file))
                }
                None => Box::new(MemoryFrameSource::single(synthetic_frame(
                    tx_frame_config.frame_width,
                    tx_frame_config.frame_height,
                ))),
            };
            let mut tx = ImageTransmitter::new(tx_frame_config, source);

            for _ in 0..steps_per_pass {
                let link = orbit.get_state();
                let was_fading = channel.fade_active();

                let _ = tx.send_next_frame(link, &mut channel, &mut dgram_tx);

                if !was_fading && channel.fade_active() {
                    let _ = event_tx.send(TxEvent::FadeActivated);
                }
                let _ = event_tx.send(TxEvent::Stats(tx.stats()));
            }
        }

        Ok(())
    });

    let reassembler = Arc::new(ImageReassembler::new(scenario.reassembly));
    let worker_count = 2usize;
    let mut worker_handles = Vec::with_capacity(worker_count);
    for _ in 0..worker_count {
        let reassembler = Arc::clone(&reassembler);
        let dgram_rx = dgram_rx.clone();
        let completion_tx = completion_tx.clone();
        let eviction_tx = eviction_tx.clone();
        worker_handles.push(std::thread::spawn(move || {
            let mut gc_logger = DownlinkLogger::default();
            for datagram in dgram_rx.iter() {
                let (result, evicted) =
                    reassembler.push_logged(datagram, std::time::Instant::now(), &mut gc_logger);
                for frame in evicted {
                    if eviction_tx.send(frame).is_err() {
                        break;
                    }
                }
                if let Some(result) = result {
                    if completion_tx.send(result).is_err() {
                        break;
                    }
                }
            }
        }));
    }
    drop(completion_tx);
    drop(dgram_rx);
    drop(eviction_tx);

    let mut telemetry = LinkTelemetryAggregator::new(scenario.terminal.telemetry_interval_secs);
    for event in event_rx.iter() {
        match event {
            TxEvent::Stats(stats) => telemetry.observe_stats(stats),
            TxEvent::FadeActivated => telemetry.record_fade_activation(),
        }
        if let Some(sample) = telemetry.sample() {
            logger.log(LogEvent::Telemetry(sample))?;
        }
    }

    let mut frames_completed = 0usize;
    let codec_config = scenario.codec;
    let frame_config = scenario.frame;
    let output_dir = scenario.terminal.output_dir.clone();

    for (frame_id, noisy, fixed) in completion_rx.iter() {
        frames_completed += 1;
        let corrected_bytes = noisy.iter().zip(fixed.iter()).filter(|(a, b)| a != b).count();

        logger.log(LogEvent::FrameComplete(FrameCompleteEvent {
            timestamp: chrono::Utc::now(),
            frame_id,
            noisy_bytes: noisy.len(),
            fixed_bytes: fixed.len(),
            corrected_bytes,
        }))?;

        if let Ok(image) = decode_frame(&fixed, &frame_config, &codec_config) {
            if args.verbose {
                logger.log(LogEvent::Info {
                    message: format!("frame {} decoded to {:?} pixel grid", frame_id, image.dim()),
                })?;
            }
        }

        if let Some(dir) = &output_dir {
            let path = dir.join(format!("frame_{:06}.bin", frame_id));
            std::fs::write(path, &fixed).wrap_err("failed to write reassembled frame")?;
        }
    }

    for handle in worker_handles {
        let _ = handle.join();
    }
    transmitter_handle
        .join()
        .map_err(|_| color_eyre::eyre::eyre!("transmitter thread panicked"))??;

    let mut frames_timed_out = 0usize;
    for frame in eviction_rx.iter() {
        frames_timed_out += 1;
        logger.log(LogEvent::Warn {
            message: format!(
                "frame {} dropped (reassembly timeout), {} chunk(s) received",
                frame.frame_id, frame.chunks_received
            ),
        })?;
    }

    let (drop_summary, corruption_summary) = telemetry.compute_statistics();
    logger.log(LogEvent::Statistics(StatisticsEvent {
        timestamp: chrono::Utc::now(),
        duration_secs: logger.elapsed(),
        drop_rate: drop_summary,
        corruption_rate: corruption_summary,
        frames_completed,
        frames_timed_out,
    }))?;

    Ok(())
}
