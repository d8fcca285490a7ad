use anyhow::Context;
use crossbeam_channel::{Receiver, Sender};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::audio_api::{AudioCommand, EngineSnapshot};
use crate::pipeline::config::LooperConfig;

mod buffer;
mod clip;
mod clip_bank;
mod clock;
mod engine;
mod scheduler;
mod slot;
mod transport;

pub use buffer::AudioBuffer;
pub use clip::Clip;
pub use clip_bank::{ClipBank, ClipIndex};
pub use clock::InternalClock;
pub use engine::{BlockReport, RenderEngine};
pub use scheduler::{EnqueueOutcome, QuantizedScheduler, StartRequest};
pub use slot::{Slot, SlotState};
pub use transport::{samples_to_next_bar, HostPhase, HostPosition, TransportTracker};

const COMMAND_QUEUE: usize = 1024;
const SNAPSHOT_QUEUE: usize = 64;
const RETIRED_QUEUE: usize = 4;

pub struct AudioHandle {
    tx: Sender<AudioCommand>,
    snapshot_rx: Receiver<EngineSnapshot>,
    retired_rx: Receiver<ClipBank>,
    sample_rate: u32,
    _output_stream: cpal::Stream,
}

impl AudioHandle {
    pub fn send(&self, cmd: AudioCommand) {
        if self.tx.try_send(cmd).is_err() {
            log::warn!("audio command queue full, dropping command");
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn poll_snapshot(&self) -> Option<EngineSnapshot> {
        self.snapshot_rx.try_iter().last()
    }

    // Banks retired by a swap are freed here, on the caller's thread.
    pub fn collect_retired(&self) -> usize {
        self.retired_rx.try_iter().count()
    }
}

pub fn start_audio(config: &LooperConfig) -> anyhow::Result<AudioHandle> {
    let (tx, rx) = crossbeam_channel::bounded::<AudioCommand>(COMMAND_QUEUE);
    let (snapshot_tx, snapshot_rx) = crossbeam_channel::bounded::<EngineSnapshot>(SNAPSHOT_QUEUE);
    let (retired_tx, retired_rx) = crossbeam_channel::bounded::<ClipBank>(RETIRED_QUEUE);

    let host = cpal::default_host();
    let device = host.default_output_device().context("no default output device")?;
    let supported = device.default_output_config().context("no default output config")?;

    let sample_rate = supported.sample_rate();
    let channels = supported.channels() as usize;
    log::info!("output device ready: {} Hz, {} channels", sample_rate, channels);

    match supported.sample_format() {
        cpal::SampleFormat::F32 => {
            let engine = RenderEngine::new(config.num_slots, config.queue_capacity, sample_rate as f64);
            let clock = InternalClock::new(
                sample_rate as f64,
                config.bpm,
                config.numerator,
                config.denominator,
            );
            let channels_out = OutputChannels {
                commands: rx,
                snapshots: snapshot_tx,
                retired: retired_tx,
            };
            let output_stream = build_output_stream_f32(
                &device,
                &supported.into(),
                engine,
                clock,
                channels_out,
                channels,
                config.max_block_size,
            )?;
            output_stream.play().context("failed to play output stream")?;

            Ok(AudioHandle {
                tx,
                snapshot_rx,
                retired_rx,
                sample_rate,
                _output_stream: output_stream,
            })
        }
        other => anyhow::bail!("unsupported sample format {other:?} (only f32 supported for now)"),
    }
}

struct OutputChannels {
    commands: Receiver<AudioCommand>,
    snapshots: Sender<EngineSnapshot>,
    retired: Sender<ClipBank>,
}

fn build_output_stream_f32(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut engine: RenderEngine,
    mut clock: InternalClock,
    io: OutputChannels,
    channels: usize,
    max_block_size: usize,
) -> anyhow::Result<cpal::Stream> {
    let max_block_size = max_block_size.max(1);
    // Allocated once here; the callback only ever writes into it.
    let mut scratch = AudioBuffer::new(channels.max(1), max_block_size);

    let err_fn = |err| log::error!("audio output stream error: {err}");

    let stream = device.build_output_stream(
        config,
        move |data: &mut [f32], _info| {
            // Single drain point: anything arriving later waits for the next callback.
            while let Ok(cmd) = io.commands.try_recv() {
                match cmd {
                    AudioCommand::Transport(t) => clock.apply(t),
                    other => {
                        if let Some(old) = engine.handle_cmd(other) {
                            let _ = io.retired.try_send(old);
                        }
                    }
                }
            }

            for chunk in data.chunks_mut(max_block_size * channels) {
                let frames = chunk.len() / channels;
                let pos = clock.position();
                engine.process(&mut scratch, frames, Some(&pos));
                clock.advance(frames);
                scratch.write_interleaved(chunk, channels, frames);
            }

            let _ = io.snapshots.try_send(engine.snapshot());
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}
