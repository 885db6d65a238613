//! Test helpers and fixtures for cadenza integration tests
//!
//! ## Tolerance Levels
//!
//! Use the appropriate tolerance from [`tolerances`] module:
//! - `FLOAT_EPSILON` (1e-6): Exact operations (passthrough, routing)
//! - `SILENCE_THRESHOLD` (0.0001): Silence detection (-80dB)
//! - `INT16_EPSILON`: one 16-bit quantization step

#![allow(dead_code)]

pub mod tolerances;

use std::sync::Arc;

use cadenza::prelude::*;

/// Default test sample rate (matches common hardware)
pub const TEST_SAMPLE_RATE: f64 = 48000.0;

/// Standard buffer size for deterministic testing
pub const TEST_BUFFER_SIZE: u32 = 512;

/// Installs a subscriber once so `RUST_LOG=cadenza_core=debug` shows
/// topology changes while debugging a test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Create a basic test engine at [`TEST_SAMPLE_RATE`].
pub fn test_engine() -> Engine {
    init_tracing();
    EngineBuilder::default()
        .sample_rate(TEST_SAMPLE_RATE)
        .max_frames_per_slice(TEST_BUFFER_SIZE)
        .build()
        .expect("Failed to create test engine")
}

pub fn stereo() -> Format {
    Format::standard(TEST_SAMPLE_RATE, 2).expect("valid format")
}

pub fn mono() -> Format {
    Format::standard(TEST_SAMPLE_RATE, 1).expect("valid format")
}

/// Engine with a stereo manual output device attached.
pub fn engine_with_output() -> (Engine, Arc<ManualIoDevice>, Arc<cadenza::IoNode>) {
    let engine = test_engine();
    let device = ManualIoDevice::output(stereo());
    let io = engine.add_io(device.clone()).expect("add io");
    (engine, device, io)
}

/// Source node playing `samples` in a loop on every channel, advancing by
/// the render time's sample position.
pub fn looping_source(samples: Vec<f32>) -> Arc<Node> {
    Node::from_fn(
        NodeArgs::new(BusCount::Bounded(0), BusCount::Bounded(1)),
        move |args| {
            let start = args.time().sample_time().unwrap_or(0).max(0) as usize;
            for buf_idx in 0..args.buffer().buffer_count() {
                if let Ok(out) = args.buffer_mut().data_mut::<f32>(buf_idx) {
                    for (i, sample) in out.iter_mut().enumerate() {
                        *sample = samples[(start + i) % samples.len()];
                    }
                }
            }
        },
    )
}

/// Source node writing `value` into every channel.
pub fn dc_source(value: f32) -> Arc<Node> {
    looping_source(vec![value])
}

/// Samples of channel `ch`.
pub fn channel_samples(buffer: &SampleBuffer, ch: u32) -> Vec<f32> {
    buffer
        .channel::<f32>(ch)
        .expect("float channel")
        .collect()
}

/// Calculate peak amplitude of a signal.
pub fn peak(samples: &[f32]) -> f32 {
    samples
        .iter()
        .map(|s| s.abs())
        .fold(0.0_f32, |a, b| a.max(b))
}

/// Check if two signals are approximately equal within tolerance.
pub fn signals_approx_equal(a: &[f32], b: &[f32], tolerance: f32) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() <= tolerance)
}

/// Assert that a signal is approximately silent (all values near zero).
pub fn assert_silence(samples: &[f32], tolerance: f32) {
    let max = peak(samples);
    assert!(
        max <= tolerance,
        "Expected silence, but peak amplitude was {}",
        max
    );
}

/// Generate an integer staircase signal [0, 1, 2, ..., n-1] as f32.
///
/// Each sample equals its index, so routing and offsets can be verified
/// exactly.
pub fn generate_integer_staircase(num_samples: usize) -> Vec<f32> {
    (0..num_samples).map(|i| i as f32).collect()
}
