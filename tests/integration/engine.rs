//! Engine lifecycle integration tests
//!
//! Tests builder configuration, start/stop transitions and cleanup.

use std::io::Write;
use std::time::Duration;

use cadenza::prelude::*;
use cadenza::Error;

use crate::helpers::*;

#[test]
fn test_engine_from_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "sample_rate = 96000.0").unwrap();
    writeln!(file, "offline_slice_frames = 256").unwrap();

    let engine = EngineBuilder::default()
        .config_file(file.path())
        .unwrap()
        .build()
        .unwrap();

    assert_eq!(engine.sample_rate(), 96000.0);
    assert_eq!(engine.config().offline_slice_frames, 256);
    assert_eq!(engine.config().max_frames_per_slice, 4096);
}

#[test]
fn test_engine_rejects_invalid_config() {
    let result = EngineBuilder::default().sample_rate(1.0).build();
    assert!(matches!(
        result,
        Err(Error::Core(cadenza::core::Error::InvalidConfig(_)))
    ));
}

#[test]
fn test_lifecycle_transitions() {
    let (engine, device, io) = engine_with_output();
    assert_eq!(engine.state(), EngineState::Configuring);

    engine.connect(&dc_source(0.5), 0, io.node(), 0, stereo()).unwrap();
    engine.start_render().unwrap();
    assert!(engine.is_running());
    assert_eq!(device.max_frames_per_slice(), TEST_BUFFER_SIZE);

    engine.stop();
    assert_eq!(engine.state(), EngineState::Idle);
    assert!(!device.is_running());

    // Restart after stop.
    engine.start_render().unwrap();
    assert!(device.render_cycle(TEST_BUFFER_SIZE).is_some());
}

#[test]
fn test_render_slices_are_capped() {
    let (engine, device, io) = engine_with_output();
    engine.connect(&dc_source(0.5), 0, io.node(), 0, stereo()).unwrap();
    engine.start_render().unwrap();

    let output = device.render_cycle(TEST_BUFFER_SIZE * 4).unwrap();
    assert_eq!(output.frame_length(), TEST_BUFFER_SIZE);
}

#[test]
fn test_engine_drop_stops_device() {
    let device = ManualIoDevice::output(stereo());
    {
        let engine = test_engine();
        let io = engine.add_io(device.clone()).unwrap();
        engine.connect(&dc_source(0.5), 0, io.node(), 0, stereo()).unwrap();
        engine.start_render().unwrap();
        assert!(device.is_running());
    }
    assert!(!device.is_running());
    assert!(device.render_cycle(64).is_none());
}

#[test]
fn test_remove_io_detaches_node() {
    let (engine, device, io) = engine_with_output();
    let source = dc_source(0.5);
    engine.connect(&source, 0, io.node(), 0, stereo()).unwrap();
    engine.start_render().unwrap();

    engine.remove_io();
    assert!(engine.io().is_none());
    assert!(!engine.node_exists(io.node()));
    assert!(!device.is_running());
    assert!(engine.output_connections_for(&source).is_empty());
    assert_eq!(engine.state(), EngineState::Idle);
}

#[test]
fn test_offline_render_collects_signal() {
    let engine = test_engine();
    let offline = engine.offline_output();
    let staircase = generate_integer_staircase(4096);
    engine
        .connect(&looping_source(staircase.clone()), 0, offline.node(), 0, mono())
        .unwrap();

    let (tx, rx) = crossbeam_channel::unbounded();
    let (done_tx, done_rx) = crossbeam_channel::bounded(1);
    let mut slices = 0;
    engine
        .start_offline_render(
            move |buffer, _time| {
                tx.send(channel_samples(buffer, 0)).unwrap();
                slices += 1;
                if slices == 4 {
                    OfflineDirective::Stop
                } else {
                    OfflineDirective::Continue
                }
            },
            move |cancelled| {
                let _ = done_tx.send(cancelled);
            },
        )
        .unwrap();

    assert_eq!(done_rx.recv_timeout(Duration::from_secs(5)), Ok(false));
    let rendered: Vec<f32> = rx.try_iter().flatten().collect();
    assert_eq!(rendered.len(), 4096);
    assert!(signals_approx_equal(
        &rendered,
        &staircase,
        tolerances::FLOAT_EPSILON
    ));
}
