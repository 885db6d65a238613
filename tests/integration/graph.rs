//! Graph construction and signal flow tests
//!
//! Signals are verified sample-exact with staircase and DC sources.

use std::sync::Arc;

use approx::assert_abs_diff_eq;
use cadenza::prelude::*;

use crate::helpers::*;

/// Gain stage pulling its single input and scaling it.
struct Gain(f32);

impl NodeProcessor for Gain {
    fn render(&self, args: &mut RenderArgs<'_>) {
        if !args.render_source() {
            return;
        }
        for buf_idx in 0..args.buffer().buffer_count() {
            if let Ok(samples) = args.buffer_mut().data_mut::<f32>(buf_idx) {
                samples.iter_mut().for_each(|s| *s *= self.0);
            }
        }
    }
}

#[test]
fn test_staircase_passes_through_chain() {
    let (engine, device, io) = engine_with_output();
    let staircase = generate_integer_staircase(TEST_BUFFER_SIZE as usize);
    let source = looping_source(staircase.clone());
    let first = Node::new(NodeArgs::default(), PassThrough);
    let second = Node::new(NodeArgs::default(), PassThrough);

    engine.connect(&source, 0, &first, 0, stereo()).unwrap();
    engine.connect(&first, 0, &second, 0, stereo()).unwrap();
    engine.connect(&second, 0, io.node(), 0, stereo()).unwrap();
    engine.start_render().unwrap();

    let output = device.render_cycle(TEST_BUFFER_SIZE).unwrap();
    for ch in 0..2 {
        assert!(signals_approx_equal(
            &channel_samples(&output, ch),
            &staircase,
            tolerances::FLOAT_EPSILON
        ));
    }
    assert_eq!(
        second.last_render_time().unwrap().sample_time(),
        io.node().last_render_time().unwrap().sample_time()
    );
}

#[test]
fn test_gain_stage() {
    let (engine, device, io) = engine_with_output();
    let gain = Node::new(NodeArgs::default(), Gain(0.5));
    engine.connect(&dc_source(0.8), 0, &gain, 0, stereo()).unwrap();
    engine.connect(&gain, 0, io.node(), 0, stereo()).unwrap();
    engine.start_render().unwrap();

    let output = device.render_cycle(128).unwrap();
    for sample in channel_samples(&output, 0) {
        assert_abs_diff_eq!(sample, 0.4, epsilon = tolerances::FLOAT_EPSILON);
    }
}

#[test]
fn test_detached_source_goes_silent() {
    let (engine, device, io) = engine_with_output();
    let source = dc_source(0.5);
    let gain = Node::new(NodeArgs::default(), Gain(1.0));
    engine.connect(&source, 0, &gain, 0, stereo()).unwrap();
    engine.connect(&gain, 0, io.node(), 0, stereo()).unwrap();
    engine.start_render().unwrap();
    assert_eq!(peak(&channel_samples(&device.render_cycle(64).unwrap(), 0)), 0.5);

    engine.detach_node(&source);
    assert!(!engine.node_exists(&source));
    assert!(engine.node_exists(&gain));
    assert_silence(
        &channel_samples(&device.render_cycle(64).unwrap(), 0),
        tolerances::SILENCE_THRESHOLD,
    );
}

#[test]
fn test_detach_if_unused_after_disconnect() {
    let (engine, device, io) = engine_with_output();
    let source = dc_source(0.5);
    let connection = engine.connect(&source, 0, io.node(), 0, stereo()).unwrap();
    assert!(!engine.detach_node_if_unused(&source));
    engine.start_render().unwrap();
    assert_eq!(peak(&channel_samples(&device.render_cycle(32).unwrap(), 0)), 0.5);

    engine.disconnect_node(io.node());
    assert!(engine.connections().is_empty());
    assert!(engine.detach_node_if_unused(&source));
    drop(source);
    assert!(connection.source_node().is_none());
    assert_silence(
        &channel_samples(&device.render_cycle(32).unwrap(), 0),
        tolerances::SILENCE_THRESHOLD,
    );
}

#[test]
fn test_control_thread_edits_while_rendering() {
    let (engine, device, io) = engine_with_output();
    let engine = Arc::new(engine);
    let mixer_input = Node::new(NodeArgs::default(), PassThrough);
    engine.connect(&mixer_input, 0, io.node(), 0, stereo()).unwrap();
    engine.start_render().unwrap();

    let editor = {
        let engine = Arc::clone(&engine);
        let mixer_input = Arc::clone(&mixer_input);
        std::thread::spawn(move || {
            for i in 0..200 {
                let source = dc_source(if i % 2 == 0 { 0.25 } else { 0.75 });
                let connection = engine.connect(&source, 0, &mixer_input, 0, stereo()).unwrap();
                engine.disconnect(&connection).unwrap();
                engine.detach_node(&source);
            }
        })
    };

    let mut cycles = 0;
    while !editor.is_finished() || cycles < 10 {
        let output = device.render_cycle(64).unwrap();
        let left = channel_samples(&output, 0);
        // Each cycle renders one consistent kernel.
        assert!(left.windows(2).all(|w| w[0] == w[1]));
        assert!([0.0, 0.25, 0.75].contains(&left[0]));
        cycles += 1;
    }
    editor.join().unwrap();
    assert_eq!(engine.connections().len(), 1);
}
