//! Channel routing and tap tests

use std::sync::Arc;

use cadenza::prelude::*;
use parking_lot::Mutex;

use crate::helpers::*;

#[test]
fn test_route_mono_sources_to_stereo() {
    let (engine, device, io) = engine_with_output();
    let router = RouteNode::new();
    let left = looping_source(generate_integer_staircase(64));
    let right = dc_source(-1.0);

    engine.connect(&left, 0, router.node(), 0, mono()).unwrap();
    engine.connect(&right, 0, router.node(), 1, mono()).unwrap();
    engine.connect(router.node(), 0, io.node(), 0, stereo()).unwrap();
    router.add_route(Route::with_buses(0, 0, 0, 0));
    router.add_route(Route::with_buses(1, 0, 0, 1));
    engine.start_render().unwrap();

    let output = device.render_cycle(64).unwrap();
    assert!(signals_approx_equal(
        &channel_samples(&output, 0),
        &generate_integer_staircase(64),
        tolerances::FLOAT_EPSILON
    ));
    assert!(channel_samples(&output, 1).iter().all(|&s| s == -1.0));
}

#[test]
fn test_route_replacement_and_clear() {
    let (engine, device, io) = engine_with_output();
    let router = RouteNode::new();
    engine.connect(&dc_source(0.3), 0, router.node(), 0, mono()).unwrap();
    engine.connect(router.node(), 0, io.node(), 0, stereo()).unwrap();
    engine.start_render().unwrap();

    router.add_route(Route::with_buses(0, 0, 0, 0));
    // Same source point: replaces the previous route.
    router.add_route(Route::with_buses(0, 0, 0, 1));
    assert_eq!(router.routes().len(), 1);

    let output = device.render_cycle(32).unwrap();
    assert_silence(&channel_samples(&output, 0), tolerances::SILENCE_THRESHOLD);
    assert!(channel_samples(&output, 1).iter().all(|&s| s == 0.3));

    router.remove_route_for_source(RoutePoint::new(0, 0));
    assert!(router.routes().is_empty());
    router.set_routes([Route::direct(0, 0)].into_iter().collect());
    let output = device.render_cycle(32).unwrap();
    assert!(channel_samples(&output, 0).iter().all(|&s| s == 0.3));

    router.clear_routes();
    let output = device.render_cycle(32).unwrap();
    assert_silence(&channel_samples(&output, 0), tolerances::SILENCE_THRESHOLD);
}

#[test]
fn test_tap_observes_and_rewrites() {
    let (engine, device, io) = engine_with_output();
    let tap = Tap::new();
    let observed = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&observed);
    tap.set_render_handler(move |args| {
        let connected = args.input_connection_on_render(0).is_some();
        args.render_source();
        sink.lock().push((connected, args.time().sample_time()));
        if let Ok(mut right) = args.buffer_mut().channel_mut::<f32>(1) {
            right.fill(0.0);
        }
    });

    engine.connect(&dc_source(0.5), 0, tap.node(), 0, stereo()).unwrap();
    engine.connect(tap.node(), 0, io.node(), 0, stereo()).unwrap();
    engine.start_render().unwrap();

    let output = device.render_cycle(128).unwrap();
    assert!(channel_samples(&output, 0).iter().all(|&s| s == 0.5));
    assert_silence(&channel_samples(&output, 1), tolerances::SILENCE_THRESHOLD);

    tap.clear_render_handler();
    let output = device.render_cycle(128).unwrap();
    assert!(channel_samples(&output, 1).iter().all(|&s| s == 0.5));
    assert_eq!(*observed.lock(), vec![(true, Some(0))]);
}

#[test]
fn test_int16_device_passthrough() {
    let engine = test_engine();
    let format = Format::new(TEST_SAMPLE_RATE, 2, SampleRepresentation::Int16, true).unwrap();
    let device = ManualIoDevice::output(format);
    let io = engine.add_io(device.clone()).unwrap();
    let source = Node::from_fn(
        NodeArgs::new(BusCount::Bounded(0), BusCount::Bounded(1)),
        |args| {
            if let Ok(mut left) = args.buffer_mut().channel_mut::<i16>(0) {
                left.fill(16384);
            }
            if let Ok(mut right) = args.buffer_mut().channel_mut::<i16>(1) {
                right.fill(i16::MIN / 2);
            }
        },
    );

    engine.connect(&source, 0, io.node(), 0, format).unwrap();
    engine.start_render().unwrap();

    let output = device.render_cycle(64).unwrap();
    let interleaved = output.data::<i16>(0).unwrap();
    assert_eq!(interleaved.len(), 128);
    for frame in interleaved.chunks(2) {
        let left = frame[0] as f32 / 32768.0;
        assert!((left - 0.5).abs() <= tolerances::INT16_EPSILON);
        assert_eq!(frame[1], i16::MIN / 2);
    }
}

#[test]
fn test_input_tap_monitors_device_input() {
    let engine = test_engine();
    let device = ManualIoDevice::new(Some(mono()), Some(stereo()));
    let io = engine.add_io(device.clone()).unwrap();
    let input_tap = Tap::input();
    let peaks = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&peaks);
    input_tap.set_render_handler(move |args| {
        sink.lock().push(peak(&channel_samples(args.buffer(), 0)));
    });

    engine.connect(io.node(), 0, input_tap.node(), 0, mono()).unwrap();
    engine.connect(&dc_source(0.1), 0, io.node(), 0, stereo()).unwrap();
    engine.start_render().unwrap();

    let mut input = SampleBuffer::new(mono(), 64).unwrap();
    input.data_mut::<f32>(0).unwrap().fill(-0.6);
    device.push_input(input);
    let output = device.render_cycle(64).unwrap();

    assert!(channel_samples(&output, 0).iter().all(|&s| s == 0.1));
    assert_eq!(*peaks.lock(), vec![0.6]);
}
