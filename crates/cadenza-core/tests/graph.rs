//! Integration tests for cadenza-core.
//!
//! These tests drive whole graphs through a manual device or the offline
//! sink, without audio hardware.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cadenza_core::{
    BusCount, Engine, EngineConfig, EngineState, Error, Format, IoEvent, Kernel, ManualIoDevice,
    Node, NodeArgs, NodeProcessor, OfflineDirective, PassThrough, RenderArgs, Route, RouteNode,
    RoutePoint, SampleBuffer, Tap, Time, MAX_FRAMES_LIMIT,
};
use parking_lot::Mutex;

fn stereo() -> Format {
    Format::standard(48000.0, 2).unwrap()
}

fn mono() -> Format {
    Format::standard(48000.0, 1).unwrap()
}

/// Source writing `value` into every channel.
fn constant(value: f32) -> Arc<Node> {
    Node::from_fn(
        NodeArgs::new(BusCount::Bounded(0), BusCount::Bounded(1)),
        move |args| {
            for buf_idx in 0..args.buffer().buffer_count() {
                if let Ok(samples) = args.buffer_mut().data_mut::<f32>(buf_idx) {
                    samples.fill(value);
                }
            }
        },
    )
}

fn all_equal(buffer: &SampleBuffer, ch: u32, value: f32) -> bool {
    buffer.channel::<f32>(ch).unwrap().all(|v| v == value)
}

// ---------------------------------------------------------------------------
// Rendering through a device
// ---------------------------------------------------------------------------

#[test]
fn test_passthrough_to_device() {
    let engine = Engine::default();
    let device = ManualIoDevice::output(stereo());
    let io = engine.add_io(device.clone()).unwrap();
    let source = constant(0.5);

    engine.connect(&source, 0, io.node(), 0, stereo()).unwrap();
    engine.start_render().unwrap();
    assert_eq!(engine.state(), EngineState::Running);

    let output = device.render_cycle(512).unwrap();
    assert_eq!(output.frame_length(), 512);
    assert!(all_equal(&output, 0, 0.5));
    assert!(all_equal(&output, 1, 0.5));
    assert_eq!(io.node().last_render_time().unwrap().sample_time(), Some(0));

    engine.stop();
    assert_eq!(engine.state(), EngineState::Idle);
    assert!(device.render_cycle(512).is_none());
}

#[test]
fn test_topology_change_while_running() {
    let engine = Engine::default();
    let device = ManualIoDevice::output(stereo());
    let io = engine.add_io(device.clone()).unwrap();
    let quiet = constant(0.25);
    let loud = constant(1.0);

    let connection = engine.connect(&quiet, 0, io.node(), 0, stereo()).unwrap();
    engine.start_render().unwrap();
    assert!(all_equal(&device.render_cycle(64).unwrap(), 0, 0.25));

    engine.disconnect(&connection).unwrap();
    engine.connect(&loud, 0, io.node(), 0, stereo()).unwrap();
    assert_eq!(engine.state(), EngineState::Running);
    assert!(all_equal(&device.render_cycle(64).unwrap(), 0, 1.0));
}

/// Source that reports an output format different from its connection.
struct MisreportingSource;

impl NodeProcessor for MisreportingSource {
    fn render(&self, args: &mut RenderArgs<'_>) {
        for buf_idx in 0..args.buffer().buffer_count() {
            if let Ok(samples) = args.buffer_mut().data_mut::<f32>(buf_idx) {
                samples.fill(1.0);
            }
        }
    }

    fn output_format(&self, _kernel: Option<&Kernel>, _bus: u32) -> Option<Format> {
        Some(mono())
    }
}

#[test]
fn test_format_mismatch_is_skipped() {
    let engine = Engine::default();
    let device = ManualIoDevice::output(stereo());
    let io = engine.add_io(device.clone()).unwrap();
    let source = Node::new(
        NodeArgs::new(BusCount::Bounded(0), BusCount::Bounded(1)),
        MisreportingSource,
    );

    engine.connect(&source, 0, io.node(), 0, stereo()).unwrap();
    engine.start_render().unwrap();

    let output = device.render_cycle(128).unwrap();
    assert!(all_equal(&output, 0, 0.0));
    assert!(all_equal(&output, 1, 0.0));
    assert!(source.last_render_time().is_none());
}

#[test]
fn test_device_format_mismatch_clears_handler() {
    let engine = Engine::default();
    let device = ManualIoDevice::output(stereo());
    let io = engine.add_io(device.clone()).unwrap();
    let source = constant(0.5);

    engine.connect(&source, 0, io.node(), 0, mono()).unwrap();
    engine.start_render().unwrap();
    assert!(!io.has_render_handler());
    assert!(all_equal(&device.render_cycle(32).unwrap(), 0, 0.0));
}

#[test]
fn test_io_events_revalidate_handler() {
    let engine = Engine::default();
    let device = ManualIoDevice::output(stereo());
    let io = engine.add_io(device.clone()).unwrap();
    engine.connect(&constant(0.5), 0, io.node(), 0, stereo()).unwrap();
    engine.start_render().unwrap();
    assert!(io.has_render_handler());

    device.set_output_format(Some(Format::standard(44100.0, 2).unwrap()));
    assert_eq!(engine.process_io_events(), 1);
    assert!(!io.has_render_handler());

    device.set_output_format(Some(stereo()));
    engine.io_event_sender().send(IoEvent::DevicesChanged).unwrap();
    assert_eq!(engine.process_io_events(), 2);
    assert!(io.has_render_handler());
    assert_eq!(engine.process_io_events(), 0);
}

#[test]
fn test_device_input_reaches_input_tap() {
    let engine = Engine::default();
    let device = ManualIoDevice::new(Some(mono()), None);
    let io = engine.add_io(device.clone()).unwrap();
    let tap = Tap::input();
    let captured = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&captured);
    tap.set_render_handler(move |args| {
        sink.lock().extend(args.buffer().channel::<f32>(0).unwrap());
    });

    engine.connect(io.node(), 0, tap.node(), 0, mono()).unwrap();
    engine.start_render().unwrap();

    let mut input = SampleBuffer::new(mono(), 16).unwrap();
    input.data_mut::<f32>(0).unwrap().fill(0.75);
    device.push_input(input);
    assert!(device.render_cycle(16).is_none());

    let captured = captured.lock();
    assert_eq!(captured.len(), 16);
    assert!(captured.iter().all(|&v| v == 0.75));
}

#[test]
fn test_start_render_errors() {
    let engine = Engine::default();
    let device = ManualIoDevice::output(stereo());
    let io = engine.add_io(device.clone()).unwrap();
    assert_eq!(engine.start_render(), Err(Error::ConnectionNotFound));

    engine.connect(&constant(0.1), 0, io.node(), 0, stereo()).unwrap();
    device.set_refuse_start(true);
    assert_eq!(engine.start_render(), Err(Error::StartFailed));
    assert_eq!(engine.state(), EngineState::Configuring);

    device.set_refuse_start(false);
    engine.start_render().unwrap();
    assert_eq!(engine.start_render(), Err(Error::AlreadyRunning));
    engine.stop();
    engine.stop();
    assert_eq!(engine.state(), EngineState::Idle);
}

// ---------------------------------------------------------------------------
// Topology
// ---------------------------------------------------------------------------

#[test]
fn test_connect_disconnect_round_trip() {
    let engine = Engine::default();
    let (a, b) = (constant(0.0), Node::new(NodeArgs::default(), PassThrough));

    let connection = engine.connect(&a, 0, &b, 0, stereo()).unwrap();
    assert_eq!(b.input_connection(0).as_deref(), Some(&*connection));
    assert_eq!(a.output_connection(0).as_deref(), Some(&*connection));
    assert_eq!(b.input_format(0), Some(stereo()));

    engine.disconnect(&connection).unwrap();
    assert!(b.input_connection(0).is_none());
    assert!(a.output_connection(0).is_none());
    assert!(b.kernel().unwrap().input_connections().is_empty());
    assert_eq!(engine.disconnect(&connection), Err(Error::ConnectionNotFound));
}

#[test]
fn test_bus_exhaustion() {
    let engine = Engine::default();
    let mixer = Node::new(
        NodeArgs::new(BusCount::Bounded(2), BusCount::Bounded(1)),
        PassThrough,
    );
    assert_eq!(mixer.next_available_input_bus(), Some(0));
    engine.connect(&constant(0.0), 0, &mixer, 0, mono()).unwrap();
    assert_eq!(mixer.next_available_input_bus(), Some(1));
    engine.connect(&constant(0.0), 0, &mixer, 1, mono()).unwrap();
    assert_eq!(mixer.next_available_input_bus(), None);
    assert_eq!(
        engine.connect(&constant(0.0), 0, &mixer, 2, mono()),
        Err(Error::BusOutOfRange { bus: 2, count: 2 })
    );

    let router = RouteNode::new();
    for bus in 0..5 {
        assert_eq!(router.node().next_available_input_bus(), Some(bus));
        engine.connect(&constant(0.0), 0, router.node(), bus, mono()).unwrap();
    }
}

#[test]
fn test_kernel_snapshot_isolation() {
    let engine = Arc::new(Engine::default());
    let source = constant(0.5);
    let (started_tx, started_rx) = crossbeam_channel::bounded::<()>(1);
    let (resume_tx, resume_rx) = crossbeam_channel::bounded::<()>(1);
    let saw_connection = Arc::new(AtomicBool::new(false));
    let saw = Arc::clone(&saw_connection);

    let sink = Node::from_fn(NodeArgs::default(), move |args| {
        let _ = started_tx.try_send(());
        let _ = resume_rx.recv_timeout(Duration::from_secs(5));
        saw.store(args.input_connection_on_render(0).is_some(), Ordering::SeqCst);
        args.render_source();
    });
    let connection = engine.connect(&source, 0, &sink, 0, mono()).unwrap();

    let render_sink = Arc::clone(&sink);
    let render = std::thread::spawn(move || {
        let mut buffer = SampleBuffer::new(mono(), 64).unwrap();
        render_sink.render(&mut buffer, 0, &Time::from_sample_time(0, 48000.0));
    });

    started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    engine.disconnect(&connection).unwrap();
    assert!(sink.kernel().unwrap().input_connection(0).is_none());
    resume_tx.send(()).unwrap();

    render.join().unwrap();
    assert!(saw_connection.load(Ordering::SeqCst));

    resume_tx.send(()).unwrap();
    let mut buffer = SampleBuffer::new(mono(), 64).unwrap();
    sink.render(&mut buffer, 0, &Time::from_sample_time(64, 48000.0));
    assert!(!saw_connection.load(Ordering::SeqCst));
    assert!(all_equal(&buffer, 0, 0.0));
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

#[test]
fn test_route_fan_in() {
    let engine = Engine::default();
    let device = ManualIoDevice::output(stereo());
    let io = engine.add_io(device.clone()).unwrap();
    let router = RouteNode::new();

    engine.connect(&constant(0.25), 0, router.node(), 0, mono()).unwrap();
    engine.connect(&constant(0.5), 0, router.node(), 1, mono()).unwrap();
    engine.connect(router.node(), 0, io.node(), 0, stereo()).unwrap();
    router.add_route(Route::with_buses(0, 0, 0, 0));
    router.add_route(Route::with_buses(1, 0, 0, 1));
    engine.start_render().unwrap();

    let output = device.render_cycle(256).unwrap();
    assert!(all_equal(&output, 0, 0.25));
    assert!(all_equal(&output, 1, 0.5));

    router.remove_route_for_destination(RoutePoint::new(0, 1));
    let output = device.render_cycle(256).unwrap();
    assert!(all_equal(&output, 0, 0.25));
    assert!(all_equal(&output, 1, 0.0));
}

#[test]
fn test_route_drops_unrouted_channels_at_slice_limit() {
    let config = EngineConfig {
        max_frames_per_slice: MAX_FRAMES_LIMIT,
        ..Default::default()
    };
    let engine = Engine::new(config).unwrap();
    let device = ManualIoDevice::output(mono());
    let io = engine.add_io(device.clone()).unwrap();
    let router = RouteNode::new();

    engine.connect(&constant(0.5), 0, router.node(), 0, stereo()).unwrap();
    engine.connect(router.node(), 0, io.node(), 0, mono()).unwrap();
    router.add_route(Route::with_buses(0, 0, 0, 0));
    engine.start_render().unwrap();

    let output = device.render_cycle(MAX_FRAMES_LIMIT).unwrap();
    assert_eq!(output.frame_length(), MAX_FRAMES_LIMIT);
    assert!(all_equal(&output, 0, 0.5));
}

#[test]
fn test_route_swaps_channels() {
    let engine = Engine::default();
    let device = ManualIoDevice::output(stereo());
    let io = engine.add_io(device.clone()).unwrap();
    let router = RouteNode::new();
    let source = Node::from_fn(
        NodeArgs::new(BusCount::Bounded(0), BusCount::Bounded(1)),
        |args| {
            let _ = args.buffer_mut().data_mut::<f32>(0).map(|d| d.fill(0.1));
            let _ = args.buffer_mut().data_mut::<f32>(1).map(|d| d.fill(0.9));
        },
    );

    engine.connect(&source, 0, router.node(), 0, stereo()).unwrap();
    engine.connect(router.node(), 0, io.node(), 0, stereo()).unwrap();
    router.set_routes([Route::direct(0, 0), Route::direct(0, 1)].into_iter().collect());
    router.add_route(Route::new(
        RoutePoint::new(0, 0),
        RoutePoint::new(0, 1),
    ));
    router.add_route(Route::new(
        RoutePoint::new(0, 1),
        RoutePoint::new(0, 0),
    ));
    assert_eq!(router.routes().len(), 2);
    engine.start_render().unwrap();

    let output = device.render_cycle(32).unwrap();
    assert!(all_equal(&output, 0, 0.9));
    assert!(all_equal(&output, 1, 0.1));
}

// ---------------------------------------------------------------------------
// Offline rendering
// ---------------------------------------------------------------------------

#[test]
fn test_offline_render_until_stop_directive() {
    let engine = Engine::default();
    let offline = engine.offline_output();
    engine.connect(&constant(0.5), 0, offline.node(), 0, mono()).unwrap();

    let (done_tx, done_rx) = crossbeam_channel::bounded(1);
    let slices = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&slices);
    engine
        .start_offline_render(
            move |buffer, time| {
                let mut seen = seen.lock();
                assert!(buffer.channel::<f32>(0).unwrap().all(|v| v == 0.5));
                seen.push(time.sample_time());
                if seen.len() == 4 {
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
    let slice = engine.config().offline_slice_frames as i64;
    assert_eq!(
        *slices.lock(),
        vec![Some(0), Some(slice), Some(slice * 2), Some(slice * 3)]
    );
    assert!(!offline.is_running());
    assert_eq!(engine.state(), EngineState::Idle);
}

#[test]
fn test_offline_render_cancelled_by_stop() {
    let engine = Engine::default();
    let offline = engine.offline_output();
    engine.connect(&constant(0.5), 0, offline.node(), 0, mono()).unwrap();

    let (done_tx, done_rx) = crossbeam_channel::bounded(1);
    engine
        .start_offline_render(
            |_, _| OfflineDirective::Continue,
            move |cancelled| {
                let _ = done_tx.send(cancelled);
            },
        )
        .unwrap();
    assert_eq!(
        engine.start_offline_render(|_, _| OfflineDirective::Stop, |_| {}),
        Err(Error::AlreadyRunning)
    );

    engine.stop();
    assert_eq!(done_rx.recv_timeout(Duration::from_secs(5)), Ok(true));
    assert_eq!(engine.state(), EngineState::Idle);
}

#[test]
fn test_offline_render_requires_input() {
    let engine = Engine::default();
    engine.offline_output();
    assert_eq!(
        engine.start_offline_render(|_, _| OfflineDirective::Stop, |_| {}),
        Err(Error::ConnectionNotFound)
    );
}
