mod common;

use std::io;
use std::time::Duration;

use camrelay::stream::{State, Tick};
use camrelay::{Error, ErrorClass, Format, FourCC, StreamConfig, StreamPipeline, StreamStart};

use common::{Frame, ScriptedCamera, ScriptedConsole};

fn qvga() -> Format {
    Format {
        stride: 640,
        ..Format::new(320, 240, FourCC::RGB565)
    }
}

fn config() -> StreamConfig {
    StreamConfig::default().with_idle_backoff(Duration::ZERO)
}

fn pipeline(
    camera: ScriptedCamera,
    console: ScriptedConsole,
) -> StreamPipeline<ScriptedCamera, ScriptedConsole> {
    StreamPipeline::with_format(camera, console, &qvga(), config()).unwrap()
}

#[test]
fn first_triggered_frame_is_relayed_before_requeue() {
    let camera = ScriptedCamera::new(vec![Frame::Ready(4096)]);
    let mut p = pipeline(camera, ScriptedConsole::triggers(1));

    assert_eq!(p.tick().unwrap(), Tick::Armed { buffers: 2 });
    assert_eq!(p.device().queue.len(), 2);
    assert!(p
        .device()
        .queue
        .iter()
        .all(|buf| buf.capacity() == 640 * 240));

    assert_eq!(p.tick().unwrap(), Tick::Started(StreamStart::Started));
    assert_eq!(
        p.tick().unwrap(),
        Tick::Relayed {
            index: 0,
            sequence: 0,
            bytes: 4096
        }
    );

    let output = &p.relay().console().output;
    assert_eq!(output.len(), 4096);
    assert!(output
        .iter()
        .enumerate()
        .all(|(i, &b)| b == ScriptedCamera::frame_byte(0, i)));

    // relayed buffer went back to the end of the queue
    let requeued: Vec<usize> = p.device().queue.iter().map(|b| b.index()).collect();
    assert_eq!(requeued, vec![1, 0]);
    assert_eq!(p.device().enqueues, 3);
    assert_eq!(p.device().timeouts_seen, vec![Duration::from_millis(33)]);
}

#[test]
fn dequeue_timeout_is_not_a_failure() {
    let camera = ScriptedCamera::new(vec![Frame::TimedOut, Frame::Ready(100)]);
    let mut p = pipeline(camera, ScriptedConsole::triggers(2));
    p.start().unwrap();

    assert_eq!(p.tick().unwrap(), Tick::TimedOut);
    assert!(p.relay().console().output.is_empty());
    assert_eq!(p.queued(), 2);
    assert_eq!(p.device().held.len(), 2);
    assert_eq!(p.state(), State::Streaming);

    // retried on the next trigger
    assert!(matches!(p.tick().unwrap(), Tick::Relayed { bytes: 100, .. }));
    assert_eq!(p.stats().timeouts, 1);
    assert_eq!(p.stats().frames, 1);
}

#[test]
fn already_started_counts_as_success() {
    let mut camera = ScriptedCamera::new(vec![]);
    camera.start_code = 1;
    let mut p = pipeline(camera, ScriptedConsole::default());

    assert_eq!(p.start().unwrap(), StreamStart::AlreadyStarted);
    assert_eq!(p.state(), State::Streaming);
    assert_eq!(p.device().stops, 0);
}

#[test]
fn other_start_codes_stop_the_stream() {
    let mut camera = ScriptedCamera::new(vec![]);
    camera.start_code = -5;
    let mut p = pipeline(camera, ScriptedConsole::default());

    let err = p.start().unwrap_err();
    assert!(matches!(err, Error::Start(_)));
    assert_eq!(err.class(), ErrorClass::StreamFatal);
    assert_eq!(p.device().stops, 1);
    assert_eq!(p.state(), State::Stopped);
    assert!(matches!(p.tick(), Err(Error::Terminated)));
}

#[test]
fn no_trigger_means_no_dequeue() {
    let input = (0..1000).map(|i| match i % 4 {
        0 => None,
        1 => Some(b'\r'),
        2 => Some(0x0b),
        _ => Some(b'a'),
    });
    let camera = ScriptedCamera::new(vec![Frame::Ready(10)]);
    let mut p = pipeline(camera, ScriptedConsole::new(input));
    p.start().unwrap();

    for _ in 0..1000 {
        assert_eq!(p.tick().unwrap(), Tick::Idle);
    }
    assert_eq!(p.device().dequeues, 0);
    assert!(p.relay().console().output.is_empty());
    assert_eq!(p.stats().idle_ticks, 1000);
}

#[test]
fn every_dequeue_follows_a_trigger_byte() {
    let input = vec![
        None,
        Some(0x0a),
        Some(b'x'),
        Some(0x0a),
        Some(0x0a),
        None,
        Some(0x0a),
    ];
    let frames = (0..4).map(|_| Frame::Ready(16));
    let mut p = pipeline(ScriptedCamera::new(frames), ScriptedConsole::new(input.clone()));
    p.start().unwrap();

    for byte in &input {
        let dequeues = p.device().dequeues;
        p.tick().unwrap();
        let attempted = p.device().dequeues - dequeues;
        assert_eq!(attempted, usize::from(*byte == Some(0x0a)));
    }
    assert_eq!(p.device().dequeues, 4);
}

#[test]
fn frames_reach_the_link_whole_and_in_order() {
    let lens = [7usize, 640 * 240, 1, 3000, 0, 512];
    let frames = lens.iter().map(|&len| Frame::Ready(len));
    let mut p = pipeline(
        ScriptedCamera::new(frames),
        ScriptedConsole::triggers(lens.len()),
    );
    p.start().unwrap();

    for _ in 0..lens.len() {
        p.tick().unwrap();
    }

    let expected: Vec<u8> = lens
        .iter()
        .enumerate()
        .flat_map(|(seq, &len)| (0..len).map(move |i| ScriptedCamera::frame_byte(seq as u32, i)))
        .collect();
    assert_eq!(p.relay().console().output, expected);
    assert_eq!(p.relay().sends(), lens.len() as u64);
}

#[test]
fn each_buffer_has_exactly_one_owner() {
    let script = vec![
        Frame::Ready(10),
        Frame::TimedOut,
        Frame::Ready(20),
        Frame::Ready(30),
        Frame::TimedOut,
        Frame::TimedOut,
        Frame::Ready(40),
    ];
    let steps = script.len();
    let mut p = pipeline(ScriptedCamera::new(script), ScriptedConsole::triggers(steps));
    p.start().unwrap();

    for _ in 0..steps {
        p.tick().unwrap();
        // all buffers sit with the peripheral between ticks, none with the pipeline
        assert_eq!(p.queued() + p.free(), 2);
        assert_eq!(p.device().held.len(), p.queued());
        assert_eq!(p.device().queue.len(), 2);
    }
    assert!(p.device().violations.is_empty(), "{:?}", p.device().violations);
}

#[test]
fn dequeue_failure_is_fatal() {
    let camera = ScriptedCamera::new(vec![Frame::Fail(io::ErrorKind::BrokenPipe)]);
    let mut p = pipeline(camera, ScriptedConsole::triggers(1));
    p.start().unwrap();

    assert!(matches!(p.tick(), Err(Error::Dequeue(_))));
    assert_eq!(p.device().stops, 1);
    assert_eq!(p.state(), State::Stopped);
}

#[test]
fn requeue_failure_is_fatal() {
    let mut camera = ScriptedCamera::new(vec![Frame::Ready(8)]);
    camera.fail_enqueue_after = Some(2);
    let mut p = pipeline(camera, ScriptedConsole::triggers(1));
    p.start().unwrap();

    match p.tick() {
        Err(Error::Enqueue { index, .. }) => assert_eq!(index, 0),
        other => panic!("unexpected {:?}", other),
    }
    // the frame itself still went out before the failed requeue
    assert_eq!(p.relay().console().output.len(), 8);
    assert_eq!(p.device().stops, 1);
}

#[test]
fn empty_working_set_is_rejected() {
    let res = StreamPipeline::with_format(
        ScriptedCamera::new(vec![]),
        ScriptedConsole::default(),
        &qvga(),
        config().with_buffer_count(0),
    );
    match res {
        Err(e) => {
            assert!(matches!(e, Error::NoBuffers));
            assert_eq!(e.class(), ErrorClass::StartupFatal);
        }
        Ok(_) => panic!("pipeline without buffers accepted"),
    }
}

#[test]
fn empty_geometry_cannot_be_streamed() {
    let fmt = Format::new(320, 240, FourCC::JPEG);
    let res = StreamPipeline::with_format(
        ScriptedCamera::new(vec![]),
        ScriptedConsole::default(),
        &fmt,
        config(),
    );
    match res {
        Err(e) => assert_eq!(e.class(), ErrorClass::StartupFatal),
        Ok(_) => panic!("zero stride accepted"),
    }
}
