//! Drives the control loop against a serial link backed by in-memory I/O and
//! checks what reaches the wire.

use std::io::{self, Cursor, Write};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use rov_bridge::pubsub::{CONTROL_TOPIC, TELEMETRY_TOPIC};
use rov_bridge::rov::mapper::StickAxes;
use rov_bridge::rov::{InputFrame, ScriptedInput};
use rov_bridge::uart::{LinkOptions, SerialLink, OUTBOUND_TERMINATOR};
use rov_bridge::{ControlChannel, ControlLoop, Publisher, RovConfig, Subscriber, TelemetryChannel, Topic};

#[derive(Clone, Default)]
struct SharedSink(Arc<Mutex<Vec<u8>>>);

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Positive Y is a stick pushed away from the operator.
fn left_stick_pushed_forward() -> InputFrame {
    InputFrame {
        sticks: StickAxes { left_y: Some(1.0), ..Default::default() },
        ..Default::default()
    }
}

#[test]
fn two_seconds_of_full_forward_on_the_wire() {
    let telemetry: Arc<TelemetryChannel> = Topic::shared(TELEMETRY_TOPIC, 16);
    let control: Arc<ControlChannel> = Topic::shared(CONTROL_TOPIC, 512);
    let ui = Subscriber::new(Arc::clone(&control));

    let sink = SharedSink::default();
    let mut link = SerialLink::from_io(
        "mock",
        Cursor::new(Vec::new()),
        sink.clone(),
        LinkOptions::default(),
        Publisher::new(telemetry),
    )
    .unwrap();

    let cfg = RovConfig::default();
    let mut ctl = ControlLoop::new(
        ScriptedInput::constant("pad", left_stick_pushed_forward()),
        &cfg,
        link.sender(),
        Publisher::new(control),
    );

    let t0 = Instant::now();
    for k in 1..=200u32 {
        ctl.tick(t0 + Duration::from_millis(10) * k);
    }
    assert_eq!(ui.pending(), 200);

    thread::sleep(Duration::from_millis(200));
    link.shutdown();

    let bytes = sink.0.lock().unwrap().clone();
    let frames: Vec<&[u8]> = bytes.split(|&b| b == OUTBOUND_TERMINATOR).filter(|f| !f.is_empty()).collect();
    assert_eq!(frames.len(), 4);
    assert_eq!(bytes.last(), Some(&OUTBOUND_TERMINATOR));
    assert!(!bytes.contains(&b'\n'));
    for frame in frames {
        assert_eq!(
            std::str::from_utf8(frame).unwrap(),
            r#"{"axisInfo":[1900,1900,1500,1500],"left_trigger":0.0,"right_trigger":0.0,"claw":1500,"claw2":1500}"#
        );
    }
}

#[test]
fn telemetry_flows_while_commands_go_out() {
    let telemetry: Arc<TelemetryChannel> = Topic::shared(TELEMETRY_TOPIC, 16);
    let readings = Subscriber::new(Arc::clone(&telemetry));
    let control: Arc<ControlChannel> = Topic::shared(CONTROL_TOPIC, 16);

    let wire_in = b"{\"depth\":1.25,\"temp\":14}\ngarbage\n{\"depth\":1.5}\n".to_vec();
    let sink = SharedSink::default();
    let mut link = SerialLink::from_io(
        "mock",
        Cursor::new(wire_in),
        sink.clone(),
        LinkOptions::default(),
        Publisher::new(telemetry),
    )
    .unwrap();

    let mut ctl = ControlLoop::new(ScriptedInput::idle("pad"), &RovConfig::default(), link.sender(), Publisher::new(control));
    let snapshot = ctl.tick(Instant::now());
    assert!(snapshot.sent);

    let first = readings.recv_timeout(Duration::from_secs(2)).expect("first reading");
    let second = readings.recv_timeout(Duration::from_secs(2)).expect("second reading");
    assert_eq!(first.get("temp").and_then(|v| v.as_i64()), Some(14));
    assert_eq!(second.get("depth").and_then(|v| v.as_f64()), Some(1.5));

    thread::sleep(Duration::from_millis(100));
    link.shutdown();
    assert!(readings.try_recv().is_none());
    assert!(sink.0.lock().unwrap().ends_with(&[OUTBOUND_TERMINATOR]));
}
