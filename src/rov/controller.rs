/**
 * ROV Control Loop
 *
 * Runs on the operator's machine at a fixed 10 ms cadence:
 * 1. Samples the input device (or notices it is gone)
 * 2. Maps sticks to thruster pulsewidths and steps both claws
 * 3. Hands one command per send interval to the serial link
 * 4. Publishes a snapshot of the tick for the UI
 *
 * The loop never blocks on I/O. The serial link owns its own workers.
 */

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use super::claw::{ClawBinding, ClawPair, ClawStateMachine};
use super::input::{Controls, InputFrame, InputSource};
use super::mapper::{AxisWiring, StickAxes, ThrusterCommandSet, ThrusterMapper};
use super::rate_limiter::CommandRateLimiter;
use crate::config::RovConfig;
use crate::connection::ConnectionState;
use crate::pubsub::Publisher;
use crate::uart::{LinkSender, OutboundMessage};

/// What the UI sees after every tick.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlSnapshot {
    pub input_state: ConnectionState,
    pub controller_name: Option<String>,
    pub thrusters: ThrusterCommandSet,
    pub claws: ClawPair,
    /// Raw readings, for diagnostic display.
    pub sticks: StickAxes,
    pub controls: Controls,
    /// Whether this tick handed a command to the link.
    pub sent: bool,
}

pub type ScreenshotHook = Box<dyn FnMut() + Send>;

pub struct ControlLoop<I: InputSource> {
    input: I,
    mapper: ThrusterMapper,
    wiring: AxisWiring,
    claw_machine: ClawStateMachine,
    primary_binding: ClawBinding,
    secondary_binding: ClawBinding,
    claws: ClawPair,
    limiter: CommandRateLimiter,
    link: LinkSender,
    snapshots: Publisher<ControlSnapshot>,
    screenshot_hook: Option<ScreenshotHook>,

    // Input device tracking
    input_state: ConnectionState,
    controller_name: Option<String>,
    screenshot_held: bool,
    reconnect_interval: Duration,
    last_discovery: Option<Instant>,

    tick_period: Duration,
}

impl<I: InputSource> ControlLoop<I> {
    pub fn new(input: I, config: &RovConfig, link: LinkSender, snapshots: Publisher<ControlSnapshot>) -> Self {
        Self {
            input,
            mapper: ThrusterMapper::from(&config.mapping),
            wiring: config.mapping.wiring,
            claw_machine: ClawStateMachine::from(&config.claw),
            primary_binding: config.claw.primary,
            secondary_binding: config.claw.secondary,
            claws: ClawPair::default(),
            limiter: CommandRateLimiter::new(config.control.send_interval()),
            link,
            snapshots,
            screenshot_hook: None,
            input_state: ConnectionState::Disconnected,
            controller_name: None,
            screenshot_held: false,
            reconnect_interval: config.control.reconnect_interval(),
            last_discovery: None,
            tick_period: config.control.tick_period(),
        }
    }

    pub fn with_screenshot_hook(mut self, hook: impl FnMut() + Send + 'static) -> Self {
        self.screenshot_hook = Some(Box::new(hook));
        self
    }

    pub fn input_state(&self) -> ConnectionState {
        self.input_state
    }

    pub fn claws(&self) -> ClawPair {
        self.claws
    }

    /// One pass of the loop at time `now`.
    pub fn tick(&mut self, now: Instant) -> ControlSnapshot {
        if self.input_state == ConnectionState::Disconnected {
            self.try_discover(now);
        }

        let frame = match self.input_state {
            ConnectionState::Disconnected => None,
            _ => self.input.poll(),
        };

        let snapshot = match frame {
            Some(frame) => self.drive(frame, now),
            None => self.idle(now),
        };
        self.snapshots.publish(snapshot.clone());
        snapshot
    }

    /// Ticks until `stop` is set. Deadlines advance by one period per tick;
    /// after an overrun the schedule restarts from the current time.
    pub fn run(&mut self, stop: &AtomicBool) {
        tracing::info!(period = ?self.tick_period, "control loop started");
        let mut deadline = Instant::now();

        while !stop.load(Ordering::Relaxed) {
            self.tick(Instant::now());

            deadline += self.tick_period;
            let now = Instant::now();
            if now >= deadline {
                tracing::debug!(overrun = ?(now - deadline), "control tick overran");
                deadline = now;
            } else {
                thread::sleep(deadline - now);
            }
        }
        tracing::info!("control loop stopped");
    }

    fn try_discover(&mut self, now: Instant) {
        let due = self
            .last_discovery
            .map_or(true, |at| now.saturating_duration_since(at) >= self.reconnect_interval);
        if !due {
            return;
        }
        self.last_discovery = Some(now);

        if let Some(name) = self.input.discover() {
            tracing::info!(controller = %name, "input device found");
            self.controller_name = Some(name);
            self.input_state = ConnectionState::Connecting;
        }
    }

    fn drive(&mut self, frame: InputFrame, now: Instant) -> ControlSnapshot {
        if self.input_state == ConnectionState::Connecting {
            tracing::info!(controller = ?self.controller_name, "input device connected");
            self.input_state = ConnectionState::Connected;
        }

        if frame.screenshot && !self.screenshot_held {
            match self.screenshot_hook.as_mut() {
                Some(hook) => hook(),
                None => tracing::debug!("screenshot requested, no hook installed"),
            }
        }
        self.screenshot_held = frame.screenshot;

        let thrusters = self.mapper.map(&self.wiring.resolve(&frame.sticks));
        self.claws = ClawPair {
            primary: self.claw_machine.step_bound(self.claws.primary, self.primary_binding, &frame.controls),
            secondary: self.claw_machine.step_bound(self.claws.secondary, self.secondary_binding, &frame.controls),
        };

        let msg = OutboundMessage {
            axis_info: thrusters.to_array(),
            left_trigger: frame.controls.left_trigger,
            right_trigger: frame.controls.right_trigger,
            claw: self.claws.primary.pulsewidth(),
            claw2: self.claws.secondary.pulsewidth(),
        };

        //a refused hand-off leaves the slot open for the next tick
        let sent = self.limiter.is_due(now) && self.link.handle_data(msg);
        if sent {
            self.limiter.mark_sent(now);
        }

        ControlSnapshot {
            input_state: self.input_state,
            controller_name: self.controller_name.clone(),
            thrusters,
            claws: self.claws,
            sticks: frame.sticks,
            controls: frame.controls,
            sent,
        }
    }

    /// No device this tick. Thrusters go neutral, claws keep their position,
    /// nothing reaches the link.
    fn idle(&mut self, now: Instant) -> ControlSnapshot {
        if self.input_state != ConnectionState::Disconnected {
            tracing::warn!(controller = ?self.controller_name, "input device lost");
            self.input_state = ConnectionState::Disconnected;
            self.controller_name = None;
            self.last_discovery = Some(now);
        }
        self.screenshot_held = false;

        ControlSnapshot {
            input_state: ConnectionState::Disconnected,
            controller_name: None,
            thrusters: ThrusterCommandSet::neutral(),
            claws: self.claws,
            sticks: StickAxes::default(),
            controls: Controls::default(),
            sent: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pubsub::{ControlChannel, Subscriber, Topic};
    use crate::rov::input::ScriptedInput;
    use crate::uart::outbound_queue;
    use crossbeam_channel::Receiver;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    const TICK: Duration = Duration::from_millis(10);

    struct Rig<I: InputSource> {
        ctl: ControlLoop<I>,
        wire: Receiver<OutboundMessage>,
        ui: Subscriber<ControlSnapshot>,
        t0: Instant,
    }

    fn rig<I: InputSource>(input: I) -> Rig<I> {
        rig_with_queue(input, 64)
    }

    fn rig_with_queue<I: InputSource>(input: I, capacity: usize) -> Rig<I> {
        let t0 = Instant::now();
        let (link, wire) = outbound_queue(capacity);
        let topic: Arc<ControlChannel> = Topic::shared("/test/control", 512);
        let ui = Subscriber::new(Arc::clone(&topic));
        let ctl = ControlLoop::new(input, &RovConfig::default(), link, Publisher::new(topic));
        Rig { ctl, wire, ui, t0 }
    }

    impl<I: InputSource> Rig<I> {
        /// Runs ticks `from..=to`, returning the snapshots.
        fn ticks(&mut self, from: u64, to: u64) -> Vec<ControlSnapshot> {
            (from..=to).map(|k| self.ctl.tick(self.t0 + TICK * k as u32)).collect()
        }

        fn wire_messages(&self) -> Vec<OutboundMessage> {
            self.wire.try_iter().collect()
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
    fn test_two_seconds_hands_off_four_commands() {
        let mut r = rig(ScriptedInput::idle("pad"));
        let snaps = r.ticks(1, 200);
        assert_eq!(snaps.len(), 200);
        assert_eq!(snaps.iter().filter(|s| s.sent).count(), 4);
        assert_eq!(r.wire_messages().len(), 4);

        let sent_at: Vec<usize> = snaps.iter().enumerate().filter(|(_, s)| s.sent).map(|(i, _)| i + 1).collect();
        assert_eq!(sent_at, vec![1, 52, 103, 154]);
    }

    #[test]
    fn test_refused_hand_off_does_not_consume_slot() {
        let mut r = rig_with_queue(ScriptedInput::idle("pad"), 1);
        assert!(r.ctl.link.handle_data(OutboundMessage {
            axis_info: [1500; 4],
            left_trigger: 0.0,
            right_trigger: 0.0,
            claw: 1500,
            claw2: 1500,
        }));

        let first = r.ticks(1, 1);
        assert!(!first[0].sent);
        assert_eq!(r.wire_messages().len(), 1);

        let second = r.ticks(2, 2);
        assert!(second[0].sent);
        assert_eq!(r.wire_messages().len(), 1);

        //the clock now runs from tick 2
        let rest = r.ticks(3, 53);
        let sent_at: Vec<usize> = rest.iter().enumerate().filter(|(_, s)| s.sent).map(|(i, _)| i + 3).collect();
        assert_eq!(sent_at, vec![53]);
    }

    #[test]
    fn test_snapshot_carries_raw_controls() {
        let controls = Controls { left_trigger: 0.4, right_trigger: 0.9, left_bumper: true, right_bumper: false };
        let frame = InputFrame { controls, ..left_stick_pushed_forward() };
        let mut script = vec![Some(frame)];
        script.push(None);
        let mut r = rig(ScriptedInput::new("pad", script));

        let snaps = r.ticks(1, 2);
        assert_eq!(snaps[0].controls, controls);
        assert_eq!(snaps[0].sticks.left_y, Some(1.0));
        assert_eq!(snaps[1].controls, Controls::default());
    }

    #[test]
    fn test_snapshot_every_tick() {
        let mut r = rig(ScriptedInput::idle("pad"));
        r.ticks(1, 30);
        assert_eq!(r.ui.pending(), 30);
        let last = r.ui.latest().unwrap();
        assert_eq!(last.input_state, ConnectionState::Connected);
        assert_eq!(last.controller_name.as_deref(), Some("pad"));
        assert_eq!(last.thrusters, ThrusterCommandSet::neutral());
        assert!(!last.sent);
    }

    #[test]
    fn test_full_forward_reaches_wire() {
        let mut r = rig(ScriptedInput::constant("pad", left_stick_pushed_forward()));
        let snaps = r.ticks(1, 51);
        assert_eq!(
            snaps[0].thrusters,
            ThrusterCommandSet { left: 1900, right: 1900, top_left: 1500, top_right: 1500 }
        );
        let wire = r.wire_messages();
        assert_eq!(wire.len(), 1);
        assert_eq!(wire[0].axis_info, [1900, 1900, 1500, 1500]);
        assert_eq!(wire[0].claw, 1500);
        assert_eq!(wire[0].claw2, 1500);
    }

    #[test]
    fn test_claws_step_per_tick() {
        let frame = InputFrame {
            controls: Controls { right_trigger: 1.0, left_bumper: true, ..Default::default() },
            ..Default::default()
        };
        let mut r = rig(ScriptedInput::constant("pad", frame));
        r.ticks(1, 10);
        assert_eq!(r.ctl.claws().primary.pulsewidth(), 1570);
        assert_eq!(r.ctl.claws().secondary.pulsewidth(), 1430);

        r.ticks(11, 52);
        let wire = r.wire_messages();
        assert_eq!(wire.len(), 2);
        assert_eq!((wire[0].claw, wire[0].claw2), (1507, 1493));
        assert_eq!(wire[1].claw, 1500 + 7 * 52);
        assert_eq!(wire[1].claw2, 1500 - 7 * 52);
        assert_eq!(wire[1].right_trigger, 1.0);
        assert_eq!(wire[1].left_trigger, 0.0);
    }

    #[test]
    fn test_disconnect_suppresses_hand_off_and_holds_claws() {
        let open = InputFrame {
            controls: Controls { right_trigger: 1.0, ..Default::default() },
            ..left_stick_pushed_forward()
        };
        let mut script = vec![Some(open); 10];
        script.push(None);
        let mut r = rig(ScriptedInput::new("pad", script));

        r.ticks(1, 10);
        assert_eq!(r.ctl.input_state(), ConnectionState::Connected);
        assert_eq!(r.wire_messages().len(), 1);

        let snaps = r.ticks(11, 200);
        assert!(snaps.iter().all(|s| !s.sent));
        assert!(r.wire_messages().is_empty());

        let last = snaps.last().unwrap();
        assert_eq!(last.input_state, ConnectionState::Disconnected);
        assert_eq!(last.controller_name, None);
        assert_eq!(last.thrusters, ThrusterCommandSet::neutral());
        assert_eq!(last.claws.primary.pulsewidth(), 1570);
    }

    #[test]
    fn test_absent_device_never_sends() {
        let mut r = rig(ScriptedInput::absent());
        let snaps = r.ticks(1, 200);
        assert!(snaps.iter().all(|s| s.input_state == ConnectionState::Disconnected && !s.sent));
        assert!(r.wire_messages().is_empty());
    }

    #[test]
    fn test_reconnect_after_interval() {
        let script = vec![Some(InputFrame::default()), None, None, Some(left_stick_pushed_forward())];
        let mut r = rig(ScriptedInput::new("pad", script));

        //connected, then lost at tick 2
        r.ticks(1, 2);
        assert_eq!(r.ctl.input_state(), ConnectionState::Disconnected);

        //rediscovery waits a full interval; the next poll eats the second None
        r.ticks(3, 102);
        assert_eq!(r.ctl.input_state(), ConnectionState::Disconnected);

        //second attempt lands on the pushed-forward frame
        let snaps = r.ticks(103, 202);
        assert_eq!(r.ctl.input_state(), ConnectionState::Connected);
        assert_eq!(snaps.last().unwrap().thrusters.left, 1900);
    }

    #[test]
    fn test_screenshot_fires_once_per_press() {
        let down = InputFrame { screenshot: true, ..Default::default() };
        let up = InputFrame::default();
        let script = vec![Some(down), Some(down), Some(down), Some(up), Some(down), Some(up)];

        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let mut r = rig(ScriptedInput::new("pad", script));
        r.ctl = r.ctl.with_screenshot_hook(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        r.ticks(1, 20);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_run_stops_on_flag() {
        let mut r = rig(ScriptedInput::idle("pad"));
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            flag.store(true, Ordering::Relaxed);
        });

        r.ctl.run(&stop);
        stopper.join().unwrap();
        assert!(r.ui.pending() > 0);
    }
}
