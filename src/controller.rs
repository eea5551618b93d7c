// Teleop controller: the whole motion command pipeline in one owned struct
//
// input event -> mapping -> ramp -> transmission gate -> transport
//
// Every handler is synchronous and runs to completion; the async runtime
// calls them with the current time and the outbound transport.

use tracing::{debug, info, warn};

use crate::config::{TeleopConfig, STOP_BURST_COUNT, STOP_BURST_SPACING_MS};
use crate::connection::{ConnectionManager, ConnectionState};
use crate::drive::{eight_way, Axis, AxisState, MotorActual, MotorTarget, Ramp, StickVector};
use crate::gate::{GateOutcome, PwmPayload, TransmissionGate};
use crate::messages::{Command, Direction, ServerMessage};
use crate::repeater::CommandRepeater;
use crate::sequence::MotorTest;
use crate::transport::Transport;

/// Everything an input source can ask for
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// One axis of the two-axis (mixer) mode moved, value in [-1, 1]
    AxisMoved { axis: Axis, value: f32 },
    AxisReleased { axis: Axis },
    /// Single stick (eight-way mode) moved
    StickMoved(StickVector),
    StickReleased,
    /// Discrete held command
    DirectionPressed(Direction),
    DirectionReleased(Direction),
    SetSpeed(u8),
    AdjustSpeed(i16),
    Calibrate,
    EmergencyStop,
    RunMotorTest,
}

// Remaining stops of an emergency stop burst
#[derive(Debug, Clone, Copy, PartialEq)]
struct StopBurst {
    remaining: u8,
    next_at: u64,
}

impl StopBurst {
    // Stops still owed after the first of `count`, if any
    fn follow_up(count: u8, now_ms: u64) -> Option<Self> {
        let remaining = count.saturating_sub(1);
        (remaining > 0).then(|| Self {
            remaining,
            next_at: now_ms.saturating_add(STOP_BURST_SPACING_MS),
        })
    }

    // True when a stop is due; consumes it
    fn poll(&mut self, now_ms: u64) -> bool {
        if self.remaining == 0 || now_ms < self.next_at {
            return false;
        }
        self.remaining -= 1;
        self.next_at = now_ms.saturating_add(STOP_BURST_SPACING_MS);
        true
    }

    fn is_done(&self) -> bool {
        self.remaining == 0
    }
}

pub struct TeleopController {
    connection: ConnectionManager,
    axes: AxisState,
    target: MotorTarget,
    ramp: Ramp,
    gate: TransmissionGate,
    repeater: CommandRepeater,
    motor_test: Option<MotorTest>,
    stop_burst: Option<StopBurst>,
    speed: u8,
}

impl TeleopController {
    pub fn new(config: &TeleopConfig) -> Self {
        Self {
            connection: ConnectionManager::new(config.reconnect_delay),
            axes: AxisState::default(),
            target: MotorTarget::stopped(),
            ramp: Ramp::new(config.tick_ms, config.ramp_ms),
            gate: TransmissionGate::new(),
            repeater: CommandRepeater::new(config.repeat_ms),
            motor_test: None,
            stop_burst: None,
            speed: config.speed,
        }
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn target(&self) -> MotorTarget {
        self.target
    }

    pub fn actual(&self) -> MotorActual {
        self.ramp.actual()
    }

    pub fn speed(&self) -> u8 {
        self.speed
    }

    pub fn active_direction(&self) -> Option<Direction> {
        self.repeater.active()
    }

    pub fn last_sent(&self) -> Option<PwmPayload> {
        self.gate.last_sent()
    }

    /// Dispatch an input event to its handler
    pub fn handle_input<T: Transport + ?Sized>(
        &mut self,
        event: InputEvent,
        now_ms: u64,
        transport: &mut T,
    ) {
        match event {
            InputEvent::AxisMoved { axis, value } => self.on_axis(axis, value, now_ms),
            InputEvent::AxisReleased { axis } => self.on_axis(axis, 0.0, now_ms),
            InputEvent::StickMoved(stick) => self.target = eight_way(stick),
            InputEvent::StickReleased => self.target = MotorTarget::stopped(),
            InputEvent::DirectionPressed(direction) => {
                for cmd in self.repeater.press(direction, now_ms) {
                    self.send(&cmd, transport);
                }
            }
            InputEvent::DirectionReleased(direction) => {
                if let Some(cmd) = self.repeater.release(direction) {
                    self.send(&cmd, transport);
                }
            }
            InputEvent::SetSpeed(value) => self.set_speed(value, transport),
            InputEvent::AdjustSpeed(delta) => {
                let value = (self.speed as i16 + delta).clamp(0, u8::MAX as i16) as u8;
                self.set_speed(value, transport);
            }
            InputEvent::Calibrate => {
                info!("Calibrating");
                self.send(
                    &Command::Move {
                        direction: Direction::Calibrate,
                    },
                    transport,
                );
            }
            InputEvent::EmergencyStop => self.emergency_stop(now_ms, transport),
            InputEvent::RunMotorTest => {
                info!("Starting motor test");
                self.repeater.cancel();
                let (test, first) = MotorTest::start(now_ms);
                self.motor_test = Some(test);
                self.send(&first, transport);
            }
        }
    }

    /// Fixed-rate tick: ramp, gate, and the timed command sources
    pub fn on_tick<T: Transport + ?Sized>(&mut self, now_ms: u64, transport: &mut T) {
        let actual = self.ramp.step(self.target);
        let payload = PwmPayload::from_actual(actual);
        if self.gate.offer(payload, self.connection.is_connected(), transport) == GateOutcome::Sent
        {
            debug!(
                "Motor payload: left={}, right={} (target {}, {})",
                payload.left, payload.right, self.target.left, self.target.right
            );
        }

        if let Some(cmd) = self.repeater.tick(now_ms) {
            self.send(&cmd, transport);
        }

        if let Some(burst) = self.stop_burst.as_mut() {
            if burst.poll(now_ms) {
                if burst.is_done() {
                    self.stop_burst = None;
                }
                self.send(&Command::stop(), transport);
            }
        }

        if let Some(test) = self.motor_test.as_mut() {
            let next = test.tick(now_ms);
            if test.is_finished() {
                info!("Motor test finished");
                self.motor_test = None;
            }
            if let Some(cmd) = next {
                self.send(&cmd, transport);
            }
        }
    }

    /// True when the runtime should start a connect attempt now
    pub fn poll_reconnect(&mut self, now_ms: u64) -> bool {
        self.connection.poll_reconnect(now_ms)
    }

    /// When the next connect attempt is due
    pub fn reconnect_at(&self) -> Option<u64> {
        self.connection.reconnect_at()
    }

    /// Transport open signal
    pub fn on_connected<T: Transport + ?Sized>(&mut self, transport: &mut T) {
        if !self.connection.on_open() {
            return;
        }
        // Car starts from standstill; ramp up again from zero
        self.ramp.reset();
        self.send(&Command::stop(), transport);
        // The firmware keeps its own base speed; push ours so its echo agrees
        self.send(&Command::Speed { value: self.speed }, transport);
    }

    /// Transport close/error signal
    pub fn on_disconnected(&mut self, now_ms: u64, reason: &str) {
        if !self.connection.on_closed(now_ms, reason) {
            return;
        }
        if self.repeater.cancel() {
            debug!("Cancelled held command on disconnect");
        }
        self.motor_test = None;
        self.stop_burst = None;
    }

    /// Inbound text frame
    pub fn on_message(&mut self, text: &str) {
        match ServerMessage::parse(text) {
            Ok(ServerMessage::Welcome { message }) => info!("Server: {}", message),
            Ok(ServerMessage::Ack { speed: Some(speed) }) => {
                if speed != self.speed {
                    debug!("Car reports speed {}", speed);
                }
                self.speed = speed;
            }
            Ok(ServerMessage::Ack { speed: None }) => {}
            Ok(ServerMessage::Other) => debug!("Unhandled message: {}", text),
            Err(e) => warn!("Failed to parse message {:?}: {}", text, e),
        }
    }

    /// Stop everything before quitting
    pub fn shutdown<T: Transport + ?Sized>(&mut self, transport: &mut T) {
        self.repeater.cancel();
        self.motor_test = None;
        self.stop_burst = None;
        self.target = MotorTarget::stopped();
        self.ramp.reset();
        self.send(&Command::stop(), transport);
    }

    fn on_axis(&mut self, axis: Axis, value: f32, now_ms: u64) {
        self.axes.update(axis, value, now_ms);
        self.target = self.axes.target();
    }

    fn set_speed<T: Transport + ?Sized>(&mut self, value: u8, transport: &mut T) {
        self.speed = value;
        info!("Speed: {}", value);
        self.send(&Command::Speed { value }, transport);
    }

    fn emergency_stop<T: Transport + ?Sized>(&mut self, now_ms: u64, transport: &mut T) {
        warn!("Emergency stop");
        self.repeater.cancel();
        self.motor_test = None;
        self.axes = AxisState::default();
        self.target = MotorTarget::stopped();
        self.ramp.reset();

        self.send(&Command::stop(), transport);
        self.stop_burst = StopBurst::follow_up(STOP_BURST_COUNT, now_ms);
    }

    // Direct command send; dropped when the link is down
    fn send<T: Transport + ?Sized>(&mut self, cmd: &Command, transport: &mut T) -> bool {
        if !self.connection.is_connected() {
            debug!("Not connected, dropping {:?}", cmd);
            return false;
        }
        match transport.send(cmd) {
            Ok(()) => {
                if cmd.is_stop() {
                    self.gate.record(PwmPayload::ZERO);
                }
                true
            }
            Err(e) => {
                debug!("Dropped {:?}: {}", cmd, e);
                false
            }
        }
    }
}
