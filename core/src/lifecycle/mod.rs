//! Sensor node lifecycle
//!
//! One measurement cycle runs from a `start` command to a `stop` command:
//!
//! ```text
//! ConnectingBus ─► Idle ─start─► Binding ─ack─► Measuring ─► Sleeping ─┐
//!       ▲                                          ▲                    │
//!       │                                          └────────────────────┘
//!       └──── Shutdown ◄── Cleanup ◄──stop (latched at a decision point)
//! ```
//!
//! The controller is driven by [`Lifecycle::tick`]. Each tick first drains
//! the bus so commands and bind responses are applied, then runs the handler
//! of the current state once. Handlers that wait (bind timeout, drain window)
//! keep pumping the bus while they wait.
//!
//! Cycle progress ([`CycleState`]) is written to retained memory whenever it
//! changes, before deep sleep and at shutdown, so a reset in the middle of a
//! cycle resumes where it left off.

use hal_abstractions::{BusError, MessageBus, Platform, RetainedStore};

use crate::binding::BindSession;
use crate::codec;
use crate::config::{topics, LifecycleConfig};
use crate::cycle::{CycleState, RECORD_LEN};
use crate::error::ConfigError;
use crate::message::{DeviceName, MeasurementReport, Message, Payload, UnbindNotice};

mod inbound;


use inbound::Session;

/// Lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// Establishing the bus session and subscriptions
    ConnectingBus,
    /// Connected, waiting for a start command
    Idle,
    /// Requesting an identity from the backend
    Binding,
    /// Publishing a report, then draining the bus
    Measuring,
    /// Publishing sleep status, then entering deep sleep
    Sleeping,
    /// Releasing the identity
    Cleanup,
    /// Clearing cycle state
    Shutdown,
}

impl State {
    /// Whether a start command is honoured in this state
    pub fn accepts_start(self) -> bool {
        !matches!(self, Self::Cleanup | Self::Shutdown)
    }

    /// Whether a stop command is honoured in this state
    pub fn accepts_stop(self) -> bool {
        matches!(self, Self::Binding | Self::Measuring)
    }

    /// State to resume in after boot, given the retained cycle
    pub fn resume_from(cycle: &CycleState) -> Self {
        if cycle.finalized {
            Self::Cleanup
        } else if cycle.active && cycle.is_bound() {
            Self::Measuring
        } else {
            Self::ConnectingBus
        }
    }
}

/// Volatile controller state, rebuilt on every boot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeState {
    pub state: State,
    pub binding: BindSession,
}

/// Counters for dropped or failed traffic
///
/// None of these failures stops the lifecycle; they are only counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LifecycleStats {
    pub reports_published: u32,
    pub bind_requests: u32,
    pub decode_failures: u32,
    pub encode_failures: u32,
    pub publish_failures: u32,
}

/// Lifecycle controller
///
/// Owns the platform, bus and retained store for its whole life. Nothing is
/// global, so independent controllers can coexist.
pub struct Lifecycle<P, B, S> {
    platform: P,
    bus: B,
    store: S,
    config: LifecycleConfig,
    device_name: DeviceName,
    session: Session,
}

impl<P, B, S> Lifecycle<P, B, S>
where
    P: Platform,
    B: MessageBus,
    S: RetainedStore,
{
    /// Build a controller, restoring any retained cycle
    ///
    /// An unreadable or invalid retained record is treated as a fresh boot.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if `config` fails validation.
    pub fn new(platform: P, bus: B, mut store: S, config: LifecycleConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let device_name =
            DeviceName::try_from(config.device_name).map_err(|_| ConfigError::DeviceNameTooLong)?;

        let cycle = load_cycle(&mut store);
        let state = State::resume_from(&cycle);
        info!(
            "Boot: resuming in {} (active={}, finalized={}, bound={})",
            state,
            cycle.active,
            cycle.finalized,
            cycle.is_bound()
        );

        Ok(Self {
            platform,
            bus,
            store,
            config,
            device_name,
            session: Session {
                runtime: RuntimeState {
                    state,
                    binding: BindSession::restored(cycle.is_bound()),
                },
                cycle,
                stats: LifecycleStats::default(),
                dirty: false,
            },
        })
    }

    pub fn state(&self) -> State {
        self.session.runtime.state
    }

    pub fn runtime(&self) -> &RuntimeState {
        &self.session.runtime
    }

    pub fn cycle(&self) -> &CycleState {
        &self.session.cycle
    }

    pub fn stats(&self) -> LifecycleStats {
        self.session.stats
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Give back the owned collaborators
    pub fn into_parts(self) -> (P, B, S) {
        (self.platform, self.bus, self.store)
    }

    /// Drive the lifecycle forever
    pub fn run(&mut self) -> ! {
        loop {
            if let Err(e) = self.tick() {
                warn!("Tick failed: {}", e);
            }
            self.platform.delay_ms(self.config.tick_interval_ms);
        }
    }

    /// Apply pending inbound messages, then run the current state once
    ///
    /// Returns the state reached at the end of the tick.
    ///
    /// # Errors
    ///
    /// Bus failures are returned after the controller has already moved back
    /// to `ConnectingBus`; the next tick retries.
    pub fn tick(&mut self) -> Result<State, BusError> {
        if self.state() != State::ConnectingBus {
            self.pump()?;
        }

        match self.state() {
            State::ConnectingBus => self.connect_bus()?,
            State::Idle => self.idle(),
            State::Binding => self.bind()?,
            State::Measuring => self.measure()?,
            State::Sleeping => self.sleep(),
            State::Cleanup => self.cleanup()?,
            State::Shutdown => self.shutdown()?,
        }

        Ok(self.state())
    }

    fn enter(&mut self, next: State) {
        let current = self.session.runtime.state;
        if current != next {
            debug!("{} -> {}", current, next);
            self.session.runtime.state = next;
        }
    }

    fn connect_bus(&mut self) -> Result<(), BusError> {
        if !self.bus.is_connected() {
            if let Err(e) = self.bus.connect(self.config.client_id) {
                warn!(
                    "Bus connect failed: {}, retrying in {} ms",
                    e, self.config.connect_backoff_ms
                );
                self.platform.delay_ms(self.config.connect_backoff_ms);
                return Err(e);
            }
            info!("Bus connected as {}", self.config.client_id);
        }

        for topic in [topics::COMMAND, topics::BIND_RESPONSE] {
            if let Err(e) = self.bus.subscribe(topic) {
                warn!("Subscribe to {} failed: {}", topic, e);
                self.platform.delay_ms(self.config.connect_backoff_ms);
                return Err(e);
            }
        }

        self.enter(State::Idle);
        Ok(())
    }

    /// Forward a cycle restored or latched while disconnected
    fn idle(&mut self) {
        let cycle = &self.session.cycle;
        let next = if cycle.finalized {
            State::Cleanup
        } else if cycle.active && cycle.is_bound() {
            State::Measuring
        } else if cycle.active {
            State::Binding
        } else {
            return;
        };
        self.enter(next);
    }

    fn bind(&mut self) -> Result<(), BusError> {
        if self.session.runtime.binding.is_acknowledged() {
            self.enter(State::Measuring);
            return Ok(());
        }
        if self.session.cycle.finalized {
            self.abandon_binding();
            return Ok(());
        }

        let request = self
            .session
            .runtime
            .binding
            .begin(&mut self.platform, &self.device_name);
        self.session.stats.bind_requests += 1;
        info!("[BIND] Requesting identity, req_id={}", request.request_id);
        self.publish_message(topics::BIND_REQUEST, &Message::BindRequest(request))?;

        self.poll_until(self.config.bind_timeout_ms, |session| {
            session.runtime.binding.is_acknowledged() || session.cycle.finalized
        })?;

        if self.session.runtime.binding.is_acknowledged() {
            self.enter(State::Measuring);
        } else if self.session.cycle.finalized {
            self.abandon_binding();
        } else {
            warn!(
                "[BIND] No identity after {} ms, retrying in {} ms",
                self.config.bind_timeout_ms, self.config.bind_retry_backoff_ms
            );
            self.platform.delay_ms(self.config.bind_retry_backoff_ms);
        }
        Ok(())
    }

    /// Leave `Binding` for `Cleanup`; a later grant for the abandoned request
    /// is ignored
    fn abandon_binding(&mut self) {
        info!("[BIND] Stopped before an identity was assigned");
        self.session.runtime.binding.abandon();
        self.enter(State::Cleanup);
    }

    fn measure(&mut self) -> Result<(), BusError> {
        let value = self.platform.read_normalized(self.config.sensor_channel);
        let state_of_charge = match self.config.battery_channel {
            Some(channel) => self.platform.read_normalized(channel),
            None => 0.0,
        };
        let device_id = self.session.cycle.assigned_id.clone().unwrap_or_default();

        let report = MeasurementReport {
            value,
            state_of_charge,
            device_id,
        };
        if self.publish_message(topics::MEASUREMENT, &Message::MeasurementReport(report))? {
            self.session.stats.reports_published += 1;
            info!("Reported {} (soc {})", value, state_of_charge);
        }

        // A stop arriving right after the report ends the cycle without
        // another sleep
        self.poll_until(self.config.drain_window_ms, |session| session.cycle.finalized)?;

        if self.session.cycle.finalized {
            self.enter(State::Cleanup);
        } else {
            self.enter(State::Sleeping);
        }
        Ok(())
    }

    /// Sleeps even when the status could not be sent
    fn sleep(&mut self) {
        if self.publish_status("sleeping").is_err() {
            debug!("Sleeping without status");
        }
        self.persist();

        info!("Deep sleep for {} us", self.config.sleep_duration_us);
        self.platform.enter_deep_sleep(self.config.sleep_duration_us);

        // Only reached when the platform wakes without a reset
        self.enter(State::Measuring);
    }

    fn cleanup(&mut self) -> Result<(), BusError> {
        self.publish_status("cleanup")?;

        if let Some(device_id) = self.session.cycle.assigned_id.clone() {
            info!("[BIND] Releasing identity {}", device_id);
            self.publish_message(topics::UNBIND, &Message::UnbindNotice(UnbindNotice { device_id }))?;
        } else {
            info!("[BIND] No identity to release");
        }

        self.enter(State::Shutdown);
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), BusError> {
        self.publish_status("shutdown")?;

        self.session.cycle = CycleState::default();
        self.session.runtime.binding.reset();
        self.persist();
        info!("Cycle finished");

        self.enter(State::ConnectingBus);
        Ok(())
    }

    /// Pump the bus until `done` holds or `window_ms` elapses
    fn poll_until(&mut self, window_ms: u32, done: impl Fn(&Session) -> bool) -> Result<bool, BusError> {
        let started = self.platform.now_ms();
        loop {
            self.pump()?;
            if done(&self.session) {
                return Ok(true);
            }
            if self.platform.now_ms().saturating_sub(started) >= u64::from(window_ms) {
                return Ok(false);
            }
            self.platform.delay_ms(self.config.poll_interval_ms);
        }
    }

    fn pump(&mut self) -> Result<(), BusError> {
        let result = if self.bus.is_connected() {
            self.bus.pump(&mut self.session)
        } else {
            Err(BusError::Disconnected)
        };
        if self.session.dirty {
            self.persist();
        }

        result.map_err(|e| {
            warn!("Bus lost in {}: {}", self.session.runtime.state, e);
            self.enter(State::ConnectingBus);
            e
        })
    }

    /// Encode and publish one message
    ///
    /// Returns `Ok(false)` when the message was dropped without losing the
    /// bus (encode failure or a refused publish).
    fn publish_message(&mut self, topic: &str, msg: &Message) -> Result<bool, BusError> {
        let encoded: Result<Payload, _> = codec::encode(msg);
        match encoded {
            Ok(payload) => self.publish_raw(topic, payload.as_bytes()),
            Err(e) => {
                self.session.stats.encode_failures += 1;
                error!("Dropping {} message: {}", msg.shape(), e);
                Ok(false)
            }
        }
    }

    fn publish_status(&mut self, status: &str) -> Result<bool, BusError> {
        self.publish_raw(topics::STATUS, status.as_bytes())
    }

    fn publish_raw(&mut self, topic: &str, payload: &[u8]) -> Result<bool, BusError> {
        match self.bus.publish(topic, payload) {
            Ok(()) => Ok(true),
            Err(e) => {
                self.session.stats.publish_failures += 1;
                warn!("Publish to {} failed: {}", topic, e);
                if self.bus.is_connected() {
                    Ok(false)
                } else {
                    self.enter(State::ConnectingBus);
                    Err(e)
                }
            }
        }
    }

    fn persist(&mut self) {
        let record = self.session.cycle.to_bytes();
        match self.store.write(&record) {
            Ok(()) => trace!("Retained cycle state written"),
            Err(e) => error!("Failed to retain cycle state: {}", e),
        }
        self.session.dirty = false;
    }
}

fn load_cycle<S: RetainedStore>(store: &mut S) -> CycleState {
    let mut record = [0u8; RECORD_LEN];
    if let Err(e) = store.read(&mut record) {
        warn!("Retained memory unreadable: {}", e);
        return CycleState::default();
    }

    match CycleState::from_bytes(&record) {
        Ok(cycle) => cycle,
        Err(e) => {
            info!("No retained cycle ({}), starting fresh", e);
            CycleState::default()
        }
    }
}
