//! Host doubles for the lifecycle collaborators
//!
//! All three share one simulated clock that only moves when the code under
//! test delays, so scenario tests are fully deterministic.

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use hal_abstractions::{
    AnalogSensor, BusError, LowPower, MessageBus, MessageHandler, Monotonic, RetainedStore,
    StoreError,
};
use rand_core::RngCore;

use crate::codec;
use crate::config::topics;
use crate::message::{BindResponse, BindStatus, Message, Payload};

/// Shared simulated time in nanoseconds
#[derive(Debug, Clone, Default)]
pub struct SimClock(Rc<Cell<u64>>);

impl SimClock {
    pub fn now_ms(&self) -> u64 {
        self.0.get() / 1_000_000
    }

    pub fn advance_ns(&self, ns: u64) {
        self.0.set(self.0.get() + ns);
    }
}

pub struct SimPlatform {
    clock: SimClock,
    rng: u64,
    /// Value returned for every channel
    pub reading: f32,
    /// Durations passed to `enter_deep_sleep`
    pub sleeps: Vec<u64>,
}

impl Monotonic for SimPlatform {
    fn now_ms(&mut self) -> u64 {
        self.clock.now_ms()
    }
}

impl AnalogSensor for SimPlatform {
    fn read_normalized(&mut self, _channel: u8) -> f32 {
        self.reading
    }
}

impl LowPower for SimPlatform {
    fn enter_deep_sleep(&mut self, duration_us: u64) {
        self.sleeps.push(duration_us);
        self.clock.advance_ns(duration_us * 1_000);
    }
}

impl DelayNs for SimPlatform {
    fn delay_ns(&mut self, ns: u32) {
        self.clock.advance_ns(u64::from(ns));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.clock.advance_ns(u64::from(ms) * 1_000_000);
    }
}

impl RngCore for SimPlatform {
    fn next_u32(&mut self) -> u32 {
        self.next_u64() as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.rng ^= self.rng << 13;
        self.rng ^= self.rng >> 7;
        self.rng ^= self.rng << 17;
        self.rng
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        rand_core::impls::fill_bytes_via_next(self, dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

/// How the simulated backend answers the next bind request
#[derive(Debug, Clone, Copy)]
pub enum BindReply {
    Grant(&'static str),
    Refuse,
    /// Grant under a correlation id that was never issued
    Mismatched(&'static str),
    Silent,
}

#[derive(Debug, Clone)]
pub struct Published {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl Published {
    pub fn text(&self) -> &str {
        std::str::from_utf8(&self.payload).unwrap()
    }
}

struct Inbound {
    deliver_at_ms: u64,
    topic: String,
    payload: Vec<u8>,
}

/// In-memory broker with a scripted backend behind it
pub struct SimBus {
    clock: SimClock,
    connected: bool,
    inbox: VecDeque<Inbound>,
    /// Number of upcoming connect attempts to refuse
    pub refuse_connects: u32,
    pub connect_attempts: u32,
    pub subscribe_calls: Vec<String>,
    /// Refuse every publish while staying connected
    pub fail_publishes: bool,
    pub published: Vec<Published>,
    /// Answers to successive bind requests; silent once exhausted
    pub bind_replies: VecDeque<BindReply>,
    /// Delay before a bind answer is delivered
    pub reply_delay_ms: u64,
    /// Queue a stop right after this many measurement reports
    pub stop_after_reports: Option<usize>,
}

impl SimBus {
    /// Queue an inbound message for the next pump
    pub fn send(&mut self, topic: &str, payload: &[u8]) {
        self.send_at(self.clock.now_ms(), topic, payload);
    }

    /// Queue an inbound message that becomes visible at `deliver_at_ms`
    pub fn send_at(&mut self, deliver_at_ms: u64, topic: &str, payload: &[u8]) {
        self.inbox.push_back(Inbound {
            deliver_at_ms,
            topic: topic.to_string(),
            payload: payload.to_vec(),
        });
    }

    pub fn drop_connection(&mut self) {
        self.connected = false;
    }

    pub fn published_on(&self, topic: &str) -> Vec<&Published> {
        self.published.iter().filter(|p| p.topic == topic).collect()
    }

    pub fn statuses(&self) -> Vec<&str> {
        self.published_on(topics::STATUS)
            .into_iter()
            .map(Published::text)
            .collect()
    }

    pub fn position(&self, topic: &str, payload: &str) -> Option<usize> {
        self.published
            .iter()
            .position(|p| p.topic == topic && p.payload == payload.as_bytes())
    }

    fn answer_bind(&mut self, payload: &[u8]) {
        let request = codec::decode_bind_request(payload).unwrap();
        let response = match self.bind_replies.pop_front().unwrap_or(BindReply::Silent) {
            BindReply::Grant(id) => BindResponse {
                request_id: request.request_id,
                device_id: id.try_into().unwrap(),
                status: BindStatus::Ok,
            },
            BindReply::Refuse => BindResponse {
                request_id: request.request_id,
                device_id: Default::default(),
                status: BindStatus::Fail,
            },
            BindReply::Mismatched(id) => BindResponse {
                request_id: "ffffffff-ffff-4fff-bfff-ffffffffffff".try_into().unwrap(),
                device_id: id.try_into().unwrap(),
                status: BindStatus::Ok,
            },
            BindReply::Silent => return,
        };

        let encoded: Payload = codec::encode(&Message::BindResponse(response)).unwrap();
        let at = self.clock.now_ms() + self.reply_delay_ms;
        self.send_at(at, topics::BIND_RESPONSE, encoded.as_bytes());
    }
}

impl MessageBus for SimBus {
    fn connect(&mut self, _client_id: &str) -> Result<(), BusError> {
        self.connect_attempts += 1;
        if self.refuse_connects > 0 {
            self.refuse_connects -= 1;
            return Err(BusError::ConnectFailed);
        }
        self.connected = true;
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), BusError> {
        if !self.connected {
            return Err(BusError::NotConnected);
        }
        self.subscribe_calls.push(topic.to_string());
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BusError> {
        if !self.connected {
            return Err(BusError::NotConnected);
        }
        if self.fail_publishes {
            return Err(BusError::PublishFailed);
        }
        self.published.push(Published {
            topic: topic.to_string(),
            payload: payload.to_vec(),
        });

        match topic {
            topics::BIND_REQUEST => self.answer_bind(payload),
            topics::MEASUREMENT => {
                let reports = self.published_on(topics::MEASUREMENT).len();
                if self.stop_after_reports == Some(reports) {
                    self.send(topics::COMMAND, b"finalizar");
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn pump(&mut self, handler: &mut dyn MessageHandler) -> Result<(), BusError> {
        if !self.connected {
            return Err(BusError::Disconnected);
        }
        let now = self.clock.now_ms();
        let mut later = VecDeque::new();
        while let Some(msg) = self.inbox.pop_front() {
            if msg.deliver_at_ms <= now {
                handler.on_message(&msg.topic, &msg.payload);
            } else {
                later.push_back(msg);
            }
        }
        self.inbox = later;
        Ok(())
    }
}

/// Retained region backed by a byte vector
pub struct SimStore {
    pub region: Vec<u8>,
    pub writes: u32,
    pub fail_reads: bool,
}

impl RetainedStore for SimStore {
    fn read(&mut self, buf: &mut [u8]) -> Result<(), StoreError> {
        if self.fail_reads {
            return Err(StoreError::Hardware);
        }
        let src = self.region.get(..buf.len()).ok_or(StoreError::OutOfRange)?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), StoreError> {
        let dst = self
            .region
            .get_mut(..bytes.len())
            .ok_or(StoreError::OutOfRange)?;
        dst.copy_from_slice(bytes);
        self.writes += 1;
        Ok(())
    }
}

impl SimStore {
    /// Blank (zeroed) retained memory
    pub fn blank() -> Self {
        Self {
            region: vec![0; 64],
            writes: 0,
            fail_reads: false,
        }
    }

    /// Retained memory holding `bytes` at the start
    pub fn holding(bytes: &[u8]) -> Self {
        let mut store = Self::blank();
        store.region[..bytes.len()].copy_from_slice(bytes);
        store
    }
}

/// Fresh platform and disconnected bus sharing one clock
pub fn rig() -> (SimPlatform, SimBus) {
    let clock = SimClock::default();
    let platform = SimPlatform {
        clock: clock.clone(),
        rng: 0x2545_F491_4F6C_DD1D,
        reading: 1.5,
        sleeps: Vec::new(),
    };
    let bus = SimBus {
        clock,
        connected: false,
        inbox: VecDeque::new(),
        refuse_connects: 0,
        connect_attempts: 0,
        subscribe_calls: Vec::new(),
        fail_publishes: false,
        published: Vec::new(),
        bind_replies: VecDeque::new(),
        reply_delay_ms: 50,
        stop_after_reports: None,
    };
    (platform, bus)
}

impl SimPlatform {
    pub fn clock_ms(&self) -> u64 {
        self.clock.now_ms()
    }
}
