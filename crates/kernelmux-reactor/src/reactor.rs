use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;

use mio::event::Source;
use mio::{Events, Poll, Registry, Token, Waker};
use tracing::{debug, error, info, trace};

use crate::error::{ChannelError, ReactorError, Result};
use crate::interest::{Interest, Readiness};

/// Default bound on each poll: 100 µs.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_micros(100);

/// Default number of readiness events collected per poll.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

const WAKE_TOKEN: Token = Token(usize::MAX);

/// Reactor tuning.
#[derive(Debug, Clone)]
pub struct ReactorConfig {
    /// Upper bound on how long one tick waits for readiness.
    pub poll_interval: Duration,
    /// Events buffer size per poll.
    pub event_capacity: usize,
}

impl Default for ReactorConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// Something the reactor polls and dispatches to.
///
/// Both callbacks return the interest the handler wants next; the reactor
/// re-registers the source only when that differs from the current one. An
/// error from either callback stops the reactor.
pub trait EventHandler {
    fn name(&self) -> &str;

    /// Interest to register with initially.
    fn interest(&self) -> Interest;

    /// The pollable source behind this handler.
    fn source(&mut self) -> &mut dyn Source;

    /// Called with the readiness the poll reported for this handler.
    fn on_ready(&mut self, readiness: Readiness) -> std::result::Result<Interest, ChannelError>;

    /// Called once per tick for handlers subscribed to wake-ups.
    fn on_wakeup(&mut self) -> std::result::Result<Interest, ChannelError>;
}

struct Slot {
    handler: Box<dyn EventHandler>,
    interest: Interest,
}

/// Single-threaded poll loop over registered endpoints.
///
/// The reactor owns every handler registered with it. The only way in from
/// other threads is the shared [`Waker`], which cuts the current poll short
/// so wake-up subscribers are serviced promptly.
pub struct Reactor {
    poll: Poll,
    events: Events,
    waker: Arc<Waker>,
    slots: Vec<Slot>,
    wakeup_targets: Vec<Token>,
    ready: Vec<(Token, Readiness)>,
    config: ReactorConfig,
    registrations: u64,
}

impl Reactor {
    pub fn new() -> Result<Self> {
        Self::with_config(ReactorConfig::default())
    }

    pub fn with_config(config: ReactorConfig) -> Result<Self> {
        let poll = Poll::new().map_err(ReactorError::Setup)?;
        let waker = Waker::new(poll.registry(), WAKE_TOKEN).map_err(ReactorError::Setup)?;
        Ok(Self {
            poll,
            events: Events::with_capacity(config.event_capacity.max(1)),
            waker: Arc::new(waker),
            slots: Vec::new(),
            wakeup_targets: Vec::new(),
            ready: Vec::new(),
            config,
            registrations: 0,
        })
    }

    /// Handle used to interrupt the poll from another thread.
    pub fn waker(&self) -> Arc<Waker> {
        Arc::clone(&self.waker)
    }

    pub fn config(&self) -> &ReactorConfig {
        &self.config
    }

    /// Register `handler` with its current interest and take ownership of it.
    pub fn register_endpoint(&mut self, mut handler: Box<dyn EventHandler>) -> Result<Token> {
        let token = Token(self.slots.len());
        let interest = handler.interest();
        let registered = self
            .poll
            .registry()
            .register(handler.source(), token, interest.into());
        if let Err(source) = registered {
            return Err(ReactorError::Register {
                name: handler.name().to_string(),
                source,
            });
        }
        self.registrations += 1;
        debug!(endpoint = handler.name(), token = token.0, ?interest, "endpoint registered");
        self.slots.push(Slot { handler, interest });
        Ok(token)
    }

    /// Subscribe a registered handler to wake-up servicing.
    pub fn register_wakeup(&mut self, token: Token) -> Result<()> {
        let slot = self
            .slots
            .get(token.0)
            .ok_or(ReactorError::UnknownToken(token.0))?;
        if !self.wakeup_targets.contains(&token) {
            debug!(endpoint = slot.handler.name(), "wake-up source registered");
            self.wakeup_targets.push(token);
        }
        Ok(())
    }

    /// Registrations plus re-registrations performed so far.
    pub fn registration_calls(&self) -> u64 {
        self.registrations
    }

    /// Interest currently registered for `token`.
    pub fn interest_of(&self, token: Token) -> Option<Interest> {
        self.slots.get(token.0).map(|slot| slot.interest)
    }

    pub fn endpoint_count(&self) -> usize {
        self.slots.len()
    }

    /// Run one tick: poll for at most `timeout`, dispatch readiness, then
    /// service wake-up subscribers.
    pub fn turn(&mut self, timeout: Option<Duration>) -> Result<()> {
        match self.poll.poll(&mut self.events, timeout) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::Interrupted => return Ok(()),
            Err(err) => return Err(ReactorError::Poll(err)),
        }

        let mut woken = false;
        self.ready.clear();
        for event in self.events.iter() {
            if event.token() == WAKE_TOKEN {
                woken = true;
            } else {
                self.ready.push((event.token(), Readiness::from_event(event)));
            }
        }
        if woken {
            trace!("reactor woken");
        }

        for i in 0..self.ready.len() {
            let (token, readiness) = self.ready[i];
            self.dispatch(token, |handler| handler.on_ready(readiness))?;
        }
        for i in 0..self.wakeup_targets.len() {
            let token = self.wakeup_targets[i];
            self.dispatch(token, |handler| handler.on_wakeup())?;
        }
        Ok(())
    }

    /// Tick forever. Returns only when a handler or the poll fails.
    pub fn run(&mut self) -> Result<()> {
        info!(
            endpoints = self.slots.len(),
            poll_interval_us = self.config.poll_interval.as_micros() as u64,
            "reactor running"
        );
        loop {
            self.turn(Some(self.config.poll_interval))?;
        }
    }

    fn dispatch<F>(&mut self, token: Token, callback: F) -> Result<()>
    where
        F: FnOnce(&mut dyn EventHandler) -> std::result::Result<Interest, ChannelError>,
    {
        let slot = self
            .slots
            .get_mut(token.0)
            .ok_or(ReactorError::UnknownToken(token.0))?;
        let next = match callback(slot.handler.as_mut()) {
            Ok(next) => next,
            Err(source) => {
                let name = slot.handler.name().to_string();
                error!(endpoint = %name, error = %source, "endpoint failed; stopping reactor");
                return Err(ReactorError::Handler { name, source });
            }
        };
        if next != slot.interest {
            reregister(self.poll.registry(), slot, token, next)?;
            self.registrations += 1;
        }
        Ok(())
    }
}

fn reregister(registry: &Registry, slot: &mut Slot, token: Token, next: Interest) -> Result<()> {
    if let Err(source) = registry.reregister(slot.handler.source(), token, next.into()) {
        return Err(ReactorError::Register {
            name: slot.handler.name().to_string(),
            source,
        });
    }
    debug!(endpoint = slot.handler.name(), from = ?slot.interest, to = ?next, "endpoint re-registered");
    slot.interest = next;
    Ok(())
}

impl std::fmt::Debug for Reactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reactor")
            .field("endpoints", &self.slots.len())
            .field("wakeup_targets", &self.wakeup_targets.len())
            .field("registrations", &self.registrations)
            .field("config", &self.config)
            .finish()
    }
}
