use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::time::Duration;

use kernelmux_frame::{FrameAssembler, FrameEndpoint, Message, WriteProgress, WriteScheduler};
use mio::event::Source;
use mio::Waker;
use tracing::{debug, trace};

use crate::error::ChannelError;
use crate::interest::{Interest, Readiness};
use crate::reactor::EventHandler;

/// Per-endpoint state driven by the reactor.
///
/// The read path turns every frame the endpoint has buffered into completed
/// messages on the [`Inbox`]. The write path drains messages queued through
/// the [`Outbox`] until the endpoint would block or the queue runs dry.
/// Interest is `ReadWrite` exactly while outbound work is in hand.
pub struct SocketChannel<E> {
    name: String,
    endpoint: E,
    assembler: FrameAssembler,
    scheduler: WriteScheduler,
    outbound: Receiver<Message>,
    inbound: Sender<Message>,
    interest: Interest,
    transitions: u64,
}

/// The two ends handed to code outside the reactor thread.
#[derive(Debug)]
pub struct ChannelHandle {
    pub inbox: Inbox,
    pub outbox: Outbox,
}

impl<E> SocketChannel<E> {
    /// Wrap `endpoint`. `waker` must belong to the reactor the channel will
    /// be registered with.
    pub fn new(name: impl Into<String>, endpoint: E, waker: Arc<Waker>) -> (Self, ChannelHandle) {
        let name = name.into();
        let (out_tx, out_rx) = mpsc::channel();
        let (in_tx, in_rx) = mpsc::channel();
        let shared_name: Arc<str> = Arc::from(name.as_str());

        let channel = Self {
            name,
            endpoint,
            assembler: FrameAssembler::new(),
            scheduler: WriteScheduler::new(),
            outbound: out_rx,
            inbound: in_tx,
            interest: Interest::ReadOnly,
            transitions: 0,
        };
        let handle = ChannelHandle {
            inbox: Inbox {
                name: Arc::clone(&shared_name),
                rx: in_rx,
            },
            outbox: Outbox {
                name: shared_name,
                tx: out_tx,
                waker,
            },
        };
        (channel, handle)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Interest the reactor should currently poll this endpoint with.
    pub fn interest(&self) -> Interest {
        self.interest
    }

    /// Number of times interest has changed since creation.
    pub fn interest_transitions(&self) -> u64 {
        self.transitions
    }

    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }

    pub fn endpoint_mut(&mut self) -> &mut E {
        &mut self.endpoint
    }

    fn set_interest(&mut self, next: Interest) {
        if self.interest == next {
            return;
        }
        debug!(endpoint = %self.name, from = ?self.interest, to = ?next, "interest changed");
        self.interest = next;
        self.transitions += 1;
    }
}

impl<E: FrameEndpoint> SocketChannel<E> {
    /// React to readiness reported by the poll.
    ///
    /// Returns the interest the endpoint should be polled with next.
    pub fn handle_readiness(&mut self, readiness: Readiness) -> Result<Interest, ChannelError> {
        if readiness.readable {
            self.read_available()?;
        }
        if readiness.writable && self.interest.is_writable() {
            self.write_available()?;
        }
        Ok(self.interest)
    }

    /// React to a wake-up: move to `ReadWrite` if outbound work is waiting.
    ///
    /// The frames themselves go out on the next writable readiness.
    pub fn handle_wakeup(&mut self) -> Result<Interest, ChannelError> {
        if !self.interest.is_writable() && self.scheduler.prefetch(&mut self.outbound)? {
            self.set_interest(Interest::ReadWrite);
        }
        Ok(self.interest)
    }

    fn read_available(&mut self) -> Result<(), ChannelError> {
        let Self {
            name,
            endpoint,
            assembler,
            inbound,
            ..
        } = self;
        let completed = assembler.read_available(endpoint, |message| {
            if let Err(mpsc::SendError(message)) = inbound.send(message) {
                debug!(endpoint = %name, frames = message.len(), "inbox dropped; discarding message");
            }
        })?;
        if completed > 0 {
            trace!(endpoint = %self.name, completed, "messages received");
        }
        Ok(())
    }

    fn write_available(&mut self) -> Result<(), ChannelError> {
        match self
            .scheduler
            .write_available(&mut self.endpoint, &mut self.outbound)?
        {
            WriteProgress::Drained => self.set_interest(Interest::ReadOnly),
            WriteProgress::Blocked => {}
        }
        Ok(())
    }
}

impl<E> EventHandler for SocketChannel<E>
where
    E: FrameEndpoint + Source,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn interest(&self) -> Interest {
        self.interest
    }

    fn source(&mut self) -> &mut dyn Source {
        &mut self.endpoint
    }

    fn on_ready(&mut self, readiness: Readiness) -> Result<Interest, ChannelError> {
        self.handle_readiness(readiness)
    }

    fn on_wakeup(&mut self) -> Result<Interest, ChannelError> {
        self.handle_wakeup()
    }
}

impl<E> std::fmt::Debug for SocketChannel<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketChannel")
            .field("name", &self.name)
            .field("interest", &self.interest)
            .field("assembling", &self.assembler.pending_frames().len())
            .field("cursor", &self.scheduler.cursor())
            .finish()
    }
}

/// Completed inbound messages, in arrival order.
#[derive(Debug)]
pub struct Inbox {
    name: Arc<str>,
    rx: Receiver<Message>,
}

impl Inbox {
    /// Block until the next message arrives.
    pub fn recv(&self) -> Result<Message, ChannelError> {
        self.rx.recv().map_err(|_| self.disconnected())
    }

    /// Wait up to `timeout`. `Ok(None)` means nothing arrived in time.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<Message>, ChannelError> {
        match self.rx.recv_timeout(timeout) {
            Ok(message) => Ok(Some(message)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(self.disconnected()),
        }
    }

    /// Take a message if one is ready.
    pub fn try_recv(&self) -> Result<Option<Message>, ChannelError> {
        match self.rx.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(self.disconnected()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn disconnected(&self) -> ChannelError {
        ChannelError::Disconnected(self.name.to_string())
    }
}

impl IntoIterator for Inbox {
    type Item = Message;
    type IntoIter = mpsc::IntoIter<Message>;

    /// Iterate until the channel is dropped.
    fn into_iter(self) -> Self::IntoIter {
        self.rx.into_iter()
    }
}

/// Enqueue side of a channel. Cheap to clone and safe to move to other threads.
#[derive(Debug, Clone)]
pub struct Outbox {
    name: Arc<str>,
    tx: Sender<Message>,
    waker: Arc<Waker>,
}

impl Outbox {
    /// Queue `message` for transmission and wake the reactor.
    ///
    /// Messages from one thread go out in the order they were enqueued.
    pub fn enqueue(&self, message: impl Into<Message>) -> Result<(), ChannelError> {
        let message = message.into();
        if message.is_empty() {
            return Err(ChannelError::EmptyMessage);
        }
        self.tx
            .send(message)
            .map_err(|_| ChannelError::Disconnected(self.name.to_string()))?;
        self.waker.wake().map_err(ChannelError::Wake)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
