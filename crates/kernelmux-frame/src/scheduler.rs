use std::collections::VecDeque;
use std::sync::mpsc::{Receiver, TryRecvError};

use tracing::trace;

use crate::endpoint::{FrameEndpoint, SendOutcome};
use crate::error::{FrameError, Result};
use crate::message::Message;

/// Where the scheduler pulls the next outbound message from.
pub trait MessageSource {
    /// Take the next queued message without blocking.
    ///
    /// `Ok(None)` means nothing is queued right now. `Err(OutboundClosed)`
    /// means nothing ever will be.
    fn try_next(&mut self) -> Result<Option<Message>>;
}

impl MessageSource for Receiver<Message> {
    fn try_next(&mut self) -> Result<Option<Message>> {
        match self.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(FrameError::OutboundClosed),
        }
    }
}

impl MessageSource for VecDeque<Message> {
    fn try_next(&mut self) -> Result<Option<Message>> {
        Ok(self.pop_front())
    }
}

/// How a write pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteProgress {
    /// Queue and cursor are exhausted and the endpoint has flushed.
    Drained,
    /// The endpoint would block; resume from the same cursor when writable.
    Blocked,
}

/// Moves queued messages onto an endpoint one frame at a time.
///
/// The cursor is `(current, index)`: `index` is the next frame of `current`
/// to send and only ever moves forward. `index == current.len()` means the
/// next message must be taken from the source.
#[derive(Debug, Default)]
pub struct WriteScheduler {
    current: Message,
    index: usize,
}

impl WriteScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no frame of the current message remains to be sent.
    pub fn is_exhausted(&self) -> bool {
        self.index >= self.current.len()
    }

    /// Index of the next frame to send within the current message.
    pub fn cursor(&self) -> usize {
        self.index
    }

    /// The message currently being sent, if any frames remain.
    pub fn current(&self) -> Option<&Message> {
        (!self.is_exhausted()).then_some(&self.current)
    }

    /// Load the next message from `source` if the cursor is exhausted.
    ///
    /// Returns whether there is a frame ready to send. A closed source reads
    /// as "no work" here; it is only an error once the scheduler is writing.
    pub fn prefetch<S>(&mut self, source: &mut S) -> Result<bool>
    where
        S: MessageSource + ?Sized,
    {
        match self.load_next(source) {
            Err(FrameError::OutboundClosed) => Ok(false),
            other => other,
        }
    }

    /// Send frames until the endpoint would block or there is nothing left.
    ///
    /// Every frame but the last of each message goes out with the more-flag.
    /// After a would-block the next call resumes at the exact frame that was
    /// refused.
    pub fn write_available<E, S>(&mut self, endpoint: &mut E, source: &mut S) -> Result<WriteProgress>
    where
        E: FrameEndpoint + ?Sized,
        S: MessageSource + ?Sized,
    {
        loop {
            if !self.load_next(source)? {
                return match endpoint.flush()? {
                    SendOutcome::Sent => Ok(WriteProgress::Drained),
                    SendOutcome::WouldBlock => Ok(WriteProgress::Blocked),
                };
            }

            let more = self.index + 1 < self.current.len();
            let frame = &self.current.frames()[self.index];
            match endpoint.send_frame(frame, more)? {
                SendOutcome::WouldBlock => {
                    trace!(cursor = self.index, "send would block");
                    return Ok(WriteProgress::Blocked);
                }
                SendOutcome::Sent => self.index += 1,
            }
        }
    }

    fn load_next<S>(&mut self, source: &mut S) -> Result<bool>
    where
        S: MessageSource + ?Sized,
    {
        // Empty messages carry no frames; skip past them.
        while self.is_exhausted() {
            match source.try_next()? {
                Some(message) => {
                    self.current = message;
                    self.index = 0;
                }
                None => return Ok(false),
            }
        }
        Ok(true)
    }
}
