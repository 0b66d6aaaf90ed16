use bytes::Bytes;

use crate::endpoint::{FrameEndpoint, RecvOutcome};
use crate::error::Result;
use crate::message::Message;

const INITIAL_FRAME_CAPACITY: usize = 10;

/// Rebuilds whole messages from a stream of `(frame, more)` pairs.
///
/// Frames accumulate until one arrives without the more-flag; that frame
/// completes the message and the accumulator starts over empty. A receive
/// that would block leaves the accumulator untouched.
#[derive(Debug)]
pub struct FrameAssembler {
    frames: Vec<Bytes>,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self {
            frames: Vec::with_capacity(INITIAL_FRAME_CAPACITY),
        }
    }

    /// Feed one frame. Returns the completed message when `more` is false.
    pub fn push(&mut self, frame: Bytes, more: bool) -> Option<Message> {
        self.frames.push(frame);
        if more {
            return None;
        }
        let frames = std::mem::replace(
            &mut self.frames,
            Vec::with_capacity(INITIAL_FRAME_CAPACITY),
        );
        Some(Message::new(frames))
    }

    /// True while a message is partially assembled.
    pub fn is_assembling(&self) -> bool {
        !self.frames.is_empty()
    }

    /// Frames held for the message currently being assembled.
    pub fn pending_frames(&self) -> &[Bytes] {
        &self.frames
    }

    /// Drain every frame `endpoint` has ready, handing each completed
    /// message to `deliver` in arrival order.
    ///
    /// Returns the number of messages completed before the endpoint reported
    /// would-block. Transport errors are returned as-is; frames accumulated
    /// so far stay buffered.
    pub fn read_available<E, F>(&mut self, endpoint: &mut E, mut deliver: F) -> Result<usize>
    where
        E: FrameEndpoint + ?Sized,
        F: FnMut(Message),
    {
        let mut completed = 0usize;
        loop {
            match endpoint.recv_frame()? {
                RecvOutcome::Frame { data, more } => {
                    if let Some(message) = self.push(data, more) {
                        completed += 1;
                        deliver(message);
                    }
                }
                RecvOutcome::WouldBlock => return Ok(completed),
            }
        }
    }
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::endpoint::SendOutcome;
    use crate::error::FrameError;

    fn b(s: &'static str) -> Bytes {
        Bytes::from_static(s.as_bytes())
    }

    /// Endpoint that replays scripted receive results, one per call.
    struct ReplayEndpoint {
        script: VecDeque<Result<RecvOutcome>>,
    }

    impl ReplayEndpoint {
        fn new(script: Vec<Result<RecvOutcome>>) -> Self {
            Self {
                script: script.into(),
            }
        }
    }

    impl FrameEndpoint for ReplayEndpoint {
        fn recv_frame(&mut self) -> Result<RecvOutcome> {
            self.script.pop_front().unwrap_or(Ok(RecvOutcome::WouldBlock))
        }

        fn send_frame(&mut self, _frame: &Bytes, _more: bool) -> Result<SendOutcome> {
            Ok(SendOutcome::Sent)
        }
    }

    fn frame(data: &'static str, more: bool) -> Result<RecvOutcome> {
        Ok(RecvOutcome::Frame { data: b(data), more })
    }

    #[test]
    fn single_frame_message_completes_immediately() {
        let mut asm = FrameAssembler::new();
        let msg = asm.push(b("only"), false).expect("message should complete");
        assert_eq!(msg.frames(), &[b("only")]);
        assert!(!asm.is_assembling());
    }

    #[test]
    fn frames_accumulate_until_last() {
        let mut asm = FrameAssembler::new();
        assert!(asm.push(b("id"), true).is_none());
        assert!(asm.push(b("<IDS|MSG>"), true).is_none());
        assert!(asm.is_assembling());
        assert_eq!(asm.pending_frames().len(), 2);

        let msg = asm.push(b("body"), false).unwrap();
        assert_eq!(msg.frames(), &[b("id"), b("<IDS|MSG>"), b("body")]);
        assert!(asm.pending_frames().is_empty());
    }

    #[test]
    fn consecutive_messages_are_independent() {
        let mut asm = FrameAssembler::new();
        asm.push(b("a1"), true);
        let first = asm.push(b("a2"), false).unwrap();
        let second = asm.push(b("b1"), false).unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(second.frames(), &[b("b1")]);
    }

    #[test]
    fn read_available_delivers_in_order_and_keeps_going() {
        let mut endpoint = ReplayEndpoint::new(vec![
            frame("m1-a", true),
            frame("m1-b", true),
            frame("m1-c", false),
            frame("m2", false),
        ]);
        let mut asm = FrameAssembler::new();
        let mut out = Vec::new();

        let completed = asm.read_available(&mut endpoint, |m| out.push(m)).unwrap();

        assert_eq!(completed, 2);
        assert_eq!(out[0].frames(), &[b("m1-a"), b("m1-b"), b("m1-c")]);
        assert_eq!(out[1].frames(), &[b("m2")]);
    }

    #[test]
    fn would_block_mid_message_keeps_accumulated_frames() {
        let mut endpoint = ReplayEndpoint::new(vec![
            frame("head", true),
            Ok(RecvOutcome::WouldBlock),
            frame("tail", false),
        ]);
        let mut asm = FrameAssembler::new();
        let mut out = Vec::new();

        let completed = asm.read_available(&mut endpoint, |m| out.push(m)).unwrap();
        assert_eq!(completed, 0);
        assert!(out.is_empty(), "no partial message may be emitted");
        assert_eq!(asm.pending_frames(), &[b("head")]);

        let completed = asm.read_available(&mut endpoint, |m| out.push(m)).unwrap();
        assert_eq!(completed, 1);
        assert_eq!(out[0].frames(), &[b("head"), b("tail")]);
    }

    #[test]
    fn transport_error_propagates_without_discarding_state() {
        let mut endpoint = ReplayEndpoint::new(vec![
            frame("head", true),
            Err(FrameError::ConnectionClosed),
        ]);
        let mut asm = FrameAssembler::new();

        let err = asm.read_available(&mut endpoint, |_| {}).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
        assert_eq!(asm.pending_frames(), &[b("head")]);
    }

    #[test]
    fn empty_frames_are_preserved() {
        let mut asm = FrameAssembler::new();
        asm.push(Bytes::new(), true);
        let msg = asm.push(b("x"), false).unwrap();
        assert_eq!(msg.len(), 2);
        assert!(msg.frames()[0].is_empty());
    }
}
