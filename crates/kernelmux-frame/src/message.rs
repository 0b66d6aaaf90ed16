use bytes::Bytes;

/// An ordered sequence of opaque frames delivered or sent as one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    frames: Vec<Bytes>,
}

impl Message {
    /// Create a message from its frames.
    pub fn new(frames: Vec<Bytes>) -> Self {
        Self { frames }
    }

    /// The frames, in order.
    pub fn frames(&self) -> &[Bytes] {
        &self.frames
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Total payload bytes across all frames.
    pub fn byte_len(&self) -> usize {
        self.frames.iter().map(Bytes::len).sum()
    }

    /// Consume the message and return its frames.
    pub fn into_frames(self) -> Vec<Bytes> {
        self.frames
    }
}

impl From<Vec<Bytes>> for Message {
    fn from(frames: Vec<Bytes>) -> Self {
        Self::new(frames)
    }
}

impl From<Vec<Vec<u8>>> for Message {
    fn from(frames: Vec<Vec<u8>>) -> Self {
        frames.into_iter().map(Bytes::from).collect()
    }
}

impl<const N: usize> From<[&'static [u8]; N]> for Message {
    fn from(frames: [&'static [u8]; N]) -> Self {
        frames.into_iter().map(Bytes::from_static).collect()
    }
}

impl FromIterator<Bytes> for Message {
    fn from_iter<I: IntoIterator<Item = Bytes>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl IntoIterator for Message {
    type Item = Bytes;
    type IntoIter = std::vec::IntoIter<Bytes>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_frames_convert() {
        let msg = Message::from([&b"a"[..], &b"bc"[..]]);
        assert_eq!(msg.len(), 2);
        assert_eq!(msg.byte_len(), 3);
        assert_eq!(msg.frames()[1].as_ref(), b"bc");
    }

    #[test]
    fn empty_by_default() {
        let msg = Message::default();
        assert!(msg.is_empty());
        assert_eq!(msg.byte_len(), 0);
    }
}
