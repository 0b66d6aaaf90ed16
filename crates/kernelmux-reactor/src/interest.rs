use mio::event::Event;

/// Which readiness the reactor should report for an endpoint.
///
/// Endpoints are always polled for readability. Writability is only
/// requested while the owning channel has outbound work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interest {
    #[default]
    ReadOnly,
    ReadWrite,
}

impl Interest {
    pub fn is_writable(self) -> bool {
        matches!(self, Interest::ReadWrite)
    }
}

impl From<Interest> for mio::Interest {
    fn from(interest: Interest) -> Self {
        match interest {
            Interest::ReadOnly => mio::Interest::READABLE,
            Interest::ReadWrite => mio::Interest::READABLE | mio::Interest::WRITABLE,
        }
    }
}

/// Readiness reported for one endpoint in one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Readiness {
    pub readable: bool,
    pub writable: bool,
}

impl Readiness {
    pub const READABLE: Readiness = Readiness {
        readable: true,
        writable: false,
    };

    pub const WRITABLE: Readiness = Readiness {
        readable: false,
        writable: true,
    };

    /// Fold a poll event into read/write readiness.
    ///
    /// Hang-ups and errors count as readiness on the affected side so the
    /// handler gets to observe the failure from the endpoint itself.
    pub fn from_event(event: &Event) -> Self {
        Self {
            readable: event.is_readable() || event.is_read_closed() || event.is_error(),
            writable: event.is_writable() || event.is_write_closed() || event.is_error(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_write_requests_both_directions() {
        let interest: mio::Interest = Interest::ReadWrite.into();
        assert!(interest.is_readable());
        assert!(interest.is_writable());

        let interest: mio::Interest = Interest::ReadOnly.into();
        assert!(interest.is_readable());
        assert!(!interest.is_writable());
    }

    #[test]
    fn default_is_read_only() {
        assert_eq!(Interest::default(), Interest::ReadOnly);
        assert!(!Interest::default().is_writable());
    }
}
