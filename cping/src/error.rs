use std::io;

/// Recoverable outcome of a single echo attempt.
///
/// The run loop renders these as a progress glyph and carries on with the
/// next attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EchoFailure {
    #[error("timeout exceeded")]
    TimeoutExceeded,
    #[error("ttl exceeded")]
    TtlExpired,
    #[error("source quench")]
    SourceQuench,
    #[error("destination unreachable")]
    DestUnreachable,
    #[error("could not fragment")]
    CouldNotFragment,
    #[error("unknown response packet")]
    UnknownPacket,
}

impl EchoFailure {
    /// Single character shown in the progress line.
    pub fn glyph(self) -> char {
        match self {
            EchoFailure::TimeoutExceeded => '.',
            EchoFailure::TtlExpired => '&',
            EchoFailure::SourceQuench => 'Q',
            EchoFailure::DestUnreachable => 'U',
            EchoFailure::CouldNotFragment => 'M',
            EchoFailure::UnknownPacket => '?',
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PingError {
    #[error(transparent)]
    Echo(#[from] EchoFailure),
    #[error("bad ip protocol version")]
    BadIpVersion,
    #[error("malformed ip address")]
    BadIpAddress,
    #[error("failed to draw echo identifier: {0}")]
    Random(#[from] rand::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl PingError {
    /// Protocol outcomes and timeouts are recoverable; everything else aborts the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PingError::Echo(_))
    }

    pub fn failure(&self) -> Option<EchoFailure> {
        match self {
            PingError::Echo(failure) => Some(*failure),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_split() {
        assert!(PingError::from(EchoFailure::TimeoutExceeded).is_recoverable());
        assert!(PingError::from(EchoFailure::UnknownPacket).is_recoverable());
        assert!(!PingError::BadIpVersion.is_recoverable());
        assert!(!PingError::BadIpAddress.is_recoverable());
        assert!(!PingError::from(io::Error::from(io::ErrorKind::PermissionDenied)).is_recoverable());
    }

    #[test]
    fn test_messages() {
        assert_eq!(PingError::from(EchoFailure::TtlExpired).to_string(), "ttl exceeded");
        assert_eq!(PingError::BadIpAddress.to_string(), "malformed ip address");
        assert_eq!(EchoFailure::CouldNotFragment.glyph(), 'M');
    }
}
