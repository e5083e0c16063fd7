use std::fmt;

use ice::state::ConnectionState;

/// ICETransportState represents the current state of the ICE transport.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum RTCIceTransportState {
    Unspecified = 0,

    /// New indicates the ICETransport is waiting for remote candidates to
    /// be supplied.
    New,

    /// Checking indicates the ICETransport has received at least one remote
    /// candidate, and a local and remote ICECandidateComplete dictionary was
    /// not added as the last candidate.
    Checking,

    /// Connected indicates the ICETransport has found a usable connection,
    /// but is still checking other candidate pairs to see if there is a
    /// better connection.
    Connected,

    /// Completed indicates the ICETransport has finished gathering,
    /// received an indication that there are no more remote candidates, and
    /// found a connection for all components.
    Completed,

    /// Disconnected indicates the ICETransport has lost connectivity.
    Disconnected,

    /// Failed indicates the ICETransport has finished attempting to
    /// connect and has failed.
    Failed,

    /// Closed indicates the ICETransport has shut down and is no longer
    /// responding to STUN requests.
    Closed,
}

impl Default for RTCIceTransportState {
    fn default() -> Self {
        RTCIceTransportState::Unspecified
    }
}

impl From<u8> for RTCIceTransportState {
    fn from(v: u8) -> Self {
        match v {
            1 => RTCIceTransportState::New,
            2 => RTCIceTransportState::Checking,
            3 => RTCIceTransportState::Connected,
            4 => RTCIceTransportState::Completed,
            5 => RTCIceTransportState::Disconnected,
            6 => RTCIceTransportState::Failed,
            7 => RTCIceTransportState::Closed,
            _ => RTCIceTransportState::Unspecified,
        }
    }
}

impl From<ConnectionState> for RTCIceTransportState {
    fn from(raw: ConnectionState) -> Self {
        match raw {
            ConnectionState::New => RTCIceTransportState::New,
            ConnectionState::Checking => RTCIceTransportState::Checking,
            ConnectionState::Connected => RTCIceTransportState::Connected,
            ConnectionState::Completed => RTCIceTransportState::Completed,
            ConnectionState::Disconnected => RTCIceTransportState::Disconnected,
            ConnectionState::Failed => RTCIceTransportState::Failed,
            ConnectionState::Closed => RTCIceTransportState::Closed,
            _ => RTCIceTransportState::Unspecified,
        }
    }
}

impl fmt::Display for RTCIceTransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            RTCIceTransportState::New => write!(f, "new"),
            RTCIceTransportState::Checking => write!(f, "checking"),
            RTCIceTransportState::Connected => write!(f, "connected"),
            RTCIceTransportState::Completed => write!(f, "completed"),
            RTCIceTransportState::Disconnected => write!(f, "disconnected"),
            RTCIceTransportState::Failed => write!(f, "failed"),
            RTCIceTransportState::Closed => write!(f, "closed"),
            _ => write!(f, "{}", crate::UNSPECIFIED_STR),
        }
    }
}

/// ICEConnectionState mirrors the aggregate connection state surfaced on
/// RTCPeerConnection.iceConnectionState. It is derived from the selected
/// ICETransportState plus the agent-reported connectivity-check lifecycle,
/// and is a distinct enum from RTCIceTransportState because the W3C kept
/// the two observable separately for backwards compatibility.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum RTCIceConnectionState {
    Unspecified = 0,
    New,
    Checking,
    Connected,
    Completed,
    Disconnected,
    Failed,
    Closed,
}

impl Default for RTCIceConnectionState {
    fn default() -> Self {
        RTCIceConnectionState::Unspecified
    }
}

impl From<u8> for RTCIceConnectionState {
    fn from(v: u8) -> Self {
        match v {
            1 => RTCIceConnectionState::New,
            2 => RTCIceConnectionState::Checking,
            3 => RTCIceConnectionState::Connected,
            4 => RTCIceConnectionState::Completed,
            5 => RTCIceConnectionState::Disconnected,
            6 => RTCIceConnectionState::Failed,
            7 => RTCIceConnectionState::Closed,
            _ => RTCIceConnectionState::Unspecified,
        }
    }
}

impl From<ConnectionState> for RTCIceConnectionState {
    fn from(raw: ConnectionState) -> Self {
        match raw {
            ConnectionState::New => RTCIceConnectionState::New,
            ConnectionState::Checking => RTCIceConnectionState::Checking,
            ConnectionState::Connected => RTCIceConnectionState::Connected,
            ConnectionState::Completed => RTCIceConnectionState::Completed,
            ConnectionState::Disconnected => RTCIceConnectionState::Disconnected,
            ConnectionState::Failed => RTCIceConnectionState::Failed,
            ConnectionState::Closed => RTCIceConnectionState::Closed,
            _ => RTCIceConnectionState::Unspecified,
        }
    }
}

impl From<RTCIceTransportState> for RTCIceConnectionState {
    fn from(s: RTCIceTransportState) -> Self {
        match s {
            RTCIceTransportState::New => RTCIceConnectionState::New,
            RTCIceTransportState::Checking => RTCIceConnectionState::Checking,
            RTCIceTransportState::Connected => RTCIceConnectionState::Connected,
            RTCIceTransportState::Completed => RTCIceConnectionState::Completed,
            RTCIceTransportState::Disconnected => RTCIceConnectionState::Disconnected,
            RTCIceTransportState::Failed => RTCIceConnectionState::Failed,
            RTCIceTransportState::Closed => RTCIceConnectionState::Closed,
            _ => RTCIceConnectionState::Unspecified,
        }
    }
}

impl fmt::Display for RTCIceConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            RTCIceConnectionState::New => write!(f, "new"),
            RTCIceConnectionState::Checking => write!(f, "checking"),
            RTCIceConnectionState::Connected => write!(f, "connected"),
            RTCIceConnectionState::Completed => write!(f, "completed"),
            RTCIceConnectionState::Disconnected => write!(f, "disconnected"),
            RTCIceConnectionState::Failed => write!(f, "failed"),
            RTCIceConnectionState::Closed => write!(f, "closed"),
            _ => write!(f, "{}", crate::UNSPECIFIED_STR),
        }
    }
}
