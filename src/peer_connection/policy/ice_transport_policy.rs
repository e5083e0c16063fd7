use serde::{Deserialize, Serialize};
use std::fmt;

/// ICETransportPolicy defines the ICE candidate policy surfaced on the
/// Configuration struct. It allows a user to limit the types of candidates
/// used during gathering and connectivity checks.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RTCIceTransportPolicy {
    #[default]
    Unspecified,

    /// All ICE candidates will be considered.
    All,

    /// Only ICE candidates whose IP is routable through a relay (TURN)
    /// server are considered.
    Relay,
}

const ICE_TRANSPORT_POLICY_RELAY_STR: &str = "relay";
const ICE_TRANSPORT_POLICY_ALL_STR: &str = "all";

impl From<&str> for RTCIceTransportPolicy {
    fn from(raw: &str) -> Self {
        match raw {
            ICE_TRANSPORT_POLICY_RELAY_STR => RTCIceTransportPolicy::Relay,
            ICE_TRANSPORT_POLICY_ALL_STR => RTCIceTransportPolicy::All,
            _ => RTCIceTransportPolicy::Unspecified,
        }
    }
}

impl fmt::Display for RTCIceTransportPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            RTCIceTransportPolicy::Relay => write!(f, "{ICE_TRANSPORT_POLICY_RELAY_STR}"),
            RTCIceTransportPolicy::All => write!(f, "{ICE_TRANSPORT_POLICY_ALL_STR}"),
            _ => write!(f, "{}", crate::UNSPECIFIED_STR),
        }
    }
}
