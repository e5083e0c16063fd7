use serde::{Deserialize, Serialize};
use std::fmt;

/// RTCPMuxPolicy affects what ICE candidates are gathered to support
/// non-multiplexed RTCP.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RTCRtcpMuxPolicy {
    #[default]
    Unspecified,

    /// RTCPMuxPolicyNegotiate indicates to gather ICE candidates for both
    /// RTP and RTCP candidates. If the remote endpoint is capable of
    /// multiplexing RTCP, multiplex RTCP onto the RTP candidates.
    Negotiate,

    /// RTCPMuxPolicyRequire indicates to gather ICE candidates only for
    /// RTP, and multiplex RTCP on the RTP candidates.
    Require,
}

const RTCP_MUX_POLICY_NEGOTIATE_STR: &str = "negotiate";
const RTCP_MUX_POLICY_REQUIRE_STR: &str = "require";

impl From<&str> for RTCRtcpMuxPolicy {
    fn from(raw: &str) -> Self {
        match raw {
            RTCP_MUX_POLICY_NEGOTIATE_STR => RTCRtcpMuxPolicy::Negotiate,
            RTCP_MUX_POLICY_REQUIRE_STR => RTCRtcpMuxPolicy::Require,
            _ => RTCRtcpMuxPolicy::Unspecified,
        }
    }
}

impl fmt::Display for RTCRtcpMuxPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            RTCRtcpMuxPolicy::Negotiate => write!(f, "{RTCP_MUX_POLICY_NEGOTIATE_STR}"),
            RTCRtcpMuxPolicy::Require => write!(f, "{RTCP_MUX_POLICY_REQUIRE_STR}"),
            _ => write!(f, "{}", crate::UNSPECIFIED_STR),
        }
    }
}
