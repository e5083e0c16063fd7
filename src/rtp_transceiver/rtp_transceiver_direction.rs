use std::fmt;

use serde::{Deserialize, Serialize};

/// RTPTransceiverDirection indicates the direction of the RTPTransceiver.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RTCRtpTransceiverDirection {
    #[default]
    Unspecified = 0,

    Sendrecv = 1,
    Sendonly = 2,
    Recvonly = 3,
    Inactive = 4,
    Stopped = 5,
}

const RTCP_TRANSCEIVER_DIRECTION_SENDRECV_STR: &str = "sendrecv";
const RTCP_TRANSCEIVER_DIRECTION_SENDONLY_STR: &str = "sendonly";
const RTCP_TRANSCEIVER_DIRECTION_RECVONLY_STR: &str = "recvonly";
const RTCP_TRANSCEIVER_DIRECTION_INACTIVE_STR: &str = "inactive";
const RTCP_TRANSCEIVER_DIRECTION_STOPPED_STR: &str = "stopped";

impl From<&str> for RTCRtpTransceiverDirection {
    fn from(raw: &str) -> Self {
        match raw {
            RTCP_TRANSCEIVER_DIRECTION_SENDRECV_STR => RTCRtpTransceiverDirection::Sendrecv,
            RTCP_TRANSCEIVER_DIRECTION_SENDONLY_STR => RTCRtpTransceiverDirection::Sendonly,
            RTCP_TRANSCEIVER_DIRECTION_RECVONLY_STR => RTCRtpTransceiverDirection::Recvonly,
            RTCP_TRANSCEIVER_DIRECTION_INACTIVE_STR => RTCRtpTransceiverDirection::Inactive,
            RTCP_TRANSCEIVER_DIRECTION_STOPPED_STR => RTCRtpTransceiverDirection::Stopped,
            _ => RTCRtpTransceiverDirection::Unspecified,
        }
    }
}

impl From<u8> for RTCRtpTransceiverDirection {
    fn from(v: u8) -> Self {
        match v {
            1 => RTCRtpTransceiverDirection::Sendrecv,
            2 => RTCRtpTransceiverDirection::Sendonly,
            3 => RTCRtpTransceiverDirection::Recvonly,
            4 => RTCRtpTransceiverDirection::Inactive,
            5 => RTCRtpTransceiverDirection::Stopped,
            _ => RTCRtpTransceiverDirection::Unspecified,
        }
    }
}

impl fmt::Display for RTCRtpTransceiverDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            RTCRtpTransceiverDirection::Sendrecv => RTCP_TRANSCEIVER_DIRECTION_SENDRECV_STR,
            RTCRtpTransceiverDirection::Sendonly => RTCP_TRANSCEIVER_DIRECTION_SENDONLY_STR,
            RTCRtpTransceiverDirection::Recvonly => RTCP_TRANSCEIVER_DIRECTION_RECVONLY_STR,
            RTCRtpTransceiverDirection::Inactive => RTCP_TRANSCEIVER_DIRECTION_INACTIVE_STR,
            RTCRtpTransceiverDirection::Stopped => RTCP_TRANSCEIVER_DIRECTION_STOPPED_STR,
            RTCRtpTransceiverDirection::Unspecified => crate::UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}

impl RTCRtpTransceiverDirection {
    /// revers returns the reverse direction, as seen from the other peer.
    pub fn revers(&self) -> Self {
        match self {
            RTCRtpTransceiverDirection::Sendonly => RTCRtpTransceiverDirection::Recvonly,
            RTCRtpTransceiverDirection::Recvonly => RTCRtpTransceiverDirection::Sendonly,
            _ => *self,
        }
    }

    /// intersect computes the result of combining this direction with a remote
    /// direction, following the W3C direction-negotiation table: the intersection
    /// is send-capable only if both sides can send, recv-capable only if both can recv.
    pub(crate) fn intersect(&self, other: Self) -> Self {
        let can_send = matches!(
            self,
            RTCRtpTransceiverDirection::Sendrecv | RTCRtpTransceiverDirection::Sendonly
        ) && matches!(
            other,
            RTCRtpTransceiverDirection::Sendrecv | RTCRtpTransceiverDirection::Recvonly
        );
        let can_recv = matches!(
            self,
            RTCRtpTransceiverDirection::Sendrecv | RTCRtpTransceiverDirection::Recvonly
        ) && matches!(
            other,
            RTCRtpTransceiverDirection::Sendrecv | RTCRtpTransceiverDirection::Sendonly
        );

        match (can_send, can_recv) {
            (true, true) => RTCRtpTransceiverDirection::Sendrecv,
            (true, false) => RTCRtpTransceiverDirection::Sendonly,
            (false, true) => RTCRtpTransceiverDirection::Recvonly,
            (false, false) => RTCRtpTransceiverDirection::Inactive,
        }
    }
}

/// have_rtp_transceiver_direction_intersection reports whether `haystack` contains
/// any of the directions in `needles`. Used to validate a header extension's
/// allowed-directions set against the directions it is being negotiated for.
pub(crate) fn have_rtp_transceiver_direction_intersection(
    haystack: &[RTCRtpTransceiverDirection],
    needles: &[RTCRtpTransceiverDirection],
) -> bool {
    for n in needles {
        if haystack.contains(n) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod direction_test {
    use super::*;

    #[test]
    fn test_new_rtp_transceiver_direction() {
        let tests = vec![
            (crate::UNSPECIFIED_STR, RTCRtpTransceiverDirection::Unspecified),
            ("sendrecv", RTCRtpTransceiverDirection::Sendrecv),
            ("sendonly", RTCRtpTransceiverDirection::Sendonly),
            ("recvonly", RTCRtpTransceiverDirection::Recvonly),
            ("inactive", RTCRtpTransceiverDirection::Inactive),
        ];

        for (raw, expected) in tests {
            assert_eq!(RTCRtpTransceiverDirection::from(raw), expected);
        }
    }

    #[test]
    fn test_rtp_transceiver_direction_string() {
        assert_eq!(RTCRtpTransceiverDirection::Sendrecv.to_string(), "sendrecv");
        assert_eq!(RTCRtpTransceiverDirection::Inactive.to_string(), "inactive");
    }

    #[test]
    fn test_direction_intersect() {
        use RTCRtpTransceiverDirection::*;
        assert_eq!(Sendrecv.intersect(Sendrecv), Sendrecv);
        assert_eq!(Sendrecv.intersect(Sendonly), Recvonly);
        assert_eq!(Sendrecv.intersect(Recvonly), Sendonly);
        assert_eq!(Recvonly.intersect(Sendonly), Inactive);
        assert_eq!(Sendonly.intersect(Recvonly), Sendonly);
    }
}
