use std::fmt;

use crate::ice_transport::ice_candidate::RTCIceCandidate;

/// ICECandidatePair represents an ICE Candidate pair
#[derive(Default, Debug, Clone, PartialEq)]
pub struct RTCIceCandidatePair {
    pub stats_id: String,
    pub local: RTCIceCandidate,
    pub remote: RTCIceCandidate,
}

impl fmt::Display for RTCIceCandidatePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(local) {} <-> (remote) {}", self.local, self.remote)
    }
}

impl RTCIceCandidatePair {
    pub fn new(local: RTCIceCandidate, remote: RTCIceCandidate) -> Self {
        let stats_id = format!("{local}-{remote}");
        RTCIceCandidatePair {
            stats_id,
            local,
            remote,
        }
    }
}
