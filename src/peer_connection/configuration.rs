use serde::{Deserialize, Serialize};

use crate::ice_transport::ice_server::RTCIceServer;
use crate::peer_connection::certificate::RTCCertificate;
use crate::peer_connection::policy::bundle_policy::RTCBundlePolicy;
use crate::peer_connection::policy::ice_transport_policy::RTCIceTransportPolicy;
use crate::peer_connection::policy::rtcp_mux_policy::RTCRtcpMuxPolicy;
use crate::peer_connection::policy::sdp_semantics::RTCSdpSemantics;

/// A Configuration defines a set of parameters to configure how the
/// peer-to-peer communication via RTCPeerConnection is established or
/// re-established.
///
/// Configurations may be set up once and reused across multiple
/// connections. Configurations are treated as readonly. As long as they
/// do not include any pointers to non-readonly resources, they do not
/// need to be deep-copied.
///
/// Reference: <https://www.w3.org/TR/webrtc/#rtcconfiguration-dictionary>
#[derive(Default, Clone, Serialize, Deserialize)]
pub struct RTCConfiguration {
    /// ice_servers defines a slice describing servers available to be used
    /// by ICE, such as STUN and TURN servers.
    #[serde(default)]
    pub ice_servers: Vec<RTCIceServer>,

    /// ice_transport_policy indicates which candidates the ICEAgent is
    /// allowed to use.
    #[serde(default)]
    pub ice_transport_policy: RTCIceTransportPolicy,

    /// bundle_policy indicates which media-bundling policy to use when
    /// gathering ICE candidates.
    #[serde(default)]
    pub bundle_policy: RTCBundlePolicy,

    /// rtcp_mux_policy indicates which rtcp-mux policy to use when
    /// gathering ICE candidates.
    #[serde(default)]
    pub rtcp_mux_policy: RTCRtcpMuxPolicy,

    /// peer_identity sets the target peer identity for the PeerConnection.
    /// The PeerConnection will not establish a connection to a remote peer
    /// unless it can be successfully authenticated with the provided name.
    #[serde(default)]
    pub peer_identity: String,

    /// certificates are a slice of certificates that the PeerConnection
    /// uses to authenticate. Valid values for this parameter are created
    /// through calls to the `generate_certificate` function. Although any
    /// given DTLS connection will use only one certificate, this value
    /// allows the web application to specify support for multiple
    /// algorithms. An empty list causes a self-signed certificate to be
    /// generated automatically.
    #[serde(skip)]
    pub certificates: Vec<RTCCertificate>,

    /// ice_candidate_pool_size determines the size of the prefetched ICE
    /// candidate pool.
    #[serde(default)]
    pub ice_candidate_pool_size: u8,

    /// sdp_semantics controls which style of SDP offers and answers the
    /// PeerConnection negotiates.
    #[serde(default)]
    pub sdp_semantics: RTCSdpSemantics,
}

impl RTCConfiguration {
    /// get_ice_servers side-steps the strict parsing mode of the url
    /// crate to return a valid slice of ice_servers to be used for
    /// gathering.
    pub(crate) fn get_ice_servers(&self) -> Vec<RTCIceServer> {
        self.ice_servers.clone()
    }
}
