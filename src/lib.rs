#![warn(rust_2018_idioms)]
#![allow(dead_code)]

// re-export sub-crates
pub use data;
pub use dtls;
pub use ice;
pub use interceptor;
pub use mdns;
pub use media;
pub use rtcp;
pub use rtp;
pub use sctp;
pub use sdp;
pub use srtp;
pub use stun;
pub use turn;
pub use util;

pub mod api;
pub mod data_channel;
pub mod dtls_transport;
pub mod error;
pub mod ice_transport;
pub mod mux;
pub mod peer_connection;
pub mod rtp_transceiver;
pub mod sctp_transport;
pub mod stats;
pub mod track;

pub use error::Error;

pub(crate) use peer_connection::sdp::SDP_ATTRIBUTE_RID;
pub(crate) use rtp_transceiver::SDES_REPAIR_RTP_STREAM_ID_URI;

#[macro_use]
extern crate lazy_static;

pub(crate) const UNSPECIFIED_STR: &str = "Unspecified";

/// Equal to UDP MTU
pub(crate) const RECEIVE_MTU: usize = 1460;

/// Maximum size of a packetized RTP payload written by a static sample track.
pub(crate) const RTP_OUTBOUND_MTU: usize = 1200;

/// default_srtp_protection_profiles returns the protection profiles offered
/// in a DTLS handshake when the application has not configured any via
/// SettingEngine.
pub(crate) fn default_srtp_protection_profiles(
) -> Vec<dtls::extension::extension_use_srtp::SrtpProtectionProfile> {
    vec![
        dtls::extension::extension_use_srtp::SrtpProtectionProfile::Srtp_Aead_Aes_128_Gcm,
        dtls::extension::extension_use_srtp::SrtpProtectionProfile::Srtp_Aes128_Cm_Hmac_Sha1_80,
    ]
}
