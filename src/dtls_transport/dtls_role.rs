use std::fmt;

use sdp::description::session::SessionDescription;
use sdp::util::ConnectionRole;
use serde::{Deserialize, Serialize};

/// DTLSRole indicates the role of the DTLS transport.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DTLSRole {
    #[default]
    Unspecified = 0,

    /// DTLSRoleAuto defines the DTLS role is determined based on
    /// the resolved ICE role: the ICE controlled role acts as the DTLS
    /// client and the ICE controlling role acts as the DTLS server.
    Auto = 1,

    /// DTLSRoleClient defines the DTLS client role.
    Client = 2,

    /// DTLSRoleServer defines the DTLS server role.
    Server = 3,
}

/// <https://tools.ietf.org/html/rfc5763>
/// The answerer MUST use either a setup attribute value of setup:active
/// or setup:passive. Note that if the answerer uses setup:passive, then
/// the DTLS handshake will not begin until the answerer is received,
/// which adds additional latency. setup:active allows the answer and the
/// DTLS handshake to occur in parallel. Thus, setup:active is RECOMMENDED.
pub(crate) const DEFAULT_DTLS_ROLE_ANSWER: DTLSRole = DTLSRole::Client;

/// The endpoint that is the offerer MUST use the setup attribute value of
/// setup:actpass and be prepared to receive a client_hello before it
/// receives the answer.
pub(crate) const DEFAULT_DTLS_ROLE_OFFER: DTLSRole = DTLSRole::Auto;

impl fmt::Display for DTLSRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            DTLSRole::Auto => write!(f, "Auto"),
            DTLSRole::Client => write!(f, "Client"),
            DTLSRole::Server => write!(f, "Server"),
            DTLSRole::Unspecified => write!(f, "{}", crate::UNSPECIFIED_STR),
        }
    }
}

impl DTLSRole {
    /// to_connection_role converts this DTLSRole into the `a=setup` line value
    /// it should be advertised as.
    pub(crate) fn to_connection_role(self) -> ConnectionRole {
        match self {
            DTLSRole::Client => ConnectionRole::Active,
            DTLSRole::Server => ConnectionRole::Passive,
            DTLSRole::Auto => ConnectionRole::Actpass,
            DTLSRole::Unspecified => ConnectionRole::Unspecified,
        }
    }
}

/// DTLSRole::from inspects the first `a=setup` line in a remote
/// SessionDescription to decide which DTLS role this peer must take; absent
/// an explicit role (or a SessionDescription without media) it returns Auto.
impl From<&SessionDescription> for DTLSRole {
    fn from(session_description: &SessionDescription) -> Self {
        for media_section in &session_description.media_descriptions {
            for attribute in &media_section.attributes {
                if attribute.key == "setup" {
                    return match attribute.value.as_deref() {
                        Some("active") => DTLSRole::Client,
                        Some("passive") => DTLSRole::Server,
                        _ => DTLSRole::Auto,
                    };
                }
            }
        }

        DTLSRole::Auto
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_dtls_role_string() {
        let tests = vec![
            (DTLSRole::Unspecified, "Unspecified"),
            (DTLSRole::Auto, "Auto"),
            (DTLSRole::Client, "Client"),
            (DTLSRole::Server, "Server"),
        ];

        for (role, expected_string) in tests {
            assert_eq!(expected_string, role.to_string());
        }
    }
}
