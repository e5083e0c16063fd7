use std::fmt;

use ice::url::{SchemeType, Url};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// ICECredentialType indicates the type of credentials used to connect to
/// an ICE server.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RTCIceCredentialType {
    /// ICECredentialTypePassword describes username and password based
    /// credentials as described in <https://tools.ietf.org/html/rfc5389>.
    #[default]
    Password,

    /// ICECredentialTypeOauth describes token based credentials as
    /// described in <https://tools.ietf.org/html/rfc7635>.
    Oauth,
}

impl fmt::Display for RTCIceCredentialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            RTCIceCredentialType::Password => write!(f, "password"),
            RTCIceCredentialType::Oauth => write!(f, "oauth"),
        }
    }
}

/// ICEServer describes a single STUN or TURN server that can be used by
/// the ICEAgent to establish a connection with a peer.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct RTCIceServer {
    pub urls: Vec<String>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub credential: String,
    #[serde(default)]
    pub credential_type: RTCIceCredentialType,
}

impl RTCIceServer {
    pub(crate) fn parse_url(&self, url: &str) -> Result<Url> {
        Ok(Url::parse_url(url)?)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        self.urls()?;
        Ok(())
    }

    /// urls parses all the URLs associated with this ICEServer, validating
    /// that any TURN URL carries the credentials required to use it.
    pub(crate) fn urls(&self) -> Result<Vec<Url>> {
        let mut urls = vec![];

        for url_str in &self.urls {
            let mut url = self.parse_url(url_str)?;
            if url.scheme == SchemeType::Turn || url.scheme == SchemeType::Turns {
                // https://www.w3.org/TR/webrtc/#set-the-configuration (step #11.3.2)
                if self.username.is_empty() || self.credential.is_empty() {
                    return Err(Error::ErrNoTurnCredentials);
                }
                url.username = self.username.clone();

                match self.credential_type {
                    RTCIceCredentialType::Password => {
                        // https://www.w3.org/TR/webrtc/#set-the-configuration (step #11.3.3)
                        url.password = self.credential.clone();
                    }
                    RTCIceCredentialType::Oauth => {
                        // https://www.w3.org/TR/webrtc/#set-the-configuration (step #11.3.4)
                        return Err(Error::ErrTurnCredentials);
                    }
                };
            }

            urls.push(url);
        }

        Ok(urls)
    }
}
