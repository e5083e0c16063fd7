pub mod dtls_fingerprint;
pub mod dtls_parameters;
pub mod dtls_role;
pub mod dtls_transport_state;

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use dtls::config::ClientAuthType;
use dtls::conn::DTLSConn;
use sha2::{Digest, Sha256};
use srtp::protection_profile::ProtectionProfile;
use srtp::session::Session;
use srtp::stream::Stream;
use tokio::sync::{mpsc, Mutex};
use util::Conn;

use crate::api::setting_engine::SettingEngine;
use crate::default_srtp_protection_profiles;
use crate::dtls_transport::dtls_parameters::DTLSParameters;
use crate::dtls_transport::dtls_role::{DTLSRole, DEFAULT_DTLS_ROLE_ANSWER};
use crate::dtls_transport::dtls_transport_state::RTCDtlsTransportState;
use crate::error::{Error, Result};
use crate::ice_transport::ice_role::RTCIceRole;
use crate::ice_transport::ice_transport_state::RTCIceTransportState;
use crate::ice_transport::RTCIceTransport;
use crate::mux::endpoint::Endpoint;
use crate::mux::mux_func::{match_srtcp, match_srtp};
use crate::peer_connection::certificate::RTCCertificate;
use crate::stats::stats_collector::StatsCollector;
use crate::stats::{CertificateStats, StatsReportType};

pub type OnDtlsTransportStateChangeHdlrFn = Box<
    dyn (FnMut(RTCDtlsTransportState) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>)
        + Send
        + Sync,
>;

/// RTCDtlsTransport allows an application access to information about the
/// DTLS transport over which RTP and RTCP packets are sent and received by
/// RTCRtpSender and RTCRtpReceiver, as well other data such as SCTP packets
/// sent and received by data channels.
pub struct RTCDtlsTransport {
    pub(crate) ice_transport: Arc<RTCIceTransport>,
    pub(crate) certificates: Vec<RTCCertificate>,
    pub(crate) setting_engine: Arc<SettingEngine>,

    pub(crate) remote_parameters: Mutex<DTLSParameters>,
    pub(crate) remote_certificate: Mutex<Bytes>,
    pub(crate) state: Arc<AtomicU8>,
    srtp_protection_profile: Mutex<ProtectionProfile>,
    pub(crate) on_state_change_handler: Arc<Mutex<Option<OnDtlsTransportStateChangeHdlrFn>>>,
    pub(crate) conn: Mutex<Option<Arc<DTLSConn>>>,

    srtp_session: Mutex<Option<Arc<Session>>>,
    srtcp_session: Mutex<Option<Arc<Session>>>,
    srtp_endpoint: Mutex<Option<Arc<Endpoint>>>,
    srtcp_endpoint: Mutex<Option<Arc<Endpoint>>>,

    simulcast_streams: Mutex<Vec<Arc<Stream>>>,

    /// srtp_ready_signal flips true the moment the SRTP/SRTCP sessions are
    /// usable, letting callers that don't want to wait (write_rtp with
    /// return_when_no_srtp) skip straight to a best-effort attempt.
    pub(crate) srtp_ready_signal: Arc<AtomicBool>,
    pub(crate) srtp_ready_rx: Mutex<Option<mpsc::Receiver<()>>>,
    srtp_ready_tx: Mutex<Option<mpsc::Sender<()>>>,
}

impl RTCDtlsTransport {
    pub(crate) fn new(
        ice_transport: Arc<RTCIceTransport>,
        certificates: Vec<RTCCertificate>,
        setting_engine: Arc<SettingEngine>,
    ) -> Self {
        let (srtp_ready_tx, srtp_ready_rx) = mpsc::channel(1);
        RTCDtlsTransport {
            ice_transport,
            certificates,
            setting_engine,
            remote_parameters: Mutex::new(DTLSParameters::default()),
            remote_certificate: Mutex::new(Bytes::new()),
            state: Arc::new(AtomicU8::new(RTCDtlsTransportState::New as u8)),
            srtp_protection_profile: Mutex::new(ProtectionProfile::Aes128CmHmacSha1_80),
            on_state_change_handler: Arc::new(Mutex::new(None)),
            conn: Mutex::new(None),
            srtp_session: Mutex::new(None),
            srtcp_session: Mutex::new(None),
            srtp_endpoint: Mutex::new(None),
            srtcp_endpoint: Mutex::new(None),
            simulcast_streams: Mutex::new(vec![]),
            srtp_ready_signal: Arc::new(AtomicBool::new(false)),
            srtp_ready_rx: Mutex::new(Some(srtp_ready_rx)),
            srtp_ready_tx: Mutex::new(Some(srtp_ready_tx)),
        }
    }

    /// ice_transport returns the currently-configured RTCIceTransport.
    pub fn ice_transport(&self) -> &Arc<RTCIceTransport> {
        &self.ice_transport
    }

    async fn set_state(&self, state: RTCDtlsTransportState) {
        self.state.store(state as u8, Ordering::SeqCst);
        let mut handler = self.on_state_change_handler.lock().await;
        if let Some(f) = &mut *handler {
            f(state).await;
        }
    }

    /// on_state_change sets a handler that is fired when the DTLS
    /// connection state changes.
    pub async fn on_state_change(&self, f: OnDtlsTransportStateChangeHdlrFn) {
        let mut on_state_change_handler = self.on_state_change_handler.lock().await;
        *on_state_change_handler = Some(f);
    }

    /// state returns the current DTLS transport state.
    pub fn state(&self) -> RTCDtlsTransportState {
        self.state.load(Ordering::SeqCst).into()
    }

    /// write_rtcp sends a user provided RTCP packet to the connected peer. If
    /// no peer is connected the packet is discarded.
    pub async fn write_rtcp(&self, pkts: &[Box<dyn rtcp::packet::Packet + Send + Sync>]) -> Result<usize> {
        let srtcp_session = self.srtcp_session.lock().await;
        if let Some(srtcp_session) = &*srtcp_session {
            let mut total = 0;
            for pkt in pkts {
                total += srtcp_session.write_rtcp(pkt.as_ref()).await?;
            }
            Ok(total)
        } else {
            Ok(0)
        }
    }

    /// get_local_parameters returns the DTLS parameters of the local
    /// RTCDtlsTransport upon construction.
    pub fn get_local_parameters(&self) -> Result<DTLSParameters> {
        let mut fingerprints = vec![];
        for c in &self.certificates {
            fingerprints.extend(c.get_fingerprints()?);
        }

        Ok(DTLSParameters {
            role: DTLSRole::Auto, // always returns the default role
            fingerprints,
        })
    }

    /// get_remote_certificate returns the certificate chain in use by the
    /// remote side. Returns an empty list prior to selection of the remote
    /// certificate.
    pub async fn get_remote_certificate(&self) -> Bytes {
        self.remote_certificate.lock().await.clone()
    }

    pub(crate) async fn start_srtp(&self) -> Result<()> {
        let profile = *self.srtp_protection_profile.lock().await;
        let mut srtp_config = srtp::config::Config {
            profile,
            ..Default::default()
        };
        let mut srtcp_config = srtp::config::Config {
            profile,
            ..Default::default()
        };

        if self.setting_engine.replay_protection.srtp != 0 {
            srtp_config.remote_rtp_options = Some(srtp::option::srtp_replay_protection(
                self.setting_engine.replay_protection.srtp,
            ));
        } else if self.setting_engine.disable_srtp_replay_protection {
            srtp_config.remote_rtp_options = Some(srtp::option::srtp_no_replay_protection());
        }

        if self.setting_engine.replay_protection.srtcp != 0 {
            srtcp_config.remote_rtcp_options = Some(srtp::option::srtcp_replay_protection(
                self.setting_engine.replay_protection.srtcp,
            ));
        } else if self.setting_engine.disable_srtcp_replay_protection {
            srtcp_config.remote_rtcp_options = Some(srtp::option::srtcp_no_replay_protection());
        }

        {
            let conn = self.conn.lock().await;
            if let Some(conn) = &*conn {
                let conn_state = conn.connection_state().await;
                let is_client = self.role().await == DTLSRole::Client;
                srtp_config
                    .extract_session_keys_from_dtls(conn_state, is_client)
                    .await?;
            } else {
                return Err(Error::ErrDtlsTransportNotStarted);
            }
        }

        {
            let srtp_endpoint = self.srtp_endpoint.lock().await;
            let mut srtp_session = self.srtp_session.lock().await;
            *srtp_session = if let Some(srtp_endpoint) = &*srtp_endpoint {
                Some(Arc::new(
                    Session::new(
                        Arc::clone(srtp_endpoint) as Arc<dyn Conn + Send + Sync>,
                        srtp_config,
                        true,
                    )
                    .await?,
                ))
            } else {
                None
            };
        }

        {
            let srtcp_endpoint = self.srtcp_endpoint.lock().await;
            let mut srtcp_session = self.srtcp_session.lock().await;
            *srtcp_session = if let Some(srtcp_endpoint) = &*srtcp_endpoint {
                Some(Arc::new(
                    Session::new(
                        Arc::clone(srtcp_endpoint) as Arc<dyn Conn + Send + Sync>,
                        srtcp_config,
                        false,
                    )
                    .await?,
                ))
            } else {
                None
            };
        }

        self.srtp_ready_signal.store(true, Ordering::SeqCst);
        self.srtp_ready_tx.lock().await.take();

        Ok(())
    }

    /// get_srtp_session returns the SRTP session used to read/write RTP, once
    /// DTLS has completed and keys have been extracted.
    pub(crate) async fn get_srtp_session(&self) -> Option<Arc<Session>> {
        self.srtp_session.lock().await.clone()
    }

    /// get_srtcp_session returns the SRTCP session used to read/write RTCP.
    pub(crate) async fn get_srtcp_session(&self) -> Option<Arc<Session>> {
        self.srtcp_session.lock().await.clone()
    }

    /// role determines the DTLS role for this transport: the inverse of
    /// whatever the remote explicitly requested, falling back to the setting
    /// engine override and finally the ICE role.
    pub(crate) async fn role(&self) -> DTLSRole {
        {
            let remote_parameters = self.remote_parameters.lock().await;
            match remote_parameters.role {
                DTLSRole::Client => return DTLSRole::Server,
                DTLSRole::Server => return DTLSRole::Client,
                _ => {}
            }
        }

        match self.setting_engine.answering_dtls_role {
            DTLSRole::Server => return DTLSRole::Server,
            DTLSRole::Client => return DTLSRole::Client,
            _ => {}
        }

        if self.ice_transport.role().await == RTCIceRole::Controlling {
            return DTLSRole::Server;
        }

        DEFAULT_DTLS_ROLE_ANSWER
    }

    async fn prepare_transport(
        &self,
        remote_parameters: DTLSParameters,
    ) -> Result<(DTLSRole, dtls::config::Config)> {
        self.ensure_ice_conn()?;

        if self.state() != RTCDtlsTransportState::New {
            return Err(Error::ErrInvalidDTLSStart);
        }

        {
            let mut srtp_endpoint = self.srtp_endpoint.lock().await;
            *srtp_endpoint = self.ice_transport.new_endpoint(Box::new(match_srtp)).await;
        }
        {
            let mut srtcp_endpoint = self.srtcp_endpoint.lock().await;
            *srtcp_endpoint = self.ice_transport.new_endpoint(Box::new(match_srtcp)).await;
        }
        {
            let mut rp = self.remote_parameters.lock().await;
            *rp = remote_parameters;
        }

        let cert = self.certificates[0].certificate.clone();
        self.set_state(RTCDtlsTransportState::Connecting).await;

        let role = self.role().await;
        Ok((
            role,
            dtls::config::Config {
                certificates: vec![cert],
                srtp_protection_profiles: if !self.setting_engine.srtp_protection_profiles.is_empty() {
                    self.setting_engine.srtp_protection_profiles.clone()
                } else {
                    default_srtp_protection_profiles()
                },
                client_auth: ClientAuthType::RequireAnyClientCert,
                insecure_skip_verify: true,
                ..Default::default()
            },
        ))
    }

    /// start negotiates a DTLS session over the underlying ICE transport
    /// using the given remote parameters.
    pub async fn start(&self, remote_parameters: DTLSParameters) -> Result<()> {
        use crate::mux::mux_func::match_dtls;

        let dtls_endpoint = self.ice_transport.new_endpoint(Box::new(match_dtls)).await;
        let dtls_conn_result = if let Some(dtls_endpoint) = dtls_endpoint {
            let (role, mut dtls_config) = self.prepare_transport(remote_parameters).await?;
            if self.setting_engine.replay_protection.dtls != 0 {
                dtls_config.replay_protection_window = self.setting_engine.replay_protection.dtls;
            }

            // Connect as DTLS Client/Server. This call blocks and must not
            // hold any lock on self.
            DTLSConn::new(
                dtls_endpoint as Arc<dyn Conn + Send + Sync>,
                dtls_config,
                role == DTLSRole::Client,
                None,
            )
            .await
        } else {
            Err(Error::new("ice_transport.new_endpoint failed".to_owned()).into())
        };

        let dtls_conn = match dtls_conn_result {
            Ok(dtls_conn) => dtls_conn,
            Err(err) => {
                self.set_state(RTCDtlsTransportState::Failed).await;
                return Err(err.into());
            }
        };

        let srtp_profile = dtls_conn.selected_srtpprotection_profile();
        {
            let mut profile = self.srtp_protection_profile.lock().await;
            *profile = match srtp_profile {
                dtls::extension::extension_use_srtp::SrtpProtectionProfile::Srtp_Aead_Aes_128_Gcm => {
                    ProtectionProfile::AeadAes128Gcm
                }
                dtls::extension::extension_use_srtp::SrtpProtectionProfile::Srtp_Aes128_Cm_Hmac_Sha1_80 => {
                    ProtectionProfile::Aes128CmHmacSha1_80
                }
                _ => {
                    self.set_state(RTCDtlsTransportState::Failed).await;
                    return Err(Error::ErrNoSRTPProtectionProfile);
                }
            };
        }

        if self.setting_engine.disable_certificate_fingerprint_verification {
            self.conn.lock().await.replace(Arc::new(dtls_conn));
            self.set_state(RTCDtlsTransportState::Connected).await;
            return self.start_srtp().await;
        }

        let remote_certs = &dtls_conn.connection_state().await.peer_certificates;
        if remote_certs.is_empty() {
            self.set_state(RTCDtlsTransportState::Failed).await;
            return Err(Error::ErrNoRemoteCertificate);
        }
        let remote_cert = Bytes::from(remote_certs[0].clone());

        if let Err(err) = self.validate_fingerprint(&remote_cert).await {
            let _ = dtls_conn.close().await;
            self.set_state(RTCDtlsTransportState::Failed).await;
            return Err(err);
        }

        *self.remote_certificate.lock().await = remote_cert;
        self.conn.lock().await.replace(Arc::new(dtls_conn));
        self.set_state(RTCDtlsTransportState::Connected).await;

        self.start_srtp().await
    }

    /// stop closes the RTCDtlsTransport.
    pub async fn stop(&self) -> Result<()> {
        let mut close_errs = vec![];

        if let Some(srtp_session) = self.srtp_session.lock().await.take() {
            if let Err(err) = srtp_session.close().await {
                close_errs.push(Error::new(err.to_string()));
            }
        }

        if let Some(srtcp_session) = self.srtcp_session.lock().await.take() {
            if let Err(err) = srtcp_session.close().await {
                close_errs.push(Error::new(err.to_string()));
            }
        }

        {
            let streams = std::mem::take(&mut *self.simulcast_streams.lock().await);
            for ss in streams {
                if let Err(err) = ss.close().await {
                    close_errs.push(Error::new(err.to_string()));
                }
            }
        }

        if let Some(conn) = self.conn.lock().await.take() {
            if let Err(err) = conn.close().await {
                if err.to_string() != dtls::error::Error::ErrConnClosed.to_string() {
                    close_errs.push(Error::new(err.to_string()));
                }
            }
        }

        self.set_state(RTCDtlsTransportState::Closed).await;

        crate::error::flatten_errs(close_errs)
    }

    /// validate_fingerprint checks the peer-presented certificate against
    /// the fingerprints advertised in the remote SDP.
    pub(crate) async fn validate_fingerprint(&self, remote_cert: &[u8]) -> Result<()> {
        let remote_parameters = self.remote_parameters.lock().await;
        if remote_parameters.fingerprints.is_empty() {
            return Ok(());
        }

        for fp in &remote_parameters.fingerprints {
            if !fp.algorithm.eq_ignore_ascii_case("sha-256") {
                continue;
            }
            let mut h = Sha256::new();
            h.update(remote_cert);
            let hashed = h.finalize();
            let value: String = hashed
                .iter()
                .map(|b| format!("{b:02x}"))
                .collect::<Vec<_>>()
                .join(":");

            if value.eq_ignore_ascii_case(&fp.value) {
                return Ok(());
            }
        }

        Err(Error::ErrNoMatchingCertificateFingerprint)
    }

    pub(crate) fn ensure_ice_conn(&self) -> Result<()> {
        if self.ice_transport.state() == RTCIceTransportState::New {
            Err(Error::ErrICEConnectionNotStarted)
        } else {
            Ok(())
        }
    }

    pub(crate) async fn store_simulcast_stream(&self, stream: Arc<Stream>) {
        self.simulcast_streams.lock().await.push(stream)
    }

    pub(crate) async fn remove_simulcast_stream(&self, ssrc: crate::rtp_transceiver::SSRC) {
        let mut streams = self.simulcast_streams.lock().await;
        streams.retain(|s| s.get_ssrc() != ssrc);
    }

    pub(crate) async fn collect_stats(&self, collector: &StatsCollector) {
        for cert in &self.certificates {
            if let Ok(fingerprints) = cert.get_fingerprints() {
                for fp in fingerprints {
                    let stats = CertificateStats::new(cert, fp);
                    collector
                        .insert(format!("certificate-{}", cert.stats_id), StatsReportType::CertificateStats(stats))
                        .await;
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dtls_transport::dtls_fingerprint::RTCDtlsFingerprint;

    #[tokio::test]
    async fn test_new_dtls_transport_starts_new() {
        let ice_transport = Arc::new(RTCIceTransport::default());
        let cert = RTCCertificate::from_key_pair(
            rcgen::KeyPair::generate(&rcgen::PKCS_ECDSA_P256_SHA256).unwrap(),
        )
        .unwrap();
        let dtls_transport = RTCDtlsTransport::new(
            ice_transport,
            vec![cert],
            Arc::new(SettingEngine::default()),
        );
        assert_eq!(dtls_transport.state(), RTCDtlsTransportState::New);
    }

    #[tokio::test]
    async fn test_validate_fingerprint() {
        let ice_transport = Arc::new(RTCIceTransport::default());
        let cert = RTCCertificate::from_key_pair(
            rcgen::KeyPair::generate(&rcgen::PKCS_ECDSA_P256_SHA256).unwrap(),
        )
        .unwrap();
        let remote_cert = cert.certificate.certificate[0].0.clone();
        let fingerprints = cert.get_fingerprints().unwrap();

        let dtls_transport = RTCDtlsTransport::new(
            ice_transport,
            vec![cert],
            Arc::new(SettingEngine::default()),
        );

        // No advertised fingerprints: nothing to check against.
        assert!(dtls_transport
            .validate_fingerprint(&remote_cert)
            .await
            .is_ok());

        *dtls_transport.remote_parameters.lock().await = DTLSParameters {
            role: DTLSRole::Auto,
            fingerprints: fingerprints.clone(),
        };
        assert!(dtls_transport
            .validate_fingerprint(&remote_cert)
            .await
            .is_ok());

        *dtls_transport.remote_parameters.lock().await = DTLSParameters {
            role: DTLSRole::Auto,
            fingerprints: vec![RTCDtlsFingerprint {
                algorithm: "sha-256".to_owned(),
                value: "00:11:22:33".to_owned(),
            }],
        };
        assert!(matches!(
            dtls_transport.validate_fingerprint(&remote_cert).await,
            Err(Error::ErrNoMatchingCertificateFingerprint)
        ));
    }
}
