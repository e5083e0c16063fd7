pub mod sctp_transport_capabilities;
pub mod sctp_transport_state;

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU16, AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;

use sctp::association::Association;
use tokio::sync::Mutex;
use util::Conn;

use crate::data_channel::data_channel_parameters::DataChannelParameters;
use crate::data_channel::RTCDataChannel;
use crate::dtls_transport::dtls_role::DTLSRole;
use crate::dtls_transport::RTCDtlsTransport;
use crate::error::{Error, Result};
use crate::sctp_transport::sctp_transport_capabilities::SCTPTransportCapabilities;
use crate::sctp_transport::sctp_transport_state::RTCSctpTransportState;
use crate::stats::stats_collector::StatsCollector;
use crate::stats::{ICETransportStats, RTCStatsType, StatsReportType};
use tokio::time::Instant;

/// SCTP port always used when negotiating over DTLS, per the WebRTC data
/// channel establishment protocol.
pub(crate) const SCTP_MAX_CHANNELS: u16 = u16::MAX - 1;

pub type OnDataChannelHdlrFn = Box<
    dyn (FnMut(Arc<RTCDataChannel>) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>)
        + Send
        + Sync,
>;

pub type OnDataChannelOpenedHdlrFn = Box<
    dyn (FnMut(Arc<RTCDataChannel>) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>)
        + Send
        + Sync,
>;

/// RTCSctpTransport provides details about the SCTP transport carrying
/// RTCDataChannel data, and hosts the association that multiplexes every
/// data channel opened over this RTCPeerConnection.
#[derive(Default)]
pub struct RTCSctpTransport {
    pub(crate) dtls_transport: Arc<RTCDtlsTransport>,

    state: Arc<AtomicU8>,

    pub(crate) data_channels: Mutex<Vec<Arc<RTCDataChannel>>>,
    pub(crate) data_channels_requested: AtomicU32,
    pub(crate) data_channels_opened: AtomicU32,
    data_channels_accepted: AtomicU32,

    max_channels: AtomicU16,

    association: Mutex<Option<Arc<Association>>>,

    on_data_channel_handler: Arc<Mutex<Option<OnDataChannelHdlrFn>>>,
    on_data_channel_opened_handler: Arc<Mutex<Option<OnDataChannelOpenedHdlrFn>>>,
}

impl RTCSctpTransport {
    pub(crate) fn new(dtls_transport: Arc<RTCDtlsTransport>) -> Self {
        RTCSctpTransport {
            dtls_transport,
            state: Arc::new(AtomicU8::new(RTCSctpTransportState::Connecting as u8)),
            data_channels: Mutex::new(vec![]),
            data_channels_requested: AtomicU32::new(0),
            data_channels_opened: AtomicU32::new(0),
            data_channels_accepted: AtomicU32::new(0),
            max_channels: AtomicU16::new(0),
            association: Mutex::new(None),
            on_data_channel_handler: Arc::new(Mutex::new(None)),
            on_data_channel_opened_handler: Arc::new(Mutex::new(None)),
        }
    }

    /// transport returns the DTLS transport over which SCTP packets are
    /// carried.
    pub fn transport(&self) -> Arc<RTCDtlsTransport> {
        Arc::clone(&self.dtls_transport)
    }

    /// state returns the current state of the SCTPTransport.
    pub fn state(&self) -> RTCSctpTransportState {
        self.state.load(Ordering::SeqCst).into()
    }

    fn set_state(&self, s: RTCSctpTransportState) {
        self.state.store(s as u8, Ordering::SeqCst);
    }

    /// max_channels returns the maximum number of data channels this
    /// transport may carry, as negotiated.
    pub fn max_channels(&self) -> u16 {
        let n = self.max_channels.load(Ordering::SeqCst);
        if n == 0 {
            SCTP_MAX_CHANNELS
        } else {
            n
        }
    }

    /// association returns the underlying SCTP association, once start has
    /// completed successfully.
    pub(crate) async fn association(&self) -> Option<Arc<Association>> {
        self.association.lock().await.clone()
    }

    /// data_channels_requested is the number of data channels the local
    /// peer has requested, whether opened locally or negotiated.
    pub fn data_channels_requested(&self) -> u32 {
        self.data_channels_requested.load(Ordering::SeqCst)
    }

    /// data_channels_opened is the number of data channels that have moved
    /// to the Open state.
    pub fn data_channels_opened(&self) -> u32 {
        self.data_channels_opened.load(Ordering::SeqCst)
    }

    /// data_channels_accepted is the number of data channels the local peer
    /// has accepted from the remote peer.
    pub fn data_channels_accepted(&self) -> u32 {
        self.data_channels_accepted.load(Ordering::SeqCst)
    }

    /// on_data_channel sets an event handler which is invoked when a data
    /// channel message arrives from a remote peer.
    pub async fn on_data_channel(&self, f: OnDataChannelHdlrFn) {
        let mut handler = self.on_data_channel_handler.lock().await;
        *handler = Some(f);
    }

    /// on_data_channel_opened sets an event handler which is invoked when a
    /// data channel is opened.
    pub async fn on_data_channel_opened(&self, f: OnDataChannelOpenedHdlrFn) {
        let mut handler = self.on_data_channel_opened_handler.lock().await;
        *handler = Some(f);
    }

    /// start starts the SCTPTransport over the already-connected DTLS
    /// transport.
    pub async fn start(self: &Arc<Self>, _remote_caps: SCTPTransportCapabilities) -> Result<()> {
        if self.association.lock().await.is_some() {
            return Ok(());
        }

        let dtls_conn = {
            let conn = self.dtls_transport.conn.lock().await;
            conn.clone().ok_or(Error::ErrSCTPTransportDTLS)?
        };

        let is_client = self.dtls_transport.role().await == DTLSRole::Client;

        let config = sctp::association::Config {
            net_conn: dtls_conn as Arc<dyn Conn + Send + Sync>,
            max_receive_buffer_size: 0,
            max_message_size: 0,
            name: "sctp".to_owned(),
        };

        let association = if is_client {
            Association::client(config).await?
        } else {
            Association::server(config).await?
        };
        let association = Arc::new(association);

        *self.association.lock().await = Some(Arc::clone(&association));
        self.set_state(RTCSctpTransportState::Connected);

        tokio::spawn(RTCSctpTransport::accept_loop(Arc::clone(self), association));

        Ok(())
    }

    /// accept_loop accepts remote-initiated data channels for as long as the
    /// association stays open, wrapping each one in an RTCDataChannel and
    /// notifying the on_data_channel handler.
    async fn accept_loop(self: Arc<Self>, association: Arc<Association>) {
        loop {
            let dc = match data::data_channel::DataChannel::accept(
                &association,
                data::data_channel::Config::default(),
                &[] as &[data::data_channel::DataChannel],
            )
            .await
            {
                Ok(dc) => dc,
                Err(_) => {
                    // Association has been closed.
                    return;
                }
            };

            let params = DataChannelParameters {
                label: dc.config.label.clone(),
                protocol: dc.config.protocol.clone(),
                id: dc.stream_identifier(),
                ordered: true,
                max_packet_life_time: 0,
                max_retransmits: 0,
                negotiated: dc.config.negotiated,
            };

            let rtc_dc = Arc::new(RTCDataChannel::new(
                params,
                Arc::new(crate::api::setting_engine::SettingEngine::default()),
            ));
            rtc_dc.accept(dc).await;

            self.data_channels.lock().await.push(Arc::clone(&rtc_dc));
            self.data_channels_accepted.fetch_add(1, Ordering::SeqCst);
            self.data_channels_opened.fetch_add(1, Ordering::SeqCst);

            {
                let mut handler = self.on_data_channel_handler.lock().await;
                if let Some(f) = &mut *handler {
                    f(Arc::clone(&rtc_dc)).await;
                }
            }

            {
                let mut handler = self.on_data_channel_opened_handler.lock().await;
                if let Some(f) = &mut *handler {
                    f(rtc_dc).await;
                }
            }
        }
    }

    /// stop stops the SCTPTransport.
    pub async fn stop(&self) -> Result<()> {
        let association = self.association.lock().await.take();
        if let Some(association) = association {
            association.close().await?;
        }

        self.set_state(RTCSctpTransportState::Closed);
        Ok(())
    }

    /// generate_and_set_data_channel_id picks the next unused data channel
    /// identifier, using even IDs when acting as the DTLS client and odd IDs
    /// when acting as the DTLS server as required by RFC 8832.
    pub(crate) async fn generate_and_set_data_channel_id(&self) -> Result<u16> {
        let role = self.dtls_transport.role().await;
        let mut id = if role == DTLSRole::Client { 0u16 } else { 1u16 };

        let max = self.max_channels();
        let data_channels = self.data_channels.lock().await;

        loop {
            if id >= max {
                return Err(Error::ErrMaxDataChannelID);
            }

            let mut in_use = false;
            for dc in data_channels.iter() {
                if dc.id().await == Some(id) {
                    in_use = true;
                    break;
                }
            }

            if !in_use {
                return Ok(id);
            }

            id = match id.checked_add(2) {
                Some(next) => next,
                None => return Err(Error::ErrMaxDataChannelID),
            };
        }
    }

    pub(crate) async fn collect_stats(&self, collector: &StatsCollector, stats_id: String) {
        let association = self.association.lock().await;
        let (bytes_sent, bytes_received) = if let Some(a) = &*association {
            (a.bytes_sent() as u64, a.bytes_received() as u64)
        } else {
            (0, 0)
        };

        let stats = SctpTransportStats {
            timestamp: crate::stats::StatsTimestamp::now(),
            stats_type: crate::stats::StatsType::Transport,
            id: stats_id.clone(),
            bytes_sent,
            bytes_received,
        };

        collector
            .insert(stats_id, StatsReportType::SctpTransportStats(stats))
            .await;
    }
}
