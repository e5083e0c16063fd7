pub mod data_channel_init;
pub mod data_channel_message;
pub mod data_channel_parameters;
pub mod data_channel_state;

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use bytes::Bytes;
use data::message::message_channel_open::ChannelType;
use sctp::stream::OnBufferedAmountLowFn;
use tokio::sync::Mutex;

use crate::api::setting_engine::SettingEngine;
use crate::data_channel::data_channel_message::RTCDataChannelMessage;
use crate::data_channel::data_channel_parameters::DataChannelParameters;
use crate::data_channel::data_channel_state::RTCDataChannelState;
use crate::error::{Error, OnErrorHdlrFn, Result};
use crate::sctp_transport::RTCSctpTransport;

/// message size limit for Chromium
const DATA_CHANNEL_BUFFER_SIZE: u16 = u16::MAX;

pub type OnMessageHdlrFn = Box<
    dyn (FnMut(RTCDataChannelMessage) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>)
        + Send
        + Sync,
>;

pub type OnOpenHdlrFn =
    Box<dyn (FnOnce() -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>) + Send + Sync>;

pub type OnCloseHdlrFn =
    Box<dyn (FnMut() -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>) + Send + Sync>;

/// RTCDataChannel represents a WebRTC DataChannel. The DataChannel interface
/// represents a network channel which can be used for bidirectional
/// peer-to-peer transfers of arbitrary data.
#[derive(Default)]
pub struct RTCDataChannel {
    stats_id: String,
    pub(crate) label: String,
    pub(crate) ordered: bool,
    pub(crate) max_packet_lifetime: u16,
    pub(crate) max_retransmits: u16,
    pub(crate) protocol: String,
    pub(crate) negotiated: bool,
    id: Mutex<Option<u16>>,
    ready_state: Arc<AtomicU8>,
    detach_called: Arc<AtomicBool>,

    on_message_handler: Arc<Mutex<Option<OnMessageHdlrFn>>>,
    on_open_handler: Arc<Mutex<Option<OnOpenHdlrFn>>>,
    on_close_handler: Arc<Mutex<Option<OnCloseHdlrFn>>>,
    on_error_handler: Arc<Mutex<Option<OnErrorHdlrFn>>>,

    data_channel: Mutex<Option<Arc<data::data_channel::DataChannel>>>,

    setting_engine: Arc<SettingEngine>,
}

impl RTCDataChannel {
    /// creates the RTCDataChannel object before the networking is set up.
    pub(crate) fn new(params: DataChannelParameters, setting_engine: Arc<SettingEngine>) -> Self {
        RTCDataChannel {
            stats_id: format!(
                "DataChannel-{}",
                SystemTime::now()
                    .duration_since(SystemTime::UNIX_EPOCH)
                    .map_or(0, |d| d.as_nanos())
            ),
            label: params.label,
            protocol: params.protocol,
            negotiated: params.negotiated,
            id: Mutex::new(if params.negotiated {
                Some(params.id)
            } else {
                None
            }),
            ordered: params.ordered,
            max_packet_lifetime: params.max_packet_life_time,
            max_retransmits: params.max_retransmits,
            ready_state: Arc::new(AtomicU8::new(RTCDataChannelState::Connecting as u8)),
            detach_called: Arc::new(AtomicBool::new(false)),
            setting_engine,
            ..Default::default()
        }
    }

    /// open opens the data channel over the given SCTP transport. If the
    /// channel identifier was not negotiated out-of-band one is generated
    /// based on the current DTLS role.
    pub(crate) async fn open(self: &Arc<Self>, sctp_transport: Arc<RTCSctpTransport>) -> Result<()> {
        if self.data_channel.lock().await.is_some() {
            // already open
            return Ok(());
        }

        let association = sctp_transport
            .association()
            .await
            .ok_or(Error::ErrSCTPTransportDTLS)?;

        let (channel_type, reliability_parameter) =
            match (self.max_packet_lifetime, self.max_retransmits) {
                (0, 0) => (
                    if self.ordered {
                        ChannelType::Reliable
                    } else {
                        ChannelType::ReliableUnordered
                    },
                    0,
                ),
                (_, max_retransmits) if max_retransmits != 0 => (
                    if self.ordered {
                        ChannelType::PartialReliableRexmit
                    } else {
                        ChannelType::PartialReliableRexmitUnordered
                    },
                    max_retransmits as u32,
                ),
                (max_packet_lifetime, _) => (
                    if self.ordered {
                        ChannelType::PartialReliableTimed
                    } else {
                        ChannelType::PartialReliableTimedUnordered
                    },
                    max_packet_lifetime as u32,
                ),
            };

        let cfg = data::data_channel::Config {
            channel_type,
            priority: data::message::message_channel_open::CHANNEL_PRIORITY_NORMAL,
            reliability_parameter,
            label: self.label.clone(),
            protocol: self.protocol.clone(),
            negotiated: self.negotiated,
        };

        let mut id_guard = self.id.lock().await;
        let id = if let Some(id) = *id_guard {
            id
        } else {
            let generated = sctp_transport.generate_and_set_data_channel_id().await?;
            *id_guard = Some(generated);
            generated
        };
        drop(id_guard);

        let dc = data::data_channel::DataChannel::dial(&association, id, cfg).await?;

        {
            let mut data_channel = self.data_channel.lock().await;
            *data_channel = Some(Arc::new(dc));
        }

        self.handle_open().await;

        Ok(())
    }

    /// After on_open is complete check that the user called detach and
    /// provide a warning message if the call was missed.
    fn check_detach_after_open(&self) {
        if self.setting_engine.detach.data_channels && !self.detach_called.load(Ordering::SeqCst) {
            log::warn!(
                "detaching data channels is enabled but Detach was not called, call detach from on_open"
            );
        }
    }

    /// on_open sets an event handler which is invoked when the underlying
    /// data transport has been established (or re-established).
    pub async fn on_open(&self, f: OnOpenHdlrFn) {
        if self.ready_state() == RTCDataChannelState::Open {
            f().await;
            self.check_detach_after_open();
        } else {
            let mut handler = self.on_open_handler.lock().await;
            *handler = Some(f);
        }
    }

    /// on_close sets an event handler which is invoked when the underlying
    /// data transport has been closed.
    pub async fn on_close(&self, f: OnCloseHdlrFn) {
        let mut handler = self.on_close_handler.lock().await;
        *handler = Some(f);
    }

    /// on_message sets an event handler which is invoked on a message
    /// arriving from a remote peer over the data channel.
    pub async fn on_message(&self, f: OnMessageHdlrFn) {
        let mut handler = self.on_message_handler.lock().await;
        *handler = Some(f);
    }

    /// on_error sets an event handler which is invoked when the underlying
    /// data transport cannot be read.
    pub async fn on_error(&self, f: OnErrorHdlrFn) {
        let mut handler = self.on_error_handler.lock().await;
        *handler = Some(f);
    }

    pub(crate) async fn handle_open(self: &Arc<Self>) {
        self.set_ready_state(RTCDataChannelState::Open);

        {
            let mut handler = self.on_open_handler.lock().await;
            if let Some(f) = handler.take() {
                f().await;
                self.check_detach_after_open();
            }
        }

        let data_channel = self.data_channel.lock().await.clone();
        if let Some(dc) = data_channel {
            if !self.setting_engine.detach.data_channels {
                let ready_state = Arc::clone(&self.ready_state);
                let on_message_handler = Arc::clone(&self.on_message_handler);
                let on_close_handler = Arc::clone(&self.on_close_handler);
                let on_error_handler = Arc::clone(&self.on_error_handler);
                tokio::spawn(async move {
                    RTCDataChannel::read_loop(
                        dc,
                        ready_state,
                        on_message_handler,
                        on_close_handler,
                        on_error_handler,
                    )
                    .await;
                });
            }
        }
    }

    async fn read_loop(
        data_channel: Arc<data::data_channel::DataChannel>,
        ready_state: Arc<AtomicU8>,
        on_message_handler: Arc<Mutex<Option<OnMessageHdlrFn>>>,
        on_close_handler: Arc<Mutex<Option<OnCloseHdlrFn>>>,
        on_error_handler: Arc<Mutex<Option<OnErrorHdlrFn>>>,
    ) {
        let mut buffer = vec![0u8; DATA_CHANNEL_BUFFER_SIZE as usize];
        loop {
            let (n, is_string) = match data_channel.read_data_channel(&mut buffer).await {
                Ok((n, is_string)) => (n, is_string),
                Err(err) => {
                    ready_state.store(RTCDataChannelState::Closed as u8, Ordering::SeqCst);
                    if err != data::error::Error::ErrStreamClosed {
                        let mut handler = on_error_handler.lock().await;
                        if let Some(f) = &mut *handler {
                            f(err.into()).await;
                        }
                    }

                    {
                        let mut handler = on_close_handler.lock().await;
                        if let Some(f) = &mut *handler {
                            f().await;
                        }
                    }

                    break;
                }
            };

            {
                let mut handler = on_message_handler.lock().await;
                if let Some(f) = &mut *handler {
                    f(RTCDataChannelMessage {
                        is_string,
                        data: Bytes::from(buffer[..n].to_vec()),
                    })
                    .await;
                }
            }
        }
    }

    /// send sends the binary message to the DataChannel peer.
    pub async fn send(&self, data: &Bytes) -> Result<usize> {
        self.ensure_open()?;
        let data_channel = self.data_channel.lock().await.clone();
        if let Some(dc) = data_channel {
            Ok(dc.write_data_channel(data, false).await?)
        } else {
            Err(Error::ErrClosedPipe)
        }
    }

    /// send_text sends the text message to the DataChannel peer.
    pub async fn send_text(&self, s: String) -> Result<usize> {
        self.ensure_open()?;
        let data_channel = self.data_channel.lock().await.clone();
        if let Some(dc) = data_channel {
            Ok(dc.write_data_channel(&Bytes::from(s), true).await?)
        } else {
            Err(Error::ErrClosedPipe)
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.ready_state() != RTCDataChannelState::Open {
            Err(Error::ErrClosedPipe)
        } else {
            Ok(())
        }
    }

    /// detach allows the underlying datachannel to be detached, providing an
    /// AsyncRead/AsyncWrite style API instead of the on_message callback.
    /// Detaching must be enabled via SettingEngine::detach_data_channels.
    pub async fn detach(&self) -> Result<Arc<data::data_channel::DataChannel>> {
        if !self.setting_engine.detach.data_channels {
            return Err(Error::ErrDetachNotEnabled);
        }

        let data_channel = self.data_channel.lock().await.clone();
        if let Some(dc) = data_channel {
            self.detach_called.store(true, Ordering::SeqCst);
            Ok(dc)
        } else {
            Err(Error::ErrDetachBeforeOpened)
        }
    }

    /// close closes the RTCDataChannel. It may be called regardless of
    /// whether the DataChannel object was created by this peer or the
    /// remote peer.
    pub async fn close(&self) -> Result<()> {
        if self.ready_state() == RTCDataChannelState::Closed {
            return Ok(());
        }

        self.set_ready_state(RTCDataChannelState::Closing);

        let data_channel = self.data_channel.lock().await.clone();
        if let Some(dc) = data_channel {
            Ok(dc.close().await?)
        } else {
            Ok(())
        }
    }

    /// label represents a label that can be used to distinguish this
    /// RTCDataChannel from other RTCDataChannel objects.
    pub fn label(&self) -> &str {
        self.label.as_str()
    }

    /// ordered reports if the DataChannel is ordered, and false if
    /// out-of-order delivery is allowed.
    pub fn ordered(&self) -> bool {
        self.ordered
    }

    /// max_packet_lifetime represents the length of the time window (msec)
    /// during which transmissions and retransmissions may occur in
    /// unreliable mode.
    pub fn max_packet_lifetime(&self) -> u16 {
        self.max_packet_lifetime
    }

    /// max_retransmits represents the maximum number of retransmissions
    /// attempted in unreliable mode.
    pub fn max_retransmits(&self) -> u16 {
        self.max_retransmits
    }

    /// protocol represents the name of the sub-protocol used with this
    /// RTCDataChannel.
    pub fn protocol(&self) -> &str {
        self.protocol.as_str()
    }

    /// negotiated represents whether this RTCDataChannel was negotiated by
    /// the application (true), or not (false).
    pub fn negotiated(&self) -> bool {
        self.negotiated
    }

    /// id represents the ID for this RTCDataChannel. Returns None if an ID
    /// was not provided at construction and the SCTP transport has not yet
    /// negotiated a DTLS role to derive one from.
    pub async fn id(&self) -> Option<u16> {
        *self.id.lock().await
    }

    /// ready_state represents the state of the RTCDataChannel object.
    pub fn ready_state(&self) -> RTCDataChannelState {
        self.ready_state.load(Ordering::SeqCst).into()
    }

    /// buffered_amount represents the number of bytes of application data
    /// that have been queued using send() but not yet transmitted to the
    /// network.
    pub async fn buffered_amount(&self) -> usize {
        let data_channel = self.data_channel.lock().await.clone();
        if let Some(dc) = data_channel {
            dc.buffered_amount()
        } else {
            0
        }
    }

    /// buffered_amount_low_threshold represents the threshold at which
    /// buffered_amount is considered low. Defaults to 0.
    pub async fn buffered_amount_low_threshold(&self) -> usize {
        let data_channel = self.data_channel.lock().await.clone();
        if let Some(dc) = data_channel {
            dc.buffered_amount_low_threshold()
        } else {
            0
        }
    }

    /// set_buffered_amount_low_threshold updates the threshold.
    pub async fn set_buffered_amount_low_threshold(&self, th: usize) {
        let data_channel = self.data_channel.lock().await.clone();
        if let Some(dc) = data_channel {
            dc.set_buffered_amount_low_threshold(th);
        }
    }

    /// on_buffered_amount_low sets an event handler invoked when the number
    /// of bytes of outgoing data buffered falls below
    /// buffered_amount_low_threshold.
    pub async fn on_buffered_amount_low(&self, f: OnBufferedAmountLowFn) {
        let data_channel = self.data_channel.lock().await.clone();
        if let Some(dc) = data_channel {
            dc.on_buffered_amount_low(f);
        }
    }

    pub(crate) fn get_stats_id(&self) -> &str {
        self.stats_id.as_str()
    }

    pub(crate) fn set_ready_state(&self, r: RTCDataChannelState) {
        self.ready_state.store(r as u8, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_new_data_channel_starts_connecting() {
        let dc = RTCDataChannel::new(
            DataChannelParameters {
                label: "data".to_owned(),
                ordered: true,
                ..Default::default()
            },
            Arc::new(SettingEngine::default()),
        );
        assert_eq!(dc.ready_state(), RTCDataChannelState::Connecting);
        assert_eq!(dc.label(), "data");
    }

    #[tokio::test]
    async fn test_send_before_open_is_closed_pipe() {
        let dc = RTCDataChannel::new(
            DataChannelParameters::default(),
            Arc::new(SettingEngine::default()),
        );
        let result = dc.send(&Bytes::from_static(b"hello")).await;
        assert!(matches!(result, Err(Error::ErrClosedPipe)));
    }
}
