use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use interceptor::stream_info::StreamInfo;
use interceptor::{Interceptor, RTCPReader, RTPWriter};
use rand::random;
use tokio::sync::{mpsc, Mutex};

use crate::api::media_engine::MediaEngine;
use crate::dtls_transport::RTCDtlsTransport;
use crate::error::{Error, Result};
use crate::rtp_transceiver::rtp_codec::RTCRtpParameters;
use crate::rtp_transceiver::{create_stream_info, SSRC};
use crate::track::track_local::{
    InterceptorToTrackLocalWriter, TrackLocal, TrackLocalContext, TrackLocalWriter,
};

/// RTCRtpSender allows an application to control how a given [`TrackLocal`]
/// is encoded and sent to a remote peer.
pub struct RTCRtpSender {
    track: Mutex<Option<Arc<dyn TrackLocal + Send + Sync>>>,

    srtp_stream: Arc<SrtpWriterFuture>,
    rtcp_interceptor: Mutex<Option<Arc<dyn RTCPReader + Send + Sync>>>,
    stream_info: Mutex<StreamInfo>,

    context: Mutex<TrackLocalContext>,
    transport: Arc<RTCDtlsTransport>,

    payload_type: crate::rtp_transceiver::PayloadType,
    ssrc: SSRC,

    negotiated: AtomicBool,

    media_engine: Arc<MediaEngine>,
    interceptor: Arc<dyn Interceptor + Send + Sync>,

    id: String,

    /// a transceiver can have multiple senders over its lifetime if SetTrack
    /// is called multiple times; only the first generates a new ssrc.
    has_sent: AtomicBool,
    has_stopped: AtomicBool,

    send_called_tx: Mutex<Option<mpsc::Sender<()>>>,
    stop_called_signal: Arc<tokio::sync::Notify>,
}

struct SrtpWriterFuture {
    ssrc: SSRC,
    transport: Arc<RTCDtlsTransport>,
    rtp_writer: Mutex<Option<Arc<dyn RTPWriter + Send + Sync>>>,
    rtcp_reader: Mutex<Option<Arc<srtp::stream::Stream>>>,
}

impl SrtpWriterFuture {
    async fn write_rtp(&self, pkt: &rtp::packet::Packet) -> Result<usize> {
        let writer = {
            let mut w = self.rtp_writer.lock().await;
            if w.is_none() {
                let session = self.transport.get_srtp_session().await.ok_or(
                    Error::ErrDtlsTransportNotStarted,
                )?;
                let stream = session.open(self.ssrc).await;
                *w = Some(Arc::new(stream) as Arc<dyn RTPWriter + Send + Sync>);
            }
            w.clone()
        };

        if let Some(writer) = writer {
            let a = interceptor::Attributes::new();
            Ok(writer.write(pkt, &a).await?)
        } else {
            Ok(0)
        }
    }

    async fn read_rtcp(&self, buf: &mut [u8]) -> Result<usize> {
        let stream = {
            let mut r = self.rtcp_reader.lock().await;
            if r.is_none() {
                let session = self.transport.get_srtcp_session().await;
                if let Some(session) = session {
                    *r = Some(session.open(self.ssrc).await);
                }
            }
            r.clone()
        };

        if let Some(stream) = stream {
            Ok(stream.read(buf).await?)
        } else {
            Ok(0)
        }
    }
}

#[async_trait::async_trait]
impl RTPWriter for SrtpWriterFuture {
    async fn write(
        &self,
        pkt: &rtp::packet::Packet,
        _a: &interceptor::Attributes,
    ) -> std::result::Result<usize, interceptor::Error> {
        self.write_rtp(pkt)
            .await
            .map_err(|e| interceptor::Error::new(e.to_string()))
    }
}

#[async_trait::async_trait]
impl RTCPReader for SrtpWriterFuture {
    async fn read(
        &self,
        buf: &mut [u8],
        a: &interceptor::Attributes,
    ) -> std::result::Result<(usize, interceptor::Attributes), interceptor::Error> {
        let n = self
            .read_rtcp(buf)
            .await
            .map_err(|e| interceptor::Error::new(e.to_string()))?;
        Ok((n, a.clone()))
    }
}

impl RTCRtpSender {
    pub async fn new(
        receive_mtu: usize,
        track: Option<Arc<dyn TrackLocal + Send + Sync>>,
        transport: Arc<RTCDtlsTransport>,
        media_engine: Arc<MediaEngine>,
        interceptor: Arc<dyn Interceptor + Send + Sync>,
    ) -> Self {
        let id = format!("{:x}", random::<u64>());
        let ssrc = random::<u32>();

        let _ = receive_mtu;

        let srtp_stream = Arc::new(SrtpWriterFuture {
            ssrc,
            transport: Arc::clone(&transport),
            rtp_writer: Mutex::new(None),
            rtcp_reader: Mutex::new(None),
        });

        let srtp_rtcp_reader = Arc::clone(&srtp_stream) as Arc<dyn RTCPReader + Send + Sync>;
        let rtcp_interceptor = interceptor.bind_rtcp_reader(srtp_rtcp_reader).await;

        RTCRtpSender {
            track: Mutex::new(track),
            srtp_stream,
            rtcp_interceptor: Mutex::new(Some(rtcp_interceptor)),
            stream_info: Mutex::new(StreamInfo::default()),
            context: Mutex::new(TrackLocalContext::default()),
            transport,
            payload_type: 0,
            ssrc,
            negotiated: AtomicBool::new(false),
            media_engine,
            interceptor,
            id,
            has_sent: AtomicBool::new(false),
            has_stopped: AtomicBool::new(false),
            send_called_tx: Mutex::new(None),
            stop_called_signal: Arc::new(tokio::sync::Notify::new()),
        }
    }

    /// transport returns the currently-configured DTLSTransport, which has
    /// not necessarily started.
    pub fn transport(&self) -> Arc<RTCDtlsTransport> {
        Arc::clone(&self.transport)
    }

    /// ssrc returns the SSRC that will be used by this RTPSender's RTP
    /// stream, once sending has begun.
    pub fn ssrc(&self) -> SSRC {
        self.ssrc
    }

    /// track returns the track that this sender is currently sending.
    pub async fn track(&self) -> Option<Arc<dyn TrackLocal + Send + Sync>> {
        self.track.lock().await.clone()
    }

    /// replace_track replaces the track currently being used as the sender's
    /// source with a new TrackLocal. The new track must be of the same media
    /// kind (audio/video, and codec).
    pub async fn replace_track(
        &self,
        track: Option<Arc<dyn TrackLocal + Send + Sync>>,
    ) -> Result<()> {
        if self.has_sent.load(Ordering::SeqCst) {
            let mut t = self.track.lock().await;
            if let Some(old) = t.take() {
                let context = self.context.lock().await;
                old.unbind(&context).await?;
            }
        }

        if let Some(t) = &track {
            let context = self.context.lock().await;
            if context.id().is_empty() {
                // Not yet bound; defer binding until send() negotiates.
            } else {
                t.bind(&context).await?;
            }
        }

        *self.track.lock().await = track;
        Ok(())
    }

    /// send activates the RTPSender, indicating to the remote peer that it
    /// should begin decoding packets sent by this RTPSender.
    pub async fn send(&self, parameters: &RTCRtpParameters) -> Result<()> {
        if self.has_sent.load(Ordering::SeqCst) {
            return Err(Error::ErrRTPSenderSendAlreadyCalled);
        }
        self.has_sent.store(true, Ordering::SeqCst);

        let track = self.track.lock().await.clone();
        let Some(track) = track else {
            return Ok(());
        };

        let interceptor_track_local_writer = Arc::new(InterceptorToTrackLocalWriter::new());

        let context = TrackLocalContext {
            id: self.id.clone(),
            params: RTCRtpParameters {
                header_extensions: parameters.header_extensions.clone(),
                codecs: self.media_engine.get_codecs_by_kind(track.kind()).await,
            },
            ssrc: self.ssrc,
            write_stream: Some(
                Arc::clone(&interceptor_track_local_writer) as Arc<dyn TrackLocalWriter + Send + Sync>
            ),
        };

        let negotiated_codec = track.bind(&context).await?;

        *self.context.lock().await = context;

        let stream_info = create_stream_info(
            self.id.clone(),
            self.ssrc,
            negotiated_codec.payload_type,
            negotiated_codec.capability.clone(),
            &parameters.header_extensions,
        );
        *self.stream_info.lock().await = stream_info.clone();

        let srtp_rtp_writer = Arc::clone(&self.srtp_stream) as Arc<dyn RTPWriter + Send + Sync>;
        let rtp_interceptor = self
            .interceptor
            .bind_local_stream(&stream_info, srtp_rtp_writer)
            .await;
        *interceptor_track_local_writer.interceptor_rtp_writer.lock().await = Some(rtp_interceptor);

        Ok(())
    }

    /// stop irreversibly stops the RTPSender.
    pub async fn stop(&self) -> Result<()> {
        if self.has_stopped.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if !self.has_sent.load(Ordering::SeqCst) {
            return Ok(());
        }

        if let Some(track) = self.track.lock().await.take() {
            let context = self.context.lock().await;
            track.unbind(&context).await?;
        }

        self.stop_called_signal.notify_waiters();

        Ok(())
    }

    /// read_rtcp is a convenience method that wraps read and unmarshal for
    /// you. It also runs any configured interceptors.
    pub async fn read_rtcp(
        &self,
    ) -> Result<(Box<dyn rtcp::packet::Packet>, interceptor::Attributes)> {
        let reader = self.rtcp_interceptor.lock().await.clone();
        let Some(reader) = reader else {
            return Err(Error::ErrRTPSenderDTLSTransportNil);
        };

        let mut b = vec![0u8; crate::RECEIVE_MTU];
        let (n, attributes) = reader
            .read(&mut b, &interceptor::Attributes::new())
            .await?;

        let mut buf = &b[..n];
        let pkts = rtcp::packet::unmarshal(&mut buf)?;

        Ok((pkts, attributes))
    }
}
