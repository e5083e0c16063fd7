use bytes::Bytes;
use tokio::sync::mpsc;
use waitgroup::WaitGroup;

use super::*;
use crate::api::media_engine::MIME_TYPE_OPUS;
use crate::peer_connection::peer_connection_state::RTCPeerConnectionState;
use crate::peer_connection::peer_connection_test::{
    close_pair_now, create_vnet_pair, signal_pair, until_connection_state,
};
use crate::rtp_transceiver::rtp_codec::RTPHeaderExtensionParameter;
use crate::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;
use crate::track::track_local::{TrackLocal, TrackLocalWriter};

lazy_static::lazy_static! {
    static ref P: RTCRtpParameters = RTCRtpParameters {
        codecs: vec![RTCRtpCodecParameters {
            capability: RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_string(),
                clock_rate: 48000,
                channels: 2,
                sdp_fmtp_line: "minptime=10;useinbandfec=1".to_string(),
                rtcp_feedback: vec![],
            },
            payload_type: 111,
            ..Default::default()
        }],
        header_extensions: vec![
            RTPHeaderExtensionParameter {
                uri: "urn:ietf:params:rtp-hdrext:sdes:mid".to_owned(),
                ..Default::default()
            },
            RTPHeaderExtensionParameter {
                uri: "urn:ietf:params:rtp-hdrext:sdes:rtp-stream-id".to_owned(),
                ..Default::default()
            },
        ],
    };
}

#[tokio::test]
async fn test_set_rtp_parameters() -> Result<()> {
    let (sender_pc, answer_pc, wan) = create_vnet_pair().await?;

    let outgoing_track: Arc<dyn TrackLocal + Send + Sync> = Arc::new(TrackLocalStaticRTP::new(
        RTCRtpCodecCapability {
            mime_type: "audio/opus".to_owned(),
            ..Default::default()
        },
        "audio".to_owned(),
        "webrtc-rs".to_owned(),
    ));

    sender_pc.add_track(Arc::clone(&outgoing_track)).await?;

    // These parameters wouldn't make sense in a real application, but for the
    // sake of the test we just need different values than what negotiation produced.
    let (seen_packet_tx, mut seen_packet_rx) = mpsc::channel::<()>(1);
    let seen_packet_tx = Arc::new(Mutex::new(Some(seen_packet_tx)));

    answer_pc
        .on_track(Box::new(
            move |_: Option<Arc<TrackRemote>>, receiver: Option<Arc<RTCRtpReceiver>>| {
                let seen_packet_tx2 = Arc::clone(&seen_packet_tx);
                Box::pin(async move {
                    if let Some(r) = &receiver {
                        r.set_rtp_parameters(P.clone()).await;

                        if let Some(t) = r.track().await {
                            let incoming_track_codec = t.codec().await;

                            assert_eq!(P.header_extensions, t.params().await.header_extensions);
                            assert_eq!(
                                P.codecs[0].capability.mime_type,
                                incoming_track_codec.capability.mime_type
                            );
                            assert_eq!(
                                P.codecs[0].capability.clock_rate,
                                incoming_track_codec.capability.clock_rate
                            );
                            assert_eq!(
                                P.codecs[0].payload_type,
                                incoming_track_codec.payload_type
                            );

                            let mut done = seen_packet_tx2.lock().await;
                            done.take();
                        }
                    }
                })
            },
        ))
        .await;

    let wg = WaitGroup::new();
    let mut sender_pc = sender_pc;
    let mut answer_pc = answer_pc;

    until_connection_state(&mut sender_pc, &wg, RTCPeerConnectionState::Connected).await;
    until_connection_state(&mut answer_pc, &wg, RTCPeerConnectionState::Connected).await;

    signal_pair(&mut sender_pc, &mut answer_pc).await?;

    if let Some(local) = outgoing_track
        .as_any()
        .downcast_ref::<TrackLocalStaticRTP>()
    {
        local
            .write_rtp(&rtp::packet::Packet {
                header: rtp::header::Header {
                    version: 2,
                    payload_type: 111,
                    sequence_number: 1,
                    timestamp: 3000,
                    ssrc: 1234,
                    ..Default::default()
                },
                payload: Bytes::from_static(&[0xAAu8]),
            })
            .await?;
    } else {
        panic!("failed to downcast outgoing track");
    }

    let _ = seen_packet_rx.recv().await;

    {
        let mut w = wan.lock().await;
        w.stop().await?;
    }
    close_pair_now(&sender_pc, &answer_pc).await;

    Ok(())
}
