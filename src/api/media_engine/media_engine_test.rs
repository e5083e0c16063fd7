use super::*;
use crate::api::APIBuilder;
use crate::peer_connection::configuration::RTCConfiguration;
use regex::Regex;
use sdp::description::session::SessionDescription;
use std::io::Cursor;

fn must_parse(raw: &str) -> SessionDescription {
    let mut reader = Cursor::new(raw.as_bytes());
    SessionDescription::unmarshal(&mut reader).unwrap()
}

#[tokio::test]
async fn test_opus_case() -> Result<()> {
    let mut m = MediaEngine::default();
    m.register_default_codecs()?;

    let api = APIBuilder::new().with_media_engine(m).build();

    let pc = api.new_peer_connection(RTCConfiguration::default()).await?;

    pc.add_transceiver_from_kind(RTPCodecType::Audio, &[])
        .await?;

    let offer = pc.create_offer(None).await?;

    let re = Regex::new(r"(?m)^a=rtpmap:\d+ opus/48000/2")?;
    assert!(re.is_match(offer.sdp.as_str()));
    pc.close().await?;

    Ok(())
}

#[tokio::test]
async fn test_video_case() -> Result<()> {
    let mut m = MediaEngine::default();
    m.register_default_codecs()?;

    let api = APIBuilder::new().with_media_engine(m).build();

    let pc = api.new_peer_connection(RTCConfiguration::default()).await?;

    pc.add_transceiver_from_kind(RTPCodecType::Video, &[])
        .await?;

    let offer = pc.create_offer(None).await?;

    assert!(Regex::new(r"(?m)^a=rtpmap:\d+ H264/90000")?.is_match(offer.sdp.as_str()));
    assert!(Regex::new(r"(?m)^a=rtpmap:\d+ VP8/90000")?.is_match(offer.sdp.as_str()));
    assert!(Regex::new(r"(?m)^a=rtpmap:\d+ VP9/90000")?.is_match(offer.sdp.as_str()));

    pc.close().await?;

    Ok(())
}

#[tokio::test]
async fn test_media_engine_remote_description_no_media() -> Result<()> {
    const NO_MEDIA: &str = "v=0\r\no=- 4596489990601351948 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n";

    let mut m = MediaEngine::default();
    m.register_default_codecs()?;
    m.update_from_remote_description(&must_parse(NO_MEDIA))
        .await?;

    assert!(!m.negotiated_video.load(Ordering::SeqCst));
    assert!(!m.negotiated_audio.load(Ordering::SeqCst));

    Ok(())
}

#[tokio::test]
async fn test_media_engine_remote_description_enable_opus() -> Result<()> {
    const OPUS_SAME_PAYLOAD: &str = "v=0\r\no=- 4596489990601351948 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\nm=audio 9 UDP/TLS/RTP/SAVPF 111\r\na=rtpmap:111 opus/48000/2\r\na=fmtp:111 minptime=10; useinbandfec=1\r\n";

    let mut m = MediaEngine::default();
    m.register_default_codecs()?;
    m.update_from_remote_description(&must_parse(OPUS_SAME_PAYLOAD))
        .await?;

    assert!(!m.negotiated_video.load(Ordering::SeqCst));
    assert!(m.negotiated_audio.load(Ordering::SeqCst));

    let (opus_codec, _) = m.get_codec_by_payload(111).await?;
    assert_eq!(opus_codec.capability.mime_type, MIME_TYPE_OPUS);

    Ok(())
}

#[tokio::test]
async fn test_media_engine_remote_description_change_payload_type() -> Result<()> {
    const OPUS_SAME_PAYLOAD: &str = "v=0\r\no=- 4596489990601351948 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\nm=audio 9 UDP/TLS/RTP/SAVPF 112\r\na=rtpmap:112 opus/48000/2\r\na=fmtp:112 minptime=10; useinbandfec=1\r\n";

    let mut m = MediaEngine::default();
    m.register_default_codecs()?;
    m.update_from_remote_description(&must_parse(OPUS_SAME_PAYLOAD))
        .await?;

    assert!(!m.negotiated_video.load(Ordering::SeqCst));
    assert!(m.negotiated_audio.load(Ordering::SeqCst));

    assert!(m.get_codec_by_payload(111).await.is_err());

    let (opus_codec, _) = m.get_codec_by_payload(112).await?;
    assert_eq!(opus_codec.capability.mime_type, MIME_TYPE_OPUS);

    Ok(())
}

#[tokio::test]
async fn test_media_engine_remote_description_case_insensitive() -> Result<()> {
    const OPUS_UPCASE: &str = "v=0\r\no=- 4596489990601351948 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\nm=audio 9 UDP/TLS/RTP/SAVPF 111\r\na=rtpmap:111 OPUS/48000/2\r\na=fmtp:111 minptime=10; useinbandfec=1\r\n";

    let mut m = MediaEngine::default();
    m.register_default_codecs()?;
    m.update_from_remote_description(&must_parse(OPUS_UPCASE))
        .await?;

    assert!(!m.negotiated_video.load(Ordering::SeqCst));
    assert!(m.negotiated_audio.load(Ordering::SeqCst));

    let (opus_codec, _) = m.get_codec_by_payload(111).await?;
    assert_eq!(opus_codec.capability.mime_type, "audio/OPUS");

    Ok(())
}

#[tokio::test]
async fn test_media_engine_remote_description_handle_different_fmtp() -> Result<()> {
    const OPUS_NO_FMTP: &str = "v=0\r\no=- 4596489990601351948 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\nm=audio 9 UDP/TLS/RTP/SAVPF 111\r\na=rtpmap:111 opus/48000/2\r\n";

    let mut m = MediaEngine::default();
    m.register_default_codecs()?;
    m.update_from_remote_description(&must_parse(OPUS_NO_FMTP))
        .await?;

    assert!(!m.negotiated_video.load(Ordering::SeqCst));
    assert!(m.negotiated_audio.load(Ordering::SeqCst));

    let (opus_codec, _) = m.get_codec_by_payload(111).await?;
    assert_eq!(opus_codec.capability.mime_type, MIME_TYPE_OPUS);

    Ok(())
}

#[tokio::test]
async fn test_media_engine_remote_description_header_extensions() -> Result<()> {
    const HEADER_EXTENSIONS: &str = "v=0\r\no=- 4596489990601351948 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\nm=audio 9 UDP/TLS/RTP/SAVPF 111\r\na=extmap:7 urn:ietf:params:rtp-hdrext:sdes:mid\r\na=extmap:5 urn:ietf:params:rtp-hdrext:sdes:rtp-stream-id\r\na=rtpmap:111 opus/48000/2\r\n";

    let mut m = MediaEngine::default();
    m.register_default_codecs()?;
    for extension in [
        "urn:ietf:params:rtp-hdrext:sdes:mid",
        "urn:ietf:params:rtp-hdrext:sdes:repaired-rtp-stream-id",
    ] {
        m.register_header_extension(
            RTCRtpHeaderExtensionCapability {
                uri: extension.to_owned(),
            },
            RTPCodecType::Audio,
            vec![],
        )
        .await?;
    }

    m.update_from_remote_description(&must_parse(HEADER_EXTENSIONS))
        .await?;

    assert!(!m.negotiated_video.load(Ordering::SeqCst));
    assert!(m.negotiated_audio.load(Ordering::SeqCst));

    let (abs_id, abs_audio_enabled, abs_video_enabled) = m
        .get_header_extension_id(RTCRtpHeaderExtensionCapability {
            uri: "http://www.webrtc.org/experiments/rtp-hdrext/abs-send-time".to_owned(),
        })
        .await;
    assert_eq!(abs_id, 0);
    assert!(!abs_audio_enabled);
    assert!(!abs_video_enabled);

    let (mid_id, mid_audio_enabled, mid_video_enabled) = m
        .get_header_extension_id(RTCRtpHeaderExtensionCapability {
            uri: "urn:ietf:params:rtp-hdrext:sdes:mid".to_owned(),
        })
        .await;
    assert_eq!(mid_id, 7);
    assert!(mid_audio_enabled);
    assert!(!mid_video_enabled);

    Ok(())
}

#[tokio::test]
async fn test_media_engine_remote_description_prefers_exact_codec_matches() -> Result<()> {
    const PROFILE_LEVELS: &str = "v=0\r\no=- 4596489990601351948 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\nm=video 60323 UDP/TLS/RTP/SAVPF 96 98\r\na=rtpmap:96 H264/90000\r\na=fmtp:96 level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=640c1f\r\na=rtpmap:98 H264/90000\r\na=fmtp:98 level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=42e01f\r\n";

    let mut m = MediaEngine::default();
    m.register_codec(
        RTCRtpCodecParameters {
            capability: RTCRtpCodecCapability {
                mime_type: MIME_TYPE_H264.to_owned(),
                clock_rate: 90000,
                channels: 0,
                sdp_fmtp_line:
                    "level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=42e01f"
                        .to_owned(),
                rtcp_feedback: vec![],
            },
            payload_type: 127,
            ..Default::default()
        },
        RTPCodecType::Video,
    )?;
    m.update_from_remote_description(&must_parse(PROFILE_LEVELS))
        .await?;

    assert!(m.negotiated_video.load(Ordering::SeqCst));
    assert!(!m.negotiated_audio.load(Ordering::SeqCst));

    let (supported_h264, _) = m.get_codec_by_payload(98).await?;
    assert_eq!(supported_h264.capability.mime_type, MIME_TYPE_H264);

    assert!(m.get_codec_by_payload(96).await.is_err());

    Ok(())
}

#[tokio::test]
async fn test_media_engine_remote_description_no_match_on_conflicting_fmtp() -> Result<()> {
    const PROFILE_LEVELS: &str = "v=0\r\no=- 4596489990601351948 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\nm=video 60323 UDP/TLS/RTP/SAVPF 96\r\na=rtpmap:96 H264/90000\r\na=fmtp:96 level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=640c1f\r\n";

    let mut m = MediaEngine::default();
    m.register_codec(
        RTCRtpCodecParameters {
            capability: RTCRtpCodecCapability {
                mime_type: MIME_TYPE_H264.to_owned(),
                clock_rate: 90000,
                channels: 0,
                sdp_fmtp_line:
                    "level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=42e01f"
                        .to_owned(),
                rtcp_feedback: vec![],
            },
            payload_type: 127,
            ..Default::default()
        },
        RTPCodecType::Video,
    )?;
    m.update_from_remote_description(&must_parse(PROFILE_LEVELS))
        .await?;

    assert!(m.get_codec_by_payload(96).await.is_err());

    Ok(())
}

#[tokio::test]
async fn test_media_engine_remote_description_matches_missing_offer_fmtp() -> Result<()> {
    const PROFILE_LEVELS: &str = "v=0\r\no=- 4596489990601351948 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\nm=video 60323 UDP/TLS/RTP/SAVPF 96\r\na=rtpmap:96 VP9/90000\r\n";

    let mut m = MediaEngine::default();
    m.register_codec(
        RTCRtpCodecParameters {
            capability: RTCRtpCodecCapability {
                mime_type: MIME_TYPE_VP9.to_owned(),
                clock_rate: 90000,
                channels: 0,
                sdp_fmtp_line: "profile-id=0".to_owned(),
                rtcp_feedback: vec![],
            },
            payload_type: 98,
            ..Default::default()
        },
        RTPCodecType::Video,
    )?;
    m.update_from_remote_description(&must_parse(PROFILE_LEVELS))
        .await?;

    assert!(m.negotiated_video.load(Ordering::SeqCst));
    assert!(m.get_codec_by_payload(96).await.is_ok());

    Ok(())
}

#[tokio::test]
async fn test_media_engine_remote_description_matches_fmtp_absent_in_both() -> Result<()> {
    const PROFILE_LEVELS: &str = "v=0\r\no=- 4596489990601351948 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\nm=video 60323 UDP/TLS/RTP/SAVPF 96\r\na=rtpmap:96 VP8/90000\r\n";

    let mut m = MediaEngine::default();
    m.register_codec(
        RTCRtpCodecParameters {
            capability: RTCRtpCodecCapability {
                mime_type: MIME_TYPE_VP8.to_owned(),
                clock_rate: 90000,
                channels: 0,
                sdp_fmtp_line: "".to_owned(),
                rtcp_feedback: vec![],
            },
            payload_type: 96,
            ..Default::default()
        },
        RTPCodecType::Video,
    )?;
    m.update_from_remote_description(&must_parse(PROFILE_LEVELS))
        .await?;

    assert!(m.negotiated_video.load(Ordering::SeqCst));
    assert!(m.get_codec_by_payload(96).await.is_ok());

    Ok(())
}

#[tokio::test]
async fn test_media_engine_remote_description_matches_rtx_apt_for_exact_match() -> Result<()> {
    const PROFILE_LEVELS: &str = "v=0\r\no=- 4596489990601351948 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\nm=video 60323 UDP/TLS/RTP/SAVPF 94 96 97\r\na=rtpmap:94 VP8/90000\r\na=rtpmap:96 VP9/90000\r\na=fmtp:96 profile-id=2\r\na=rtpmap:97 rtx/90000\r\na=fmtp:97 apt=96\r\n";

    let mut m = MediaEngine::default();
    m.register_codec(
        RTCRtpCodecParameters {
            capability: RTCRtpCodecCapability {
                mime_type: MIME_TYPE_VP8.to_owned(),
                clock_rate: 90000,
                channels: 0,
                sdp_fmtp_line: "".to_owned(),
                rtcp_feedback: vec![],
            },
            payload_type: 94,
            ..Default::default()
        },
        RTPCodecType::Video,
    )?;
    m.register_codec(
        RTCRtpCodecParameters {
            capability: RTCRtpCodecCapability {
                mime_type: MIME_TYPE_VP9.to_owned(),
                clock_rate: 90000,
                channels: 0,
                sdp_fmtp_line: "profile-id=2".to_owned(),
                rtcp_feedback: vec![],
            },
            payload_type: 96,
            ..Default::default()
        },
        RTPCodecType::Video,
    )?;
    m.register_codec(
        RTCRtpCodecParameters {
            capability: RTCRtpCodecCapability {
                mime_type: "video/rtx".to_owned(),
                clock_rate: 90000,
                channels: 0,
                sdp_fmtp_line: "apt=96".to_owned(),
                rtcp_feedback: vec![],
            },
            payload_type: 97,
            ..Default::default()
        },
        RTPCodecType::Video,
    )?;
    m.update_from_remote_description(&must_parse(PROFILE_LEVELS))
        .await?;

    assert!(m.negotiated_video.load(Ordering::SeqCst));
    assert!(m.get_codec_by_payload(97).await.is_ok());

    Ok(())
}

#[tokio::test]
async fn test_media_engine_remote_description_matches_rtx_apt_for_partial_match() -> Result<()> {
    const PROFILE_LEVELS: &str = "v=0\r\no=- 4596489990601351948 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\nm=video 60323 UDP/TLS/RTP/SAVPF 94 96 97\r\na=rtpmap:94 VP8/90000\r\na=rtpmap:96 VP9/90000\r\na=fmtp:96 profile-id=2\r\na=rtpmap:97 rtx/90000\r\na=fmtp:97 apt=96\r\n";

    let mut m = MediaEngine::default();
    m.register_codec(
        RTCRtpCodecParameters {
            capability: RTCRtpCodecCapability {
                mime_type: MIME_TYPE_VP8.to_owned(),
                clock_rate: 90000,
                channels: 0,
                sdp_fmtp_line: "".to_owned(),
                rtcp_feedback: vec![],
            },
            payload_type: 94,
            ..Default::default()
        },
        RTPCodecType::Video,
    )?;
    // registered VP9 only partially matches the remote's profile-id
    m.register_codec(
        RTCRtpCodecParameters {
            capability: RTCRtpCodecCapability {
                mime_type: MIME_TYPE_VP9.to_owned(),
                clock_rate: 90000,
                channels: 0,
                sdp_fmtp_line: "profile-id=1".to_owned(),
                rtcp_feedback: vec![],
            },
            payload_type: 96,
            ..Default::default()
        },
        RTPCodecType::Video,
    )?;
    m.register_codec(
        RTCRtpCodecParameters {
            capability: RTCRtpCodecCapability {
                mime_type: "video/rtx".to_owned(),
                clock_rate: 90000,
                channels: 0,
                sdp_fmtp_line: "apt=96".to_owned(),
                rtcp_feedback: vec![],
            },
            payload_type: 97,
            ..Default::default()
        },
        RTPCodecType::Video,
    )?;
    m.update_from_remote_description(&must_parse(PROFILE_LEVELS))
        .await?;

    assert!(m.negotiated_video.load(Ordering::SeqCst));
    // rtx apt only partially matched its media codec, so it is not negotiated
    assert!(matches!(
        m.get_codec_by_payload(97).await,
        Err(Error::ErrCodecNotFound)
    ));

    Ok(())
}

fn register_test_opus(m: &mut MediaEngine) -> Result<()> {
    m.register_codec(
        RTCRtpCodecParameters {
            capability: RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: 48000,
                channels: 0,
                sdp_fmtp_line: "".to_owned(),
                rtcp_feedback: vec![],
            },
            payload_type: 111,
            ..Default::default()
        },
        RTPCodecType::Audio,
    )
}

#[tokio::test]
async fn test_media_engine_header_extension_direction_no_direction() -> Result<()> {
    let mut m = MediaEngine::default();
    register_test_opus(&mut m)?;
    m.register_header_extension(
        RTCRtpHeaderExtensionCapability {
            uri: "pion-header-test".to_owned(),
        },
        RTPCodecType::Audio,
        vec![],
    )
    .await?;

    let params = m
        .get_rtp_parameters_by_kind(
            RTPCodecType::Audio,
            &[RTCRtpTransceiverDirection::Recvonly],
        )
        .await;

    assert_eq!(params.header_extensions.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_media_engine_header_extension_direction_same_direction() -> Result<()> {
    let mut m = MediaEngine::default();
    register_test_opus(&mut m)?;
    m.register_header_extension(
        RTCRtpHeaderExtensionCapability {
            uri: "pion-header-test".to_owned(),
        },
        RTPCodecType::Audio,
        vec![RTCRtpTransceiverDirection::Recvonly],
    )
    .await?;

    let params = m
        .get_rtp_parameters_by_kind(
            RTPCodecType::Audio,
            &[RTCRtpTransceiverDirection::Recvonly],
        )
        .await;

    assert_eq!(params.header_extensions.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_media_engine_header_extension_direction_different_direction() -> Result<()> {
    let mut m = MediaEngine::default();
    register_test_opus(&mut m)?;
    m.register_header_extension(
        RTCRtpHeaderExtensionCapability {
            uri: "pion-header-test".to_owned(),
        },
        RTPCodecType::Audio,
        vec![RTCRtpTransceiverDirection::Sendonly],
    )
    .await?;

    let params = m
        .get_rtp_parameters_by_kind(
            RTPCodecType::Audio,
            &[RTCRtpTransceiverDirection::Recvonly],
        )
        .await;

    assert_eq!(params.header_extensions.len(), 0);

    Ok(())
}

#[tokio::test]
async fn test_media_engine_header_extension_direction_invalid_direction() -> Result<()> {
    let mut m = MediaEngine::default();
    register_test_opus(&mut m)?;

    for direction in [
        RTCRtpTransceiverDirection::Sendrecv,
        RTCRtpTransceiverDirection::Inactive,
        RTCRtpTransceiverDirection::Unspecified,
    ] {
        let result = m
            .register_header_extension(
                RTCRtpHeaderExtensionCapability {
                    uri: "pion-header-test".to_owned(),
                },
                RTPCodecType::Audio,
                vec![direction],
            )
            .await;
        assert!(matches!(
            result,
            Err(Error::ErrRegisterHeaderExtensionInvalidDirection)
        ));
    }

    Ok(())
}

/// If a user attempts to register a codec twice we should just discard duplicate calls
#[test]
fn test_media_engine_double_register() -> Result<()> {
    let mut m = MediaEngine::default();

    m.register_codec(
        RTCRtpCodecParameters {
            capability: RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: 48000,
                channels: 0,
                sdp_fmtp_line: "".to_owned(),
                rtcp_feedback: vec![],
            },
            payload_type: 111,
            ..Default::default()
        },
        RTPCodecType::Audio,
    )?;

    m.register_codec(
        RTCRtpCodecParameters {
            capability: RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: 48000,
                channels: 0,
                sdp_fmtp_line: "".to_owned(),
                rtcp_feedback: vec![],
            },
            payload_type: 111,
            ..Default::default()
        },
        RTPCodecType::Audio,
    )?;

    assert_eq!(m.audio_codecs.len(), 1);

    Ok(())
}

/// The cloned MediaEngine instance should be able to update negotiated header extensions.
#[tokio::test]
async fn test_update_header_extension_to_cloned_media_engine() -> Result<()> {
    let mut src = MediaEngine::default();

    src.register_codec(
        RTCRtpCodecParameters {
            capability: RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: 48000,
                channels: 0,
                sdp_fmtp_line: "".to_owned(),
                rtcp_feedback: vec![],
            },
            payload_type: 111,
            ..Default::default()
        },
        RTPCodecType::Audio,
    )?;

    src.register_header_extension(
        RTCRtpHeaderExtensionCapability {
            uri: "test-extension".to_owned(),
        },
        RTPCodecType::Audio,
        vec![],
    )
    .await?;

    async fn validate(m: &MediaEngine) -> Result<()> {
        m.update_header_extension(2, "test-extension", RTPCodecType::Audio)
            .await?;

        let (id, audio_negotiated, video_negotiated) = m
            .get_header_extension_id(RTCRtpHeaderExtensionCapability {
                uri: "test-extension".to_owned(),
            })
            .await;
        assert_eq!(id, 2);
        assert!(audio_negotiated);
        assert!(!video_negotiated);
        Ok(())
    }

    validate(&src).await?;
    validate(&src.clone_to()).await?;

    Ok(())
}
