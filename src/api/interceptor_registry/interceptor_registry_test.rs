use super::*;
use crate::rtp_transceiver::rtp_codec::RTCRtpHeaderExtensionCapability;

/// configure_nack should register NACK/PLI feedback on the video codecs and
/// add a generator/responder pair to the registry.
#[test]
fn test_configure_nack_registers_feedback() {
    let mut m = MediaEngine::default();
    m.register_default_codecs().unwrap();

    let video_codecs_before = m.video_codecs.clone();
    assert!(video_codecs_before
        .iter()
        .all(|c| !c.capability.rtcp_feedback.iter().any(|f| f.typ == "nack"
            && f.parameter.is_empty())));

    let registry = configure_nack(Registry::new(), &mut m);

    assert!(m.video_codecs.iter().all(|c| c
        .capability
        .rtcp_feedback
        .iter()
        .any(|f| f.typ == "nack" && f.parameter.is_empty())));
    assert!(m.video_codecs.iter().all(|c| c
        .capability
        .rtcp_feedback
        .iter()
        .any(|f| f.typ == "nack" && f.parameter == "pli")));

    assert!(registry.build("nack-test").is_ok());
}

/// configure_rtcp_reports should produce a registry that can build a chain
/// containing the sender/receiver report interceptors.
#[test]
fn test_configure_rtcp_reports_builds() {
    let registry = configure_rtcp_reports(Registry::new());
    assert!(registry.build("rtcp-reports-test").is_ok());
}

/// configure_twcc_header_extension_sender should register the transport-cc
/// header extension for both audio and video.
#[tokio::test]
async fn test_configure_twcc_header_extension_sender() -> Result<()> {
    let mut m = MediaEngine::default();

    let registry =
        configure_twcc_header_extension_sender(Registry::new(), &mut m).await?;

    let (video_id, _, video_enabled) = m
        .get_header_extension_id(RTCRtpHeaderExtensionCapability {
            uri: sdp::extmap::TRANSPORT_CC_URI.to_owned(),
        })
        .await;
    assert_eq!(video_id, 0);
    assert!(!video_enabled);

    assert!(registry.build("twcc-header-test").is_ok());

    Ok(())
}

/// register_default_interceptors should combine the nack and rtcp-report
/// configuration into a single usable registry.
#[tokio::test]
async fn test_register_default_interceptors() -> Result<()> {
    let mut m = MediaEngine::default();
    m.register_default_codecs()?;

    let registry = register_default_interceptors(Registry::new(), &mut m).await?;

    assert!(m.video_codecs.iter().all(|c| c
        .capability
        .rtcp_feedback
        .iter()
        .any(|f| f.typ == "nack")));
    assert!(registry.build("default-interceptors-test").is_ok());

    Ok(())
}
