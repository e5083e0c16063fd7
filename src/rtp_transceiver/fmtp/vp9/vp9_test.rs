use super::*;

#[test]
fn test_vp9_fmtp_parse() {
    let f = crate::rtp_transceiver::fmtp::parse("video/VP9", "profile-id=2");
    assert_eq!(f.mime_type(), "video/vp9");
    assert_eq!(f.parameter("profile-id"), Some(&"2".to_owned()));
}

#[test]
fn test_vp9_fmtp_match_same_profile() {
    let a = crate::rtp_transceiver::fmtp::parse("video/VP9", "profile-id=0");
    let b = crate::rtp_transceiver::fmtp::parse("video/VP9", "profile-id=0");
    assert!(a.match_fmtp(&*b));
}

#[test]
fn test_vp9_fmtp_mismatch_profile() {
    let a = crate::rtp_transceiver::fmtp::parse("video/VP9", "profile-id=0");
    let b = crate::rtp_transceiver::fmtp::parse("video/VP9", "profile-id=2");
    assert!(!a.match_fmtp(&*b));
}

#[test]
fn test_vp9_fmtp_missing_profile_is_compatible() {
    let a = crate::rtp_transceiver::fmtp::parse("video/VP9", "");
    let b = crate::rtp_transceiver::fmtp::parse("video/VP9", "profile-id=1");
    assert!(a.match_fmtp(&*b));
}
