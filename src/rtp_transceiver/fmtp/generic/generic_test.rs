use super::*;

#[test]
fn test_generic_fmtp_parse() {
    let f = crate::rtp_transceiver::fmtp::parse("audio/opus", "minptime=10;useinbandfec=1");
    assert_eq!(f.mime_type(), "audio/opus");
    assert_eq!(f.parameter("minptime"), Some(&"10".to_owned()));
    assert_eq!(f.parameter("useinbandfec"), Some(&"1".to_owned()));
}

#[test]
fn test_generic_fmtp_match() {
    let consist_string: HashMap<bool, String> = [
        (true, "consist".to_owned()),
        (false, "inconsist".to_owned()),
    ]
    .iter()
    .cloned()
    .collect();

    let tests = vec![
        ("Equal", "key1=value1;key2=value2", "key1=value1;key2=value2", true),
        ("OneHasExtraParam", "key1=value1", "key1=value1;key2=value2", true),
        ("Inconsistent", "key1=value1", "key1=value2", false),
    ];

    for (name, a, b, consist) in tests {
        let aa = crate::rtp_transceiver::fmtp::parse("audio/opus", a);
        let bb = crate::rtp_transceiver::fmtp::parse("audio/opus", b);
        let c = aa.match_fmtp(&*bb);
        assert_eq!(
            c,
            consist,
            "{}: '{}' and '{}' are expected to be {:?}, but treated as {:?}",
            name,
            a,
            b,
            consist_string.get(&consist),
            consist_string.get(&c),
        );
    }
}

#[test]
fn test_generic_fmtp_mismatched_mime_type() {
    let a = crate::rtp_transceiver::fmtp::parse("audio/opus", "minptime=10");
    let b = crate::rtp_transceiver::fmtp::parse("audio/pcmu", "minptime=10");
    assert!(!a.match_fmtp(&*b));
}
