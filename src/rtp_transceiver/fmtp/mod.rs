mod generic;
mod h264;
mod vp9;

use std::any::Any;
use std::collections::HashMap;

use generic::GenericFmtp;
use h264::H264Fmtp;
use vp9::Vp9Fmtp;

/// Fmtp represents a parsed fmtp line, specific to a codec's MIME type.
pub(crate) trait Fmtp: std::fmt::Debug {
    /// mime_type returns the MIME type associated with the fmtp.
    fn mime_type(&self) -> &str;

    /// match_fmtp compares this fmtp against another and reports whether
    /// they are compatible (non-contradictory) for negotiation purposes.
    fn match_fmtp(&self, f: &(dyn Fmtp)) -> bool;

    /// parameter returns the value of a named parameter, if present.
    fn parameter(&self, key: &str) -> Option<&String>;

    /// equal reports whether two fmtp instances are the same MIME type
    /// and carry identical parameters.
    fn equal(&self, other: &(dyn Fmtp)) -> bool;

    fn as_any(&self) -> &(dyn Any);
}

/// parse_fmtp parses an fmtp line into a generic, case-normalised map.
fn parse_fmtp(line: &str) -> HashMap<String, String> {
    let mut f = HashMap::new();
    for p in line.split(';').collect::<Vec<&str>>() {
        let pp: Vec<&str> = p.trim().splitn(2, '=').collect();
        let key = pp[0].to_lowercase();
        let value = if pp.len() > 1 {
            pp[1].to_owned()
        } else {
            String::new()
        };
        if !key.is_empty() {
            f.insert(key, value);
        }
    }
    f
}

/// parse parses an fmtp line for the given MIME type, dispatching to the
/// codec-specific implementation when one is registered and falling back
/// to the generic parser otherwise.
pub(crate) fn parse(mime_type: &str, line: &str) -> Box<dyn Fmtp> {
    let parameters = parse_fmtp(line);
    let mime_type_lower = mime_type.to_lowercase();

    if mime_type_lower == crate::api::media_engine::MIME_TYPE_H264.to_lowercase() {
        Box::new(H264Fmtp {
            parameters,
        })
    } else if mime_type_lower == crate::api::media_engine::MIME_TYPE_VP9.to_lowercase() {
        Box::new(Vp9Fmtp { parameters })
    } else {
        Box::new(GenericFmtp {
            mime_type: mime_type_lower,
            parameters,
        })
    }
}

#[cfg(test)]
mod fmtp_test {
    use super::*;

    #[test]
    fn test_parse_generic() {
        let f = parse("audio/opus", "minptime=10;useinbandfec=1");
        assert_eq!(f.mime_type(), "audio/opus");
        assert_eq!(f.parameter("minptime"), Some(&"10".to_owned()));
    }

    #[test]
    fn test_parse_h264_dispatch() {
        let f = parse("video/H264", "profile-level-id=42e01f;packetization-mode=1");
        assert_eq!(f.mime_type(), "video/h264");
        assert!(f.as_any().downcast_ref::<H264Fmtp>().is_some());
    }

    #[test]
    fn test_parse_vp9_dispatch() {
        let f = parse("video/VP9", "profile-id=0");
        assert_eq!(f.mime_type(), "video/vp9");
        assert!(f.as_any().downcast_ref::<Vp9Fmtp>().is_some());
    }
}
