use std::fmt;

use serde::{Deserialize, Serialize};

use crate::api::media_engine::{
    MIME_TYPE_G722, MIME_TYPE_H264, MIME_TYPE_OPUS, MIME_TYPE_PCMA, MIME_TYPE_PCMU, MIME_TYPE_VP8,
};
use crate::error::{Error, Result};
use crate::rtp_transceiver::{PayloadType, RTCPFeedback};

/// RTPCodecType determines the type of a codec
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RTPCodecType {
    #[default]
    Unspecified = 0,

    /// Audio indicates this is an audio codec
    Audio = 1,

    /// Video indicates this is a video codec
    Video = 2,
}

const RTP_CODEC_TYPE_AUDIO_STR: &str = "audio";
const RTP_CODEC_TYPE_VIDEO_STR: &str = "video";

impl From<&str> for RTPCodecType {
    fn from(raw: &str) -> Self {
        match raw {
            RTP_CODEC_TYPE_AUDIO_STR => RTPCodecType::Audio,
            RTP_CODEC_TYPE_VIDEO_STR => RTPCodecType::Video,
            _ => RTPCodecType::Unspecified,
        }
    }
}

impl fmt::Display for RTPCodecType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            RTPCodecType::Audio => RTP_CODEC_TYPE_AUDIO_STR,
            RTPCodecType::Video => RTP_CODEC_TYPE_VIDEO_STR,
            RTPCodecType::Unspecified => crate::UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}

/// RTPCodecCapability provides information about codec capabilities.
/// <https://w3c.github.io/webrtc-pc/#dictionary-rtcrtpcodeccapability-members>
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RTCRtpCodecCapability {
    pub mime_type: String,
    pub clock_rate: u32,
    pub channels: u16,
    pub sdp_fmtp_line: String,
    pub rtcp_feedback: Vec<RTCPFeedback>,
}

impl RTCRtpCodecCapability {
    pub(crate) fn payloader_for_codec(
        &self,
    ) -> Result<Box<dyn rtp::packetizer::Payloader + Send + Sync>> {
        match self.mime_type.to_lowercase().as_str() {
            MIME_TYPE_H264 => Ok(Box::new(rtp::codecs::h264::H264Payloader)),
            MIME_TYPE_OPUS => Ok(Box::new(rtp::codecs::opus::OpusPayloader)),
            MIME_TYPE_VP8 => Ok(Box::new(rtp::codecs::vp8::Vp8Payloader)),
            MIME_TYPE_G722 => Ok(Box::new(rtp::codecs::g7xx::G7xxPayloader)),
            MIME_TYPE_PCMU | MIME_TYPE_PCMA => Ok(Box::new(rtp::codecs::g7xx::G7xxPayloader)),
            _ => Err(Error::ErrNoPayloaderForCodec),
        }
    }
}

/// RTPHeaderExtensionCapability is used to represent the capabilities/preferences of a header extension.
/// <https://w3c.github.io/webrtc-pc/#dom-rtcrtpcapabilities-headerextensions>
#[derive(Default, Debug, Clone)]
pub struct RTCRtpHeaderExtensionCapability {
    pub uri: String,
}

/// RTPHeaderExtensionParameter represents a negotiated RTPHeaderExtension.
/// <https://w3c.github.io/webrtc-pc/#dictionary-rtcrtpheaderextensionparameters-members>
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RTCRtpHeaderExtensionParameters {
    pub uri: String,
    pub id: isize,
}

/// RTPCodecParameters is a sequence containing the media codecs that an RTPSender
/// will choose from, as well as entries for RTX, RED and FEC mechanisms. This is
/// a subset of the RFC since Pion WebRTC doesn't implement decoding/encoding itself.
/// <https://w3c.github.io/webrtc-pc/#rtcrtpcodecparameters>
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RTCRtpCodecParameters {
    pub capability: RTCRtpCodecCapability,
    pub payload_type: PayloadType,
    #[serde(skip)]
    pub stats_id: String,
}

/// RTPParameters is a list of negotiated codecs and header extensions.
/// <https://w3c.github.io/webrtc-pc/#dictionary-rtcrtpparameters-members>
#[derive(Default, Debug, Clone)]
pub struct RTCRtpParameters {
    pub header_extensions: Vec<RTCRtpHeaderExtensionParameters>,
    pub codecs: Vec<RTCRtpCodecParameters>,
}

/// CodecMatch indicates whether a local and a remote codec description are
/// compatible, and to what degree.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum CodecMatch {
    #[default]
    None = 0,
    Partial = 1,
    Exact = 2,
}

/// codec_parameters_fuzzy_search searches a list of codecs for one matching `needle`,
/// returning the best grade of match found (exact beats partial beats none) together
/// with the matched codec. fmtp lines are compared after parameter-order
/// normalisation; an unparseable or contradictory fmtp line downgrades an
/// otherwise-exact match to partial rather than rejecting it outright.
pub(crate) fn codec_parameters_fuzzy_search(
    needle: &RTCRtpCodecParameters,
    haystack: &[RTCRtpCodecParameters],
) -> (RTCRtpCodecParameters, CodecMatch) {
    // First attempt an exact match: mime type + clock rate + channels + fmtp line
    // match exactly (byte-equal after fmtp parsing).
    let needle_fmtp = crate::rtp_transceiver::fmtp::parse(
        &needle.capability.mime_type,
        &needle.capability.sdp_fmtp_line,
    );

    let mut partial: Option<RTCRtpCodecParameters> = None;

    for c in haystack {
        if !c
            .capability
            .mime_type
            .eq_ignore_ascii_case(&needle.capability.mime_type)
        {
            continue;
        }
        if c.capability.clock_rate != needle.capability.clock_rate {
            continue;
        }
        if needle.capability.channels != 0 && c.capability.channels != needle.capability.channels {
            continue;
        }

        let c_fmtp = crate::rtp_transceiver::fmtp::parse(
            &c.capability.mime_type,
            &c.capability.sdp_fmtp_line,
        );

        if needle_fmtp.match_fmtp(&*c_fmtp) {
            if needle.capability.sdp_fmtp_line.is_empty()
                || c.capability.sdp_fmtp_line.is_empty()
                || needle_fmtp.equal(&*c_fmtp)
            {
                return (c.clone(), CodecMatch::Exact);
            }
            if partial.is_none() {
                partial = Some(c.clone());
            }
        }
    }

    if let Some(c) = partial {
        (c, CodecMatch::Partial)
    } else {
        (RTCRtpCodecParameters::default(), CodecMatch::None)
    }
}

#[cfg(test)]
mod codec_test {
    use super::*;

    fn codec(mime: &str, clock: u32, channels: u16, fmtp: &str, pt: u8) -> RTCRtpCodecParameters {
        RTCRtpCodecParameters {
            capability: RTCRtpCodecCapability {
                mime_type: mime.to_owned(),
                clock_rate: clock,
                channels,
                sdp_fmtp_line: fmtp.to_owned(),
                rtcp_feedback: vec![],
            },
            payload_type: pt,
            stats_id: String::new(),
        }
    }

    #[test]
    fn test_fuzzy_search_exact_match() {
        let haystack = vec![codec("audio/opus", 48000, 2, "minptime=10", 111)];
        let needle = codec("audio/opus", 48000, 2, "minptime=10", 96);
        let (c, m) = codec_parameters_fuzzy_search(&needle, &haystack);
        assert_eq!(m, CodecMatch::Exact);
        assert_eq!(c.payload_type, 111);
    }

    #[test]
    fn test_fuzzy_search_h264_exact_prefers_matching_profile() {
        let haystack = vec![
            codec("video/H264", 90000, 0, "packetization-mode=1;profile-level-id=640c1f", 96),
            codec("video/H264", 90000, 0, "packetization-mode=1;profile-level-id=42e01f", 98),
        ];
        let needle = codec(
            "video/H264",
            90000,
            0,
            "packetization-mode=1;profile-level-id=42e01f",
            127,
        );
        let (c, m) = codec_parameters_fuzzy_search(&needle, &haystack);
        assert_eq!(m, CodecMatch::Exact);
        assert_eq!(c.payload_type, 98);
    }

    #[test]
    fn test_fuzzy_search_no_match() {
        let haystack = vec![codec("audio/opus", 48000, 2, "", 111)];
        let needle = codec("video/VP8", 90000, 0, "", 96);
        let (_, m) = codec_parameters_fuzzy_search(&needle, &haystack);
        assert_eq!(m, CodecMatch::None);
    }
}
