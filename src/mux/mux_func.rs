/// MatchFunc allows custom logic for mapping incoming packets to an Endpoint.
pub type MatchFunc = Box<dyn Fn(&[u8]) -> bool + Send + Sync>;

/// match_range is a MatchFunc that accepts packets with the first byte in
/// [lower, upper].
#[allow(dead_code)]
pub(crate) fn match_range(lower: u8, upper: u8) -> MatchFunc {
    Box::new(move |buf: &[u8]| -> bool {
        if buf.is_empty() {
            return false;
        }
        let b = buf[0];
        b >= lower && b <= upper
    })
}

/// MatchFuncs as described in RFC 7983, used to demultiplex STUN, DTLS,
/// RTP/RTCP and TURN Channel Data on a single 5-tuple.
/// <https://tools.ietf.org/html/rfc7983>
///  +----------------+
///  | 127 < B < 192 -+--> forward to RTP
///  |                |
///  |  19 < B < 64  -+--> forward to DTLS
///  |                |
///  |       B < 2   -+--> forward to STUN
///  +----------------+

/// match_dtls is a MatchFunc that accepts packets with the first byte in [20..63].
pub fn match_dtls(b: &[u8]) -> bool {
    !b.is_empty() && (20..=63).contains(&b[0])
}

/// match_srtp is a MatchFunc that accepts packets with the first byte in [128..191]
/// (RTP version 2, excluding the RTCP range carved out by match_srtcp below).
pub fn match_srtp(b: &[u8]) -> bool {
    !b.is_empty() && (128..=191).contains(&b[0])
}

/// match_srtcp is a MatchFunc that accepts packets with the first byte in [192..223],
/// which per RFC 5761 is the RTCP packet-type range that overlaps the RTP range.
pub fn match_srtcp(b: &[u8]) -> bool {
    !b.is_empty() && (192..=223).contains(&b[0])
}

/// match_all is a MatchFunc that accepts any packet, used when only one
/// Endpoint is registered on the Mux.
#[allow(dead_code)]
pub fn match_all(_b: &[u8]) -> bool {
    true
}

const STUN_HEADER_LENGTH: usize = 20;
const STUN_MAGIC_COOKIE: [u8; 4] = [0x21, 0x12, 0xa4, 0x42];

/// match_stun is a MatchFunc that accepts packets whose first byte is less
/// than 2 and whose STUN magic cookie matches.
pub fn match_stun(b: &[u8]) -> bool {
    if b.len() < STUN_HEADER_LENGTH {
        return false;
    }
    b[0] < 2 && b[4..8] == STUN_MAGIC_COOKIE
}
