#[cfg(test)]
mod h264_test;

use super::*;

#[derive(Debug, PartialEq)]
pub(crate) struct H264Fmtp {
    pub(crate) parameters: HashMap<String, String>,
}

impl H264Fmtp {
    fn profile_level_id(&self) -> Option<&str> {
        self.parameters
            .get("profile-level-id")
            .map(|s| s.as_str())
    }

    /// profile_indication_and_constraints extracts the first four hex digits
    /// of profile-level-id, which carry the profile_idc and the
    /// constraint-flags octet; the level is deliberately ignored since
    /// unequal levels are non-contradictory.
    fn profile_indication_and_constraints(&self) -> Option<&str> {
        self.profile_level_id().and_then(|id| id.get(0..4))
    }

    fn packetization_mode(&self) -> Option<&String> {
        self.parameters.get("packetization-mode")
    }
}

impl Fmtp for H264Fmtp {
    fn mime_type(&self) -> &str {
        "video/h264"
    }

    /// match_fmtp implements the RFC 6184 recommended compatibility check:
    /// packetization-mode must match exactly when either side specifies it,
    /// and the profile_idc/constraint-flags portion of profile-level-id must
    /// match exactly while the level portion is ignored.
    fn match_fmtp(&self, f: &(dyn Fmtp)) -> bool {
        let c = match f.as_any().downcast_ref::<H264Fmtp>() {
            Some(c) => c,
            None => return false,
        };

        match (self.packetization_mode(), c.packetization_mode()) {
            (Some(a), Some(b)) => {
                if a != b {
                    return false;
                }
            }
            (None, None) => {}
            _ => return false,
        }

        match (
            self.profile_indication_and_constraints(),
            c.profile_indication_and_constraints(),
        ) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            (None, None) => true,
            _ => false,
        }
    }

    fn parameter(&self, key: &str) -> Option<&String> {
        self.parameters.get(key)
    }

    fn equal(&self, other: &(dyn Fmtp)) -> bool {
        other
            .as_any()
            .downcast_ref::<H264Fmtp>()
            .map_or(false, |a| self == a)
    }

    fn as_any(&self) -> &(dyn Any) {
        self
    }
}
