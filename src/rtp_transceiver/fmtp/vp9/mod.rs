#[cfg(test)]
mod vp9_test;

use super::*;

#[derive(Debug, PartialEq)]
pub(crate) struct Vp9Fmtp {
    pub(crate) parameters: HashMap<String, String>,
}

impl Vp9Fmtp {
    fn profile_id(&self) -> Option<&String> {
        self.parameters.get("profile-id")
    }
}

impl Fmtp for Vp9Fmtp {
    fn mime_type(&self) -> &str {
        "video/vp9"
    }

    /// match_fmtp treats profile-id as the only parameter that can
    /// contradict; codecs with differing explicit profile-id values are
    /// distinct formats and must not be negotiated together.
    fn match_fmtp(&self, f: &(dyn Fmtp)) -> bool {
        let c = match f.as_any().downcast_ref::<Vp9Fmtp>() {
            Some(c) => c,
            None => return false,
        };

        match (self.profile_id(), c.profile_id()) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }

    fn parameter(&self, key: &str) -> Option<&String> {
        self.parameters.get(key)
    }

    fn equal(&self, other: &(dyn Fmtp)) -> bool {
        other
            .as_any()
            .downcast_ref::<Vp9Fmtp>()
            .map_or(false, |a| self == a)
    }

    fn as_any(&self) -> &(dyn Any) {
        self
    }
}
