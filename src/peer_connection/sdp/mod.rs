#[cfg(test)]
mod sdp_test;

pub mod sdp_type;
pub mod session_description;

use std::collections::HashMap;
use std::sync::Arc;

use sdp::description::common::{Address, Attribute, ConnectionInformation};
use sdp::description::media::{MediaDescription, MediaName, RangedPort};
use sdp::description::session::{Origin, SessionDescription, ATTR_KEY_GROUP, ATTR_KEY_ICELITE};
use sdp::util::ConnectionRole;

use ::ice::candidate::candidate_base::unmarshal_candidate;
use ::ice::candidate::Candidate;

use crate::api::media_engine::MediaEngine;
use crate::error::{Error, Result};
use crate::ice_transport::ice_candidate::RTCIceCandidate;
use crate::ice_transport::ice_gathering_state::RTCIceGatheringState;
use crate::ice_transport::ice_parameters::RTCIceParameters;
use crate::peer_connection::sdp::session_description::RTCSessionDescription;
use crate::rtp_transceiver::rtp_codec::{
    RTCRtpCodecParameters, RTCRtpHeaderExtensionParameters, RTPCodecType,
};
use crate::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use crate::rtp_transceiver::{RTCPFeedback, RTCRtpTransceiver};

/// MediaSection describes a single `m=` line that a future SessionDescription
/// should contain, together with the transceivers it is built from. `rid_map`
/// carries any simulcast RID -> restriction-line mapping that must be
/// reflected in `a=rid` lines.
#[derive(Default, Clone)]
pub(crate) struct MediaSection {
    pub(crate) id: String,
    pub(crate) transceivers: Vec<Arc<RTCRtpTransceiver>>,
    pub(crate) data: bool,
    pub(crate) rid_map: HashMap<String, String>,
}

/// TrackDetails represents a single media source described by a remote SDP
/// (SSRC, RTP stream id, associated RTX SSRC).
#[derive(Default, Debug, Clone)]
pub(crate) struct TrackDetails {
    pub(crate) mid: String,
    pub(crate) kind: RTPCodecType,
    pub(crate) stream_id: String,
    pub(crate) id: String,
    pub(crate) ssrcs: Vec<u32>,
    pub(crate) repair_stream_id: String,
    pub(crate) rids: Vec<String>,
}

pub(crate) const SDP_ATTRIBUTE_RID: &str = "rid";
pub(crate) const MEDIA_SECTION_APPLICATION: &str = "application";

/// extract_fingerprint fetches the first fingerprint attribute from the
/// session, falling back to media level, and errors if any two fingerprints
/// found in the description conflict.
pub(crate) fn extract_fingerprint(desc: &SessionDescription) -> Result<(String, String)> {
    let mut fingerprints = vec![];

    if let Some(fingerprint) = desc.attribute("fingerprint") {
        fingerprints.push(fingerprint.clone());
    }

    for m in &desc.media_descriptions {
        if let Some(Some(fingerprint)) = m.attribute("fingerprint") {
            fingerprints.push(fingerprint.to_owned());
        }
    }

    if fingerprints.is_empty() {
        return Err(Error::ErrSessionDescriptionNoFingerprint);
    }

    for f in &fingerprints[1..] {
        if *f != fingerprints[0] {
            return Err(Error::ErrSessionDescriptionConflictingFingerprints);
        }
    }

    let parts: Vec<&str> = fingerprints[0].split_whitespace().collect();
    if parts.len() != 2 {
        return Err(Error::ErrSessionDescriptionInvalidFingerprint);
    }

    Ok((parts[1].to_owned(), parts[0].to_owned()))
}

/// extract_ice_details fetches the ICE details (ufrag, pwd, candidates) from
/// every media section, ensuring they agree with each other and with the
/// session level attributes where both are present.
pub(crate) async fn extract_ice_details(
    desc: &SessionDescription,
) -> Result<(String, String, Vec<RTCIceCandidate>)> {
    let mut candidates = vec![];
    let mut ufrag = String::new();
    let mut pwd = String::new();

    if let Some(u) = desc.attribute("ice-ufrag") {
        ufrag = u.clone();
    }
    if let Some(p) = desc.attribute("ice-pwd") {
        pwd = p.clone();
    }

    for m in &desc.media_descriptions {
        if let Some(Some(u)) = m.attribute("ice-ufrag") {
            if ufrag.is_empty() {
                ufrag = u.to_owned();
            } else if ufrag != u {
                return Err(Error::ErrSessionDescriptionConflictingIceUfrag);
            }
        }

        if let Some(Some(p)) = m.attribute("ice-pwd") {
            if pwd.is_empty() {
                pwd = p.to_owned();
            } else if pwd != p {
                return Err(Error::ErrSessionDescriptionConflictingIcePwd);
            }
        }

        for a in &m.attributes {
            if a.is_ice_candidate() {
                if let Some(value) = &a.value {
                    let candidate: Arc<dyn Candidate + Send + Sync> =
                        Arc::new(unmarshal_candidate(value).await?);
                    candidates.push((&candidate).into());
                }
            }
        }
    }

    if ufrag.is_empty() {
        return Err(Error::ErrSessionDescriptionMissingIceUfrag);
    } else if pwd.is_empty() {
        return Err(Error::ErrSessionDescriptionMissingIcePwd);
    }

    Ok((ufrag, pwd, candidates))
}

/// track_details_for_ssrc returns the TrackDetails entry that contains `ssrc`.
pub(crate) fn track_details_for_ssrc(
    track_details: &[TrackDetails],
    ssrc: u32,
) -> Option<&TrackDetails> {
    track_details.iter().find(|x| x.ssrcs.contains(&ssrc))
}

/// track_details_from_sdp extracts TrackDetails from the SDP media sections.
/// `a=ssrc-group:FID` associates a repair (RTX) SSRC with its primary stream
/// rather than creating a separate track, and unknown media kinds are
/// skipped entirely. When `exclude_inactive` is set, `a=inactive` and
/// `a=recvonly` sections (nothing for us to receive) are dropped.
pub(crate) fn track_details_from_sdp(
    s: &SessionDescription,
    exclude_inactive: bool,
) -> Vec<TrackDetails> {
    let mut incoming_tracks: Vec<TrackDetails> = vec![];

    for media in &s.media_descriptions {
        let kind = RTPCodecType::from(media.media_name.media.as_str());
        if kind == RTPCodecType::Unspecified {
            continue;
        }

        if exclude_inactive
            && (media.attribute("inactive").is_some() || media.attribute("recvonly").is_some())
        {
            continue;
        }

        let mut mid = String::new();
        let mut stream_id = String::new();
        let mut id = String::new();
        let mut rids = vec![];
        let mut rtx_repair_ssrcs: HashMap<u32, u32> = HashMap::new();

        for attr in &media.attributes {
            match attr.key.as_str() {
                "mid" => {
                    if let Some(v) = &attr.value {
                        mid = v.clone();
                    }
                }
                "msid" => {
                    if let Some(v) = &attr.value {
                        let split: Vec<&str> = v.split_whitespace().collect();
                        if split.len() == 2 {
                            stream_id = split[0].to_owned();
                            id = split[1].to_owned();
                        }
                    }
                }
                SDP_ATTRIBUTE_RID => {
                    if let Some(v) = &attr.value {
                        if let Some(rid) = v.split_whitespace().next() {
                            rids.push(rid.to_owned());
                        }
                    }
                }
                "ssrc-group" => {
                    if let Some(v) = &attr.value {
                        let split: Vec<&str> = v.split_whitespace().collect();
                        if split.len() == 3 && split[0] == "FID" {
                            if let (Ok(base), Ok(rtx)) =
                                (split[1].parse::<u32>(), split[2].parse::<u32>())
                            {
                                rtx_repair_ssrcs.insert(rtx, base);
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        if !rids.is_empty() {
            incoming_tracks.push(TrackDetails {
                mid: mid.clone(),
                kind,
                stream_id,
                id,
                ssrcs: vec![],
                repair_stream_id: String::new(),
                rids,
            });
            continue;
        }

        for attr in &media.attributes {
            if attr.key != "ssrc" {
                continue;
            }
            let value = match &attr.value {
                Some(v) => v,
                None => continue,
            };

            let fields: Vec<&str> = value.split_whitespace().collect();
            if fields.is_empty() {
                continue;
            }
            let ssrc = match fields[0].parse::<u32>() {
                Ok(s) => s,
                Err(_) => continue,
            };

            // An RTX SSRC is carried as its own `a=ssrc` line but refers to a
            // primary stream via `a=ssrc-group:FID`; it never becomes its own track.
            if rtx_repair_ssrcs.contains_key(&ssrc) {
                continue;
            }

            if track_details_for_ssrc(&incoming_tracks, ssrc).is_some() {
                continue;
            }

            let mut track_stream_id = stream_id.clone();
            let mut track_id = id.clone();
            for f in &fields[1..] {
                if let Some(rest) = f.strip_prefix("msid:") {
                    let parts: Vec<&str> = rest.split_whitespace().collect();
                    if parts.len() == 2 {
                        track_stream_id = parts[0].to_owned();
                        track_id = parts[1].to_owned();
                    }
                }
            }

            if track_stream_id.is_empty() || track_id.is_empty() {
                continue;
            }

            let repair_stream_id = rtx_repair_ssrcs
                .iter()
                .find(|(_, base)| **base == ssrc)
                .map(|(rtx, _)| rtx.to_string())
                .unwrap_or_default();

            incoming_tracks.push(TrackDetails {
                mid: mid.clone(),
                kind,
                stream_id: track_stream_id,
                id: track_id,
                ssrcs: vec![ssrc],
                repair_stream_id,
                rids: vec![],
            });
        }
    }

    incoming_tracks
}

/// get_mid_value returns the value of the `a=mid` attribute of a media
/// description, if present.
pub(crate) fn get_mid_value(media: &MediaDescription) -> Option<&String> {
    for attr in &media.attributes {
        if attr.key == "mid" {
            return attr.value.as_ref();
        }
    }
    None
}

/// get_peer_direction returns the first direction attribute (`a=sendrecv`,
/// `a=sendonly`, `a=recvonly`, `a=inactive`) found on a media description.
pub(crate) fn get_peer_direction(media: &MediaDescription) -> RTCRtpTransceiverDirection {
    for a in &media.attributes {
        let direction = RTCRtpTransceiverDirection::from(a.key.as_str());
        if direction != RTCRtpTransceiverDirection::Unspecified {
            return direction;
        }
    }
    RTCRtpTransceiverDirection::Unspecified
}

/// description_is_plan_b detects legacy plan-b semantics. A unified-plan mid
/// is a per-transceiver index ("0", "1", ...); plan-b instead multiplexes
/// every media source of a kind onto a single section whose `mid` is the
/// literal kind name.
pub(crate) fn description_is_plan_b(desc: Option<&RTCSessionDescription>) -> Result<bool> {
    let desc = match desc {
        Some(d) => d,
        None => return Ok(false),
    };

    if let Some(parsed) = &desc.parsed {
        for media in &parsed.media_descriptions {
            if let Some(mid_value) = get_mid_value(media) {
                if mid_value == "audio" || mid_value == "video" || mid_value == "data" {
                    return Ok(true);
                }
            }
        }
    }

    Ok(false)
}

/// get_rids scans a media description for `a=rid` attributes, building a
/// simulcast RID -> raw-restriction-line map.
pub(crate) fn get_rids(media: &MediaDescription) -> HashMap<String, String> {
    let mut rids = HashMap::new();

    for attr in &media.attributes {
        if attr.key != SDP_ATTRIBUTE_RID {
            continue;
        }
        if let Some(value) = &attr.value {
            if let Some(rid) = value.split_whitespace().next() {
                rids.insert(rid.to_owned(), value.clone());
            }
        }
    }

    rids
}

/// have_application_media_section reports whether the session already
/// describes a SCTP/DataChannel media section.
pub(crate) fn have_application_media_section(desc: &SessionDescription) -> bool {
    desc.media_descriptions
        .iter()
        .any(|m| m.media_name.media == MEDIA_SECTION_APPLICATION)
}

/// codecs_from_media_description parses the codec list (`a=rtpmap`,
/// `a=fmtp`, `a=rtcp-fb`) out of a single media description.
pub(crate) fn codecs_from_media_description(
    m: &MediaDescription,
) -> Result<Vec<RTCRtpCodecParameters>> {
    let s = SessionDescription {
        media_descriptions: vec![m.clone()],
        ..Default::default()
    };

    let media_prefix = match RTPCodecType::from(m.media_name.media.as_str()) {
        RTPCodecType::Audio => "audio/",
        RTPCodecType::Video => "video/",
        RTPCodecType::Unspecified => "",
    };

    let mut out = vec![];

    for payload_str in &m.media_name.formats {
        let payload_type: u8 = match payload_str.parse() {
            Ok(p) => p,
            Err(_) => continue,
        };

        let codec = match s.get_codec_for_payload_type(payload_type) {
            Ok(c) => c,
            Err(_) => continue,
        };

        let split: Vec<&str> = codec.name.splitn(3, '/').collect();
        let name = split.first().copied().unwrap_or(&codec.name);
        let clock_rate = split.get(1).and_then(|s| s.parse().ok()).unwrap_or(0);
        let channels = split.get(2).and_then(|s| s.parse().ok()).unwrap_or(0);

        let mut rtcp_feedback = vec![];
        for fb in &codec.rtcp_feedback {
            let fb_split: Vec<&str> = fb.splitn(2, ' ').collect();
            rtcp_feedback.push(RTCPFeedback {
                typ: fb_split[0].to_owned(),
                parameter: fb_split.get(1).map(|s| s.to_string()).unwrap_or_default(),
            });
        }

        out.push(RTCRtpCodecParameters {
            capability: crate::rtp_transceiver::rtp_codec::RTCRtpCodecCapability {
                mime_type: format!("{media_prefix}{name}"),
                clock_rate,
                channels,
                sdp_fmtp_line: codec.fmtp.clone(),
                rtcp_feedback,
            },
            payload_type,
            stats_id: String::new(),
        });
    }

    Ok(out)
}

/// rtp_extensions_from_media_description parses `a=extmap` lines into a
/// URI -> id map.
pub(crate) fn rtp_extensions_from_media_description(
    m: &MediaDescription,
) -> Result<HashMap<String, isize>> {
    let mut out = HashMap::new();

    for a in &m.attributes {
        if a.key != "extmap" {
            continue;
        }
        let value = match &a.value {
            Some(v) => v,
            None => continue,
        };

        let fields: Vec<&str> = value.split_whitespace().collect();
        if fields.len() < 2 {
            continue;
        }

        let id: isize = match fields[0].parse() {
            Ok(i) => i,
            Err(_) => continue,
        };
        out.insert(fields[1].to_owned(), id);
    }

    Ok(out)
}

/// header_extensions_from_media_description is a typed convenience wrapper
/// around [`rtp_extensions_from_media_description`].
pub(crate) fn header_extensions_from_media_description(
    m: &MediaDescription,
) -> Result<Vec<RTCRtpHeaderExtensionParameters>> {
    let raw = rtp_extensions_from_media_description(m)?;
    Ok(raw
        .into_iter()
        .map(|(uri, id)| RTCRtpHeaderExtensionParameters { uri, id })
        .collect())
}

/// update_sdp_origin bumps the origin session version on every renegotiation,
/// matching the "o=" line semantics required by RFC 8866 section 5.2: the
/// session id is fixed for the lifetime of the session, the version
/// increments whenever the SDP content changes.
pub(crate) fn update_sdp_origin(origin: &mut Origin, d: &mut SessionDescription) {
    if origin.session_version == 0 {
        origin.session_id = d.origin.session_id;
        origin.session_version = d.origin.session_version;
    } else {
        origin.session_version += 1;
    }

    d.origin = origin.clone();
}

/// PopulateSdpParams groups the per-negotiation knobs that `populate_sdp`
/// needs beyond the media/ICE/codec state already carried by its other
/// arguments.
pub(crate) struct PopulateSdpParams {
    pub(crate) is_plan_b: bool,
    pub(crate) media_description_fingerprint: bool,
    pub(crate) is_icelite: bool,
    pub(crate) connection_role: ConnectionRole,
    pub(crate) ice_gathering_state: RTCIceGatheringState,
}

fn connection_role_str(role: ConnectionRole) -> &'static str {
    match role {
        ConnectionRole::Active => "active",
        ConnectionRole::Passive => "passive",
        ConnectionRole::Actpass => "actpass",
        ConnectionRole::Holdconn => "holdconn",
        ConnectionRole::Unspecified => "actpass",
    }
}

fn blank_media_description(media: String, formats: Vec<String>) -> MediaDescription {
    MediaDescription {
        media_name: MediaName {
            media,
            port: RangedPort {
                value: 9,
                range: None,
            },
            protos: vec![
                "UDP".to_owned(),
                "TLS".to_owned(),
                "RTP".to_owned(),
                "SAVPF".to_owned(),
            ],
            formats,
        },
        media_title: None,
        connection_information: Some(ConnectionInformation {
            network_type: "IN".to_owned(),
            address_type: "IP4".to_owned(),
            address: Some(Address {
                address: "0.0.0.0".to_owned(),
                ttl: None,
                range: None,
            }),
        }),
        bandwidth: vec![],
        encryption_key: None,
        attributes: vec![],
    }
}

fn push_value(m: &mut MediaDescription, key: &str, value: String) {
    m.attributes.push(Attribute {
        key: key.to_owned(),
        value: Some(value),
    });
}

fn push_property(m: &mut MediaDescription, key: &str) {
    m.attributes.push(Attribute {
        key: key.to_owned(),
        value: None,
    });
}

fn mime_type_without_prefix(mime_type: &str) -> String {
    match mime_type.split_once('/') {
        Some((_, rest)) => rest.to_owned(),
        None => mime_type.to_owned(),
    }
}

fn create_data_media_section(
    mid: &str,
    dtls_fingerprints: &[(String, String)],
    is_icelite: bool,
    media_description_fingerprint: bool,
) -> MediaDescription {
    let mut m = blank_media_description(
        MEDIA_SECTION_APPLICATION.to_owned(),
        vec!["webrtc-datachannel".to_owned()],
    );
    m.media_name.protos = vec!["UDP".to_owned(), "DTLS".to_owned(), "SCTP".to_owned()];

    if media_description_fingerprint {
        for (algorithm, value) in dtls_fingerprints {
            push_value(&mut m, "fingerprint", format!("{algorithm} {value}"));
        }
    }

    if is_icelite {
        push_property(&mut m, ATTR_KEY_ICELITE);
    }

    push_value(&mut m, "mid", mid.to_owned());
    push_property(&mut m, "sctp-port:5000");

    m
}

/// populate_sdp serializes the given transceivers/data sections, ICE
/// parameters, DTLS fingerprints and (once gathering has completed) local
/// candidates into `d`, producing a complete offer or answer body.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn populate_sdp(
    mut d: SessionDescription,
    dtls_fingerprints: &[crate::dtls_transport::dtls_fingerprint::RTCDtlsFingerprint],
    media_engine: &Arc<MediaEngine>,
    candidates: &[RTCIceCandidate],
    ice_params: &RTCIceParameters,
    media_sections: &[MediaSection],
    params: PopulateSdpParams,
) -> Result<SessionDescription> {
    let fingerprints: Vec<(String, String)> = dtls_fingerprints
        .iter()
        .map(|f| (f.algorithm.clone(), f.value.clone()))
        .collect();

    let mut bundle_value = "BUNDLE".to_owned();
    let mut bundle_count = 0usize;

    for media in media_sections {
        if media.data && media.transceivers.is_empty() {
            d.media_descriptions.push(create_data_media_section(
                &media.id,
                &fingerprints,
                params.is_icelite,
                params.media_description_fingerprint,
            ));
            bundle_value = format!("{bundle_value} {}", media.id);
            bundle_count += 1;
            continue;
        }

        let Some(t) = media.transceivers.first() else {
            continue;
        };

        let codecs = media_engine.get_codecs_by_kind(t.kind()).await;

        let mut seen_payload_types = std::collections::HashSet::new();
        let mut formats = vec![];
        for c in &codecs {
            if seen_payload_types.insert(c.payload_type) {
                formats.push(c.payload_type.to_string());
            }
        }
        if formats.is_empty() {
            // No codecs survived negotiation for this kind: reject the section
            // per RFC 8829 by advertising a single zero payload type and port 0.
            formats.push("0".to_owned());
        }

        let mut m = blank_media_description(t.kind().to_string(), formats);
        if codecs.is_empty() {
            m.media_name.port.value = 0;
        }

        for codec in &codecs {
            let name = mime_type_without_prefix(&codec.capability.mime_type);
            let rtpmap = if codec.capability.channels > 0 {
                format!(
                    "{} {}/{}/{}",
                    codec.payload_type, name, codec.capability.clock_rate, codec.capability.channels
                )
            } else {
                format!(
                    "{} {}/{}",
                    codec.payload_type, name, codec.capability.clock_rate
                )
            };
            push_value(&mut m, "rtpmap", rtpmap);

            if !codec.capability.sdp_fmtp_line.is_empty() {
                push_value(
                    &mut m,
                    "fmtp",
                    format!("{} {}", codec.payload_type, codec.capability.sdp_fmtp_line),
                );
            }

            for feedback in &codec.capability.rtcp_feedback {
                let value = if feedback.parameter.is_empty() {
                    format!("{} {}", codec.payload_type, feedback.typ)
                } else {
                    format!(
                        "{} {} {}",
                        codec.payload_type, feedback.typ, feedback.parameter
                    )
                };
                push_value(&mut m, "rtcp-fb", value);
            }
        }

        let extensions = media_engine.get_rtp_parameters_by_kind(t.kind(), &[]).await;
        for ext in &extensions.header_extensions {
            push_value(&mut m, "extmap", format!("{} {}", ext.id, ext.uri));
        }

        for (rid, restriction) in &media.rid_map {
            push_value(&mut m, SDP_ATTRIBUTE_RID, format!("{rid} {restriction}"));
        }

        if let Some(sender) = t.sender().await {
            if let Some(track) = sender.track().await {
                let ssrc = sender.ssrc();
                push_value(&mut m, "ssrc", format!("{ssrc} cname:{}", track.stream_id()));
                push_value(
                    &mut m,
                    "ssrc",
                    format!("{ssrc} msid:{} {}", track.stream_id(), track.id()),
                );
                push_value(&mut m, "msid", format!("{} {}", track.stream_id(), track.id()));
            }
        }

        push_property(&mut m, &t.direction().to_string());

        if params.media_description_fingerprint {
            for (algorithm, value) in &fingerprints {
                push_value(&mut m, "fingerprint", format!("{algorithm} {value}"));
            }
        }

        if params.is_icelite {
            push_property(&mut m, ATTR_KEY_ICELITE);
        }

        push_value(&mut m, "ice-ufrag", ice_params.username_fragment.clone());
        push_value(&mut m, "ice-pwd", ice_params.password.clone());

        push_property(&mut m, "rtcp-mux");
        if t.kind() == RTPCodecType::Audio {
            push_property(&mut m, "rtcp-rsize");
        }

        push_value(
            &mut m,
            "setup",
            connection_role_str(params.connection_role).to_owned(),
        );
        push_value(&mut m, "mid", media.id.clone());

        if params.ice_gathering_state == RTCIceGatheringState::Complete {
            for c in candidates {
                let candidate = c.to_ice().await?;
                push_value(&mut m, "candidate", candidate.marshal());
            }
            push_property(&mut m, "end-of-candidates");
        }

        d.media_descriptions.push(m);
        bundle_value = format!("{bundle_value} {}", media.id);
        bundle_count += 1;
    }

    if bundle_count > 0 {
        d.attributes.push(Attribute {
            key: ATTR_KEY_GROUP.to_owned(),
            value: Some(bundle_value),
        });
    }

    let _ = params.is_plan_b;

    Ok(d)
}
