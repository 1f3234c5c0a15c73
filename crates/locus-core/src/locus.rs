//! The Locus resource as seen by the reconciler.
//!
//! The server pushes two kinds of Locus objects over the socket: full
//! snapshots and deltas. A delta carries a `baseSequence` naming the revision
//! it extends. Both share one shape, so the same type serves as the incoming
//! envelope and as the reconciler's working copy. Everything besides the
//! ordering metadata is kept as opaque JSON in `body`.

use crate::error::{LocusError, Result};
use crate::sequence::SequenceDescriptor;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One Locus revision: ordering metadata plus the opaque payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Locus {
    /// Resource identity / location
    #[serde(default)]
    pub url: String,
    /// Position of this revision
    pub sequence: SequenceDescriptor,
    /// Revision a delta claims to extend (absent on full loci)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_sequence: Option<SequenceDescriptor>,
    /// Where to fetch a catch-up delta from after a desync
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_url: Option<String>,
    /// Remaining fields, owned by the calling plugin
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

/// An event received from the transport.
pub type DeltaEnvelope = Locus;

/// The reconciler's current best-known state.
pub type WorkingCopy = Locus;

impl Locus {
    pub fn new(url: impl Into<String>, sequence: SequenceDescriptor) -> Self {
        Self {
            url: url.into(),
            sequence,
            base_sequence: None,
            sync_url: None,
            body: Map::new(),
        }
    }

    /// Turn this revision into a delta on top of `base`.
    pub fn with_base(mut self, base: SequenceDescriptor) -> Self {
        self.base_sequence = Some(base);
        self
    }

    pub fn with_sync_url(mut self, sync_url: impl Into<String>) -> Self {
        self.sync_url = Some(sync_url.into());
        self
    }

    /// Attach an opaque payload field.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.body.insert(key.into(), value);
        self
    }

    /// True for partial updates.
    pub fn is_delta(&self) -> bool {
        self.base_sequence.is_some()
    }

    /// Parse from JSON, rejecting objects that are not shaped like a Locus.
    pub fn from_value(value: Value) -> Result<Self> {
        if !is_locus(&value) {
            return Err(LocusError::InvalidLocus(summarize(&value)));
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Basic shape check: an object whose `sequence` carries both range bounds.
pub fn is_locus(value: &Value) -> bool {
    let Some(sequence) = value.get("sequence").and_then(Value::as_object) else {
        return false;
    };
    sequence.contains_key("rangeStart") && sequence.contains_key("rangeEnd")
}

fn summarize(value: &Value) -> String {
    let mut text = value.to_string();
    if text.len() > 80 {
        let mut cut = 80;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
        text.push('…');
    }
    text
}

/// Server event names carried in `eventType`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum LocusEventType {
    Difference,
    ParticipantJoined,
    ParticipantLeft,
    ParticipantDeclined,
    ParticipantUpdated,
    ParticipantControlsUpdated,
    ParticipantRolesUpdated,
    ParticipantAudioMuted,
    ParticipantAudioUnmuted,
    ParticipantVideoMuted,
    ParticipantVideoUnmuted,
    ControlsUpdated,
    SelfChanged,
    FloorGranted,
    FloorReleased,
    Other(String),
}

impl LocusEventType {
    pub fn parse(name: &str) -> Self {
        match name {
            "locus.difference" => Self::Difference,
            "locus.participant_joined" => Self::ParticipantJoined,
            "locus.participant_left" => Self::ParticipantLeft,
            "locus.participant_declined" => Self::ParticipantDeclined,
            "locus.participant_updated" => Self::ParticipantUpdated,
            "locus.participant_controls_updated" => Self::ParticipantControlsUpdated,
            "locus.participant_roles_updated" => Self::ParticipantRolesUpdated,
            "locus.participant_audio_muted" => Self::ParticipantAudioMuted,
            "locus.participant_audio_unmuted" => Self::ParticipantAudioUnmuted,
            "locus.participant_video_muted" => Self::ParticipantVideoMuted,
            "locus.participant_video_unmuted" => Self::ParticipantVideoUnmuted,
            "locus.controls_updated" => Self::ControlsUpdated,
            "locus.self_changed" => Self::SelfChanged,
            "locus.floor_granted" => Self::FloorGranted,
            "locus.floor_released" => Self::FloorReleased,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Difference => "locus.difference",
            Self::ParticipantJoined => "locus.participant_joined",
            Self::ParticipantLeft => "locus.participant_left",
            Self::ParticipantDeclined => "locus.participant_declined",
            Self::ParticipantUpdated => "locus.participant_updated",
            Self::ParticipantControlsUpdated => "locus.participant_controls_updated",
            Self::ParticipantRolesUpdated => "locus.participant_roles_updated",
            Self::ParticipantAudioMuted => "locus.participant_audio_muted",
            Self::ParticipantAudioUnmuted => "locus.participant_audio_unmuted",
            Self::ParticipantVideoMuted => "locus.participant_video_muted",
            Self::ParticipantVideoUnmuted => "locus.participant_video_unmuted",
            Self::ControlsUpdated => "locus.controls_updated",
            Self::SelfChanged => "locus.self_changed",
            Self::FloorGranted => "locus.floor_granted",
            Self::FloorReleased => "locus.floor_released",
            Self::Other(name) => name,
        }
    }

    /// Participant, controls, floor and self events ship a full Locus;
    /// `locus.difference` and anything unrecognised ship a delta.
    pub fn carries_full_locus(&self) -> bool {
        !matches!(self, Self::Difference | Self::Other(_))
    }
}

impl std::fmt::Display for LocusEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw socket payload: `{ "eventType": "...", "locus": { ... } }`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocketEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(default)]
    pub locus: Value,
}

impl SocketEvent {
    pub fn delta(locus: &Locus) -> Result<Self> {
        Ok(Self {
            event_type: Some(LocusEventType::Difference.as_str().to_string()),
            locus: locus.to_value()?,
        })
    }

    pub fn full(event_type: LocusEventType, locus: &Locus) -> Result<Self> {
        Ok(Self {
            event_type: Some(event_type.as_str().to_string()),
            locus: locus.to_value()?,
        })
    }

    /// Missing event types are treated as deltas.
    pub fn kind(&self) -> LocusEventType {
        self.event_type
            .as_deref()
            .map(LocusEventType::parse)
            .unwrap_or_else(|| LocusEventType::Other(String::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_locus_shape_check() {
        assert!(is_locus(&json!({"sequence": {"rangeStart": 0, "rangeEnd": 0}})));
        assert!(!is_locus(&json!({"sequence": {"entries": [1]}})));
        assert!(!is_locus(&json!({"url": "a"})));
        assert!(!is_locus(&json!(null)));
        assert!(!is_locus(&json!(42)));
    }

    #[test]
    fn test_from_value_keeps_payload() {
        let value = json!({
            "url": "https://locus/1",
            "sequence": {"entries": [10], "rangeStart": 0, "rangeEnd": 0},
            "baseSequence": {"entries": [9], "rangeStart": 0, "rangeEnd": 0},
            "syncUrl": "https://locus/1/sync",
            "participants": [{"id": "p1"}]
        });

        let locus = Locus::from_value(value.clone()).unwrap();
        assert_eq!(locus.url, "https://locus/1");
        assert!(locus.is_delta());
        assert_eq!(locus.sync_url.as_deref(), Some("https://locus/1/sync"));
        assert_eq!(locus.body.get("participants"), Some(&json!([{"id": "p1"}])));

        assert_eq!(locus.to_value().unwrap(), value);
    }

    #[test]
    fn test_from_value_rejects_non_locus() {
        let err = Locus::from_value(json!({"hello": "world"})).unwrap_err();
        assert!(matches!(err, LocusError::InvalidLocus(_)));
    }

    #[test]
    fn test_event_type_routing() {
        assert!(!LocusEventType::parse("locus.difference").carries_full_locus());
        assert!(LocusEventType::parse("locus.participant_joined").carries_full_locus());
        assert!(LocusEventType::parse("locus.floor_released").carries_full_locus());
        assert!(!LocusEventType::parse("locus.something_new").carries_full_locus());

        let event: SocketEvent = serde_json::from_value(json!({"locus": {}})).unwrap();
        assert!(!event.kind().carries_full_locus());
    }

    #[test]
    fn test_event_type_names_round_trip() {
        for name in ["locus.self_changed", "locus.participant_video_unmuted", "custom"] {
            assert_eq!(LocusEventType::parse(name).as_str(), name);
        }
    }
}
