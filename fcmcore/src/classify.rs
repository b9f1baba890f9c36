//! Turns the payload of a DataMessageStanza into a typed event.
//!
//! Pushes arrive as AppData key/value pairs. The pairs are folded into one
//! JSON object whose top-level key names the event kind.

use crate::proto::mcs::AppData;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

pub const KEY_NEW_MESSAGE: &str = "newMessage";
pub const KEY_NONCONVERSATIONAL: &str = "nonconversationalMessageExists";
pub const KEY_DEVICE_ACCOUNT_UPDATE: &str = "deviceAccountUpdate";

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("payload is not valid UTF-8")]
    NotUtf8,
    #[error("parsing payload: {0}")]
    Json(#[source] serde_json::Error),
    #[error("parsing {kind}: {source}")]
    Field {
        kind: &'static str,
        source: serde_json::Error,
    },
    #[error("imei is neither a string nor a number: {0}")]
    InvalidImei(String),
    #[error("unknown payload type: keys={keys:?}")]
    UnknownPayload { keys: Vec<String> },
}

/// A chat message delivered by push.
///
/// Push payloads name the ids `messageGuid`/`conversationGuid`, the REST
/// API names them `messageId`/`conversationId`. Both are accepted; the
/// push names win, and an empty string counts as absent.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushMessage {
    pub message_id: Option<String>,
    pub conversation_id: Option<String>,
    pub parent_message_id: Option<String>,
    pub message_body: Option<String>,
    pub to: Vec<String>,
    pub from: Option<String>,
    pub sent_at: Option<String>,
    pub received_at: Option<String>,
    /// Fields not modelled above, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPushMessage {
    message_guid: Option<String>,
    message_id: Option<String>,
    conversation_guid: Option<String>,
    conversation_id: Option<String>,
    parent_message_guid: Option<String>,
    parent_message_id: Option<String>,
    message_body: Option<String>,
    to: Option<Vec<String>>,
    from: Option<String>,
    sent_at: Option<String>,
    received_at: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

fn prefer(primary: Option<String>, fallback: Option<String>) -> Option<String> {
    primary
        .filter(|s| !s.is_empty())
        .or(fallback.filter(|s| !s.is_empty()))
}

impl From<RawPushMessage> for PushMessage {
    fn from(raw: RawPushMessage) -> Self {
        Self {
            message_id: prefer(raw.message_guid, raw.message_id),
            conversation_id: prefer(raw.conversation_guid, raw.conversation_id),
            parent_message_id: prefer(raw.parent_message_guid, raw.parent_message_id),
            message_body: raw.message_body,
            to: raw.to.unwrap_or_default(),
            from: raw.from,
            sent_at: raw.sent_at,
            received_at: raw.received_at,
            extra: raw.extra,
        }
    }
}

impl<'de> Deserialize<'de> for PushMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        RawPushMessage::deserialize(deserializer).map(Into::into)
    }
}

/// A device (inReach unit) has messages that are not part of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NonconversationalMessage {
    /// Decimal IMEI, however the server encoded it.
    pub imei: String,
}

/// Account-level change for a device. The payload is passed on unparsed.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceAccountUpdate {
    pub data: Box<RawValue>,
}

impl PartialEq for DeviceAccountUpdate {
    fn eq(&self, other: &Self) -> bool {
        self.data.get() == other.data.get()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    NewMessage(PushMessage),
    NonconversationalMessage(NonconversationalMessage),
    DeviceAccountUpdate(DeviceAccountUpdate),
}

impl InboundEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            InboundEvent::NewMessage(_) => KEY_NEW_MESSAGE,
            InboundEvent::NonconversationalMessage(_) => KEY_NONCONVERSATIONAL,
            InboundEvent::DeviceAccountUpdate(_) => KEY_DEVICE_ACCOUNT_UPDATE,
        }
    }
}

/// Folds AppData pairs into a JSON object.
///
/// Values that already parse as JSON are embedded as-is so nested objects
/// are not double-encoded; everything else becomes a JSON string. On
/// duplicate keys the last pair wins.
pub fn synthesize_payload(app_data: &[AppData]) -> Result<String, ClassifyError> {
    let mut object: BTreeMap<&str, Box<RawValue>> = BTreeMap::new();
    for pair in app_data {
        let value = match serde_json::from_str::<Box<RawValue>>(&pair.value) {
            Ok(raw) => raw,
            Err(_) => serde_json::value::to_raw_value(&pair.value).map_err(ClassifyError::Json)?,
        };
        object.insert(pair.key.as_str(), value);
    }
    serde_json::to_string(&object).map_err(ClassifyError::Json)
}

#[derive(Deserialize)]
struct NonconversationalBody<'a> {
    #[serde(borrow)]
    imei: Option<&'a RawValue>,
}

fn normalize_imei(raw: Option<&RawValue>) -> Result<String, ClassifyError> {
    let Some(raw) = raw else {
        return Err(ClassifyError::InvalidImei("missing".to_string()));
    };
    if let Ok(s) = serde_json::from_str::<String>(raw.get()) {
        return Ok(s);
    }
    // Keep the number's digits exactly as sent: a 15 digit IMEI must not
    // pass through a float.
    match serde_json::from_str::<Value>(raw.get()) {
        Ok(Value::Number(_)) => Ok(raw.get().trim().to_string()),
        _ => Err(ClassifyError::InvalidImei(raw.get().to_string())),
    }
}

/// Classifies a JSON payload by its top-level keys, checked in the order
/// `newMessage`, `nonconversationalMessageExists`, `deviceAccountUpdate`.
pub fn classify(payload: &str) -> Result<InboundEvent, ClassifyError> {
    let top: BTreeMap<String, Box<RawValue>> =
        serde_json::from_str(payload).map_err(ClassifyError::Json)?;

    if let Some(body) = top.get(KEY_NEW_MESSAGE) {
        let message: PushMessage =
            serde_json::from_str(body.get()).map_err(|source| ClassifyError::Field {
                kind: KEY_NEW_MESSAGE,
                source,
            })?;
        return Ok(InboundEvent::NewMessage(message));
    }

    if let Some(body) = top.get(KEY_NONCONVERSATIONAL) {
        let parsed: NonconversationalBody<'_> =
            serde_json::from_str(body.get()).map_err(|source| ClassifyError::Field {
                kind: KEY_NONCONVERSATIONAL,
                source,
            })?;
        let imei = normalize_imei(parsed.imei)?;
        return Ok(InboundEvent::NonconversationalMessage(
            NonconversationalMessage { imei },
        ));
    }

    if let Some(body) = top.get(KEY_DEVICE_ACCOUNT_UPDATE) {
        return Ok(InboundEvent::DeviceAccountUpdate(DeviceAccountUpdate {
            data: body.clone(),
        }));
    }

    Err(ClassifyError::UnknownPayload {
        keys: top.into_keys().collect(),
    })
}

/// Classifies one data message. A non-empty `raw_payload` is used directly,
/// otherwise the payload is built from `app_data`.
pub fn classify_data_message(
    raw_payload: &[u8],
    app_data: &[AppData],
) -> Result<InboundEvent, ClassifyError> {
    if raw_payload.is_empty() {
        classify(&synthesize_payload(app_data)?)
    } else {
        let text = std::str::from_utf8(raw_payload).map_err(|_| ClassifyError::NotUtf8)?;
        classify(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(key: &str, value: &str) -> AppData {
        AppData {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn test_json_values_are_embedded() {
        let payload = synthesize_payload(&[
            pair("newMessage", r#"{"messageBody":"hi"}"#),
            pair("plain", "not json"),
            pair("quoted", r#"say "hi""#),
        ])
        .unwrap();

        let value: Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value["newMessage"]["messageBody"], "hi");
        assert_eq!(value["plain"], "not json");
        assert_eq!(value["quoted"], r#"say "hi""#);
        assert!(!payload.contains(r#"\"messageBody\""#));
    }

    #[test]
    fn test_new_message_guid_names() {
        let event = classify(
            r#"{"newMessage":{
                "messageGuid":"550e8400-e29b-41d4-a716-446655440000",
                "messageId":"ignored",
                "conversationGuid":"660e8400-e29b-41d4-a716-446655440000",
                "parentMessageGuid":"",
                "messageBody":"Hello from FCM",
                "to":["+15555550100"],
                "userLocation":{"latitudeDegrees":1.5}
            }}"#,
        )
        .unwrap();

        let InboundEvent::NewMessage(msg) = event else {
            panic!("expected NewMessage, got {event:?}");
        };
        assert_eq!(msg.message_id.as_deref(), Some("550e8400-e29b-41d4-a716-446655440000"));
        assert_eq!(msg.conversation_id.as_deref(), Some("660e8400-e29b-41d4-a716-446655440000"));
        assert_eq!(msg.parent_message_id, None);
        assert_eq!(msg.message_body.as_deref(), Some("Hello from FCM"));
        assert_eq!(msg.to, vec!["+15555550100"]);
        assert!(msg.extra.contains_key("userLocation"));
        assert!(!msg.extra.contains_key("messageGuid"));
    }

    #[test]
    fn test_new_message_rest_names() {
        let event = classify(
            r#"{"newMessage":{"messageId":"a","conversationId":"b","messageBody":"x"}}"#,
        )
        .unwrap();
        let InboundEvent::NewMessage(msg) = event else {
            panic!("expected NewMessage");
        };
        assert_eq!(msg.message_id.as_deref(), Some("a"));
        assert_eq!(msg.conversation_id.as_deref(), Some("b"));
    }

    #[test]
    fn test_imei_string_and_number_agree() {
        let from_string = classify(r#"{"nonconversationalMessageExists":{"imei":"300434038675370"}}"#).unwrap();
        let from_number = classify(r#"{"nonconversationalMessageExists":{"imei":300434038675370}}"#).unwrap();
        assert_eq!(from_string, from_number);
        assert_eq!(
            from_number,
            InboundEvent::NonconversationalMessage(NonconversationalMessage {
                imei: "300434038675370".to_string()
            })
        );
    }

    #[test]
    fn test_imei_via_app_data() {
        let event = classify_data_message(
            &[],
            &[pair("nonconversationalMessageExists", r#"{"imei":300434038675370}"#)],
        )
        .unwrap();
        assert_eq!(event.kind(), KEY_NONCONVERSATIONAL);
    }

    #[test]
    fn test_bad_imei() {
        assert!(matches!(
            classify(r#"{"nonconversationalMessageExists":{"imei":[1]}}"#),
            Err(ClassifyError::InvalidImei(_))
        ));
    }

    #[test]
    fn test_device_account_update_is_verbatim() {
        let event = classify(r#"{"deviceAccountUpdate":{"a":1,"b":[true]}}"#).unwrap();
        let InboundEvent::DeviceAccountUpdate(update) = event else {
            panic!("expected DeviceAccountUpdate");
        };
        assert_eq!(update.data.get(), r#"{"a":1,"b":[true]}"#);
    }

    #[test]
    fn test_priority_order() {
        let event = classify(
            r#"{"deviceAccountUpdate":{},"nonconversationalMessageExists":{"imei":"1"},"newMessage":{}}"#,
        )
        .unwrap();
        assert_eq!(event.kind(), KEY_NEW_MESSAGE);

        let event =
            classify(r#"{"deviceAccountUpdate":{},"nonconversationalMessageExists":{"imei":"1"}}"#).unwrap();
        assert_eq!(event.kind(), KEY_NONCONVERSATIONAL);
    }

    #[test]
    fn test_unknown_payload() {
        match classify(r#"{"somethingElse":1}"#) {
            Err(ClassifyError::UnknownPayload { keys }) => assert_eq!(keys, vec!["somethingElse"]),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_raw_payload_takes_precedence() {
        let event = classify_data_message(
            br#"{"newMessage":{"messageBody":"raw"}}"#,
            &[pair("deviceAccountUpdate", "{}")],
        )
        .unwrap();
        assert_eq!(event.kind(), KEY_NEW_MESSAGE);
    }
}
