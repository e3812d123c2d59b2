//! Wire protocol message types
//!
//! JSON objects tagged by a `head` field with an optional `datas`
//! payload. Inbound decoding goes through an envelope so an unknown tag
//! and a malformed payload stay distinct, typed conditions instead of a
//! fallthrough branch.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{GroupedOrder, NewOrder};

/// Errors decoding an inbound message
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Not a JSON object with a `head` field
    #[error("malformed message: {0}")]
    Malformed(#[source] serde_json::Error),

    /// `head` value is not part of the protocol
    #[error("unhandled message tag '{0}'")]
    UnknownTag(String),

    /// Recognized tag, but the payload does not fit the variant
    #[error("bad payload for '{head}': {source}")]
    BadPayload {
        head: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
struct Envelope {
    head: String,
    #[serde(default)]
    datas: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct SetStatePayload {
    #[serde(rename = "idOrder")]
    id_order: i64,
    state: String,
}

/// Messages received from clients
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// Place a new order
    NewOrder(NewOrder),
    /// Ask for pickup slots able to fit an order of the given quantity
    GetTimeSlots(Option<u32>),
    /// Ask for the full order list
    GetOrders,
    /// Move an order to a new lifecycle state
    SetState { id_order: i64, state: String },
}

impl ClientMessage {
    /// Decode a message from its JSON text frame
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let envelope: Envelope =
            serde_json::from_str(text).map_err(ProtocolError::Malformed)?;

        let bad_payload = |head: &str| {
            let head = head.to_string();
            move |source| ProtocolError::BadPayload { head, source }
        };

        match envelope.head.as_str() {
            "newOrder" => {
                let order = serde_json::from_value(envelope.datas)
                    .map_err(bad_payload("newOrder"))?;
                Ok(ClientMessage::NewOrder(order))
            }
            "getTimeSlots" => {
                if envelope.datas.is_null() {
                    return Ok(ClientMessage::GetTimeSlots(None));
                }
                let quantity = serde_json::from_value(envelope.datas)
                    .map_err(bad_payload("getTimeSlots"))?;
                Ok(ClientMessage::GetTimeSlots(Some(quantity)))
            }
            "getOrders" => Ok(ClientMessage::GetOrders),
            "setState" => {
                let payload: SetStatePayload = serde_json::from_value(envelope.datas)
                    .map_err(bad_payload("setState"))?;
                Ok(ClientMessage::SetState {
                    id_order: payload.id_order,
                    state: payload.state,
                })
            }
            other => Err(ProtocolError::UnknownTag(other.to_string())),
        }
    }
}

/// Messages sent to clients
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "head", content = "datas")]
pub enum ServerMessage {
    /// Signal that slot availability changed; clients should re-request
    #[serde(rename = "updateSlotsRequired")]
    UpdateSlotsRequired,

    /// Reply to `getTimeSlots`: the labels able to take the order
    #[serde(rename = "updateSlots")]
    UpdateSlots(Vec<String>),

    /// Reply to `getOrders`: grouped order objects
    #[serde(rename = "updateOrders")]
    UpdateOrders(Vec<GroupedOrder>),

    /// Broadcast after an order changed lifecycle state
    #[serde(rename = "updateState")]
    UpdateState {
        #[serde(rename = "idOrder")]
        id_order: i64,
        state: String,
    },
}

impl ServerMessage {
    /// Encode the message to its JSON text frame
    pub fn encode(&self) -> String {
        serde_json::to_string(self).expect("JSON encoding failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_new_order() {
        let text = r#"{
            "head": "newOrder",
            "datas": {
                "lastName": "Doe",
                "firstName": "Jane",
                "phone": "0600000000",
                "timeSlot": "12:30",
                "totalQty": 2,
                "pizzas": [{"name": "margherita", "qty": 2}],
                "price": 18.5
            }
        }"#;

        match ClientMessage::decode(text).unwrap() {
            ClientMessage::NewOrder(order) => {
                assert_eq!(order.time_slot, "12:30");
                assert_eq!(order.total_qty, 2);
            }
            other => panic!("expected NewOrder, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_get_time_slots_quantity_optional() {
        assert_eq!(
            ClientMessage::decode(r#"{"head": "getTimeSlots"}"#).unwrap(),
            ClientMessage::GetTimeSlots(None)
        );
        assert_eq!(
            ClientMessage::decode(r#"{"head": "getTimeSlots", "datas": 3}"#).unwrap(),
            ClientMessage::GetTimeSlots(Some(3))
        );
    }

    #[test]
    fn test_decode_set_state() {
        let msg =
            ClientMessage::decode(r#"{"head": "setState", "datas": {"idOrder": 7, "state": "ready"}}"#)
                .unwrap();
        assert_eq!(
            msg,
            ClientMessage::SetState {
                id_order: 7,
                state: "ready".to_string(),
            }
        );
    }

    #[test]
    fn test_decode_unknown_tag() {
        let err = ClientMessage::decode(r#"{"head": "selfDestruct"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownTag(tag) if tag == "selfDestruct"));
    }

    #[test]
    fn test_decode_malformed_frame() {
        let err = ClientMessage::decode("not json at all").unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[test]
    fn test_decode_bad_payload() {
        let err =
            ClientMessage::decode(r#"{"head": "setState", "datas": {"state": 12}}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::BadPayload { head, .. } if head == "setState"));
    }

    #[test]
    fn test_encode_signal_has_no_payload() {
        assert_eq!(
            ServerMessage::UpdateSlotsRequired.encode(),
            r#"{"head":"updateSlotsRequired"}"#
        );
    }

    #[test]
    fn test_encode_update_slots() {
        let msg = ServerMessage::UpdateSlots(vec!["12:15".to_string(), "12:30".to_string()]);
        assert_eq!(
            msg.encode(),
            r#"{"head":"updateSlots","datas":["12:15","12:30"]}"#
        );
    }

    #[test]
    fn test_encode_update_state() {
        let msg = ServerMessage::UpdateState {
            id_order: 7,
            state: "ready".to_string(),
        };
        assert_eq!(
            msg.encode(),
            r#"{"head":"updateState","datas":{"idOrder":7,"state":"ready"}}"#
        );
    }
}
