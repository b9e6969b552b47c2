//! Out-of-band control messages sent from a page to the proxy

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum ControlMessage {
  /// Re-run core asset population without reinstalling
  #[serde(rename = "UPDATE_CACHE")]
  UpdateCache,
  /// Activate immediately instead of waiting for open pages to close
  #[serde(rename = "SKIP_WAITING")]
  SkipWaiting,
  #[serde(other)]
  Unknown,
}

impl ControlMessage {
  /// Parse message data; anything unrecognized yields `None`.
  pub fn parse(data: &Value) -> Option<Self> {
    match Self::deserialize(data) {
      Ok(Self::Unknown) | Err(_) => None,
      Ok(message) => Some(message),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_parse_update_cache() {
    assert_eq!(
      ControlMessage::parse(&json!({"type": "UPDATE_CACHE"})),
      Some(ControlMessage::UpdateCache)
    );
  }

  #[test]
  fn test_parse_skip_waiting_with_extra_fields() {
    assert_eq!(
      ControlMessage::parse(&json!({"type": "SKIP_WAITING", "from": "settings"})),
      Some(ControlMessage::SkipWaiting)
    );
  }

  #[test]
  fn test_unknown_type_ignored() {
    assert_eq!(ControlMessage::parse(&json!({"type": "CLEAR_ALL"})), None);
  }

  #[test]
  fn test_malformed_data_ignored() {
    assert_eq!(ControlMessage::parse(&json!(null)), None);
    assert_eq!(ControlMessage::parse(&json!("UPDATE_CACHE")), None);
    assert_eq!(ControlMessage::parse(&json!({"kind": "UPDATE_CACHE"})), None);
    assert_eq!(ControlMessage::parse(&json!({"type": 7})), None);
  }
}
