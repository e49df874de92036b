//! Check/perform plumbing shared by every upkeep the automation network polls.
//!
//! The network calls `check` off-chain, keeps the returned bytes, and hands
//! them back verbatim to `execute`. Only identifiers travel in the payload.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Opaque perform data carried from `check` to `execute`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload(Vec<u8>);

impl Payload {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn encode<T: Serialize>(ids: &[T]) -> Result<Self, PayloadError> {
        serde_json::to_vec(ids).map(Self).map_err(PayloadError::Encode)
    }

    /// An empty payload decodes to no ids.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<Vec<T>, PayloadError> {
        if self.0.is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_slice(&self.0).map_err(PayloadError::Decode)
    }
}

/// Result of a `check` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpkeepCheck {
    pub upkeep_needed: bool,
    pub perform_data: Payload,
}

impl UpkeepCheck {
    pub fn idle() -> Self {
        Self {
            upkeep_needed: false,
            perform_data: Payload::empty(),
        }
    }

    /// Idle when `ids` is empty.
    pub fn for_ids<T: Serialize>(ids: &[T]) -> Result<Self, PayloadError> {
        if ids.is_empty() {
            return Ok(Self::idle());
        }
        Ok(Self {
            upkeep_needed: true,
            perform_data: Payload::encode(ids)?,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("failed to encode perform data: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("malformed perform data: {0}")]
    Decode(#[source] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PositionId, UpkeepId};

    #[test]
    fn empty_ids_produce_idle_check() {
        let check = UpkeepCheck::for_ids::<PositionId>(&[]).unwrap();
        assert!(!check.upkeep_needed);
        assert!(check.perform_data.is_empty());
        assert!(check.perform_data.decode::<PositionId>().unwrap().is_empty());
    }

    #[test]
    fn payload_carries_ids_only() {
        let check = UpkeepCheck::for_ids(&[PositionId(3), PositionId(9)]).unwrap();
        assert!(check.upkeep_needed);
        assert_eq!(check.perform_data.as_bytes(), b"[3,9]");

        let ids: Vec<PositionId> = check.perform_data.decode().unwrap();
        assert_eq!(ids, vec![PositionId(3), PositionId(9)]);
    }

    #[test]
    fn upkeep_ids_keep_full_width() {
        let id = UpkeepId::new("71811323549820858690788095236248551462108397831996880708762786105308124610685");
        let payload = Payload::encode(std::slice::from_ref(&id)).unwrap();
        assert_eq!(payload.decode::<UpkeepId>().unwrap(), vec![id]);
    }

    #[test]
    fn garbage_is_rejected() {
        let payload = Payload::from_bytes(vec![0x9e, 0xc3, 0xc4]);
        assert!(matches!(payload.decode::<PositionId>(), Err(PayloadError::Decode(_))));
    }
}
