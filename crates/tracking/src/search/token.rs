//! Page tokens
//!
//! A token is base64(JSON) of a keyset cursor: the sort key of the last row
//! returned plus a fingerprint of the query it belongs to. The next page
//! starts strictly after that key, so rows inserted or removed between pages
//! never shift the window.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use mlmd_core::{Result, TrackingError, ViewType};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::order::SortKey;

/// Hash of everything that determines a result sequence
pub fn fingerprint(experiment_ids: &[String], filter: &str, order: &str, view: ViewType) -> String {
    let mut ids: Vec<&str> = experiment_ids.iter().map(String::as_str).collect();
    ids.sort_unstable();
    ids.dedup();
    let mut hasher = Sha256::new();
    for id in ids {
        hasher.update(id.as_bytes());
        hasher.update([0u8]);
    }
    hasher.update([1u8]);
    hasher.update(filter.as_bytes());
    hasher.update([1u8]);
    hasher.update(order.as_bytes());
    hasher.update([1u8]);
    hasher.update(view.as_str().as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Decoded page token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageToken {
    pub fingerprint: String,
    pub after: SortKey,
}

impl PageToken {
    pub fn encode(&self) -> Result<String> {
        let json = serde_json::to_vec(self)?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    /// Decode and check that the token belongs to the query with `fingerprint`
    pub fn decode(token: &str, fingerprint: &str) -> Result<Self> {
        let invalid = || TrackingError::invalid_parameter("Invalid page token");
        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|_| invalid())?;
        let decoded: PageToken = serde_json::from_slice(&bytes).map_err(|_| invalid())?;
        if decoded.fingerprint != fingerprint {
            return Err(TrackingError::invalid_parameter(
                "Page token was issued for a different query",
            ));
        }
        Ok(decoded)
    }
}
