use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::ConsoleError;

/// `{success, message, data}` wrapper every management endpoint returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    /// Unwrap a successful envelope that must carry data.
    pub fn into_data(self) -> Result<T, ConsoleError> {
        if !self.success {
            return Err(ConsoleError::api(self.message));
        }
        self.data
            .ok_or_else(|| ConsoleError::api("response is missing its data field"))
    }

    /// Unwrap a successful envelope whose data is irrelevant.
    pub fn into_ack(self) -> Result<String, ConsoleError> {
        if self.success {
            Ok(self.message)
        } else {
            Err(ConsoleError::api(self.message))
        }
    }
}

/// Decode an envelope from raw body bytes.
pub fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<ApiEnvelope<T>, ConsoleError> {
    Ok(serde_json::from_slice(body)?)
}

/// One page of a list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Page<T> {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub data: Vec<T>,
}

// The server encodes an empty page as `"data": null`.
pub(crate) fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
