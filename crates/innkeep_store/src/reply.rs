// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use serde::{Deserialize, Serialize};

use crate::StoreError;

/// The `{ data, error }` envelope returned by the remote store client.
///
/// The store reports failures in-band: the call itself succeeds and `error` carries a message.
/// [`into_result`][Self::into_result] turns the envelope into a `Result` so the failure reaches
/// the retry and circuit-breaker machinery.
///
/// # Examples
///
/// ```
/// use innkeep_store::{StoreError, StoreReply};
///
/// let reply: StoreReply<u32> = serde_json::from_str(r#"{"data": null, "error": "fetch failed"}"#).unwrap();
/// assert!(matches!(reply.into_result(), Err(StoreError::Connection(_))));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreReply<T> {
    /// The payload; `None` when the query matched nothing.
    #[serde(default)]
    pub data: Option<T>,

    /// The in-band error message, if the request failed.
    #[serde(default)]
    pub error: Option<String>,
}

impl<T> StoreReply<T> {
    /// A successful reply carrying `data`.
    pub fn ok(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }

    /// A successful reply without data.
    #[must_use]
    pub fn empty() -> Self {
        Self { data: None, error: None }
    }

    /// A failed reply carrying `message`.
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            data: None,
            error: Some(message.into()),
        }
    }

    /// Converts the envelope into a `Result`.
    ///
    /// # Errors
    ///
    /// Returns the classified error message (see [`StoreError::from_message`]), or
    /// [`StoreError::Protocol`] if the reply carries both data and an error.
    pub fn into_result(self) -> Result<Option<T>, StoreError> {
        match (self.data, self.error) {
            (Some(_), Some(message)) => Err(StoreError::Protocol(format!(
                "reply carries both data and an error: {message}"
            ))),
            (_, Some(message)) => Err(StoreError::from_message(message)),
            (data, None) => Ok(data),
        }
    }
}
