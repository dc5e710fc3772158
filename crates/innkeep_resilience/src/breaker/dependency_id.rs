// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::fmt::Display;

/// Names a logical upstream dependency that gets its own circuit breaker.
///
/// Examples are `"remote_store"`, `"payments"` or `"availability"`. Keep the set small and
/// long-lived: one id per failure domain, never per user or per request.
///
/// The id is included in logs and metrics, so it must not carry sensitive data.
///
/// # Examples
///
/// ```
/// use innkeep_resilience::breaker::DependencyId;
///
/// let id = DependencyId::from("payments");
/// assert_eq!(id.to_string(), "payments");
/// assert_eq!(DependencyId::from(7_u64).to_string(), "7");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DependencyId(Value);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Value {
    Number(u64),
    Name(Cow<'static, str>),
}

impl DependencyId {
    /// Creates an id from a name.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(Value::Name(name.into()))
    }
}

impl Display for DependencyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Value::Number(n) => write!(f, "{n}"),
            Value::Name(name) => f.write_str(name),
        }
    }
}

impl From<u64> for DependencyId {
    fn from(value: u64) -> Self {
        Self(Value::Number(value))
    }
}

impl From<&'static str> for DependencyId {
    fn from(value: &'static str) -> Self {
        Self::new(value)
    }
}

impl From<String> for DependencyId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&Self> for DependencyId {
    fn from(value: &Self) -> Self {
        value.clone()
    }
}

impl From<DependencyId> for Cow<'static, str> {
    fn from(value: DependencyId) -> Self {
        match value.0 {
            Value::Number(n) => Cow::Owned(n.to_string()),
            Value::Name(name) => name,
        }
    }
}
