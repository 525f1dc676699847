//! Message envelope carried by the in-memory broker.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::deadline::{Attributes, Deadline, DEFAULT_HEADER};

/// A message plus the string headers attached by its producer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    #[serde(default)]
    pub headers: HashMap<String, String>,

    #[serde(default)]
    pub payload: String,
}

impl Envelope {
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            headers: HashMap::new(),
            payload: payload.into(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Stamp an absolute deadline into the default deadline header, as a producer would.
    pub fn with_deadline(self, deadline: Deadline) -> Self {
        self.with_header(DEFAULT_HEADER, deadline.to_rfc3339())
    }
}

impl Attributes for Envelope {
    fn attribute(&self, key: &str) -> Option<&str> {
        self.headers.attribute(key)
    }
}
