use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::annotations::Annotations;

/// Content-derived identity of a vertex: SHA-256 hex of kind plus sorted annotations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VertexId(pub String);

/// Content-derived identity of an edge: kind, both endpoint ids, and sorted annotations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(pub String);

macro_rules! id_common {
    ($name:ident) => {
        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// First 12 hex chars, for display.
            pub fn short(&self) -> &str {
                &self.0[..self.0.len().min(12)]
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_common!(VertexId);
id_common!(EdgeId);

/// Length-prefixed digest so ("ab","c") and ("a","bc") never collide.
pub(crate) struct ContentDigest(Sha256);

impl ContentDigest {
    pub(crate) fn new(tag: &str) -> Self {
        let mut digest = Self(Sha256::new());
        digest.field(tag);
        digest
    }

    pub(crate) fn field(&mut self, value: &str) -> &mut Self {
        self.0.update((value.len() as u64).to_le_bytes());
        self.0.update(value.as_bytes());
        self
    }

    pub(crate) fn annotations(&mut self, annotations: &Annotations) -> &mut Self {
        let sorted = annotations.sorted();
        self.0.update((sorted.len() as u64).to_le_bytes());
        for (k, v) in sorted {
            self.field(k);
            self.field(v);
        }
        self
    }

    pub(crate) fn finish(self) -> String {
        format!("{:x}", self.0.finalize())
    }
}
