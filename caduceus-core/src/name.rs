//! Isolate source names

use std::fmt;

use serde::{Deserialize, Serialize};

/// The source metadata field an isolate name was drawn from
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum IsolateNameType {
    Isolate,
    Strain,
    Clone,
}

impl fmt::Display for IsolateNameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Isolate => write!(f, "Isolate"),
            Self::Strain => write!(f, "Strain"),
            Self::Clone => write!(f, "Clone"),
        }
    }
}

/// The name of an isolate as drawn from source record metadata.
///
/// Names are ordered by `(type, value)`, which fixes the canonical isolate
/// ordering within an OTU.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct IsolateName {
    #[serde(rename = "type")]
    pub kind: IsolateNameType,

    pub value: String,
}

impl IsolateName {
    pub fn new(kind: IsolateNameType, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

impl fmt::Display for IsolateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let name = IsolateName::new(IsolateNameType::Isolate, "A");
        assert_eq!(name.to_string(), "Isolate A");
    }

    #[test]
    fn test_wire_format() {
        let name = IsolateName::new(IsolateNameType::Strain, "PV-0113");
        let json = serde_json::to_value(&name).unwrap();

        assert_eq!(
            json,
            serde_json::json!({"type": "strain", "value": "PV-0113"})
        );
    }

    #[test]
    fn test_ordering() {
        let a = IsolateName::new(IsolateNameType::Isolate, "B");
        let b = IsolateName::new(IsolateNameType::Strain, "A");

        // Isolate sorts before Strain regardless of value.
        assert!(a < b);
    }
}
