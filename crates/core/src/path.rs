// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Concrete resource identity

use serde::{Deserialize, Serialize};

/// The 4-tuple identifying a resource: `(exporter, group, cls, name)`
///
/// Serialized as a plain 4-element array.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(
    from = "(String, String, String, String)",
    into = "(String, String, String, String)"
)]
pub struct ResourcePath {
    pub exporter: String,
    pub group: String,
    pub cls: String,
    pub name: String,
}

impl ResourcePath {
    pub fn new(
        exporter: impl Into<String>,
        group: impl Into<String>,
        cls: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            exporter: exporter.into(),
            group: group.into(),
            cls: cls.into(),
            name: name.into(),
        }
    }
}

impl From<(String, String, String, String)> for ResourcePath {
    fn from((exporter, group, cls, name): (String, String, String, String)) -> Self {
        Self {
            exporter,
            group,
            cls,
            name,
        }
    }
}

impl From<ResourcePath> for (String, String, String, String) {
    fn from(path: ResourcePath) -> Self {
        (path.exporter, path.group, path.cls, path.name)
    }
}

impl std::fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.exporter, self.group, self.cls, self.name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_tuple() {
        let path = ResourcePath::new("exp1", "board1", "NetworkSerialPort", "");
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, r#"["exp1","board1","NetworkSerialPort",""]"#);

        let back: ResourcePath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
    }

    #[test]
    fn displays_slash_separated() {
        let path = ResourcePath::new("exp1", "board1", "PowerPort", "pdu");
        assert_eq!(path.to_string(), "exp1/board1/PowerPort/pdu");
    }
}
