use std::fmt;

use serde::{Deserialize, Serialize};

/// A CPE 2.3 identifier, reduced to the attributes the matcher cares about.
///
/// Attribute comparison is wildcard-aware and case-insensitive on every
/// path. Serialized as the full `cpe:2.3:` string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cpe {
    pub part: String,
    pub vendor: String,
    pub product: String,
    pub version: String,
    pub update: String,
    pub target_sw: String,
}

#[derive(Debug, thiserror::Error)]
#[error("invalid CPE {0:?}: {1}")]
pub struct CpeError(pub String, pub &'static str);

impl Cpe {
    /// Parse a `cpe:2.3:part:vendor:product:version:update:edition:language:
    /// sw_edition:target_sw:target_hw:other` string. Trailing attributes may
    /// be omitted and default to `*`.
    pub fn parse(s: &str) -> Result<Self, CpeError> {
        let mut fields = s.trim().split(':');
        if fields.next() != Some("cpe") {
            return Err(CpeError(s.to_string(), "missing cpe: prefix"));
        }
        if fields.next() != Some("2.3") {
            return Err(CpeError(s.to_string(), "only CPE 2.3 is supported"));
        }
        let rest: Vec<&str> = fields.collect();
        if rest.is_empty() {
            return Err(CpeError(s.to_string(), "missing attributes"));
        }
        let attr = |i: usize| rest.get(i).copied().unwrap_or("*").to_string();
        Ok(Self {
            part: attr(0),
            vendor: attr(1),
            product: attr(2),
            version: attr(3),
            update: attr(4),
            // indices 5..8 are edition, language, sw_edition; unused here
            target_sw: attr(8),
        })
    }

    /// Wildcard-aware, case-insensitive single-attribute comparison.
    pub fn attribute_matches(a: &str, b: &str) -> bool {
        a == "*" || b == "*" || a.eq_ignore_ascii_case(b)
    }

    /// Whether this CPE identifies the same product as `other`, comparing
    /// vendor, product, and target software. Version comparison is deferred
    /// to the version algebra.
    pub fn matches_product(&self, other: &Cpe) -> bool {
        Self::attribute_matches(&self.vendor, &other.vendor)
            && Self::attribute_matches(&self.product, &other.product)
            && Self::attribute_matches(&self.target_sw, &other.target_sw)
    }

    /// True when the version attribute names a concrete version rather than
    /// a wildcard.
    pub fn has_specific_version(&self) -> bool {
        !self.version.is_empty() && self.version != "*" && self.version != "-"
    }
}

impl fmt::Display for Cpe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cpe:2.3:{}:{}:{}:{}:{}:*:*:*:{}:*:*",
            self.part, self.vendor, self.product, self.version, self.update, self.target_sw
        )
    }
}

impl TryFrom<String> for Cpe {
    type Error = CpeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Cpe::parse(&value)
    }
}

impl From<Cpe> for String {
    fn from(value: Cpe) -> Self {
        value.to_string()
    }
}
