// ---------------------------------------------------------------------------
// VEX document ingestion
// ---------------------------------------------------------------------------
//
// VEX documents are a rule source: each statement becomes an ignore rule
// carrying its status. `not_affected` and `fixed` suppress, `affected`
// forces retention, `under_investigation` is recorded but never suppresses.

use serde::Deserialize;

use vulnsift_types::{IgnoreRule, VexStatus};

use crate::error::MatchError;

#[derive(Debug, Deserialize)]
struct VexDocument {
    #[serde(default)]
    statements: Vec<VexStatement>,
}

#[derive(Debug, Deserialize)]
struct VexStatement {
    vulnerability: VexVulnerability,
    status: VexStatus,
    #[serde(default)]
    justification: Option<String>,
    #[serde(default)]
    products: Vec<VexProduct>,
}

#[derive(Debug, Deserialize)]
struct VexVulnerability {
    name: String,
}

#[derive(Debug, Deserialize)]
struct VexProduct {
    #[serde(rename = "@id", default)]
    id: Option<String>,
}

/// Parse an OpenVEX JSON document into ignore rules, one per
/// (statement, product) pair; statements without products scope to the
/// vulnerability alone.
pub fn rules_from_vex(json: &str) -> Result<Vec<IgnoreRule>, MatchError> {
    let doc: VexDocument =
        serde_json::from_str(json).map_err(|e| MatchError::Vex(e.to_string()))?;

    let mut rules = Vec::new();
    for statement in doc.statements {
        if statement.vulnerability.name.is_empty() {
            return Err(MatchError::Vex("statement without a vulnerability name".into()));
        }
        let base = IgnoreRule {
            vulnerability: Some(statement.vulnerability.name.clone()),
            vex_status: Some(statement.status),
            reason: statement.justification.clone(),
            ..IgnoreRule::default()
        };

        let product_names: Vec<String> = statement
            .products
            .iter()
            .filter_map(|p| p.id.as_deref())
            .filter_map(purl_name)
            .collect();

        if product_names.is_empty() {
            rules.push(base);
        } else {
            for name in product_names {
                rules.push(IgnoreRule {
                    package_name: Some(name),
                    ..base.clone()
                });
            }
        }
    }
    Ok(rules)
}

/// Extract the package name from a purl-ish product id:
/// `pkg:deb/debian/libssl1.1@1.1.1n-0+deb11u3?arch=amd64` → `libssl1.1`.
fn purl_name(purl: &str) -> Option<String> {
    let rest = purl.strip_prefix("pkg:")?;
    let path = rest.split(['@', '?', '#']).next()?;
    let name = path.rsplit('/').next()?;
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statements_become_rules() {
        let json = r#"{
            "@context": "https://openvex.dev/ns/v0.2.0",
            "statements": [
                {
                    "vulnerability": {"name": "CVE-2022-3602"},
                    "products": [{"@id": "pkg:deb/debian/libssl1.1@1.1.1n-0+deb11u3"}],
                    "status": "not_affected",
                    "justification": "vulnerable_code_not_in_execute_path"
                },
                {
                    "vulnerability": {"name": "CVE-2021-44228"},
                    "status": "affected"
                }
            ]
        }"#;
        let rules = rules_from_vex(json).unwrap();
        assert_eq!(rules.len(), 2);

        assert_eq!(rules[0].vulnerability.as_deref(), Some("CVE-2022-3602"));
        assert_eq!(rules[0].package_name.as_deref(), Some("libssl1.1"));
        assert_eq!(rules[0].vex_status, Some(VexStatus::NotAffected));
        assert_eq!(
            rules[0].reason.as_deref(),
            Some("vulnerable_code_not_in_execute_path")
        );

        assert_eq!(rules[1].vex_status, Some(VexStatus::Affected));
        assert!(rules[1].package_name.is_none());
    }

    #[test]
    fn statement_with_multiple_products_fans_out() {
        let json = r#"{
            "statements": [
                {
                    "vulnerability": {"name": "CVE-2024-0001"},
                    "products": [
                        {"@id": "pkg:rpm/rhel/openssl@3.0.7"},
                        {"@id": "pkg:rpm/rhel/openssl-libs@3.0.7"}
                    ],
                    "status": "fixed"
                }
            ]
        }"#;
        let rules = rules_from_vex(json).unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].package_name.as_deref(), Some("openssl"));
        assert_eq!(rules[1].package_name.as_deref(), Some("openssl-libs"));
    }

    #[test]
    fn malformed_documents_are_config_errors() {
        assert!(rules_from_vex("not json").is_err());
        assert!(rules_from_vex(r#"{"statements": [{"status": "fixed"}]}"#).is_err());
    }

    #[test]
    fn purl_name_extraction() {
        assert_eq!(
            purl_name("pkg:deb/debian/libssl1.1@1.1.1n?arch=amd64"),
            Some("libssl1.1".into())
        );
        assert_eq!(
            purl_name("pkg:maven/org.apache/log4j-core@2.14.1"),
            Some("log4j-core".into())
        );
        assert_eq!(purl_name("not-a-purl"), None);
    }
}
