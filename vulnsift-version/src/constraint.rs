use std::cmp::Ordering;
use std::fmt;

use vulnsift_types::VersionScheme;

use crate::error::VersionError;
use crate::kb::KbGraph;
use crate::scheme;

/// A parsed version constraint: a disjunction of conjunctive clauses.
///
/// ```text
/// constraint := clause ( "||" clause )*
/// clause     := range ( "," range )*
/// range      := op version
/// op         := "<" | "<=" | ">" | ">=" | "=" | "!="
/// ```
///
/// Bare versions mean `=`. An empty constraint is always satisfied (a CPE
/// record with no upstream version bound).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    scheme: VersionScheme,
    clauses: Vec<Vec<Range>>,
    raw: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Range {
    pub op: Op,
    pub version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Op {
    /// Strip a leading operator from a range token; no operator means `=`.
    fn strip(token: &str) -> (Op, &str) {
        for (text, op) in [
            ("<=", Op::Le),
            (">=", Op::Ge),
            ("!=", Op::Ne),
            ("<", Op::Lt),
            (">", Op::Gt),
            ("=", Op::Eq),
        ] {
            if let Some(rest) = token.strip_prefix(text) {
                return (op, rest);
            }
        }
        (Op::Eq, token)
    }

    pub fn admits(&self, ord: Ordering) -> bool {
        match self {
            Op::Lt => ord == Ordering::Less,
            Op::Le => ord != Ordering::Greater,
            Op::Gt => ord == Ordering::Greater,
            Op::Ge => ord != Ordering::Less,
            Op::Eq => ord == Ordering::Equal,
            Op::Ne => ord != Ordering::Equal,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::Eq => "=",
            Op::Ne => "!=",
        }
    }
}

impl Constraint {
    pub fn parse(raw: &str, scheme: VersionScheme) -> Result<Self, VersionError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Self {
                scheme,
                clauses: Vec::new(),
                raw: raw.to_string(),
            });
        }

        let mut clauses = Vec::new();
        for clause in trimmed.split("||") {
            let mut ranges = Vec::new();
            for token in clause.split(',') {
                let token = token.trim();
                if token.is_empty() {
                    return Err(VersionError::InvalidConstraint {
                        constraint: raw.to_string(),
                        reason: "empty range".to_string(),
                    });
                }
                let (op, version) = Op::strip(token);
                let version = version.trim();
                if version.is_empty() {
                    return Err(VersionError::InvalidConstraint {
                        constraint: raw.to_string(),
                        reason: format!("operator {:?} without a version", op.as_str()),
                    });
                }
                ranges.push(Range {
                    op,
                    version: version.to_string(),
                });
            }
            clauses.push(ranges);
        }

        Ok(Self {
            scheme,
            clauses,
            raw: raw.to_string(),
        })
    }

    pub fn scheme(&self) -> VersionScheme {
        self.scheme
    }

    /// True when the constraint has no ranges and admits every version.
    pub fn is_unbounded(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Whether `version` satisfies this constraint under the declared
    /// scheme. Errors mean the version (or a range bound) does not parse;
    /// callers skip the record and log.
    pub fn satisfied_by(&self, version: &str) -> Result<bool, VersionError> {
        if self.scheme == VersionScheme::Kb {
            return Err(VersionError::MissingKbGraph);
        }
        self.evaluate(|range| {
            let ord = scheme::compare(self.scheme, version, &range.version)?;
            Ok(range.op.admits(ord))
        })
    }

    /// KB evaluation against the Microsoft supersedence graph.
    pub fn satisfied_by_kb(&self, version: &str, graph: &KbGraph) -> Result<bool, VersionError> {
        self.evaluate(|range| Ok(graph.range_admits(version, range.op, &range.version)))
    }

    fn evaluate<F>(&self, mut admits: F) -> Result<bool, VersionError>
    where
        F: FnMut(&Range) -> Result<bool, VersionError>,
    {
        if self.clauses.is_empty() {
            return Ok(true);
        }
        for clause in &self.clauses {
            let mut all = true;
            for range in clause {
                if !admits(range)? {
                    all = false;
                    break;
                }
            }
            if all {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Constraint {
        Constraint::parse(raw, VersionScheme::Semver).unwrap()
    }

    #[test]
    fn empty_constraint_always_satisfied() {
        let c = parse("");
        assert!(c.is_unbounded());
        assert!(c.satisfied_by("1.0.0").unwrap());
        assert!(c.satisfied_by("anything-at-all").unwrap());

        let c = parse("   ");
        assert!(c.satisfied_by("1.0.0").unwrap());
    }

    #[test]
    fn single_range() {
        let c = parse("<1.4.3");
        assert!(c.satisfied_by("1.4.2").unwrap());
        assert!(!c.satisfied_by("1.4.3").unwrap());
        assert!(!c.satisfied_by("2.0.0").unwrap());
    }

    #[test]
    fn conjunction_within_clause() {
        let c = parse(">=1.2.0, <1.4.3");
        assert!(c.satisfied_by("1.2.0").unwrap());
        assert!(c.satisfied_by("1.4.2").unwrap());
        assert!(!c.satisfied_by("1.1.9").unwrap());
        assert!(!c.satisfied_by("1.4.3").unwrap());
    }

    #[test]
    fn disjunction_across_clauses() {
        let c = parse(">=1.2.0,<1.4.3 || >=1.5.0,<1.5.7");
        assert!(c.satisfied_by("1.3.0").unwrap());
        assert!(c.satisfied_by("1.5.6").unwrap());
        assert!(!c.satisfied_by("1.4.5").unwrap());
        assert!(!c.satisfied_by("1.5.7").unwrap());
    }

    #[test]
    fn bare_version_means_equality() {
        let c = parse("1.2.3");
        assert!(c.satisfied_by("1.2.3").unwrap());
        assert!(!c.satisfied_by("1.2.4").unwrap());
    }

    #[test]
    fn not_equal() {
        let c = parse("!=1.2.3");
        assert!(!c.satisfied_by("1.2.3").unwrap());
        assert!(c.satisfied_by("1.2.4").unwrap());
    }

    #[test]
    fn whitespace_tolerated_around_tokens() {
        let c = parse("  >= 1.2.0 ,  < 1.4.3  ");
        assert!(c.satisfied_by("1.3.0").unwrap());
    }

    #[test]
    fn malformed_constraints_rejected() {
        assert!(Constraint::parse(">=", VersionScheme::Semver).is_err());
        assert!(Constraint::parse(">=1.0,,<2.0", VersionScheme::Semver).is_err());
        assert!(Constraint::parse("<1.0 || ", VersionScheme::Semver).is_err());
    }

    #[test]
    fn unparseable_version_is_an_error_not_a_match() {
        let c = parse("<1.4.3");
        assert!(matches!(
            c.satisfied_by("not$a%version"),
            Err(VersionError::Unparsed { .. })
        ));
    }

    #[test]
    fn kb_without_graph_errors() {
        let c = Constraint::parse("<KB5006670", VersionScheme::Kb).unwrap();
        assert!(matches!(
            c.satisfied_by("KB5005565"),
            Err(VersionError::MissingKbGraph)
        ));
    }

    #[test]
    fn display_preserves_raw_text() {
        let raw = ">=1.2.0,<1.4.3 || >=1.5.0,<1.5.7";
        assert_eq!(parse(raw).to_string(), raw);
    }
}
