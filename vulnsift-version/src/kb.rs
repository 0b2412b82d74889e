// ---------------------------------------------------------------------------
// Microsoft KB supersedence
// ---------------------------------------------------------------------------
//
// KB rollups are not linearly ordered: "newer" means "supersedes", as
// recorded in the database's superseding-by table. `>=KB X` holds when the
// candidate is X or any transitive successor of X.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::constraint::Op;

/// The supersedence graph loaded from the database.
#[derive(Debug, Clone, Default)]
pub struct KbGraph {
    superseded_by: HashMap<String, Vec<String>>,
}

fn normalize(kb: &str) -> String {
    kb.trim().to_ascii_uppercase()
}

impl KbGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_edges<I, S>(edges: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: AsRef<str>,
    {
        let mut graph = Self::new();
        for (kb, successor) in edges {
            graph.insert(kb.as_ref(), successor.as_ref());
        }
        graph
    }

    /// Record that `successor` supersedes `kb`.
    pub fn insert(&mut self, kb: &str, successor: &str) {
        self.superseded_by
            .entry(normalize(kb))
            .or_default()
            .push(normalize(successor));
    }

    pub fn is_empty(&self) -> bool {
        self.superseded_by.is_empty()
    }

    /// Whether `candidate` transitively supersedes `kb`. Strict: a KB does
    /// not supersede itself.
    pub fn supersedes(&self, kb: &str, candidate: &str) -> bool {
        let start = normalize(kb);
        let target = normalize(candidate);
        if start == target {
            return false;
        }

        let mut seen: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(&start);
        while let Some(current) = queue.pop_front() {
            let Some(successors) = self.superseded_by.get(current) else {
                continue;
            };
            for succ in successors {
                if succ == &target {
                    return true;
                }
                if seen.insert(succ) {
                    queue.push_back(succ);
                }
            }
        }
        false
    }

    /// Evaluate one constraint range against the graph: `>=X` means the
    /// candidate is X or a successor of X, `<X` means X supersedes the
    /// candidate.
    pub(crate) fn range_admits(&self, version: &str, op: Op, target: &str) -> bool {
        let v = normalize(version);
        let t = normalize(target);
        match op {
            Op::Eq => v == t,
            Op::Ne => v != t,
            Op::Ge => v == t || self.supersedes(&t, &v),
            Op::Gt => self.supersedes(&t, &v),
            Op::Le => v == t || self.supersedes(&v, &t),
            Op::Lt => self.supersedes(&v, &t),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::Constraint;
    use vulnsift_types::VersionScheme;

    fn chain() -> KbGraph {
        KbGraph::from_edges([
            ("KB5005565", "KB5006670"),
            ("KB5006670", "KB5008212"),
            ("KB4000001", "KB5005565"),
        ])
    }

    #[test]
    fn direct_and_transitive_supersedence() {
        let g = chain();
        assert!(g.supersedes("KB5005565", "KB5006670"));
        assert!(g.supersedes("KB5005565", "KB5008212"));
        assert!(g.supersedes("KB4000001", "KB5008212"));
        assert!(!g.supersedes("KB5006670", "KB5005565"));
        assert!(!g.supersedes("KB5005565", "KB5005565"));
    }

    #[test]
    fn case_insensitive_ids() {
        let g = chain();
        assert!(g.supersedes("kb5005565", "KB5006670"));
    }

    #[test]
    fn constraint_less_than_matches_predecessors() {
        let g = chain();
        let c = Constraint::parse("<KB5006670", VersionScheme::Kb).unwrap();
        assert!(c.satisfied_by_kb("KB5005565", &g).unwrap());
        assert!(!c.satisfied_by_kb("KB5006670", &g).unwrap());
        assert!(!c.satisfied_by_kb("KB5008212", &g).unwrap());

        let c = Constraint::parse("<KB5005565", VersionScheme::Kb).unwrap();
        assert!(!c.satisfied_by_kb("KB5005565", &g).unwrap());
    }

    #[test]
    fn constraint_greater_equal_matches_successors() {
        let g = chain();
        let c = Constraint::parse(">=KB5006670", VersionScheme::Kb).unwrap();
        assert!(c.satisfied_by_kb("KB5006670", &g).unwrap());
        assert!(c.satisfied_by_kb("KB5008212", &g).unwrap());
        assert!(!c.satisfied_by_kb("KB5005565", &g).unwrap());
    }

    #[test]
    fn unrelated_kbs_never_match_ranges() {
        let g = chain();
        let c = Constraint::parse("<KB5006670", VersionScheme::Kb).unwrap();
        assert!(!c.satisfied_by_kb("KB9999999", &g).unwrap());
    }

    #[test]
    fn cyclic_data_terminates() {
        let g = KbGraph::from_edges([("KB1", "KB2"), ("KB2", "KB1")]);
        assert!(g.supersedes("KB1", "KB2"));
        assert!(!g.supersedes("KB1", "KB3"));
    }
}
