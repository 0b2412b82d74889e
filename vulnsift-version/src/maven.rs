// ---------------------------------------------------------------------------
// Maven version comparison
// ---------------------------------------------------------------------------
//
// Follows Maven's ComparableVersion rules closely enough for advisory data:
// tokens split on `.`, `-`, and digit/letter transitions; known qualifiers
// rank `alpha < beta < milestone < rc = cr < snapshot < "" = final = ga =
// release < sp`; unknown qualifiers sort after releases, lexically among
// themselves; numbers beat qualifiers.

use std::cmp::Ordering;

use vulnsift_types::VersionScheme;

use crate::error::VersionError;

pub(crate) fn compare(a: &str, b: &str) -> Result<Ordering, VersionError> {
    let ta = tokenize(a)?;
    let tb = tokenize(b)?;
    Ok(compare_tokens(&ta, &tb))
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(u64),
    Qual(String),
}

const RELEASE_RANK: u8 = 6;

fn qualifier_rank(q: &str) -> u8 {
    match q {
        "alpha" | "a" => 1,
        "beta" | "b" => 2,
        "milestone" | "m" => 3,
        "rc" | "cr" => 4,
        "snapshot" => 5,
        "" | "final" | "ga" | "release" => RELEASE_RANK,
        "sp" => 7,
        _ => 8,
    }
}

fn tokenize(s: &str) -> Result<Vec<Token>, VersionError> {
    let lowered = s.trim().to_ascii_lowercase();
    if lowered.is_empty() {
        return Err(VersionError::unparsed(VersionScheme::Maven, s));
    }

    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut current_is_digit = false;

    let mut flush = |current: &mut String, is_digit: bool| {
        if current.is_empty() {
            return;
        }
        if is_digit {
            match current.parse() {
                Ok(n) => tokens.push(Token::Num(n)),
                Err(_) => tokens.push(Token::Qual(current.clone())),
            }
        } else {
            tokens.push(Token::Qual(current.clone()));
        }
        current.clear();
    };

    for c in lowered.chars() {
        if c == '.' || c == '-' || c == '_' {
            flush(&mut current, current_is_digit);
        } else if c.is_ascii_digit() {
            if !current.is_empty() && !current_is_digit {
                flush(&mut current, false);
            }
            current_is_digit = true;
            current.push(c);
        } else {
            if !current.is_empty() && current_is_digit {
                flush(&mut current, true);
            }
            current_is_digit = false;
            current.push(c);
        }
    }
    flush(&mut current, current_is_digit);

    if tokens.is_empty() {
        return Err(VersionError::unparsed(VersionScheme::Maven, s));
    }
    Ok(tokens)
}

fn compare_tokens(a: &[Token], b: &[Token]) -> Ordering {
    let max = a.len().max(b.len());
    for idx in 0..max {
        let ord = match (a.get(idx), b.get(idx)) {
            (Some(ta), Some(tb)) => compare_pair(ta, tb),
            (Some(ta), None) => compare_to_padding(ta),
            (None, Some(tb)) => compare_to_padding(tb).reverse(),
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn compare_pair(a: &Token, b: &Token) -> Ordering {
    match (a, b) {
        (Token::Num(na), Token::Num(nb)) => na.cmp(nb),
        // Numbers always beat qualifiers: 1.0.1 > 1.0-alpha, 1.1 > 1-sp.
        (Token::Num(_), Token::Qual(_)) => Ordering::Greater,
        (Token::Qual(_), Token::Num(_)) => Ordering::Less,
        (Token::Qual(qa), Token::Qual(qb)) => {
            let (ra, rb) = (qualifier_rank(qa), qualifier_rank(qb));
            ra.cmp(&rb).then_with(|| {
                if ra == 8 {
                    qa.cmp(qb)
                } else {
                    Ordering::Equal
                }
            })
        }
    }
}

/// Compare a leftover token against the implicit padding of the shorter
/// version ("1.0" is padded when compared to "1.0-alpha").
fn compare_to_padding(t: &Token) -> Ordering {
    match t {
        Token::Num(0) => Ordering::Equal,
        Token::Num(_) => Ordering::Greater,
        Token::Qual(q) => qualifier_rank(q).cmp(&RELEASE_RANK),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmp(a: &str, b: &str) -> Ordering {
        compare(a, b).unwrap()
    }

    #[test]
    fn release_ordering() {
        assert_eq!(cmp("1.0", "1.0"), Ordering::Equal);
        assert_eq!(cmp("1.0", "1.1"), Ordering::Less);
        assert_eq!(cmp("1.0.0", "1.0"), Ordering::Equal);
        assert_eq!(cmp("2.14.0", "2.15.0"), Ordering::Less);
    }

    #[test]
    fn qualifier_chain() {
        assert_eq!(cmp("1.0-alpha", "1.0-beta"), Ordering::Less);
        assert_eq!(cmp("1.0-beta", "1.0-milestone"), Ordering::Less);
        assert_eq!(cmp("1.0-milestone", "1.0-rc"), Ordering::Less);
        assert_eq!(cmp("1.0-rc", "1.0-snapshot"), Ordering::Less);
        assert_eq!(cmp("1.0-snapshot", "1.0"), Ordering::Less);
        assert_eq!(cmp("1.0", "1.0-sp"), Ordering::Less);
    }

    #[test]
    fn qualifier_aliases() {
        assert_eq!(cmp("1.0-rc1", "1.0-cr1"), Ordering::Equal);
        assert_eq!(cmp("1.0", "1.0-ga"), Ordering::Equal);
        assert_eq!(cmp("1.0", "1.0.final"), Ordering::Equal);
        assert_eq!(cmp("1.0-a1", "1.0-alpha1"), Ordering::Equal);
    }

    #[test]
    fn numbers_beat_qualifiers() {
        assert_eq!(cmp("1.0.1", "1.0-alpha"), Ordering::Greater);
        assert_eq!(cmp("1.0-1", "1.0-alpha"), Ordering::Greater);
    }

    #[test]
    fn unknown_qualifiers_sort_after_release() {
        assert_eq!(cmp("1.0-xyz", "1.0"), Ordering::Greater);
        assert_eq!(cmp("1.0-abc", "1.0-xyz"), Ordering::Less);
    }

    #[test]
    fn embedded_transitions() {
        // "1.0alpha1" tokenizes as 1 . 0 . alpha . 1
        assert_eq!(cmp("1.0alpha1", "1.0-alpha-1"), Ordering::Equal);
        assert_eq!(cmp("2.4.1b07", "2.4.1b08"), Ordering::Less);
    }

    #[test]
    fn log4j_corpus() {
        assert_eq!(cmp("2.14.1", "2.15.0"), Ordering::Less);
        assert_eq!(cmp("2.16.0", "2.15.0"), Ordering::Greater);
        assert_eq!(cmp("2.0-beta9", "2.0"), Ordering::Less);
    }

    #[test]
    fn malformed_rejected() {
        assert!(compare("", "1.0").is_err());
        assert!(compare("...", "1.0").is_err());
    }
}
