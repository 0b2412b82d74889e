// ---------------------------------------------------------------------------
// RubyGems version comparison
// ---------------------------------------------------------------------------
//
// Gem::Version semantics: versions split into numeric and alphabetic
// segments; alphabetic segments mark pre-releases and sort before numbers,
// missing segments count as zero.

use std::cmp::Ordering;

use vulnsift_types::VersionScheme;

use crate::error::VersionError;

pub(crate) fn compare(a: &str, b: &str) -> Result<Ordering, VersionError> {
    let sa = segments(a)?;
    let sb = segments(b)?;

    let max = sa.len().max(sb.len());
    for idx in 0..max {
        let zero = Segment::Num(0);
        let ea = sa.get(idx).unwrap_or(&zero);
        let eb = sb.get(idx).unwrap_or(&zero);
        let ord = match (ea, eb) {
            (Segment::Num(na), Segment::Num(nb)) => na.cmp(nb),
            (Segment::Str(xa), Segment::Str(xb)) => xa.cmp(xb),
            // A string segment marks a pre-release: "1.0.a" < "1.0".
            (Segment::Str(_), Segment::Num(_)) => Ordering::Less,
            (Segment::Num(_), Segment::Str(_)) => Ordering::Greater,
        };
        if ord != Ordering::Equal {
            return Ok(ord);
        }
    }
    Ok(Ordering::Equal)
}

#[derive(Debug, PartialEq)]
enum Segment {
    Num(u64),
    Str(String),
}

fn segments(s: &str) -> Result<Vec<Segment>, VersionError> {
    let trimmed = s.trim();
    if trimmed.is_empty()
        || !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        return Err(VersionError::unparsed(VersionScheme::Gem, s));
    }

    // Gem scans alternating digit/alpha runs: "1.0.beta2" and "1.0-beta2"
    // both yield [1, 0, "beta", 2].
    let mut out = Vec::new();
    let mut current = String::new();
    let mut is_digit = false;
    let mut flush = |current: &mut String, is_digit: bool, out: &mut Vec<Segment>| {
        if current.is_empty() {
            return;
        }
        if is_digit {
            match current.parse() {
                Ok(n) => out.push(Segment::Num(n)),
                Err(_) => out.push(Segment::Str(current.clone())),
            }
        } else {
            out.push(Segment::Str(current.clone()));
        }
        current.clear();
    };

    for c in trimmed.to_ascii_lowercase().chars() {
        if c == '.' || c == '-' {
            flush(&mut current, is_digit, &mut out);
        } else if c.is_ascii_digit() {
            if !current.is_empty() && !is_digit {
                flush(&mut current, false, &mut out);
            }
            is_digit = true;
            current.push(c);
        } else {
            if !current.is_empty() && is_digit {
                flush(&mut current, true, &mut out);
            }
            is_digit = false;
            current.push(c);
        }
    }
    flush(&mut current, is_digit, &mut out);

    if out.is_empty() {
        return Err(VersionError::unparsed(VersionScheme::Gem, s));
    }
    Ok(out)
}
