// ---------------------------------------------------------------------------
// Fuzzy version comparison
// ---------------------------------------------------------------------------
//
// Lenient last-resort ordering for records with no declared scheme: split on
// `.`, `-`, `_`, compare segments numerically when both parse, fall back to
// lexicographic. Trailing zero segments do not affect ordering, so
// "1.2" == "1.2.0".

use std::cmp::Ordering;

use vulnsift_types::VersionScheme;

use crate::error::VersionError;

pub(crate) fn compare(a: &str, b: &str) -> Result<Ordering, VersionError> {
    let seg_a = split(a);
    let seg_b = split(b);
    if seg_a.is_empty() {
        return Err(VersionError::unparsed(VersionScheme::Fuzzy, a));
    }
    if seg_b.is_empty() {
        return Err(VersionError::unparsed(VersionScheme::Fuzzy, b));
    }

    for (sa, sb) in seg_a.iter().zip(seg_b.iter()) {
        let ord = compare_segments(sa, sb);
        if ord != Ordering::Equal {
            return Ok(ord);
        }
    }

    // Compare remaining segments of the longer version against "0" so that
    // trailing .0 segments compare equal.
    let (longer, flip) = if seg_a.len() > seg_b.len() {
        (&seg_a[seg_b.len()..], false)
    } else {
        (&seg_b[seg_a.len()..], true)
    };
    for seg in longer {
        let ord = compare_segments(seg, "0");
        if ord != Ordering::Equal {
            return Ok(if flip { ord.reverse() } else { ord });
        }
    }

    Ok(Ordering::Equal)
}

fn split(v: &str) -> Vec<&str> {
    v.trim()
        .split(['.', '-', '_'])
        .filter(|s| !s.is_empty())
        .collect()
}

fn compare_segments(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(na), Ok(nb)) => na.cmp(&nb),
        _ => a.cmp(b),
    }
}
