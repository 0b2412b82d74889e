// ---------------------------------------------------------------------------
// Debian version comparison
// ---------------------------------------------------------------------------
//
// Implements dpkg's ordering for `[epoch:]upstream[-revision]`: epochs are
// compared numerically, upstream and revision with dpkg's character
// classing, where `~` sorts before the empty string and letters sort before
// every other non-digit.

use std::cmp::Ordering;

use vulnsift_types::VersionScheme;

use crate::error::VersionError;

pub(crate) fn compare(a: &str, b: &str) -> Result<Ordering, VersionError> {
    let va = DebVersion::parse(a)?;
    let vb = DebVersion::parse(b)?;
    Ok(va.cmp_to(&vb))
}

#[derive(Debug)]
struct DebVersion<'a> {
    epoch: u64,
    upstream: &'a str,
    revision: &'a str,
}

impl<'a> DebVersion<'a> {
    fn parse(s: &'a str) -> Result<Self, VersionError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(VersionError::unparsed(VersionScheme::Deb, s));
        }

        let (epoch, rest) = match s.split_once(':') {
            Some((e, rest)) if !e.is_empty() && e.bytes().all(|c| c.is_ascii_digit()) => {
                let epoch = e
                    .parse()
                    .map_err(|_| VersionError::unparsed(VersionScheme::Deb, s))?;
                (epoch, rest)
            }
            Some(_) => return Err(VersionError::unparsed(VersionScheme::Deb, s)),
            None => (0, s),
        };

        // The revision starts at the last hyphen; a version without one has
        // an empty revision.
        let (upstream, revision) = match rest.rsplit_once('-') {
            Some((up, rev)) => (up, rev),
            None => (rest, ""),
        };
        if upstream.is_empty() {
            return Err(VersionError::unparsed(VersionScheme::Deb, s));
        }

        Ok(Self {
            epoch,
            upstream,
            revision,
        })
    }

    fn cmp_to(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| verrevcmp(self.upstream, other.upstream))
            .then_with(|| verrevcmp(self.revision, other.revision))
    }
}

/// dpkg's character weight: digits are segment breaks (weight 0 alongside
/// end-of-string), `~` sorts before everything, letters before other bytes.
fn weight(c: Option<u8>) -> i32 {
    match c {
        None => 0,
        Some(b'~') => -1,
        Some(c) if c.is_ascii_digit() => 0,
        Some(c) if c.is_ascii_alphabetic() => c as i32,
        Some(c) => c as i32 + 256,
    }
}

fn verrevcmp(a: &str, b: &str) -> Ordering {
    let a = a.as_bytes();
    let b = b.as_bytes();
    let (mut i, mut j) = (0usize, 0usize);

    while i < a.len() || j < b.len() {
        // Non-digit run.
        while (i < a.len() && !a[i].is_ascii_digit()) || (j < b.len() && !b[j].is_ascii_digit()) {
            let wa = weight(a.get(i).copied());
            let wb = weight(b.get(j).copied());
            if wa != wb {
                return wa.cmp(&wb);
            }
            i += 1;
            j += 1;
        }

        // Digit run, compared numerically via leading-zero skip + first
        // differing digit + length.
        while a.get(i) == Some(&b'0') {
            i += 1;
        }
        while b.get(j) == Some(&b'0') {
            j += 1;
        }
        let mut first_diff = Ordering::Equal;
        while i < a.len() && j < b.len() && a[i].is_ascii_digit() && b[j].is_ascii_digit() {
            if first_diff == Ordering::Equal {
                first_diff = a[i].cmp(&b[j]);
            }
            i += 1;
            j += 1;
        }
        if i < a.len() && a[i].is_ascii_digit() {
            return Ordering::Greater;
        }
        if j < b.len() && b[j].is_ascii_digit() {
            return Ordering::Less;
        }
        if first_diff != Ordering::Equal {
            return first_diff;
        }
    }

    Ordering::Equal
}
