// ---------------------------------------------------------------------------
// RPM version comparison
// ---------------------------------------------------------------------------
//
// Implements rpmvercmp over `[epoch:]version[-release]`: alternating digit
// and alpha segments, digits beat alpha, `~` marks a pre-release and `^` a
// post-release snapshot.

use std::cmp::Ordering;

use vulnsift_types::VersionScheme;

use crate::error::VersionError;

pub(crate) fn compare(a: &str, b: &str) -> Result<Ordering, VersionError> {
    let va = RpmVersion::parse(a)?;
    let vb = RpmVersion::parse(b)?;
    Ok(va.cmp_to(&vb))
}

#[derive(Debug)]
struct RpmVersion<'a> {
    epoch: u64,
    version: &'a str,
    release: &'a str,
}

impl<'a> RpmVersion<'a> {
    fn parse(s: &'a str) -> Result<Self, VersionError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(VersionError::unparsed(VersionScheme::Rpm, s));
        }

        let (epoch, rest) = match s.split_once(':') {
            Some((e, rest)) if !e.is_empty() && e.bytes().all(|c| c.is_ascii_digit()) => {
                let epoch = e
                    .parse()
                    .map_err(|_| VersionError::unparsed(VersionScheme::Rpm, s))?;
                (epoch, rest)
            }
            Some(_) => return Err(VersionError::unparsed(VersionScheme::Rpm, s)),
            None => (0, s),
        };

        let (version, release) = match rest.split_once('-') {
            Some((v, r)) => (v, r),
            None => (rest, ""),
        };
        if version.is_empty() {
            return Err(VersionError::unparsed(VersionScheme::Rpm, s));
        }

        Ok(Self {
            epoch,
            version,
            release,
        })
    }

    fn cmp_to(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| rpmvercmp(self.version, other.version))
            .then_with(|| {
                // A missing release compares equal to any release, matching
                // how rpm treats requirement versions without one.
                if self.release.is_empty() || other.release.is_empty() {
                    Ordering::Equal
                } else {
                    rpmvercmp(self.release, other.release)
                }
            })
    }
}

fn is_segment_byte(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'~' || c == b'^'
}

fn rpmvercmp(a: &str, b: &str) -> Ordering {
    let a = a.as_bytes();
    let b = b.as_bytes();
    let (mut i, mut j) = (0usize, 0usize);

    loop {
        while i < a.len() && !is_segment_byte(a[i]) {
            i += 1;
        }
        while j < b.len() && !is_segment_byte(b[j]) {
            j += 1;
        }

        // Tilde: pre-release, sorts before everything including end.
        let a_tilde = a.get(i) == Some(&b'~');
        let b_tilde = b.get(j) == Some(&b'~');
        if a_tilde || b_tilde {
            match (a_tilde, b_tilde) {
                (true, true) => {
                    i += 1;
                    j += 1;
                    continue;
                }
                (true, false) => return Ordering::Less,
                (false, true) => return Ordering::Greater,
                (false, false) => unreachable!(),
            }
        }

        // Caret: newer than the bare version, older than any longer one.
        let a_caret = a.get(i) == Some(&b'^');
        let b_caret = b.get(j) == Some(&b'^');
        if a_caret || b_caret {
            match (a_caret, b_caret) {
                (true, true) => {
                    i += 1;
                    j += 1;
                    continue;
                }
                (true, false) => {
                    return if j >= b.len() {
                        Ordering::Greater
                    } else {
                        Ordering::Less
                    };
                }
                (false, true) => {
                    return if i >= a.len() {
                        Ordering::Less
                    } else {
                        Ordering::Greater
                    };
                }
                (false, false) => unreachable!(),
            }
        }

        if i >= a.len() || j >= b.len() {
            break;
        }

        // Segment type is decided by the first string: a digit run beats an
        // alpha run outright.
        if a[i].is_ascii_digit() {
            if !b[j].is_ascii_digit() {
                return Ordering::Greater;
            }
            while a.get(i) == Some(&b'0') {
                i += 1;
            }
            while b.get(j) == Some(&b'0') {
                j += 1;
            }
            let sa_start = i;
            let sb_start = j;
            while i < a.len() && a[i].is_ascii_digit() {
                i += 1;
            }
            while j < b.len() && b[j].is_ascii_digit() {
                j += 1;
            }
            let sa = &a[sa_start..i];
            let sb = &b[sb_start..j];
            let ord = sa.len().cmp(&sb.len()).then_with(|| sa.cmp(sb));
            if ord != Ordering::Equal {
                return ord;
            }
        } else {
            if b[j].is_ascii_digit() {
                return Ordering::Less;
            }
            let sa_start = i;
            let sb_start = j;
            while i < a.len() && a[i].is_ascii_alphabetic() {
                i += 1;
            }
            while j < b.len() && b[j].is_ascii_alphabetic() {
                j += 1;
            }
            let ord = a[sa_start..i].cmp(&b[sb_start..j]);
            if ord != Ordering::Equal {
                return ord;
            }
        }
    }

    // One string exhausted: the one with a segment left is newer.
    if i < a.len() {
        Ordering::Greater
    } else if j < b.len() {
        Ordering::Less
    } else {
        Ordering::Equal
    }
}
