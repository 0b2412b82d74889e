// ---------------------------------------------------------------------------
// Gentoo portage version comparison
// ---------------------------------------------------------------------------
//
// PMS ordering: dotted numeric components, an optional trailing letter,
// suffixes `_alpha < _beta < _pre < _rc < (none) < _p` with optional
// numbers, and an `-rN` ebuild revision.

use std::cmp::Ordering;

use vulnsift_types::VersionScheme;

use crate::error::VersionError;

pub(crate) fn compare(a: &str, b: &str) -> Result<Ordering, VersionError> {
    let va = PortageVersion::parse(a)?;
    let vb = PortageVersion::parse(b)?;
    Ok(va.cmp_to(&vb))
}

#[derive(Debug)]
struct PortageVersion {
    components: Vec<u64>,
    letter: Option<char>,
    suffixes: Vec<(i8, u64)>,
    revision: u64,
}

fn suffix_rank(name: &str) -> Option<i8> {
    match name {
        "alpha" => Some(-4),
        "beta" => Some(-3),
        "pre" => Some(-2),
        "rc" => Some(-1),
        "p" => Some(1),
        _ => None,
    }
}

impl PortageVersion {
    fn parse(s: &str) -> Result<Self, VersionError> {
        let err = || VersionError::unparsed(VersionScheme::Portage, s);
        let input = s.trim();
        let bytes = input.as_bytes();
        let mut pos = 0usize;

        let read_digits = |pos: &mut usize| -> Option<u64> {
            let start = *pos;
            while *pos < bytes.len() && bytes[*pos].is_ascii_digit() {
                *pos += 1;
            }
            if *pos == start {
                return None;
            }
            input[start..*pos].parse().ok()
        };

        let mut components = Vec::new();
        components.push(read_digits(&mut pos).ok_or_else(err)?);
        while pos < bytes.len() && bytes[pos] == b'.' {
            pos += 1;
            components.push(read_digits(&mut pos).ok_or_else(err)?);
        }

        let letter = if pos < bytes.len() && bytes[pos].is_ascii_lowercase() {
            let c = bytes[pos] as char;
            pos += 1;
            Some(c)
        } else {
            None
        };

        let mut suffixes = Vec::new();
        while pos < bytes.len() && bytes[pos] == b'_' {
            pos += 1;
            let start = pos;
            while pos < bytes.len() && bytes[pos].is_ascii_lowercase() {
                pos += 1;
            }
            let rank = suffix_rank(&input[start..pos]).ok_or_else(err)?;
            let num = read_digits(&mut pos).unwrap_or(0);
            suffixes.push((rank, num));
        }

        let revision = if pos < bytes.len() && input[pos..].starts_with("-r") {
            pos += 2;
            read_digits(&mut pos).ok_or_else(err)?
        } else {
            0
        };

        if pos != bytes.len() {
            return Err(err());
        }

        Ok(Self {
            components,
            letter,
            suffixes,
            revision,
        })
    }

    fn cmp_to(&self, other: &Self) -> Ordering {
        let max = self.components.len().max(other.components.len());
        for idx in 0..max {
            let a = self.components.get(idx).copied().unwrap_or(0);
            let b = other.components.get(idx).copied().unwrap_or(0);
            if a != b {
                return a.cmp(&b);
            }
        }

        let la = self.letter.map(|c| c as u32).unwrap_or(0);
        let lb = other.letter.map(|c| c as u32).unwrap_or(0);
        if la != lb {
            return la.cmp(&lb);
        }

        let max = self.suffixes.len().max(other.suffixes.len());
        for idx in 0..max {
            let a = self.suffixes.get(idx).copied().unwrap_or((0, 0));
            let b = other.suffixes.get(idx).copied().unwrap_or((0, 0));
            if a != b {
                return a.cmp(&b);
            }
        }

        self.revision.cmp(&other.revision)
    }
}
