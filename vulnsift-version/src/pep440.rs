// ---------------------------------------------------------------------------
// PEP 440 version comparison
// ---------------------------------------------------------------------------
//
// Parses the normal form `[N!]release[{a|b|rc}N][.postN][.devN][+local]`.
// The local segment is ignored for ordering. Ordering key follows the
// reference implementation: a dev release of X sorts before any pre-release
// of X, which sorts before X itself, which sorts before its post-releases.

use std::cmp::Ordering;

use vulnsift_types::VersionScheme;

use crate::error::VersionError;

pub(crate) fn compare(a: &str, b: &str) -> Result<Ordering, VersionError> {
    let va = Pep440Version::parse(a)?;
    let vb = Pep440Version::parse(b)?;
    Ok(va.key().cmp(&vb.key()))
}

#[derive(Debug)]
struct Pep440Version {
    epoch: u64,
    release: Vec<u64>,
    pre: Option<(u8, u64)>,
    post: Option<u64>,
    dev: Option<u64>,
}

#[derive(Debug, Clone)]
enum Token {
    Num(u64),
    Word(String),
}

fn lex(s: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = s.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c == '.' || c == '-' || c == '_' {
            chars.next();
        } else if c.is_ascii_digit() {
            let mut num = String::new();
            while let Some(&d) = chars.peek() {
                if d.is_ascii_digit() {
                    num.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            match num.parse() {
                Ok(n) => tokens.push(Token::Num(n)),
                Err(_) => tokens.push(Token::Word(num)),
            }
        } else {
            let mut word = String::new();
            while let Some(&d) = chars.peek() {
                if d.is_ascii_alphabetic() {
                    word.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            if word.is_empty() {
                // Not a digit, letter, or separator.
                tokens.push(Token::Word(c.to_string()));
                chars.next();
            } else {
                tokens.push(Token::Word(word));
            }
        }
    }
    tokens
}

fn pre_rank(word: &str) -> Option<u8> {
    match word {
        "a" | "alpha" => Some(0),
        "b" | "beta" => Some(1),
        "c" | "rc" | "pre" | "preview" => Some(2),
        _ => None,
    }
}

impl Pep440Version {
    fn parse(s: &str) -> Result<Self, VersionError> {
        let err = || VersionError::unparsed(VersionScheme::Pep440, s);
        let lowered = s.trim().to_ascii_lowercase();
        let bare = lowered.strip_prefix('v').unwrap_or(&lowered);
        // The local version label never participates in ordering.
        let bare = bare.split('+').next().unwrap_or(bare);

        let (epoch, rest) = match bare.split_once('!') {
            Some((e, rest)) => (e.parse().map_err(|_| err())?, rest),
            None => (0, bare),
        };

        let tokens = lex(rest);
        if tokens.is_empty() {
            return Err(err());
        }

        let mut release = Vec::new();
        let mut pre = None;
        let mut post = None;
        let mut dev = None;

        let mut iter = tokens.into_iter().peekable();
        while let Some(Token::Num(_)) = iter.peek() {
            if let Some(Token::Num(n)) = iter.next() {
                release.push(n);
            }
        }
        if release.is_empty() {
            return Err(err());
        }

        while let Some(token) = iter.next() {
            let word = match token {
                Token::Word(w) => w,
                Token::Num(_) => return Err(err()),
            };
            let num = match iter.peek() {
                Some(Token::Num(_)) => match iter.next() {
                    Some(Token::Num(n)) => n,
                    _ => 0,
                },
                _ => 0,
            };
            if let Some(rank) = pre_rank(&word) {
                if pre.is_some() {
                    return Err(err());
                }
                pre = Some((rank, num));
            } else if word == "post" || word == "rev" || word == "r" {
                if post.is_some() {
                    return Err(err());
                }
                post = Some(num);
            } else if word == "dev" {
                if dev.is_some() {
                    return Err(err());
                }
                dev = Some(num);
            } else {
                return Err(err());
            }
        }

        Ok(Self {
            epoch,
            release,
            pre,
            post,
            dev,
        })
    }

    /// Ordering key, mirroring packaging's `_cmpkey`: a bare dev release
    /// sorts before any pre-release, and absence of a pre-release otherwise
    /// sorts after every pre-release.
    #[allow(clippy::type_complexity)]
    fn key(&self) -> (u64, Vec<u64>, (u8, u8, u64), (u8, u64), (u8, u64)) {
        let mut release = self.release.clone();
        while release.len() > 1 && release.last() == Some(&0) {
            release.pop();
        }
        let pre_key = match (self.pre, self.post, self.dev) {
            (Some((rank, n)), _, _) => (1, rank, n),
            (None, None, Some(_)) => (0, 0, 0),
            (None, _, _) => (2, 0, 0),
        };
        let post_key = match self.post {
            Some(n) => (1, n),
            None => (0, 0),
        };
        let dev_key = match self.dev {
            Some(n) => (0, n),
            None => (1, 0),
        };
        (self.epoch, release, pre_key, post_key, dev_key)
    }
}
