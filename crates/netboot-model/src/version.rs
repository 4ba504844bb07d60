// SPDX-License-Identifier: Apache-2.0

//! Ordering over distribution version strings.
//!
//! Versions that parse as semantic versions (an optional leading `v`, one to
//! three numeric components, optional pre-release and build suffixes) compare
//! by semver precedence. A parseable version always sorts above one that is
//! not, and two unparseable versions tie. [`compare_versions`] breaks any
//! remaining tie with a plain string comparison so the order is total.

use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq)]
struct SemVer<'a> {
    major: &'a str,
    minor: &'a str,
    patch: &'a str,
    prerelease: Vec<&'a str>,
}

fn is_numeric(part: &str) -> bool {
    !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit())
}

fn is_canonical_number(part: &str) -> bool {
    is_numeric(part) && (part == "0" || !part.starts_with('0'))
}

fn is_identifier(part: &str) -> bool {
    !part.is_empty()
        && part
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

fn parse_semver(input: &str) -> Option<SemVer<'_>> {
    let body = input.strip_prefix('v').unwrap_or(input);
    let (body, build) = match body.split_once('+') {
        Some((head, build)) => (head, Some(build)),
        None => (body, None),
    };
    let (core, prerelease) = match body.split_once('-') {
        Some((head, pre)) => (head, Some(pre)),
        None => (body, None),
    };

    let parts: Vec<&str> = core.split('.').collect();
    if parts.len() > 3 || !parts.iter().all(|p| is_canonical_number(p)) {
        return None;
    }
    // Shorthand forms (`1`, `1.2`) carry no suffixes.
    if parts.len() < 3 && (prerelease.is_some() || build.is_some()) {
        return None;
    }
    if let Some(build) = build {
        if !build.split('.').all(is_identifier) {
            return None;
        }
    }
    let prerelease = match prerelease {
        Some(pre) => {
            let ids: Vec<&str> = pre.split('.').collect();
            let valid = ids
                .iter()
                .all(|id| is_identifier(id) && (!is_numeric(id) || is_canonical_number(id)));
            if !valid {
                return None;
            }
            ids
        }
        None => Vec::new(),
    };

    Some(SemVer {
        major: parts[0],
        minor: parts.get(1).copied().unwrap_or("0"),
        patch: parts.get(2).copied().unwrap_or("0"),
        prerelease,
    })
}

fn compare_numeric(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn compare_prerelease(a: &[&str], b: &[&str]) -> Ordering {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }
    for (x, y) in a.iter().zip(b.iter()) {
        let ord = match (is_numeric(x), is_numeric(y)) {
            (true, true) => compare_numeric(x, y),
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => x.cmp(y),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

fn compare_semver(a: &SemVer<'_>, b: &SemVer<'_>) -> Ordering {
    compare_numeric(a.major, b.major)
        .then_with(|| compare_numeric(a.minor, b.minor))
        .then_with(|| compare_numeric(a.patch, b.patch))
        .then_with(|| compare_prerelease(&a.prerelease, &b.prerelease))
}

#[must_use]
pub fn is_semver(version: &str) -> bool {
    parse_semver(version).is_some()
}

/// Semver precedence only; unparseable versions sort below parseable ones
/// and tie with each other.
#[must_use]
pub fn semver_precedence(a: &str, b: &str) -> Ordering {
    match (parse_semver(a), parse_semver(b)) {
        (Some(x), Some(y)) => compare_semver(&x, &y),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

/// Total ascending order: semver precedence, then raw string order.
#[must_use]
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    semver_precedence(a, b).then_with(|| a.cmp(b))
}
