// SPDX-License-Identifier: GPL-3.0-or-later

//! Generic filter match/except checks run before duplicate detection.
//!
//! Comma separated lists match case-insensitively. Items containing `*` or
//! `?` are wildcards; plain items are exact matches, except for release names
//! where they match as substrings. With `use_regex` each release-name item is
//! compiled as `(?i)(?:item)`; an item that does not compile never matches.

use lazy_static::lazy_static;
use moka::sync::Cache;
use regex::Regex;
use sievarr_domain::{Filter, Release};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SizeError {
    #[error("invalid size: {0:?}")]
    Invalid(String),
}

lazy_static! {
    static ref REGEX_CACHE: Cache<String, Option<Regex>> = Cache::new(1024);
    static ref SIZE_REGEX: Regex =
        Regex::new(r"(?i)^\s*(?P<value>\d+(?:\.\d+)?)\s*(?P<unit>[kmgt]i?b|b)?\s*$")
            .expect("valid size regex");
}

/// Run every configured criterion and return the rejection reasons. An empty
/// result means the release passes.
pub fn check_filter(filter: &Filter, release: &Release) -> Vec<String> {
    let mut rejections = Vec::new();

    if filter.freeleech && !release.freeleech {
        rejections.push("wanted: freeleech".to_string());
    }

    if !filter.shows.is_empty() && !contains(&release.title, &filter.shows) {
        rejections.push(format!(
            "shows not matching. got: {} want: {}",
            release.title, filter.shows
        ));
    }

    if !filter.seasons.is_empty() && !contains_int_strings(release.season, &filter.seasons) {
        rejections.push(format!(
            "season not matching. got: {} want: {}",
            release.season, filter.seasons
        ));
    }

    if !filter.episodes.is_empty() && !contains_int_strings(release.episode, &filter.episodes) {
        rejections.push(format!(
            "episodes not matching. got: {} want: {}",
            release.episode, filter.episodes
        ));
    }

    if filter.use_regex {
        if !filter.match_releases.is_empty()
            && !match_regex(&release.release_name, &filter.match_releases)
        {
            rejections.push(format!(
                "match release regex not matching. got: {} want: {}",
                release.release_name, filter.match_releases
            ));
        }
        if !filter.except_releases.is_empty()
            && match_regex(&release.release_name, &filter.except_releases)
        {
            rejections.push(format!(
                "except releases regex unwanted. got: {} unwanted: {}",
                release.release_name, filter.except_releases
            ));
        }
    } else {
        if !filter.match_releases.is_empty()
            && !contains_fuzzy(&release.release_name, &filter.match_releases)
        {
            rejections.push(format!(
                "match release not matching. got: {} want: {}",
                release.release_name, filter.match_releases
            ));
        }
        if !filter.except_releases.is_empty()
            && contains_fuzzy(&release.release_name, &filter.except_releases)
        {
            rejections.push(format!(
                "except releases unwanted. got: {} unwanted: {}",
                release.release_name, filter.except_releases
            ));
        }
    }

    if !filter.match_release_groups.is_empty()
        && !contains(&release.group, &filter.match_release_groups)
    {
        rejections.push(format!(
            "release groups not matching. got: {} want: {}",
            release.group, filter.match_release_groups
        ));
    }

    if !filter.except_release_groups.is_empty()
        && contains(&release.group, &filter.except_release_groups)
    {
        rejections.push(format!(
            "release group unwanted. got: {} unwanted: {}",
            release.group, filter.except_release_groups
        ));
    }

    if !filter.match_uploaders.is_empty() && !contains(&release.uploader, &filter.match_uploaders)
    {
        rejections.push(format!(
            "uploaders not matching. got: {} want: {}",
            release.uploader, filter.match_uploaders
        ));
    }

    if !filter.except_uploaders.is_empty() && contains(&release.uploader, &filter.except_uploaders)
    {
        rejections.push(format!(
            "uploaders unwanted. got: {} unwanted: {}",
            release.uploader, filter.except_uploaders
        ));
    }

    if !filter.match_language.is_empty()
        && !slice_contains_slice(&release.language, &filter.match_language)
    {
        rejections.push(format!(
            "language not matching. got: {} want: {}",
            release.language.join(","),
            filter.match_language.join(",")
        ));
    }

    if !filter.except_language.is_empty()
        && slice_contains_slice(&release.language, &filter.except_language)
    {
        rejections.push(format!(
            "language unwanted. got: {} unwanted: {}",
            release.language.join(","),
            filter.except_language.join(",")
        ));
    }

    if !filter.resolutions.is_empty()
        && !slice_contains_slice(std::slice::from_ref(&release.resolution), &filter.resolutions)
    {
        rejections.push(format!(
            "resolution not matching. got: {} want: {}",
            release.resolution,
            filter.resolutions.join(",")
        ));
    }

    if !filter.codecs.is_empty() && !slice_contains_slice(&release.codec, &filter.codecs) {
        rejections.push(format!(
            "codec not matching. got: {} want: {}",
            release.codec.join(","),
            filter.codecs.join(",")
        ));
    }

    if !filter.sources.is_empty()
        && !slice_contains_slice(std::slice::from_ref(&release.source), &filter.sources)
    {
        rejections.push(format!(
            "source not matching. got: {} want: {}",
            release.source,
            filter.sources.join(",")
        ));
    }

    if !filter.containers.is_empty()
        && !slice_contains_slice(std::slice::from_ref(&release.container), &filter.containers)
    {
        rejections.push(format!(
            "container not matching. got: {} want: {}",
            release.container,
            filter.containers.join(",")
        ));
    }

    if !filter.match_hdr.is_empty() && !slice_contains_slice(&release.hdr, &filter.match_hdr) {
        rejections.push(format!(
            "hdr not matching. got: {} want: {}",
            release.hdr.join(","),
            filter.match_hdr.join(",")
        ));
    }

    if !filter.except_hdr.is_empty() && slice_contains_slice(&release.hdr, &filter.except_hdr) {
        rejections.push(format!(
            "hdr unwanted. got: {} unwanted: {}",
            release.hdr.join(","),
            filter.except_hdr.join(",")
        ));
    }

    if !filter.years.is_empty() && !contains_int_strings(release.year, &filter.years) {
        rejections.push(format!(
            "year not matching. got: {} want: {}",
            release.year, filter.years
        ));
    }

    if !filter.months.is_empty() && !contains_int_strings(release.month, &filter.months) {
        rejections.push(format!(
            "month not matching. got: {} want: {}",
            release.month, filter.months
        ));
    }

    if !filter.days.is_empty() && !contains_int_strings(release.day, &filter.days) {
        rejections.push(format!(
            "day not matching. got: {} want: {}",
            release.day, filter.days
        ));
    }

    let categories = release_categories(release);
    if !filter.match_categories.is_empty() && !contains_any(&categories, &filter.match_categories)
    {
        rejections.push(format!(
            "category not matching. got: {} want: {}",
            categories.join(","),
            filter.match_categories
        ));
    }

    if !filter.except_categories.is_empty()
        && contains_any(&categories, &filter.except_categories)
    {
        rejections.push(format!(
            "category unwanted. got: {} unwanted: {}",
            categories.join(","),
            filter.except_categories
        ));
    }

    if let Some(reason) = check_size(filter, release) {
        rejections.push(reason);
    }

    if !filter.tags.is_empty() && !contains_any(&release.tags, &filter.tags) {
        rejections.push(format!(
            "tags not matching. got: {} want: {}",
            release.tags.join(","),
            filter.tags
        ));
    }

    if !filter.except_tags.is_empty() && contains_any(&release.tags, &filter.except_tags) {
        rejections.push(format!(
            "tags unwanted. got: {} unwanted: {}",
            release.tags.join(","),
            filter.except_tags
        ));
    }

    rejections
}

fn release_categories(release: &Release) -> Vec<String> {
    let mut categories = release.categories.clone();
    if !release.category.is_empty() && !categories.contains(&release.category) {
        categories.push(release.category.clone());
    }
    categories
}

// ----------------------------------------------------------------------------
// Size
// ----------------------------------------------------------------------------

/// Unknown size (0) always passes; the action side re-checks once known.
fn check_size(filter: &Filter, release: &Release) -> Option<String> {
    if filter.min_size.is_empty() && filter.max_size.is_empty() {
        return None;
    }
    if release.size == 0 {
        return None;
    }

    let bounds = (|| -> Result<(Option<u64>, Option<u64>), SizeError> {
        let min = (!filter.min_size.is_empty())
            .then(|| parse_size(&filter.min_size))
            .transpose()?;
        let max = (!filter.max_size.is_empty())
            .then(|| parse_size(&filter.max_size))
            .transpose()?;
        Ok((min, max))
    })();

    match bounds {
        Err(err) => Some(format!(
            "size: error checking release size against filter: {}",
            err
        )),
        Ok((min, max)) => {
            let too_small = min.is_some_and(|min| release.size < min);
            let too_big = max.is_some_and(|max| release.size > max);
            (too_small || too_big).then(|| {
                format!(
                    "size not matching. got: {} want min: {} max: {}",
                    release.size, filter.min_size, filter.max_size
                )
            })
        }
    }
}

/// Parse `"1.5 GB"`, `"700MiB"` or a bare byte count.
pub fn parse_size(input: &str) -> Result<u64, SizeError> {
    let caps = SIZE_REGEX
        .captures(input)
        .ok_or_else(|| SizeError::Invalid(input.to_string()))?;
    let value: f64 = caps
        .name("value")
        .and_then(|m| m.as_str().parse().ok())
        .ok_or_else(|| SizeError::Invalid(input.to_string()))?;
    let unit = caps
        .name("unit")
        .map(|m| m.as_str().to_lowercase())
        .unwrap_or_else(|| "b".to_string());

    let multiplier: f64 = match unit.as_str() {
        "b" => 1.0,
        "kb" => 1e3,
        "mb" => 1e6,
        "gb" => 1e9,
        "tb" => 1e12,
        "kib" => 1024.0,
        "mib" => 1024.0 * 1024.0,
        "gib" => 1024.0 * 1024.0 * 1024.0,
        "tib" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        _ => return Err(SizeError::Invalid(input.to_string())),
    };
    Ok((value * multiplier).round() as u64)
}

// ----------------------------------------------------------------------------
// List matching
// ----------------------------------------------------------------------------

fn split_list(list: &str) -> impl Iterator<Item = String> + '_ {
    list.split(',')
        .map(|item| item.trim().to_lowercase())
        .filter(|item| !item.is_empty())
}

fn is_wildcard(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

/// Exact (or wildcard) match of a single value against a comma list.
fn contains(value: &str, list: &str) -> bool {
    contains_any(std::slice::from_ref(&value.to_string()), list)
}

/// Any of `values` exactly (or by wildcard) in the comma list.
fn contains_any(values: &[String], list: &str) -> bool {
    let patterns: Vec<String> = split_list(list).collect();
    values
        .iter()
        .filter(|v| !v.is_empty())
        .map(|v| v.to_lowercase())
        .any(|value| {
            patterns.iter().any(|pattern| {
                if is_wildcard(pattern) {
                    wildcard_match(pattern, &value)
                } else {
                    *pattern == value
                }
            })
        })
}

/// Like [`contains`], but plain items match as substrings.
fn contains_fuzzy(value: &str, list: &str) -> bool {
    if value.is_empty() {
        return false;
    }
    let value = value.to_lowercase();
    split_list(list).any(|pattern| {
        if is_wildcard(&pattern) {
            wildcard_match(&pattern, &value)
        } else {
            value.contains(&pattern)
        }
    })
}

/// Any overlap between two lists, compared case-insensitively.
fn slice_contains_slice(values: &[String], wanted: &[String]) -> bool {
    values.iter().filter(|v| !v.is_empty()).any(|value| {
        wanted
            .iter()
            .any(|w| !w.is_empty() && w.eq_ignore_ascii_case(value))
    })
}

/// `"1,3-5,8"` style lists. Malformed items never match.
pub fn contains_int_strings(value: u32, list: &str) -> bool {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .any(|item| match item.split_once('-') {
            Some((min, max)) => match (min.trim().parse::<u32>(), max.trim().parse::<u32>()) {
                (Ok(min), Ok(max)) if min <= max => (min..=max).contains(&value),
                _ => false,
            },
            None => item.parse::<u32>().is_ok_and(|n| n == value),
        })
}

/// Glob match where `*` is any run and `?` a single character.
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut mark = 0usize;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some(pi);
            mark = ti;
            pi += 1;
        } else if let Some(s) = star {
            pi = s + 1;
            mark += 1;
            ti = mark;
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

/// Comma separated regex list; commas inside brackets or quotes do not split.
fn split_patterns(list: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut quoted = false;

    for c in list.chars() {
        match c {
            '"' => quoted = !quoted,
            '(' | '[' | '{' if !quoted => depth += 1,
            ')' | ']' | '}' if !quoted => depth -= 1,
            ',' if depth <= 0 && !quoted => {
                out.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    out.push(current);
    out.into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn compiled(pattern: &str) -> Option<Regex> {
    REGEX_CACHE.get_with(pattern.to_string(), || {
        match Regex::new(&format!("(?i)(?:{})", pattern)) {
            Ok(re) => Some(re),
            Err(err) => {
                debug!(target: "matching", pattern, error = %err, "invalid filter regex");
                None
            }
        }
    })
}

fn match_regex(value: &str, list: &str) -> bool {
    if value.is_empty() {
        return false;
    }
    split_patterns(list)
        .iter()
        .any(|pattern| compiled(pattern).is_some_and(|re| re.is_match(value)))
}
