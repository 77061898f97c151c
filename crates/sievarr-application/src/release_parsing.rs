// SPDX-License-Identifier: GPL-3.0-or-later

//! Reference release-name tokenizer.
//!
//! Turns a raw announce name such as
//! `The.Best.Show.2020.S04E10.1080p.AMZN.WEB-DL.DDP5.1.H.264-GROUP` into a
//! structured [`Release`]. Title tokens run until the first anchor (year,
//! episode marker, resolution, source or codec); descriptive tags such as HDR,
//! audio, language and edition are only recognised after that point so words
//! in a title are not mistaken for tags.

use lazy_static::lazy_static;
use regex::Regex;
use sievarr_domain::Release;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("release name is empty")]
    Empty,
}

/// Parse a release name, rejecting blank input.
pub fn try_parse_release_name(name: &str) -> Result<Release, ParseError> {
    if name.trim().is_empty() {
        return Err(ParseError::Empty);
    }
    Ok(parse_release_name(name))
}

pub fn parse_release_name(name: &str) -> Release {
    let mut release = Release::new(name);
    let trimmed = name.trim();

    let (body, group) = split_group(trimmed);
    release.group = group.unwrap_or_default();

    let tokens = tokenize(body);
    let mut tagged = vec![false; tokens.len()];
    let mut title_end: Option<usize> = None;
    let mut episode_marker: Option<usize> = None;
    let mut editions: Vec<&'static str> = Vec::new();

    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i];
        let lower = token.to_lowercase();

        // Anchors: these end the title wherever they appear.
        if let Some(caps) = SEASON_EPISODE_REGEX.captures(token) {
            release.season = capture_u32(&caps, "season");
            release.episode = capture_u32(&caps, "episode");
            anchor(&mut title_end, &mut tagged, i);
            episode_marker = Some(i);
            i += 1;
            continue;
        }

        if i > 0 && is_year(token) {
            if tokens.get(i + 1).is_some_and(|next| is_year(next)) {
                // "Blade.Runner.2049.2017": the first number belongs to the title.
                i += 1;
                continue;
            }
            release.year = token.parse().unwrap_or(0);
            anchor(&mut title_end, &mut tagged, i);

            if let (Some(month), Some(day)) = (
                tokens.get(i + 1).and_then(|t| two_digit_in(t, 1, 12)),
                tokens.get(i + 2).and_then(|t| two_digit_in(t, 1, 31)),
            ) {
                release.month = month;
                release.day = day;
                tagged[i + 1] = true;
                tagged[i + 2] = true;
                episode_marker = Some(i + 2);
                i += 3;
                continue;
            }
            i += 1;
            continue;
        }

        if let Some(resolution) = canonical_resolution(&lower) {
            release.resolution = resolution;
            anchor(&mut title_end, &mut tagged, i);
            i += 1;
            continue;
        }

        if lower == "uhd"
            && tokens
                .get(i + 1)
                .is_some_and(|next| matches!(next.to_lowercase().as_str(), "bluray" | "blu-ray"))
        {
            release.source = "UHD.BluRay".to_string();
            anchor(&mut title_end, &mut tagged, i);
            tagged[i + 1] = true;
            i += 2;
            continue;
        }

        if let Some(source) = canonical_source(&lower) {
            if source == "REMUX" && !release.source.is_empty() {
                push_unique(&mut release.other, "REMUX");
            } else if release.source.is_empty() || release.source == "REMUX" {
                if release.source == "REMUX" {
                    push_unique(&mut release.other, "REMUX");
                }
                release.source = source.to_string();
            }
            anchor(&mut title_end, &mut tagged, i);
            i += 1;
            continue;
        }

        if let Some(codec) = canonical_codec(&lower) {
            push_unique(&mut release.codec, codec);
            anchor(&mut title_end, &mut tagged, i);
            i += 1;
            continue;
        }

        if title_end.is_none() {
            i += 1;
            continue;
        }

        // Descriptive tags, only after the title.
        if lower == "uhd" {
            if release.resolution.is_empty() {
                release.resolution = "2160p".to_string();
            }
            tagged[i] = true;
        } else if lower == "sdr" {
            tagged[i] = true;
        } else if let Some(hdr) = canonical_hdr(&lower) {
            push_unique(&mut release.hdr, hdr);
            tagged[i] = true;
        } else if CHANNELS_REGEX.is_match(token) {
            push_unique(&mut release.audio, token);
            tagged[i] = true;
        } else if let Some(audio) = canonical_audio(&lower) {
            push_unique(&mut release.audio, audio);
            tagged[i] = true;
        } else if let Some((audio, channels)) = split_audio_channels(token) {
            push_unique(&mut release.audio, audio);
            push_unique(&mut release.audio, channels);
            tagged[i] = true;
        } else if let Some(website) = canonical_website(token) {
            release.website = website.to_string();
            tagged[i] = true;
        } else if let Some(language) = canonical_language(token) {
            push_unique(&mut release.language, language);
            tagged[i] = true;
        } else if lower == "directors"
            && tokens
                .get(i + 1)
                .is_some_and(|next| next.eq_ignore_ascii_case("cut"))
        {
            editions.push("Directors Cut");
            tagged[i] = true;
            tagged[i + 1] = true;
            i += 2;
            continue;
        } else if let Some(edition) = canonical_edition(&lower) {
            editions.push(edition);
            tagged[i] = true;
        } else if lower == "proper" {
            release.proper = true;
            tagged[i] = true;
        } else if lower == "repack" || lower == "rerip" {
            release.repack = true;
            tagged[i] = true;
        } else if lower == "hybrid" {
            release.hybrid = true;
            tagged[i] = true;
        } else if let Some(container) = canonical_container(&lower) {
            release.container = container.to_string();
            tagged[i] = true;
        } else if let Some(other) = canonical_other(&lower) {
            push_unique(&mut release.other, other);
            tagged[i] = true;
        }

        i += 1;
    }

    let title_end = title_end.unwrap_or(tokens.len());
    release.title = tokens[..title_end].join(" ");

    if let Some(marker) = episode_marker {
        release.sub_title = tokens
            .iter()
            .zip(tagged.iter())
            .skip(marker + 1)
            .take_while(|(_, is_tag)| !**is_tag)
            .map(|(token, _)| *token)
            .collect::<Vec<_>>()
            .join(" ");
    }

    release.edition = editions.join(" ");
    release
}

// ----------------------------------------------------------------------------
// Tokenizing
// ----------------------------------------------------------------------------

lazy_static! {
    // Compound tokens first so "H.264", "DTS-HD.MA" and "DD5.1" survive the dot split.
    static ref TOKEN_REGEX: Regex =
        Regex::new(r"(?i)h\.26[45]|dts-hd\.ma|[a-z+\-]*\d\.\d|[^.\s_]+").expect("valid token regex");
    static ref GROUP_REGEX: Regex =
        Regex::new(r"-(?P<group>[A-Za-z0-9][A-Za-z0-9_]*)$").expect("valid group regex");
    static ref SEASON_EPISODE_REGEX: Regex =
        Regex::new(r"(?i)^S(?P<season>\d{1,2})(?:E(?P<episode>\d{1,3}))?$")
            .expect("valid season/episode regex");
    static ref YEAR_REGEX: Regex = Regex::new(r"^(?:19|20)\d{2}$").expect("valid year regex");
    static ref CHANNELS_REGEX: Regex = Regex::new(r"^\d\.\d$").expect("valid channels regex");
    static ref AUDIO_CHANNELS_REGEX: Regex =
        Regex::new(r"^(?P<codec>[A-Za-z][A-Za-z+\-]*?)(?P<channels>\d\.\d)$")
            .expect("valid audio channels regex");
}

/// Hyphenated tags that must not be read as `-GROUP`.
const HYPHENATED_TAGS: &[&str] = &["web-dl", "dts-hd", "dts-x", "blu-ray", "web-rip"];

fn split_group(name: &str) -> (&str, Option<String>) {
    let Some(caps) = GROUP_REGEX.captures(name) else {
        return (name, None);
    };
    let Some(group) = caps.name("group") else {
        return (name, None);
    };
    let body = &name[..group.start() - 1];

    let last_token = body
        .rsplit(|c: char| c == '.' || c == '_' || c.is_whitespace())
        .next()
        .unwrap_or_default();
    let joined = format!("{}-{}", last_token, group.as_str()).to_lowercase();
    if HYPHENATED_TAGS.iter().any(|tag| joined.ends_with(tag)) {
        return (name, None);
    }

    (body, Some(group.as_str().to_string()))
}

fn tokenize(body: &str) -> Vec<&str> {
    TOKEN_REGEX.find_iter(body).map(|m| m.as_str()).collect()
}

fn anchor(title_end: &mut Option<usize>, tagged: &mut [bool], index: usize) {
    if title_end.is_none() {
        *title_end = Some(index);
    }
    tagged[index] = true;
}

fn capture_u32(caps: &regex::Captures<'_>, name: &str) -> u32 {
    caps.name(name)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

fn is_year(token: &str) -> bool {
    YEAR_REGEX.is_match(token)
}

fn two_digit_in(token: &str, min: u32, max: u32) -> Option<u32> {
    if token.len() != 2 {
        return None;
    }
    token
        .parse::<u32>()
        .ok()
        .filter(|value| (min..=max).contains(value))
}

fn push_unique(values: &mut Vec<String>, value: &str) {
    if !values.iter().any(|v| v == value) {
        values.push(value.to_string());
    }
}

// ----------------------------------------------------------------------------
// Token tables
// ----------------------------------------------------------------------------

fn canonical_resolution(lower: &str) -> Option<String> {
    match lower {
        "480p" | "480i" | "576p" | "576i" | "720p" | "1080p" | "1080i" | "1440p" | "2160p" => {
            Some(lower.to_string())
        }
        "4k" => Some("2160p".to_string()),
        _ => None,
    }
}

fn canonical_source(lower: &str) -> Option<&'static str> {
    match lower {
        "bluray" | "blu-ray" | "bdrip" | "brrip" => Some("BluRay"),
        "web-dl" | "webdl" => Some("WEB-DL"),
        "webrip" | "web-rip" => Some("WEBRip"),
        "web" => Some("WEB"),
        "hdtv" => Some("HDTV"),
        "dvdrip" => Some("DVDRip"),
        "remux" => Some("REMUX"),
        _ => None,
    }
}

fn canonical_codec(lower: &str) -> Option<&'static str> {
    match lower {
        "h.264" | "h264" | "avc" => Some("H.264"),
        "h.265" | "h265" | "hevc" => Some("H.265"),
        "x264" => Some("x264"),
        "x265" => Some("x265"),
        "xvid" => Some("XviD"),
        "av1" => Some("AV1"),
        "vp9" => Some("VP9"),
        _ => None,
    }
}

fn canonical_hdr(lower: &str) -> Option<&'static str> {
    match lower {
        "hdr" => Some("HDR"),
        "hdr10" => Some("HDR10"),
        "hdr10+" | "hdr10plus" => Some("HDR10+"),
        "dv" | "dovi" => Some("DV"),
        "hlg" => Some("HLG"),
        _ => None,
    }
}

fn canonical_audio(lower: &str) -> Option<&'static str> {
    match lower {
        "dd" => Some("DD"),
        "ddp" | "dd+" => Some("DDP"),
        "ac3" => Some("AC3"),
        "eac3" => Some("EAC3"),
        "dts" => Some("DTS"),
        "dts-hd" => Some("DTS-HD"),
        "dts-hd.ma" => Some("DTS-HD.MA"),
        "dts-x" => Some("DTS-X"),
        "truehd" => Some("TrueHD"),
        "atmos" => Some("Atmos"),
        "aac" => Some("AAC"),
        "flac" => Some("FLAC"),
        "opus" => Some("OPUS"),
        "lpcm" => Some("LPCM"),
        _ => None,
    }
}

/// `DDP5.1` style tokens carry codec and channel layout together.
fn split_audio_channels(token: &str) -> Option<(&'static str, &str)> {
    let caps = AUDIO_CHANNELS_REGEX.captures(token)?;
    let codec = canonical_audio(&caps.name("codec")?.as_str().to_lowercase())?;
    let channels = caps.name("channels")?.as_str();
    Some((codec, channels))
}

/// Streaming services are matched case-sensitively; `iT` would otherwise
/// swallow the English word.
fn canonical_website(token: &str) -> Option<&'static str> {
    match token {
        "AMZN" => Some("AMZN"),
        "NF" => Some("NF"),
        "HULU" => Some("HULU"),
        "DSNP" => Some("DSNP"),
        "ATVP" => Some("ATVP"),
        "HMAX" => Some("HMAX"),
        "PCOK" => Some("PCOK"),
        "iT" => Some("iT"),
        _ => None,
    }
}

/// Only upper-case tokens count as language tags.
fn canonical_language(token: &str) -> Option<&'static str> {
    if token != token.to_uppercase() {
        return None;
    }
    match token {
        "GER" => Some("GER"),
        "GERMAN" => Some("GERMAN"),
        "FRENCH" => Some("FRENCH"),
        "ITA" | "ITALIAN" => Some("ITALIAN"),
        "SPANISH" => Some("SPANISH"),
        "DUTCH" => Some("DUTCH"),
        "NORDIC" => Some("NORDIC"),
        "SWEDISH" => Some("SWEDISH"),
        "DANISH" => Some("DANISH"),
        "FINNISH" => Some("FINNISH"),
        "NORWEGIAN" => Some("NORWEGIAN"),
        "POLISH" => Some("POLISH"),
        "RUSSIAN" => Some("RUSSIAN"),
        "JAPANESE" => Some("JAPANESE"),
        "KOREAN" => Some("KOREAN"),
        "MULTI" => Some("MULTI"),
        _ => None,
    }
}

fn canonical_edition(lower: &str) -> Option<&'static str> {
    match lower {
        "extended" => Some("Extended"),
        "unrated" => Some("Unrated"),
        "remastered" => Some("Remastered"),
        "uncut" => Some("Uncut"),
        "criterion" => Some("Criterion"),
        "imax" => Some("IMAX"),
        "theatrical" => Some("Theatrical"),
        _ => None,
    }
}

fn canonical_container(lower: &str) -> Option<&'static str> {
    match lower {
        "mkv" => Some("mkv"),
        "mp4" => Some("mp4"),
        "avi" => Some("avi"),
        "m2ts" => Some("m2ts"),
        _ => None,
    }
}

fn canonical_other(lower: &str) -> Option<&'static str> {
    match lower {
        "internal" => Some("INTERNAL"),
        "dubbed" => Some("DUBBED"),
        "subbed" => Some("SUBBED"),
        "complete" => Some("COMPLETE"),
        "limited" => Some("LIMITED"),
        _ => None,
    }
}
