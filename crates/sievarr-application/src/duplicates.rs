// SPDX-License-Identifier: GPL-3.0-or-later

//! Duplicate release detection.
//!
//! A candidate is a duplicate when at least one history entry is equal to it
//! on every field the profile enables. Each field has its own predicate in
//! [`FIELD_PREDICATES`]; the detector AND-reduces the enabled ones per entry
//! and OR-reduces over the history. Nothing here performs I/O or fails.

use std::collections::BTreeSet;

use sievarr_domain::{DuplicateField, DuplicateReleaseProfile, Release};
use tracing::debug;
use unicode_normalization::UnicodeNormalization;

/// Equality of one field between two releases. Must be symmetric.
pub type FieldPredicate = fn(&Release, &Release) -> bool;

/// Audio codec aliases, lower-case, alias first. Channel layouts are never aliased.
pub const AUDIO_ALIASES: &[(&str, &str)] = &[("dd", "ac3")];

pub const FIELD_PREDICATES: &[(DuplicateField, FieldPredicate)] = &[
    (DuplicateField::Protocol, protocol_eq),
    (DuplicateField::ReleaseName, release_name_eq),
    (DuplicateField::Hash, hash_eq),
    (DuplicateField::Title, |a, b| known_text_eq(&a.title, &b.title)),
    (DuplicateField::SubTitle, |a, b| text_eq(&a.sub_title, &b.sub_title)),
    (DuplicateField::Year, |a, b| a.year == b.year),
    (DuplicateField::Month, |a, b| a.month == b.month),
    (DuplicateField::Day, |a, b| a.day == b.day),
    (DuplicateField::Source, |a, b| text_eq(&a.source, &b.source)),
    (DuplicateField::Resolution, |a, b| text_eq(&a.resolution, &b.resolution)),
    (DuplicateField::Codec, |a, b| set_eq(&a.codec, &b.codec)),
    (DuplicateField::Container, |a, b| text_eq(&a.container, &b.container)),
    (DuplicateField::DynamicRange, |a, b| set_eq(&a.hdr, &b.hdr)),
    (DuplicateField::Audio, audio_eq),
    (DuplicateField::Group, known_group_eq),
    (DuplicateField::Season, |a, b| a.season == b.season),
    (DuplicateField::Episode, |a, b| a.episode == b.episode),
    (DuplicateField::Website, |a, b| text_eq(&a.website, &b.website)),
    // A PROPER/REPACK from another (or an unknown) group is a competing release, not a fix.
    (DuplicateField::Proper, |a, b| a.proper == b.proper && known_group_eq(a, b)),
    (DuplicateField::Repack, |a, b| a.repack == b.repack && known_group_eq(a, b)),
    (DuplicateField::Edition, |a, b| text_eq(&a.edition, &b.edition)),
    (DuplicateField::Language, |a, b| set_eq(&a.language, &b.language)),
    (DuplicateField::Hybrid, |a, b| a.hybrid == b.hybrid),
];

/// Whether `candidate` duplicates any release in `history` under `profile`.
pub fn is_duplicate(
    candidate: &Release,
    profile: &DuplicateReleaseProfile,
    history: &[Release],
) -> bool {
    find_duplicate(candidate, profile, history).is_some()
}

/// The first history entry `candidate` duplicates, if any.
pub fn find_duplicate<'a>(
    candidate: &Release,
    profile: &DuplicateReleaseProfile,
    history: &'a [Release],
) -> Option<&'a Release> {
    let predicates: Vec<FieldPredicate> = FIELD_PREDICATES
        .iter()
        .filter(|(field, _)| profile.is_enabled(*field))
        .map(|(_, predicate)| *predicate)
        .collect();

    let found = history
        .iter()
        .find(|entry| predicates.iter().all(|eq| eq(candidate, entry)));

    if let Some(entry) = found {
        debug!(
            target: "duplicates",
            candidate = %candidate.release_name,
            existing = %entry.release_name,
            existing_id = %entry.id,
            profile = %profile.name,
            "release matches history entry"
        );
    }
    found
}

/// Compare a single field, regardless of what a profile enables.
pub fn field_eq(field: DuplicateField, a: &Release, b: &Release) -> bool {
    FIELD_PREDICATES
        .iter()
        .find(|(f, _)| *f == field)
        .map(|(_, predicate)| predicate(a, b))
        .unwrap_or(false)
}

// ----------------------------------------------------------------------------
// Normalization
// ----------------------------------------------------------------------------

fn normalize_text(value: &str) -> String {
    value.nfkc().collect::<String>().trim().to_lowercase()
}

fn text_eq(a: &str, b: &str) -> bool {
    normalize_text(a) == normalize_text(b)
}

fn normalized_set(values: &[String]) -> BTreeSet<String> {
    values
        .iter()
        .map(|v| normalize_text(v))
        .filter(|v| !v.is_empty())
        .collect()
}

/// Like [`text_eq`], but an empty value equals nothing.
fn known_text_eq(a: &str, b: &str) -> bool {
    let (a, b) = (normalize_text(a), normalize_text(b));
    !a.is_empty() && a == b
}

fn set_eq(a: &[String], b: &[String]) -> bool {
    normalized_set(a) == normalized_set(b)
}

fn audio_token(value: &str) -> String {
    let token = normalize_text(value);
    AUDIO_ALIASES
        .iter()
        .find(|(alias, _)| *alias == token)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(token)
}

fn audio_set(values: &[String]) -> BTreeSet<String> {
    values
        .iter()
        .map(|v| audio_token(v))
        .filter(|v| !v.is_empty())
        .collect()
}

fn audio_eq(a: &Release, b: &Release) -> bool {
    audio_set(&a.audio) == audio_set(&b.audio)
}

fn known_group_eq(a: &Release, b: &Release) -> bool {
    known_text_eq(&a.group, &b.group)
}

fn protocol_eq(a: &Release, b: &Release) -> bool {
    a.protocol == b.protocol
}

/// Unknown hashes never match.
fn hash_eq(a: &Release, b: &Release) -> bool {
    let (a, b) = (normalize_text(&a.info_hash), normalize_text(&b.info_hash));
    !a.is_empty() && a == b
}

fn release_name_key(value: &str) -> String {
    normalize_text(value)
        .split(|c: char| c == '.' || c == '_' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn release_name_eq(a: &Release, b: &Release) -> bool {
    let (a, b) = (release_name_key(&a.release_name), release_name_key(&b.release_name));
    !a.is_empty() && a == b
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release_parsing::parse_release_name;
    use sievarr_domain::ReleaseProtocol;

    fn profile(fields: &[DuplicateField]) -> DuplicateReleaseProfile {
        fields
            .iter()
            .fold(DuplicateReleaseProfile::new("test"), |p, f| p.with(*f))
    }

    fn history(names: &[&str]) -> Vec<Release> {
        names.iter().map(|n| parse_release_name(n)).collect()
    }

    // ------------------------------------------------------------------
    // Reference scenarios
    // ------------------------------------------------------------------

    #[test]
    fn different_group_is_not_duplicate() {
        let history = history(&["Inkheart 2008 BluRay 1080p DD5.1 x264-BADGROUP"]);
        let candidate = parse_release_name("Inkheart 2008 BluRay 1080p DD5.1 x264-GROUP");
        let profile = profile(&[DuplicateField::Title, DuplicateField::Group]);

        assert!(!is_duplicate(&candidate, &profile, &history));
    }

    #[test]
    fn group_not_compared_unless_enabled() {
        let history = history(&[
            "That.Movie.2023.BluRay.2160p.x265.DTS-HD-GROUP",
            "That.Movie.2023.BluRay.720p.x265.DTS-HD-GROUP",
            "That.Movie.2023.2160p.WEB.x265.DTS-HD-GROUP",
        ]);
        let candidate = parse_release_name("That.Movie.2023.BluRay.2160p.x265.DTS-HD-GROUP1");

        let loose = profile(&[
            DuplicateField::Title,
            DuplicateField::Source,
            DuplicateField::Resolution,
        ]);
        assert!(is_duplicate(&candidate, &loose, &history));
        assert_eq!(
            find_duplicate(&candidate, &loose, &history).map(|r| r.release_name.as_str()),
            Some("That.Movie.2023.BluRay.2160p.x265.DTS-HD-GROUP")
        );

        let strict = profile(&[
            DuplicateField::Title,
            DuplicateField::Year,
            DuplicateField::Source,
            DuplicateField::Resolution,
            DuplicateField::Codec,
            DuplicateField::Audio,
            DuplicateField::Group,
        ]);
        assert!(!is_duplicate(&candidate, &strict, &history));
    }

    #[test]
    fn identical_release_name() {
        let name = "The Best Show 2020 S04E10 1080p AMZN WEB-DL DDP 5.1 H.264-GROUP";
        let history = history(&[name]);
        let candidate = parse_release_name(name);

        assert!(is_duplicate(
            &candidate,
            &profile(&[DuplicateField::ReleaseName]),
            &history
        ));
    }

    #[test]
    fn release_name_ignores_separators_and_case() {
        let history = history(&["The.Best.Show.2020.S04E10.1080p.AMZN.WEB-DL.DDP.5.1.H.264-GROUP"]);
        let candidate =
            parse_release_name("the best show 2020 s04e10 1080p amzn web-dl ddp 5 1 h 264-group");
        assert!(is_duplicate(
            &candidate,
            &profile(&[DuplicateField::ReleaseName]),
            &history
        ));
    }

    #[test]
    fn repack_from_other_group_is_not_duplicate() {
        let history = history(&[
            "The Show S01E01 REPACK 2160p AMZN WEB-DL DDP5.1 HDR DV H.265-FraMeSToR",
        ]);
        let candidate =
            parse_release_name("The Show S01E01 REPACK 2160p AMZN WEB-DL DDP5.1 HDR DV H.265-OTHERGROUP");
        let profile = profile(&[
            DuplicateField::Title,
            DuplicateField::Season,
            DuplicateField::Episode,
            DuplicateField::Repack,
        ]);
        assert!(!profile.group);
        assert!(!is_duplicate(&candidate, &profile, &history));

        let same_group =
            parse_release_name("The Show S01E01 REPACK 1080p AMZN WEB-DL DDP5.1 H.264-FraMeSToR");
        assert!(is_duplicate(&same_group, &profile, &history));
    }

    #[test]
    fn proper_also_couples_group() {
        let history = history(&["Movie.2020.PROPER.1080p.BluRay.x264-AAA"]);
        let candidate = parse_release_name("Movie.2020.PROPER.1080p.BluRay.x264-BBB");
        let profile = profile(&[DuplicateField::Title, DuplicateField::Proper]);
        assert!(!is_duplicate(&candidate, &profile, &history));
    }

    #[test]
    fn empty_dynamic_range_matches_untagged_history() {
        let history = history(&[
            "The Show S02E03 1080p HULU WEB-DL DDP 5.1 SDR H.264-GROUP",
            "The Show S02E03 1080p AMZN WEB-DL DDP 5.1 SDR H.264-GROUP",
            "The Show S02E03 2160p AMZN WEB-DL DDP 5.1 HDR DV H.265-GROUP",
        ]);
        let candidate = parse_release_name("The Show S02E03 1080p AMZN WEB-DL DDP 5.1 H.264-GROUP");
        let profile = profile(&[
            DuplicateField::Title,
            DuplicateField::Season,
            DuplicateField::Episode,
            DuplicateField::Website,
            DuplicateField::DynamicRange,
        ]);
        assert_eq!(
            find_duplicate(&candidate, &profile, &history).map(|r| r.website.as_str()),
            Some("AMZN")
        );
        assert!(history[2].hdr.contains(&"DV".to_string()));
    }

    #[test]
    fn dynamic_range_is_exact_set_equality() {
        let mut a = Release::new("a");
        let mut b = Release::new("b");
        a.hdr = vec!["HDR".into(), "DV".into()];
        b.hdr = vec!["DV".into()];
        assert!(!field_eq(DuplicateField::DynamicRange, &a, &b));
        b.hdr = vec!["HDR10".into()];
        assert!(!field_eq(DuplicateField::DynamicRange, &a, &b));
        b.hdr = vec!["dv".into(), "hdr".into()];
        assert!(field_eq(DuplicateField::DynamicRange, &a, &b));
    }

    #[test]
    fn language_tagged_vs_untagged() {
        let history = history(&["The Show S01E01 GER 1080p WEB H.264-GROUP"]);
        let untagged = parse_release_name("The Show S01E01 1080p WEB H.264-GROUP");
        let tagged = parse_release_name("The Show S01E01 GER 1080p WEB H.264-GROUP");
        let profile = profile(&[
            DuplicateField::Title,
            DuplicateField::Season,
            DuplicateField::Episode,
            DuplicateField::Language,
        ]);

        assert!(!is_duplicate(&untagged, &profile, &history));
        assert!(is_duplicate(&tagged, &profile, &history));
    }

    // ------------------------------------------------------------------
    // Field rules
    // ------------------------------------------------------------------

    #[test]
    fn audio_aliases_dd_and_ac3_but_not_channels() {
        let mut a = Release::new("a");
        let mut b = Release::new("b");
        a.audio = vec!["DD".into(), "5.1".into()];
        b.audio = vec!["AC3".into(), "5.1".into()];
        assert!(field_eq(DuplicateField::Audio, &a, &b));

        b.audio = vec!["AC3".into(), "2.0".into()];
        assert!(!field_eq(DuplicateField::Audio, &a, &b));

        b.audio = vec!["DTS".into(), "5.1".into()];
        assert!(!field_eq(DuplicateField::Audio, &a, &b));

        a.audio = vec!["DTS-HD".into()];
        b.audio = vec!["DTS".into()];
        assert!(!field_eq(DuplicateField::Audio, &a, &b));
    }

    #[test]
    fn unparsed_titles_never_match() {
        let history = history(&["1080p.WEB.x264-AAA"]);
        let candidate = parse_release_name("2160p.BluRay.x265-BBB");
        assert!(candidate.title.is_empty());
        assert!(history[0].title.is_empty());

        assert!(!is_duplicate(
            &candidate,
            &profile(&[DuplicateField::Title]),
            &history
        ));
    }

    #[test]
    fn repack_without_group_is_not_a_correction() {
        let history = history(&["Movie.2020.REPACK.1080p.BluRay.x264"]);
        let candidate = parse_release_name("Movie.2020.REPACK.1080p.WEB.x264");
        assert!(candidate.group.is_empty());

        let repack = profile(&[DuplicateField::Title, DuplicateField::Repack]);
        assert!(!is_duplicate(&candidate, &repack, &history));
        let proper = profile(&[DuplicateField::Title, DuplicateField::Proper]);
        assert!(!is_duplicate(&candidate, &proper, &history));

        assert!(!field_eq(DuplicateField::Group, &candidate, &history[0]));
    }

    #[test]
    fn codec_compares_case_insensitive_sets() {
        let mut a = Release::new("a");
        let mut b = Release::new("b");
        a.codec = vec!["H.264".into()];
        b.codec = vec!["h.264".into()];
        assert!(field_eq(DuplicateField::Codec, &a, &b));
        b.codec = vec!["x264".into()];
        assert!(!field_eq(DuplicateField::Codec, &a, &b));
    }

    #[test]
    fn text_fields_trim_and_ignore_case() {
        let mut a = Release::new("a");
        let mut b = Release::new("b");
        a.title = " That Movie ".into();
        b.title = "that movie".into();
        assert!(field_eq(DuplicateField::Title, &a, &b));
        a.sub_title = String::new();
        b.sub_title = String::new();
        assert!(field_eq(DuplicateField::SubTitle, &a, &b));
    }

    #[test]
    fn numeric_fields_treat_zero_as_a_value() {
        let pack_a = parse_release_name("Show.S01.1080p.WEB.h264-GRP");
        let pack_b = parse_release_name("Show.S01.720p.WEB.h264-GRP");
        let episode = parse_release_name("Show.S01E01.1080p.WEB.h264-GRP");
        assert!(field_eq(DuplicateField::Episode, &pack_a, &pack_b));
        assert!(!field_eq(DuplicateField::Episode, &pack_a, &episode));
        assert!(field_eq(DuplicateField::Day, &pack_a, &episode));
    }

    #[test]
    fn hash_requires_known_value() {
        let mut a = Release::new("a");
        let mut b = Release::new("b");
        assert!(!field_eq(DuplicateField::Hash, &a, &b));
        a.info_hash = "ABCDEF0123".into();
        b.info_hash = "abcdef0123".into();
        assert!(field_eq(DuplicateField::Hash, &a, &b));
    }

    #[test]
    fn protocol_and_hybrid() {
        let mut a = Release::new("a");
        let mut b = Release::new("b");
        assert!(field_eq(DuplicateField::Protocol, &a, &b));
        b.protocol = ReleaseProtocol::Usenet;
        assert!(!field_eq(DuplicateField::Protocol, &a, &b));
        a.hybrid = true;
        assert!(!field_eq(DuplicateField::Hybrid, &a, &b));
    }

    #[test]
    fn every_field_has_a_predicate() {
        for field in DuplicateField::ALL {
            assert!(
                FIELD_PREDICATES.iter().any(|(f, _)| *f == field),
                "missing predicate for {field}"
            );
        }
    }

    // ------------------------------------------------------------------
    // Invariants
    // ------------------------------------------------------------------

    fn sample_pairs() -> Vec<(Release, Release)> {
        let names = [
            "Inkheart 2008 BluRay 1080p DD5.1 x264-BADGROUP",
            "Inkheart 2008 BluRay 1080p AC3 5.1 x264-GROUP",
            "The Show S02E03 2160p AMZN WEB-DL DDP 5.1 HDR DV H.265-GROUP",
            "The Show S02E03 1080p HULU WEB-DL DDP 5.1 SDR H.264-GROUP",
            "The Show S01E01 GER REPACK 1080p WEB H.264-FraMeSToR",
            "Show.S01.1080p.BluRay.x264-GRP",
        ];
        let releases: Vec<Release> = names.iter().map(|n| parse_release_name(n)).collect();
        let mut pairs = Vec::new();
        for a in &releases {
            for b in &releases {
                pairs.push((a.clone(), b.clone()));
            }
        }
        pairs
    }

    #[test]
    fn field_comparisons_are_symmetric() {
        for (a, b) in sample_pairs() {
            for field in DuplicateField::ALL {
                assert_eq!(
                    field_eq(field, &a, &b),
                    field_eq(field, &b, &a),
                    "{field} not symmetric for {} / {}",
                    a.release_name,
                    b.release_name
                );
            }
        }
    }

    #[test]
    fn all_false_profile() {
        let empty = DuplicateReleaseProfile::new("none");
        let candidate = parse_release_name("Anything.2020.1080p.WEB.h264-GRP");
        assert!(!is_duplicate(&candidate, &empty, &[]));
        let history = history(&["Something.Else.1999.720p.HDTV.x264-OTHER"]);
        assert!(is_duplicate(&candidate, &empty, &history));
    }

    #[test]
    fn enabling_fields_only_narrows() {
        let history: Vec<Release> = sample_pairs().into_iter().map(|(a, _)| a).collect();
        let candidates = history.clone();

        for candidate in &candidates {
            let mut profile = DuplicateReleaseProfile::new("narrowing");
            let mut previous = is_duplicate(candidate, &profile, &history);
            for field in DuplicateField::ALL {
                profile.set(field, true);
                let current = is_duplicate(candidate, &profile, &history);
                assert!(
                    previous || !current,
                    "enabling {field} turned false into true for {}",
                    candidate.release_name
                );
                previous = current;
            }
        }
    }
}
