// SPDX-License-Identifier: GPL-3.0-or-later
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Value Objects & IDs
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReleaseId(pub Uuid);

impl ReleaseId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for ReleaseId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ReleaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FilterId(pub Uuid);

impl FilterId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for FilterId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for FilterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexerId(pub Uuid);

impl IndexerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for IndexerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for IndexerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DuplicateProfileId(pub Uuid);

impl DuplicateProfileId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for DuplicateProfileId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DuplicateProfileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionStatusId(pub Uuid);

impl ActionStatusId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for ActionStatusId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ActionStatusId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Enums
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseProtocol {
    #[default]
    Torrent,
    Usenet,
}

impl std::fmt::Display for ReleaseProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReleaseProtocol::Torrent => write!(f, "torrent"),
            ReleaseProtocol::Usenet => write!(f, "usenet"),
        }
    }
}

/// Which ingestion path produced a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReleaseImplementation {
    #[default]
    Irc,
    Torznab,
    Newznab,
    Rss,
    Api,
}

impl std::fmt::Display for ReleaseImplementation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReleaseImplementation::Irc => "IRC",
            ReleaseImplementation::Torznab => "TORZNAB",
            ReleaseImplementation::Newznab => "NEWZNAB",
            ReleaseImplementation::Rss => "RSS",
            ReleaseImplementation::Api => "API",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReleaseFilterStatus {
    #[default]
    Pending,
    FilterApproved,
    FilterRejected,
}

impl std::fmt::Display for ReleaseFilterStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReleaseFilterStatus::Pending => "PENDING",
            ReleaseFilterStatus::FilterApproved => "FILTER_APPROVED",
            ReleaseFilterStatus::FilterRejected => "FILTER_REJECTED",
        };
        write!(f, "{}", s)
    }
}

/// Outcome of pushing a release to its action. Only `PUSH_APPROVED`
/// entries count as history for duplicate detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReleasePushStatus {
    #[default]
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "PUSH_APPROVED")]
    Approved,
    #[serde(rename = "PUSH_REJECTED")]
    Rejected,
    #[serde(rename = "PUSH_ERROR")]
    Error,
}

impl std::fmt::Display for ReleasePushStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReleasePushStatus::Pending => "PENDING",
            ReleasePushStatus::Approved => "PUSH_APPROVED",
            ReleasePushStatus::Rejected => "PUSH_REJECTED",
            ReleasePushStatus::Error => "PUSH_ERROR",
        };
        write!(f, "{}", s)
    }
}

// ============================================================================
// Release
// ============================================================================

/// A single parsed announcement. Numeric fields use `0` for "not present",
/// so a season pack carries `episode == 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    pub id: ReleaseId,
    pub filter_id: Option<FilterId>,
    pub filter_status: ReleaseFilterStatus,
    pub indexer: String,
    pub implementation: ReleaseImplementation,
    pub protocol: ReleaseProtocol,
    pub release_name: String,
    pub info_hash: String,
    pub size: u64,
    pub title: String,
    pub sub_title: String,
    pub year: u32,
    pub month: u32,
    pub day: u32,
    pub season: u32,
    pub episode: u32,
    pub resolution: String,
    pub source: String,
    pub codec: Vec<String>,
    pub container: String,
    pub hdr: Vec<String>,
    pub audio: Vec<String>,
    pub group: String,
    pub website: String,
    pub edition: String,
    pub language: Vec<String>,
    pub proper: bool,
    pub repack: bool,
    pub hybrid: bool,
    pub category: String,
    pub categories: Vec<String>,
    pub freeleech: bool,
    pub uploader: String,
    pub tags: Vec<String>,
    pub other: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl Release {
    pub fn new(release_name: impl Into<String>) -> Self {
        Self {
            id: ReleaseId::new(),
            filter_id: None,
            filter_status: ReleaseFilterStatus::Pending,
            indexer: String::new(),
            implementation: ReleaseImplementation::default(),
            protocol: ReleaseProtocol::default(),
            release_name: release_name.into(),
            info_hash: String::new(),
            size: 0,
            title: String::new(),
            sub_title: String::new(),
            year: 0,
            month: 0,
            day: 0,
            season: 0,
            episode: 0,
            resolution: String::new(),
            source: String::new(),
            codec: Vec::new(),
            container: String::new(),
            hdr: Vec::new(),
            audio: Vec::new(),
            group: String::new(),
            website: String::new(),
            edition: String::new(),
            language: Vec::new(),
            proper: false,
            repack: false,
            hybrid: false,
            category: String::new(),
            categories: Vec::new(),
            freeleech: false,
            uploader: String::new(),
            tags: Vec::new(),
            other: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// A season pack has a season but no episode.
    pub fn is_season_pack(&self) -> bool {
        self.season > 0 && self.episode == 0
    }

    pub fn is_dated(&self) -> bool {
        self.year > 0 && self.month > 0 && self.day > 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseActionStatus {
    pub id: ActionStatusId,
    pub release_id: ReleaseId,
    pub filter_id: FilterId,
    pub filter: String,
    pub action: String,
    pub status: ReleasePushStatus,
    pub rejections: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl ReleaseActionStatus {
    pub fn new(
        release_id: ReleaseId,
        filter_id: FilterId,
        filter: impl Into<String>,
        status: ReleasePushStatus,
    ) -> Self {
        Self {
            id: ActionStatusId::new(),
            release_id,
            filter_id,
            filter: filter.into(),
            action: String::new(),
            status,
            rejections: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn approved(release_id: ReleaseId, filter_id: FilterId, filter: impl Into<String>) -> Self {
        Self::new(release_id, filter_id, filter, ReleasePushStatus::Approved)
    }
}

// ============================================================================
// Duplicate Release Profile
// ============================================================================

/// Field toggles controlling which release attributes must be equal for a
/// history entry to count as a duplicate. Everything defaults to `false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplicateReleaseProfile {
    pub id: DuplicateProfileId,
    pub name: String,
    pub protocol: bool,
    pub release_name: bool,
    pub hash: bool,
    pub title: bool,
    pub sub_title: bool,
    pub year: bool,
    pub month: bool,
    pub day: bool,
    pub source: bool,
    pub resolution: bool,
    pub codec: bool,
    pub container: bool,
    #[serde(rename = "hdr")]
    pub dynamic_range: bool,
    pub audio: bool,
    pub group: bool,
    pub season: bool,
    pub episode: bool,
    pub website: bool,
    pub proper: bool,
    pub repack: bool,
    pub edition: bool,
    pub language: bool,
    pub hybrid: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for DuplicateReleaseProfile {
    fn default() -> Self {
        Self::new("")
    }
}

impl DuplicateReleaseProfile {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: DuplicateProfileId::new(),
            name: name.into(),
            protocol: false,
            release_name: false,
            hash: false,
            title: false,
            sub_title: false,
            year: false,
            month: false,
            day: false,
            source: false,
            resolution: false,
            codec: false,
            container: false,
            dynamic_range: false,
            audio: false,
            group: false,
            season: false,
            episode: false,
            website: false,
            proper: false,
            repack: false,
            edition: false,
            language: false,
            hybrid: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder-style toggle, mostly useful for tests and fixtures.
    pub fn with(mut self, field: DuplicateField) -> Self {
        self.set(field, true);
        self
    }

    pub fn is_enabled(&self, field: DuplicateField) -> bool {
        match field {
            DuplicateField::Protocol => self.protocol,
            DuplicateField::ReleaseName => self.release_name,
            DuplicateField::Hash => self.hash,
            DuplicateField::Title => self.title,
            DuplicateField::SubTitle => self.sub_title,
            DuplicateField::Year => self.year,
            DuplicateField::Month => self.month,
            DuplicateField::Day => self.day,
            DuplicateField::Source => self.source,
            DuplicateField::Resolution => self.resolution,
            DuplicateField::Codec => self.codec,
            DuplicateField::Container => self.container,
            DuplicateField::DynamicRange => self.dynamic_range,
            DuplicateField::Audio => self.audio,
            DuplicateField::Group => self.group,
            DuplicateField::Season => self.season,
            DuplicateField::Episode => self.episode,
            DuplicateField::Website => self.website,
            DuplicateField::Proper => self.proper,
            DuplicateField::Repack => self.repack,
            DuplicateField::Edition => self.edition,
            DuplicateField::Language => self.language,
            DuplicateField::Hybrid => self.hybrid,
        }
    }

    pub fn set(&mut self, field: DuplicateField, enabled: bool) {
        let slot = match field {
            DuplicateField::Protocol => &mut self.protocol,
            DuplicateField::ReleaseName => &mut self.release_name,
            DuplicateField::Hash => &mut self.hash,
            DuplicateField::Title => &mut self.title,
            DuplicateField::SubTitle => &mut self.sub_title,
            DuplicateField::Year => &mut self.year,
            DuplicateField::Month => &mut self.month,
            DuplicateField::Day => &mut self.day,
            DuplicateField::Source => &mut self.source,
            DuplicateField::Resolution => &mut self.resolution,
            DuplicateField::Codec => &mut self.codec,
            DuplicateField::Container => &mut self.container,
            DuplicateField::DynamicRange => &mut self.dynamic_range,
            DuplicateField::Audio => &mut self.audio,
            DuplicateField::Group => &mut self.group,
            DuplicateField::Season => &mut self.season,
            DuplicateField::Episode => &mut self.episode,
            DuplicateField::Website => &mut self.website,
            DuplicateField::Proper => &mut self.proper,
            DuplicateField::Repack => &mut self.repack,
            DuplicateField::Edition => &mut self.edition,
            DuplicateField::Language => &mut self.language,
            DuplicateField::Hybrid => &mut self.hybrid,
        };
        *slot = enabled;
    }

    pub fn enabled_fields(&self) -> Vec<DuplicateField> {
        DuplicateField::ALL
            .iter()
            .copied()
            .filter(|f| self.is_enabled(*f))
            .collect()
    }
}

/// One comparable release attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateField {
    Protocol,
    ReleaseName,
    Hash,
    Title,
    SubTitle,
    Year,
    Month,
    Day,
    Source,
    Resolution,
    Codec,
    Container,
    #[serde(rename = "hdr")]
    DynamicRange,
    Audio,
    Group,
    Season,
    Episode,
    Website,
    Proper,
    Repack,
    Edition,
    Language,
    Hybrid,
}

impl DuplicateField {
    pub const ALL: [DuplicateField; 23] = [
        DuplicateField::Protocol,
        DuplicateField::ReleaseName,
        DuplicateField::Hash,
        DuplicateField::Title,
        DuplicateField::SubTitle,
        DuplicateField::Year,
        DuplicateField::Month,
        DuplicateField::Day,
        DuplicateField::Source,
        DuplicateField::Resolution,
        DuplicateField::Codec,
        DuplicateField::Container,
        DuplicateField::DynamicRange,
        DuplicateField::Audio,
        DuplicateField::Group,
        DuplicateField::Season,
        DuplicateField::Episode,
        DuplicateField::Website,
        DuplicateField::Proper,
        DuplicateField::Repack,
        DuplicateField::Edition,
        DuplicateField::Language,
        DuplicateField::Hybrid,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DuplicateField::Protocol => "protocol",
            DuplicateField::ReleaseName => "release_name",
            DuplicateField::Hash => "hash",
            DuplicateField::Title => "title",
            DuplicateField::SubTitle => "sub_title",
            DuplicateField::Year => "year",
            DuplicateField::Month => "month",
            DuplicateField::Day => "day",
            DuplicateField::Source => "source",
            DuplicateField::Resolution => "resolution",
            DuplicateField::Codec => "codec",
            DuplicateField::Container => "container",
            DuplicateField::DynamicRange => "hdr",
            DuplicateField::Audio => "audio",
            DuplicateField::Group => "group",
            DuplicateField::Season => "season",
            DuplicateField::Episode => "episode",
            DuplicateField::Website => "website",
            DuplicateField::Proper => "proper",
            DuplicateField::Repack => "repack",
            DuplicateField::Edition => "edition",
            DuplicateField::Language => "language",
            DuplicateField::Hybrid => "hybrid",
        }
    }
}

impl std::fmt::Display for DuplicateField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Filters & Indexers
// ============================================================================

/// A named rule set. String list fields are comma separated and accept
/// `*`/`?` wildcards (or regex when `use_regex` is set); the numeric lists
/// (`seasons`, `episodes`, `years`, `months`, `days`) accept ranges like
/// `"1,3-5"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Filter {
    pub id: FilterId,
    pub name: String,
    pub enabled: bool,
    pub priority: i32,
    pub duplicate_profile_id: Option<DuplicateProfileId>,
    pub indexers: Vec<IndexerId>,
    pub min_size: String,
    pub max_size: String,
    pub use_regex: bool,
    pub match_releases: String,
    pub except_releases: String,
    pub match_release_groups: String,
    pub except_release_groups: String,
    pub shows: String,
    pub seasons: String,
    pub episodes: String,
    pub years: String,
    pub months: String,
    pub days: String,
    pub resolutions: Vec<String>,
    pub codecs: Vec<String>,
    pub sources: Vec<String>,
    pub containers: Vec<String>,
    pub match_hdr: Vec<String>,
    pub except_hdr: Vec<String>,
    pub match_language: Vec<String>,
    pub except_language: Vec<String>,
    pub match_categories: String,
    pub except_categories: String,
    pub match_uploaders: String,
    pub except_uploaders: String,
    pub tags: String,
    pub except_tags: String,
    pub freeleech: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Filter {
    fn default() -> Self {
        Self::new("")
    }
}

impl Filter {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: FilterId::new(),
            name: name.into(),
            enabled: true,
            priority: 0,
            duplicate_profile_id: None,
            indexers: Vec::new(),
            min_size: String::new(),
            max_size: String::new(),
            use_regex: false,
            match_releases: String::new(),
            except_releases: String::new(),
            match_release_groups: String::new(),
            except_release_groups: String::new(),
            shows: String::new(),
            seasons: String::new(),
            episodes: String::new(),
            years: String::new(),
            months: String::new(),
            days: String::new(),
            resolutions: Vec::new(),
            codecs: Vec::new(),
            sources: Vec::new(),
            containers: Vec::new(),
            match_hdr: Vec::new(),
            except_hdr: Vec::new(),
            match_language: Vec::new(),
            except_language: Vec::new(),
            match_categories: String::new(),
            except_categories: String::new(),
            match_uploaders: String::new(),
            except_uploaders: String::new(),
            tags: String::new(),
            except_tags: String::new(),
            freeleech: false,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Indexer {
    pub id: IndexerId,
    /// Announce key releases are tagged with.
    pub identifier: String,
    pub name: String,
    pub enabled: bool,
    pub implementation: ReleaseImplementation,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Indexer {
    pub fn new(identifier: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: IndexerId::new(),
            identifier: identifier.into(),
            name: name.into(),
            enabled: true,
            implementation: ReleaseImplementation::Irc,
            created_at: now,
            updated_at: now,
        }
    }
}

// ============================================================================
// Validation
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub trait Validate {
    fn validate(&self) -> Result<(), Vec<ValidationError>>;
}

impl Validate for DuplicateReleaseProfile {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push(ValidationError {
                field: "name",
                message: "name cannot be empty".into(),
            });
        }
        if self.enabled_fields().is_empty() {
            errors.push(ValidationError {
                field: "fields",
                message: "at least one field must be enabled".into(),
            });
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl Validate for Filter {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push(ValidationError {
                field: "name",
                message: "name cannot be empty".into(),
            });
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl Validate for Indexer {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if self.identifier.trim().is_empty() {
            errors.push(ValidationError {
                field: "identifier",
                message: "identifier cannot be empty".into(),
            });
        }
        if self.name.trim().is_empty() {
            errors.push(ValidationError {
                field: "name",
                message: "name cannot be empty".into(),
            });
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl Validate for Release {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if self.release_name.trim().is_empty() {
            errors.push(ValidationError {
                field: "release_name",
                message: "release name cannot be empty".into(),
            });
        }
        if self.month > 12 {
            errors.push(ValidationError {
                field: "month",
                message: "month must be between 1 and 12".into(),
            });
        }
        if self.day > 31 {
            errors.push(ValidationError {
                field: "day",
                message: "day must be between 1 and 31".into(),
            });
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

// ============================================================================
// Domain Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent<TPayload> {
    pub name: &'static str,
    pub occurred_at: DateTime<Utc>,
    pub payload: TPayload,
}

impl<TPayload> DomainEvent<TPayload> {
    pub fn new(name: &'static str, payload: TPayload) -> Self {
        Self {
            name,
            occurred_at: Utc::now(),
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseApprovedPayload {
    pub release_id: ReleaseId,
    pub filter_id: FilterId,
    pub filter_name: String,
    pub release_name: String,
}

pub type ReleaseApproved = DomainEvent<ReleaseApprovedPayload>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseRejectedPayload {
    pub release_name: String,
    pub indexer: String,
    pub duplicate: bool,
    pub rejections: Vec<String>,
}

pub type ReleaseRejected = DomainEvent<ReleaseRejectedPayload>;

// ============================================================================
// Tests
// ============================================================================
