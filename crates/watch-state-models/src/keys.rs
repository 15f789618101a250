use crate::media::{ExternalId, MediaKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Raised when a stored key does not form a valid identity (wrong catalog id
/// for its kind, missing episode coordinates, and so on).
#[derive(Debug)]
pub struct KeyError {
    message: String,
}

impl KeyError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for KeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for KeyError {}

/// Identity of one continue-watching entry.
///
/// The tuple (kind, external id, season, episode, dub track) is unique per
/// owner; writing an equal key again updates the existing entry in place.
/// Dub and sub tracks of the same anime episode are distinct entries.
///
/// Construction goes through the typed constructors, so an `EntryKey` always
/// carries the right catalog id for its kind and the episode coordinates the
/// kind requires. Stored rows are decoded through the same validation and
/// rejected when malformed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawEntryKey", into = "RawEntryKey")]
pub struct EntryKey {
    kind: MediaKind,
    external_id: ExternalId,
    season: Option<u32>,
    episode: Option<u32>,
    dubbed: bool,
}

impl EntryKey {
    pub fn movie(tmdb_id: u32) -> Self {
        Self {
            kind: MediaKind::Movie,
            external_id: ExternalId::Tmdb(tmdb_id),
            season: None,
            episode: None,
            dubbed: false,
        }
    }

    pub fn tv_episode(tmdb_id: u32, season: u32, episode: u32) -> Self {
        Self {
            kind: MediaKind::Tv,
            external_id: ExternalId::Tmdb(tmdb_id),
            season: Some(season),
            episode: Some(episode),
            dubbed: false,
        }
    }

    pub fn anime_episode(anilist_id: u32, episode: u32, dubbed: bool) -> Self {
        Self {
            kind: MediaKind::Anime,
            external_id: ExternalId::Anilist(anilist_id),
            season: None,
            episode: Some(episode),
            dubbed,
        }
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn external_id(&self) -> ExternalId {
        self.external_id
    }

    pub fn season(&self) -> Option<u32> {
        self.season
    }

    pub fn episode(&self) -> Option<u32> {
        self.episode
    }

    pub fn is_dub(&self) -> bool {
        self.dubbed
    }

    /// Whole-title identity for this entry (season/episode/dub dropped).
    pub fn title_key(&self) -> TitleKey {
        TitleKey {
            kind: self.kind,
            external_id: self.external_id,
        }
    }

    /// Stable string form of the identity, usable as a log tag or map key.
    ///
    /// Formats: `movie-603`, `tv-1399-s1-e1`, `anime-21-e5-dub`.
    pub fn slug(&self) -> String {
        match self.kind {
            MediaKind::Movie => format!("movie-{}", self.external_id.value()),
            MediaKind::Tv => format!(
                "tv-{}-s{}-e{}",
                self.external_id.value(),
                self.season.unwrap_or(0),
                self.episode.unwrap_or(0)
            ),
            MediaKind::Anime => format!(
                "anime-{}-e{}-{}",
                self.external_id.value(),
                self.episode.unwrap_or(0),
                if self.dubbed { "dub" } else { "sub" }
            ),
        }
    }
}

/// Identity of one watchlist or favorites entry. Whole-title granularity:
/// no season, episode, or dub track.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawTitleKey", into = "RawTitleKey")]
pub struct TitleKey {
    kind: MediaKind,
    external_id: ExternalId,
}

impl TitleKey {
    pub fn movie(tmdb_id: u32) -> Self {
        Self {
            kind: MediaKind::Movie,
            external_id: ExternalId::Tmdb(tmdb_id),
        }
    }

    pub fn tv(tmdb_id: u32) -> Self {
        Self {
            kind: MediaKind::Tv,
            external_id: ExternalId::Tmdb(tmdb_id),
        }
    }

    pub fn anime(anilist_id: u32) -> Self {
        Self {
            kind: MediaKind::Anime,
            external_id: ExternalId::Anilist(anilist_id),
        }
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn external_id(&self) -> ExternalId {
        self.external_id
    }

    pub fn slug(&self) -> String {
        format!("{}-{}", self.kind, self.external_id.value())
    }
}

/// Wire/storage shape of an `EntryKey`: the flat column set shared by the
/// local JSON files and the remote tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEntryKey {
    pub content_type: MediaKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tmdb_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anilist_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<u32>,
    #[serde(default)]
    pub is_dub: bool,
}

fn catalog_id(
    kind: MediaKind,
    tmdb_id: Option<u32>,
    anilist_id: Option<u32>,
) -> Result<ExternalId, KeyError> {
    match kind {
        MediaKind::Movie | MediaKind::Tv => match (tmdb_id, anilist_id) {
            (Some(id), None) => Ok(ExternalId::Tmdb(id)),
            (None, _) => Err(KeyError::new(format!("{} key is missing tmdb_id", kind))),
            (Some(_), Some(_)) => Err(KeyError::new(format!(
                "{} key carries both tmdb_id and anilist_id",
                kind
            ))),
        },
        MediaKind::Anime => match (anilist_id, tmdb_id) {
            (Some(id), None) => Ok(ExternalId::Anilist(id)),
            (None, _) => Err(KeyError::new("anime key is missing anilist_id")),
            (Some(_), Some(_)) => Err(KeyError::new(
                "anime key carries both tmdb_id and anilist_id",
            )),
        },
    }
}

impl TryFrom<RawEntryKey> for EntryKey {
    type Error = KeyError;

    fn try_from(raw: RawEntryKey) -> Result<Self, Self::Error> {
        let external_id = catalog_id(raw.content_type, raw.tmdb_id, raw.anilist_id)?;
        match raw.content_type {
            // Episode coordinates on a movie are storage noise; drop them.
            MediaKind::Movie => Ok(EntryKey::movie(external_id.value())),
            MediaKind::Tv => {
                let season = raw
                    .season
                    .ok_or_else(|| KeyError::new("tv key is missing season"))?;
                let episode = raw
                    .episode
                    .ok_or_else(|| KeyError::new("tv key is missing episode"))?;
                Ok(EntryKey::tv_episode(external_id.value(), season, episode))
            }
            MediaKind::Anime => {
                let episode = raw
                    .episode
                    .ok_or_else(|| KeyError::new("anime key is missing episode"))?;
                Ok(EntryKey::anime_episode(
                    external_id.value(),
                    episode,
                    raw.is_dub,
                ))
            }
        }
    }
}

impl From<EntryKey> for RawEntryKey {
    fn from(key: EntryKey) -> Self {
        RawEntryKey {
            content_type: key.kind,
            tmdb_id: key.external_id.tmdb(),
            anilist_id: key.external_id.anilist(),
            season: key.season,
            episode: key.episode,
            is_dub: key.dubbed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTitleKey {
    pub content_type: MediaKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tmdb_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anilist_id: Option<u32>,
}

impl TryFrom<RawTitleKey> for TitleKey {
    type Error = KeyError;

    fn try_from(raw: RawTitleKey) -> Result<Self, Self::Error> {
        let external_id = catalog_id(raw.content_type, raw.tmdb_id, raw.anilist_id)?;
        Ok(TitleKey {
            kind: raw.content_type,
            external_id,
        })
    }
}

impl From<TitleKey> for RawTitleKey {
    fn from(key: TitleKey) -> Self {
        RawTitleKey {
            content_type: key.kind,
            tmdb_id: key.external_id.tmdb(),
            anilist_id: key.external_id.anilist(),
        }
    }
}
