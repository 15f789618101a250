use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Tv,
    Anime,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MediaKind::Movie => "movie",
            MediaKind::Tv => "tv",
            MediaKind::Anime => "anime",
        };
        write!(f, "{}", s)
    }
}

/// Catalog identifier for one title.
///
/// Movies and TV shows are identified by their TMDB id, anime by its AniList
/// id. Exactly one of the two exists for any entry; which one is implied by
/// the entry's `MediaKind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExternalId {
    Tmdb(u32),
    Anilist(u32),
}

impl ExternalId {
    pub fn tmdb(&self) -> Option<u32> {
        match self {
            ExternalId::Tmdb(id) => Some(*id),
            ExternalId::Anilist(_) => None,
        }
    }

    pub fn anilist(&self) -> Option<u32> {
        match self {
            ExternalId::Anilist(id) => Some(*id),
            ExternalId::Tmdb(_) => None,
        }
    }

    /// The raw numeric id, regardless of catalog.
    pub fn value(&self) -> u32 {
        match self {
            ExternalId::Tmdb(id) | ExternalId::Anilist(id) => *id,
        }
    }
}
