//! Built-in beatmap mirrors.
//!
//! Each mirror differs only in base URL and in how it is told to strip the
//! background video from the archive:
//!
//! | mirror       | URL pattern                                      | no-video flag      |
//! |--------------|--------------------------------------------------|--------------------|
//! | `osu.direct` | `https://osu.direct/api/d/{id}`                  | `?noVideo=1`       |
//! | `nerinyan`   | `https://api.nerinyan.moe/d/{id}`                | `?noVideo=1`       |
//! | `mimo`       | `https://catboy.best/d/{id}`                     | `n` suffix on id   |
//! | `nekoha`     | `https://mirror.nekoha.moe/api4/download/{id}`   | unsupported        |

use super::types::{Mirror, MirrorOptions};

/// How a mirror is asked to serve the archive without video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoFlag {
    /// Append `?noVideo=1`.
    NoVideoQuery,
    /// Append `n` to the set ID path segment.
    IdSuffix,
    /// The mirror always serves its default variant.
    Unsupported,
}

/// A mirror described by a base URL and a video flag style.
#[derive(Debug, Clone)]
pub struct UrlMirror {
    name: String,
    base_url: String,
    video_flag: VideoFlag,
}

impl UrlMirror {
    /// Creates a mirror serving `{base_url}/{set_id}`.
    ///
    /// A trailing slash on `base_url` is ignored.
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, video_flag: VideoFlag) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            name: name.into(),
            base_url,
            video_flag,
        }
    }

    /// osu.direct.
    pub fn osu_direct() -> Self {
        Self::new("osu.direct", "https://osu.direct/api/d", VideoFlag::NoVideoQuery)
    }

    /// Nerinyan.
    pub fn nerinyan() -> Self {
        Self::new("nerinyan", "https://api.nerinyan.moe/d", VideoFlag::NoVideoQuery)
    }

    /// Mimo (catboy.best).
    pub fn mimo() -> Self {
        Self::new("mimo", "https://catboy.best/d", VideoFlag::IdSuffix)
    }

    /// Nekoha. Ignores all download options.
    pub fn nekoha() -> Self {
        Self::new(
            "nekoha",
            "https://mirror.nekoha.moe/api4/download",
            VideoFlag::Unsupported,
        )
    }

    /// The default mirror list, in registry (tie-break) order.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::osu_direct(),
            Self::nerinyan(),
            Self::mimo(),
            Self::nekoha(),
        ]
    }
}

impl Mirror for UrlMirror {
    fn name(&self) -> &str {
        &self.name
    }

    fn build_url(&self, set_id: u32, options: &MirrorOptions) -> String {
        match (self.video_flag, options.include_video) {
            (VideoFlag::NoVideoQuery, false) => {
                format!("{}/{}?noVideo=1", self.base_url, set_id)
            }
            (VideoFlag::IdSuffix, false) => format!("{}/{}n", self.base_url, set_id),
            _ => format!("{}/{}", self.base_url, set_id),
        }
    }
}
