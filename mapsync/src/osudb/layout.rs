//! Version-dependent record layout.
//!
//! The record format changed at a few database versions. Each change is one
//! row in [`LAYOUT_CHANGES`]; the layout for a version is the legacy layout
//! with every change at or below that version applied in order.

/// Difficulty values stored as `f32` instead of `u8`; star-rating arrays added.
pub const VERSION_FLOAT_DIFFICULTY: i32 = 20140609;

/// Per-record size prefix removed.
pub const VERSION_NO_ENTRY_SIZE: i32 = 20191106;

/// Star-rating pair values shrink from `f64` to `f32`.
pub const VERSION_COMPACT_STAR_RATINGS: i32 = 20250107;

/// A single format change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutChange {
    FloatDifficulty,
    DropEntrySize,
    CompactStarRatings,
}

/// Format changes, ordered by the first version carrying them.
pub const LAYOUT_CHANGES: &[(i32, LayoutChange)] = &[
    (VERSION_FLOAT_DIFFICULTY, LayoutChange::FloatDifficulty),
    (VERSION_NO_ENTRY_SIZE, LayoutChange::DropEntrySize),
    (VERSION_COMPACT_STAR_RATINGS, LayoutChange::CompactStarRatings),
];

/// How one record is laid out for a given version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayout {
    /// Record starts with an `i32` byte size.
    pub entry_size: bool,
    /// AR/CS/HP/OD are `f32` (otherwise `u8`).
    pub float_difficulty: bool,
    /// Size of one star-rating pair, when the four arrays are present.
    ///
    /// A pair is a `0x08`-tagged `i32` mod mask and a tagged rating
    /// (`0x0D` + `f64`, or `0x0C` + `f32`).
    pub star_rating_pair_bytes: Option<usize>,
    /// An `i16` of unknown meaning precedes the last-modification time.
    pub trailing_unknown: bool,
}

impl RecordLayout {
    /// Layout before any recorded change.
    pub const LEGACY: RecordLayout = RecordLayout {
        entry_size: true,
        float_difficulty: false,
        star_rating_pair_bytes: None,
        trailing_unknown: true,
    };

    pub fn for_version(version: i32) -> Self {
        LAYOUT_CHANGES
            .iter()
            .take_while(|(min_version, _)| version >= *min_version)
            .fold(Self::LEGACY, |layout, (_, change)| layout.apply(*change))
    }

    fn apply(mut self, change: LayoutChange) -> Self {
        match change {
            LayoutChange::FloatDifficulty => {
                self.float_difficulty = true;
                self.star_rating_pair_bytes = Some(14);
                self.trailing_unknown = false;
            }
            LayoutChange::DropEntrySize => self.entry_size = false,
            LayoutChange::CompactStarRatings => self.star_rating_pair_bytes = Some(10),
        }
        self
    }

    /// Bytes taken by AR/CS/HP/OD together.
    pub fn difficulty_bytes(&self) -> usize {
        if self.float_difficulty {
            16
        } else {
            4
        }
    }
}
