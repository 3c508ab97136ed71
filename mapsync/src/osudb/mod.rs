//! Decoder for the stable client's `osu!.db` beatmap database.
//!
//! Only the fields needed to identify installed beatmaps are materialised;
//! everything else is skipped according to the version's [`RecordLayout`].

mod decoder;
mod error;
mod layout;
mod reader;
mod record;

pub use decoder::{owned_set_ids, DbHeader, OsuDbReader};
pub use error::DbError;
pub use layout::{
    LayoutChange, RecordLayout, LAYOUT_CHANGES, VERSION_COMPACT_STAR_RATINGS,
    VERSION_FLOAT_DIFFICULTY, VERSION_NO_ENTRY_SIZE,
};
pub use reader::ByteReader;
pub use record::LightRecord;
