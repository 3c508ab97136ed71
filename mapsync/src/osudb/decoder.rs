//! Streaming `osu!.db` decoder.
//!
//! The header is decoded eagerly; records are decoded one at a time as the
//! reader is iterated. The first malformed record ends the iteration.

use std::collections::BTreeSet;
use std::path::Path;

use tracing::debug;

use super::error::DbError;
use super::layout::RecordLayout;
use super::reader::ByteReader;
use super::record::LightRecord;

/// Bytes of one timing point: BPM `f64`, offset `f64`, inherited flag `u8`.
const TIMING_POINT_BYTES: usize = 17;

/// Number of per-mode star-rating arrays.
const STAR_RATING_ARRAYS: usize = 4;

/// Database header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbHeader {
    pub version: i32,
    pub folder_count: i32,
    pub player_name: String,
    pub record_count: u32,
}

/// Lazy reader over the records of an `osu!.db` file.
#[derive(Debug)]
pub struct OsuDbReader {
    data: Vec<u8>,
    pos: usize,
    header: DbHeader,
    layout: RecordLayout,
    remaining: u32,
    failed: bool,
}

impl OsuDbReader {
    /// Decodes the header of an in-memory database.
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Result<Self, DbError> {
        let data = data.into();
        let mut reader = ByteReader::new(&data);

        let version = reader.read_i32()?;
        let folder_count = reader.read_i32()?;
        reader.read_u8()?; // account unlocked
        reader.read_i64()?; // unlock date
        let player_name = reader.read_string()?;

        let count_offset = reader.position();
        let record_count = reader.read_i32()?;
        let record_count = u32::try_from(record_count).map_err(|_| {
            DbError::malformed(count_offset, format!("negative record count {}", record_count))
        })?;

        let pos = reader.position();
        let layout = RecordLayout::for_version(version);
        debug!(version, record_count, ?layout, "Decoded database header");

        Ok(Self {
            data,
            pos,
            header: DbHeader {
                version,
                folder_count,
                player_name,
                record_count,
            },
            layout,
            remaining: record_count,
            failed: false,
        })
    }

    /// Reads and decodes the header of the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DbError> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|source| DbError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(data)
    }

    pub fn header(&self) -> &DbHeader {
        &self.header
    }

    pub fn version(&self) -> i32 {
        self.header.version
    }

    pub fn layout(&self) -> RecordLayout {
        self.layout
    }

    fn decode_next(&mut self) -> Result<LightRecord, DbError> {
        let mut reader = ByteReader::at(&self.data, self.pos);
        let record = decode_record(&mut reader, &self.layout)?;
        self.pos = reader.position();
        Ok(record)
    }
}

impl Iterator for OsuDbReader {
    type Item = Result<LightRecord, DbError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.remaining == 0 {
            return None;
        }

        match self.decode_next() {
            Ok(record) => {
                self.remaining -= 1;
                Some(Ok(record))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed {
            (0, Some(0))
        } else {
            (0, Some(self.remaining as usize))
        }
    }
}

fn decode_record(reader: &mut ByteReader<'_>, layout: &RecordLayout) -> Result<LightRecord, DbError> {
    if layout.entry_size {
        reader.read_i32()?;
    }

    let artist = reader.read_string()?;
    reader.skip_string()?; // artist unicode
    let title = reader.read_string()?;
    reader.skip_string()?; // title unicode
    reader.skip_string()?; // creator
    let difficulty = reader.read_string()?;
    reader.skip_string()?; // audio file
    reader.skip_string()?; // md5
    reader.skip_string()?; // .osu file name

    reader.skip(1, "ranked status")?;
    reader.skip(2 * 3, "object counts")?;
    reader.skip(8, "modification time")?;
    reader.skip(layout.difficulty_bytes(), "difficulty settings")?;
    reader.skip(8, "slider velocity")?;

    if let Some(pair_bytes) = layout.star_rating_pair_bytes {
        for _ in 0..STAR_RATING_ARRAYS {
            let len = read_array_len(reader, pair_bytes, "star rating")?;
            reader.skip(len, "star ratings")?;
        }
    }

    reader.skip(4 * 3, "drain/total/preview time")?;
    let len = read_array_len(reader, TIMING_POINT_BYTES, "timing point")?;
    reader.skip(len, "timing points")?;

    let beatmap_id = reader.read_i32()?;
    let set_id = reader.read_i32()?;
    reader.skip(4, "thread id")?;
    reader.skip(4, "grades")?;
    reader.skip(2, "local offset")?;
    reader.skip(4, "stack leniency")?;
    reader.skip(1, "mode")?;
    reader.skip_string()?; // source
    reader.skip_string()?; // tags
    reader.skip(2, "online offset")?;
    reader.skip_string()?; // title font
    reader.skip(1, "unplayed")?;
    reader.skip(8, "last played")?;
    reader.skip(1, "osz2")?;
    reader.skip_string()?; // folder name
    reader.skip(8, "last checked")?;
    reader.skip(5, "override flags")?;
    if layout.trailing_unknown {
        reader.skip(2, "unknown")?;
    }
    reader.skip(4, "last modification")?;
    reader.skip(1, "mania scroll speed")?;

    Ok(LightRecord {
        beatmap_id,
        set_id,
        title,
        artist,
        difficulty,
    })
}

/// Reads an `i32` element count and returns the byte length of the array.
fn read_array_len(
    reader: &mut ByteReader<'_>,
    element_bytes: usize,
    what: &str,
) -> Result<usize, DbError> {
    let offset = reader.position();
    let count = reader.read_i32()?;
    let count = usize::try_from(count)
        .map_err(|_| DbError::malformed(offset, format!("negative {} count {}", what, count)))?;
    count.checked_mul(element_bytes).ok_or_else(|| {
        DbError::malformed(offset, format!("{} count {} out of range", what, count))
    })
}

/// Distinct submitted set IDs among `records`.
///
/// Stops at the first decode error.
pub fn owned_set_ids<I>(records: I) -> Result<BTreeSet<u32>, DbError>
where
    I: IntoIterator<Item = Result<LightRecord, DbError>>,
{
    let mut owned = BTreeSet::new();
    for record in records {
        if let Some(set_id) = record?.online_set_id() {
            owned.insert(set_id);
        }
    }
    Ok(owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::osudb::reader::tests::encode_string;
    use tempfile::TempDir;

    struct Entry {
        beatmap_id: i32,
        set_id: i32,
        artist: &'static str,
        title: &'static str,
        difficulty: &'static str,
        star_ratings: i32,
        timing_points: i32,
    }

    fn entry(beatmap_id: i32, set_id: i32, title: &'static str) -> Entry {
        Entry {
            beatmap_id,
            set_id,
            artist: "Camellia",
            title,
            difficulty: "Extra",
            star_ratings: 2,
            timing_points: 3,
        }
    }

    /// Builds a database the way the game writes it for `version`.
    fn build_db(version: i32, entries: &[Entry]) -> Vec<u8> {
        let layout = RecordLayout::for_version(version);
        let mut out = Vec::new();
        out.extend_from_slice(&version.to_le_bytes());
        out.extend_from_slice(&7i32.to_le_bytes());
        out.push(1);
        out.extend_from_slice(&0i64.to_le_bytes());
        encode_string("player", &mut out);
        out.extend_from_slice(&(entries.len() as i32).to_le_bytes());

        for e in entries {
            let body = build_record(&layout, e);
            if layout.entry_size {
                out.extend_from_slice(&(body.len() as i32).to_le_bytes());
            }
            out.extend_from_slice(&body);
        }
        out
    }

    fn build_record(layout: &RecordLayout, e: &Entry) -> Vec<u8> {
        let mut b = Vec::new();
        encode_string(e.artist, &mut b);
        encode_string("", &mut b);
        encode_string(e.title, &mut b);
        encode_string("", &mut b);
        encode_string("mapper", &mut b);
        encode_string(e.difficulty, &mut b);
        encode_string("audio.mp3", &mut b);
        encode_string("d41d8cd98f00b204e9800998ecf8427e", &mut b);
        encode_string("map.osu", &mut b);
        b.push(4);
        b.extend_from_slice(&[1, 0, 2, 0, 3, 0]);
        b.extend_from_slice(&0i64.to_le_bytes());
        if layout.float_difficulty {
            for v in [9.0f32, 4.0, 6.0, 8.0] {
                b.extend_from_slice(&v.to_le_bytes());
            }
        } else {
            b.extend_from_slice(&[9, 4, 6, 8]);
        }
        b.extend_from_slice(&1.4f64.to_le_bytes());
        if let Some(pair_bytes) = layout.star_rating_pair_bytes {
            for _ in 0..STAR_RATING_ARRAYS {
                b.extend_from_slice(&e.star_ratings.to_le_bytes());
                for _ in 0..e.star_ratings {
                    b.push(0x08);
                    b.extend_from_slice(&0i32.to_le_bytes());
                    if pair_bytes == 14 {
                        b.push(0x0D);
                        b.extend_from_slice(&5.5f64.to_le_bytes());
                    } else {
                        b.push(0x0C);
                        b.extend_from_slice(&5.5f32.to_le_bytes());
                    }
                }
            }
        }
        b.extend_from_slice(&[0u8; 12]);
        b.extend_from_slice(&e.timing_points.to_le_bytes());
        b.extend(std::iter::repeat(0u8).take(e.timing_points as usize * TIMING_POINT_BYTES));
        b.extend_from_slice(&e.beatmap_id.to_le_bytes());
        b.extend_from_slice(&e.set_id.to_le_bytes());
        b.extend_from_slice(&0i32.to_le_bytes());
        b.extend_from_slice(&[9, 9, 9, 9]);
        b.extend_from_slice(&0i16.to_le_bytes());
        b.extend_from_slice(&0.7f32.to_le_bytes());
        b.push(0);
        encode_string("source", &mut b);
        encode_string("tag1 tag2", &mut b);
        b.extend_from_slice(&0i16.to_le_bytes());
        encode_string("", &mut b);
        b.push(1);
        b.extend_from_slice(&0i64.to_le_bytes());
        b.push(0);
        encode_string("1 Camellia - Song", &mut b);
        b.extend_from_slice(&0i64.to_le_bytes());
        b.extend_from_slice(&[0u8; 5]);
        if layout.trailing_unknown {
            b.extend_from_slice(&0i16.to_le_bytes());
        }
        b.extend_from_slice(&0i32.to_le_bytes());
        b.push(0);
        b
    }

    fn decode_all(data: Vec<u8>) -> Vec<LightRecord> {
        OsuDbReader::from_bytes(data)
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_legacy_byte_difficulty_version() {
        let records = decode_all(build_db(20131216, &[entry(11, 1, "Old")]));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Old");
        assert_eq!(records[0].set_id, 1);
    }

    #[test]
    fn test_size_prefixed_version() {
        let data = build_db(20190101, &[entry(100, 10, "First"), entry(200, 20, "Second")]);
        let reader = OsuDbReader::from_bytes(data).unwrap();
        assert_eq!(reader.header().record_count, 2);
        assert_eq!(reader.header().player_name, "player");
        assert!(reader.layout().entry_size);

        let records: Vec<_> = reader.collect::<Result<_, _>>().unwrap();
        assert_eq!(
            records[1],
            LightRecord {
                beatmap_id: 200,
                set_id: 20,
                title: "Second".to_string(),
                artist: "Camellia".to_string(),
                difficulty: "Extra".to_string(),
            }
        );
    }

    #[test]
    fn test_float_difficulty_without_size_prefix() {
        let records = decode_all(build_db(20230101, &[entry(5, 50, "Mid"), entry(6, 50, "Mid")]));
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].beatmap_id, 5);
        assert_eq!(records[1].beatmap_id, 6);
    }

    #[test]
    fn test_compact_star_ratings_version() {
        let records = decode_all(build_db(20250107, &[entry(7, 70, "New"), entry(8, 80, "Newer")]));
        assert_eq!(
            records.iter().map(|r| r.set_id).collect::<Vec<_>>(),
            vec![70, 80]
        );
    }

    #[test]
    fn test_empty_arrays() {
        let mut e = entry(1, 2, "Empty");
        e.star_ratings = 0;
        e.timing_points = 0;
        let records = decode_all(build_db(20250107, &[e]));
        assert_eq!(records[0].title, "Empty");
    }

    #[test]
    fn test_invalid_string_tag_stops_iteration() {
        let mut data = build_db(20230101, &[entry(1, 1, "A"), entry(2, 2, "B")]);
        // header: 4 + 4 + 1 + 8 + player(8) + count(4) = 29; first record starts with the artist tag
        assert_eq!(data[29], 0x0B);
        data[29] = 0x42;

        let mut reader = OsuDbReader::from_bytes(data).unwrap();
        let err = reader.next().unwrap().unwrap_err();
        assert_eq!(err.offset(), Some(29));
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_truncated_stream() {
        let mut data = build_db(20230101, &[entry(1, 1, "A"), entry(2, 2, "B")]);
        data.truncate(data.len() - 3);

        let results: Vec<_> = OsuDbReader::from_bytes(data).unwrap().collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(DbError::MalformedStream { .. })));
    }

    #[test]
    fn test_array_len_overflow_is_malformed() {
        let data = 7i32.to_le_bytes();
        let mut reader = ByteReader::new(&data);
        let err = read_array_len(&mut reader, usize::MAX, "timing point").unwrap_err();
        assert_eq!(err.offset(), Some(0));
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_negative_timing_point_count() {
        let data = (-3i32).to_le_bytes();
        let mut reader = ByteReader::new(&data);
        let err = read_array_len(&mut reader, TIMING_POINT_BYTES, "timing point").unwrap_err();
        assert!(err.to_string().contains("negative timing point count -3"));
    }

    #[test]
    fn test_negative_record_count() {
        let mut data = build_db(20230101, &[]);
        let len = data.len();
        data[len - 4..].copy_from_slice(&(-1i32).to_le_bytes());
        let err = OsuDbReader::from_bytes(data).unwrap_err();
        assert!(err.to_string().contains("negative record count"));
    }

    #[test]
    fn test_truncated_header() {
        assert!(OsuDbReader::from_bytes(vec![0u8; 6]).is_err());
    }

    #[test]
    fn test_owned_set_ids() {
        let data = build_db(
            20230101,
            &[entry(1, 10, "A"), entry(2, 10, "A"), entry(3, -1, "Local"), entry(4, 30, "C")],
        );
        let owned = owned_set_ids(OsuDbReader::from_bytes(data).unwrap()).unwrap();
        assert_eq!(owned.into_iter().collect::<Vec<_>>(), vec![10, 30]);
    }

    #[test]
    fn test_open_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("osu!.db");
        std::fs::write(&path, build_db(20230101, &[entry(1, 1, "A")])).unwrap();

        let reader = OsuDbReader::open(&path).unwrap();
        assert_eq!(reader.version(), 20230101);
        assert_eq!(reader.count(), 1);
    }

    #[test]
    fn test_open_missing_file() {
        let err = OsuDbReader::open("/nonexistent/osu!.db").unwrap_err();
        assert!(matches!(err, DbError::Io { .. }));
    }
}
