//! Decoded beatmap entries.

/// The subset of a beatmap entry needed to identify owned sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightRecord {
    /// Beatmap (difficulty) ID; `0` or negative when unsubmitted.
    pub beatmap_id: i32,
    /// Beatmap set ID; `-1` when unsubmitted.
    pub set_id: i32,
    pub title: String,
    pub artist: String,
    /// Difficulty name.
    pub difficulty: String,
}

impl LightRecord {
    /// The set ID when it refers to a submitted set.
    pub fn online_set_id(&self) -> Option<u32> {
        u32::try_from(self.set_id).ok().filter(|id| *id > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(set_id: i32) -> LightRecord {
        LightRecord {
            beatmap_id: 1,
            set_id,
            title: "t".to_string(),
            artist: "a".to_string(),
            difficulty: "d".to_string(),
        }
    }

    #[test]
    fn test_online_set_id() {
        assert_eq!(record(42).online_set_id(), Some(42));
        assert_eq!(record(0).online_set_id(), None);
        assert_eq!(record(-1).online_set_id(), None);
    }
}
