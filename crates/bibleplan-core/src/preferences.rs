//! Reading preferences.

use anyhow::Result;

use crate::storage::{LocalStorage, TEXT_SIZE_KEY};

/// Relative text scale for each size step.
const SCALES: [f32; 6] = [0.9, 1.0, 1.12, 1.25, 1.4, 1.6];

/// Labels shown for each size step.
const LABELS: [&str; 6] = ["80%", "89%", "100%", "112%", "125%", "143%"];

const DEFAULT_INDEX: usize = 2;

/// Comfortable reading width, in terminal cells, at the default size.
const IDEAL_COLUMNS: f32 = 90.0;

/// Text size step, `0..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSize(usize);

impl Default for TextSize {
    fn default() -> Self {
        Self(DEFAULT_INDEX)
    }
}

impl TextSize {
    pub fn from_index(index: usize) -> Option<Self> {
        (index < SCALES.len()).then_some(Self(index))
    }

    /// Stored size, falling back to the default for missing or bad values.
    pub fn load(storage: &LocalStorage) -> Self {
        storage
            .get_item(TEXT_SIZE_KEY)
            .and_then(|v| v.trim().parse::<usize>().ok())
            .and_then(Self::from_index)
            .unwrap_or_default()
    }

    pub fn save(self, storage: &mut LocalStorage) -> Result<()> {
        storage.set_item(TEXT_SIZE_KEY, self.0.to_string())
    }

    pub fn label(self) -> &'static str {
        LABELS[self.0]
    }

    pub fn larger(self) -> Self {
        Self((self.0 + 1).min(SCALES.len() - 1))
    }

    pub fn smaller(self) -> Self {
        Self(self.0.saturating_sub(1))
    }

    /// Reading column width for `available` cells. Larger text means a
    /// narrower column.
    pub fn column_width(self, available: u16) -> u16 {
        let scale = SCALES[self.0] / SCALES[DEFAULT_INDEX];
        let columns = (IDEAL_COLUMNS / scale).round() as u16;
        columns.min(available)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = LocalStorage::open(dir.path()).unwrap();
        assert_eq!(TextSize::load(&storage), TextSize::default());

        storage.set_item(TEXT_SIZE_KEY, "9").unwrap();
        assert_eq!(TextSize::load(&storage), TextSize::default());

        storage.set_item(TEXT_SIZE_KEY, "abc").unwrap();
        assert_eq!(TextSize::load(&storage), TextSize::default());

        TextSize::from_index(4).unwrap().save(&mut storage).unwrap();
        assert_eq!(TextSize::load(&storage).label(), "125%");
    }

    #[test]
    fn test_steps_are_clamped() {
        let largest = TextSize::from_index(5).unwrap();
        assert_eq!(largest.larger(), largest);
        let smallest = TextSize::from_index(0).unwrap();
        assert_eq!(smallest.smaller(), smallest);
        assert!(TextSize::from_index(6).is_none());
    }

    #[test]
    fn test_column_width_shrinks_as_text_grows() {
        let default = TextSize::default();
        assert_eq!(default.column_width(200), 90);
        assert!(default.larger().column_width(200) < 90);
        assert!(default.smaller().column_width(200) > 90);
        assert_eq!(default.column_width(40), 40);
    }
}
