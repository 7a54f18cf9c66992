use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{Rect, deserialize_u32_from_number};

/// Packing parameters shared by every sheet of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackConfig {
    pub sheet: Rect,
    /// Kerf kept clear after the right and bottom edge of every piece.
    #[serde(deserialize_with = "deserialize_u32_from_number")]
    pub gap: u32,
    /// Free rectangles narrower or shorter than this are discarded.
    #[serde(deserialize_with = "deserialize_u32_from_number")]
    pub min_free_size: u32,
    pub allow_rotate: bool,
}

impl PackConfig {
    pub const DEFAULT_SHEET_WIDTH: u32 = 6000;
    pub const DEFAULT_SHEET_HEIGHT: u32 = 3210;
    pub const DEFAULT_GAP: u32 = 5;
    pub const DEFAULT_MIN_FREE_SIZE: u32 = 100;

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let config: PackConfig = serde_json::from_reader(std::io::BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sheet.is_empty() {
            return Err(Error::InvalidConfig(format!(
                "sheet dimensions must be non-zero, got {}",
                self.sheet
            )));
        }
        Ok(())
    }
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            sheet: Rect::new(Self::DEFAULT_SHEET_WIDTH, Self::DEFAULT_SHEET_HEIGHT),
            gap: Self::DEFAULT_GAP,
            min_free_size: Self::DEFAULT_MIN_FREE_SIZE,
            allow_rotate: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PackConfig::default();
        assert_eq!(config.sheet, Rect::new(6000, 3210));
        assert_eq!(config.gap, 5);
        assert_eq!(config.min_free_size, 100);
        assert!(config.allow_rotate);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: PackConfig = serde_json::from_str(r#"{"gap": 3}"#).unwrap();
        assert_eq!(config.gap, 3);
        assert_eq!(config.sheet, Rect::new(6000, 3210));
        assert!(config.allow_rotate);
    }

    #[test]
    fn test_zero_sheet_rejected() {
        let config: PackConfig =
            serde_json::from_str(r#"{"sheet": {"w": 0, "h": 3210}}"#).unwrap();
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }
}
