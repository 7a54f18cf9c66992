use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Error;
use crate::free_space::FreeRect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    #[serde(deserialize_with = "deserialize_u32_from_number")]
    pub w: u32,
    #[serde(deserialize_with = "deserialize_u32_from_number")]
    pub h: u32,
}

impl Rect {
    pub fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }

    pub fn area(&self) -> u64 {
        self.w as u64 * self.h as u64
    }

    pub fn rotated(&self) -> Self {
        Self {
            w: self.h,
            h: self.w,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.w, self.h)
    }
}

impl FromStr for Rect {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidDimensions(s.to_string());
        let (w, h) = s.split_once(['x', 'X']).ok_or_else(invalid)?;
        let w = w.trim().parse::<u32>().map_err(|_| invalid())?;
        let h = h.trim().parse::<u32>().map_err(|_| invalid())?;
        if w == 0 || h == 0 {
            return Err(invalid());
        }
        Ok(Rect::new(w, h))
    }
}

/// Accepts any JSON number for a length or count. Fractions are rounded;
/// zero, negative and non-finite values become 0 so the piece gets filtered.
pub fn deserialize_u32_from_number<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    Ok(number_to_u32(value))
}

fn number_to_u32(value: f64) -> u32 {
    if value.is_finite() && value > 0.0 {
        value.round() as u32
    } else {
        0
    }
}

/// A requested piece size and how many copies of it to cut.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PieceSpec {
    pub id: u32,
    #[serde(deserialize_with = "deserialize_u32_from_number")]
    pub width: u32,
    #[serde(deserialize_with = "deserialize_u32_from_number")]
    pub height: u32,
    #[serde(deserialize_with = "deserialize_u32_from_number")]
    pub quantity: u32,
}

impl PieceSpec {
    pub fn new(id: u32, width: u32, height: u32, quantity: u32) -> Self {
        Self {
            id,
            width,
            height,
            quantity,
        }
    }

    /// Parses `WxH:qty`.
    pub fn parse(id: u32, s: &str) -> Result<Self, Error> {
        let (dims, qty) = s
            .split_once(':')
            .ok_or_else(|| Error::InvalidPiece(s.to_string()))?;
        let rect: Rect = dims.parse()?;
        let quantity = qty
            .trim()
            .parse::<u32>()
            .map_err(|_| Error::InvalidPiece(s.to_string()))?;
        if quantity == 0 {
            return Err(Error::InvalidPiece(s.to_string()));
        }
        Ok(Self::new(id, rect.w, rect.h, quantity))
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.width, self.height)
    }

    pub fn is_valid(&self) -> bool {
        !self.rect().is_empty() && self.quantity > 0
    }
}

/// One physical copy of a `PieceSpec`, waiting for a place on a sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceableUnit {
    pub unit_id: String,
    pub original_id: u32,
    pub rect: Rect,
}

/// A unit as it landed on a sheet. `rect` holds the as-placed dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedPiece {
    pub unit_id: String,
    pub original_id: u32,
    pub x: u32,
    pub y: u32,
    pub rect: Rect,
    pub rotated: bool,
}

impl PlacedPiece {
    pub fn right(&self) -> u32 {
        self.x + self.rect.w
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.rect.h
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub id: usize,
    pub stock: Rect,
    pub placements: Vec<PlacedPiece>,
    pub free_rects: Vec<FreeRect>,
    pub used_area: u64,
    /// Used area as a percentage of the sheet area.
    pub efficiency: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackingResult {
    pub stock: Rect,
    pub gap: u32,
    pub sheets: Vec<Sheet>,
    /// Units that do not fit on an empty sheet in either orientation.
    pub unplaceable: Vec<PlaceableUnit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_sheets: usize,
    pub total_pieces: usize,
    pub unplaceable_pieces: usize,
    pub requested_area: u64,
    pub total_sheet_area: u64,
    pub total_used_area: u64,
    pub total_waste_area: u64,
    pub overall_efficiency: f64,
}

impl PackingResult {
    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    pub fn placed_count(&self) -> usize {
        self.sheets.iter().map(|s| s.placements.len()).sum()
    }

    pub fn total_waste_percent(&self) -> f64 {
        let total_sheet_area = self.stock.area() * self.sheets.len() as u64;
        if total_sheet_area == 0 {
            return 0.0;
        }
        let total_used: u64 = self.sheets.iter().map(|s| s.used_area).sum();
        (total_sheet_area - total_used) as f64 / total_sheet_area as f64 * 100.0
    }

    pub fn summary(&self) -> Summary {
        let total_sheet_area = self.stock.area() * self.sheets.len() as u64;
        let total_used_area: u64 = self.sheets.iter().map(|s| s.used_area).sum();
        let unplaceable_area: u64 = self.unplaceable.iter().map(|u| u.rect.area()).sum();
        let overall_efficiency = if total_sheet_area == 0 {
            0.0
        } else {
            total_used_area as f64 / total_sheet_area as f64 * 100.0
        };

        Summary {
            total_sheets: self.sheets.len(),
            total_pieces: self.placed_count(),
            unplaceable_pieces: self.unplaceable.len(),
            requested_area: total_used_area + unplaceable_area,
            total_sheet_area,
            total_used_area,
            total_waste_area: total_sheet_area - total_used_area,
            overall_efficiency,
        }
    }
}

/// A packing result together with its aggregate figures, as handed to
/// display and reporting consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub result: PackingResult,
    pub summary: Summary,
}

impl From<PackingResult> for Report {
    fn from(result: PackingResult) -> Self {
        let summary = result.summary();
        Self { result, summary }
    }
}
