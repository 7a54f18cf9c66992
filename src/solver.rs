use std::cmp::Reverse;

use tracing::{debug, warn};

use crate::config::PackConfig;
use crate::free_space::{Fit, FreeSpace};
use crate::types::{PackingResult, PieceSpec, PlaceableUnit, PlacedPiece, Rect, Sheet};

/// Packs `pieces` onto as few `config.sheet` sized sheets as the greedy
/// heuristic manages.
pub fn pack(pieces: &[PieceSpec], config: &PackConfig) -> PackingResult {
    Solver::new(*config, pieces.to_vec()).solve()
}

/// Expands every valid piece into `quantity` units and orders them by area,
/// largest first. Equal areas keep their expansion order.
pub fn expand_units(pieces: &[PieceSpec]) -> Vec<PlaceableUnit> {
    let mut units = Vec::new();
    for piece in pieces.iter().filter(|p| p.is_valid()) {
        for i in 0..piece.quantity {
            units.push(PlaceableUnit {
                unit_id: format!("{}-{}", piece.id, i),
                original_id: piece.id,
                rect: piece.rect(),
            });
        }
    }
    units.sort_by_key(|u| Reverse(u.rect.area()));
    units
}

pub struct Solver {
    config: PackConfig,
    pieces: Vec<PieceSpec>,
}

/// A sheet still accepting pieces.
struct OpenSheet {
    id: usize,
    free_space: FreeSpace,
    placements: Vec<PlacedPiece>,
    used_area: u64,
}

impl Solver {
    pub fn new(config: PackConfig, pieces: Vec<PieceSpec>) -> Self {
        Self { config, pieces }
    }

    pub fn solve(&self) -> PackingResult {
        let dropped = self.pieces.iter().filter(|p| !p.is_valid()).count();
        if dropped > 0 {
            debug!(dropped, "ignoring pieces with zero dimensions or quantity");
        }

        let mut unplaced = expand_units(&self.pieces);
        let mut sheets = Vec::new();
        let mut unplaceable = Vec::new();

        while !unplaced.is_empty() {
            let mut sheet = self.open_sheet(sheets.len() + 1);
            while self.place_first_fit(&mut sheet, &mut unplaced) {}

            if sheet.placements.is_empty() {
                // Nothing fits on an empty sheet, so nothing left ever will.
                for unit in &unplaced {
                    warn!(
                        unit = %unit.unit_id,
                        size = %unit.rect,
                        sheet = %self.config.sheet,
                        gap = self.config.gap,
                        "piece does not fit on an empty sheet"
                    );
                }
                unplaceable.append(&mut unplaced);
                break;
            }

            sheets.push(self.close_sheet(sheet));
        }

        let result = PackingResult {
            stock: self.config.sheet,
            gap: self.config.gap,
            sheets,
            unplaceable,
        };
        debug!(
            sheets = result.sheet_count(),
            placed = result.placed_count(),
            unplaceable = result.unplaceable.len(),
            waste_percent = result.total_waste_percent(),
            "packing finished"
        );
        result
    }

    fn open_sheet(&self, id: usize) -> OpenSheet {
        OpenSheet {
            id,
            free_space: FreeSpace::new(
                self.config.sheet,
                self.config.gap,
                self.config.min_free_size,
            ),
            placements: Vec::new(),
            used_area: 0,
        }
    }

    /// Places the first unit in queue order that fits anywhere on the sheet.
    /// The unrotated orientation wins whenever it fits; the rotated one is only
    /// tried when it does not. Returns false when no unit fits.
    fn place_first_fit(
        &self,
        sheet: &mut OpenSheet,
        unplaced: &mut Vec<PlaceableUnit>,
    ) -> bool {
        let found = unplaced.iter().enumerate().find_map(|(i, unit)| {
            self.find_orientation(&sheet.free_space, unit.rect)
                .map(|orientation| (i, orientation))
        });
        let Some((i, (rect, rotated, fit))) = found else {
            return false;
        };

        let unit = unplaced.remove(i);
        sheet.free_space.occupy(fit.x, fit.y, rect);
        sheet.used_area += rect.area();
        sheet.placements.push(PlacedPiece {
            unit_id: unit.unit_id,
            original_id: unit.original_id,
            x: fit.x,
            y: fit.y,
            rect,
            rotated,
        });
        true
    }

    fn find_orientation(&self, free_space: &FreeSpace, unit: Rect) -> Option<(Rect, bool, Fit)> {
        if let Some(fit) = free_space.find_best_fit(unit) {
            return Some((unit, false, fit));
        }
        if !self.config.allow_rotate {
            return None;
        }
        let rotated = unit.rotated();
        free_space
            .find_best_fit(rotated)
            .map(|fit| (rotated, true, fit))
    }

    fn close_sheet(&self, sheet: OpenSheet) -> Sheet {
        let stock_area = self.config.sheet.area();
        let efficiency = if stock_area == 0 {
            0.0
        } else {
            sheet.used_area as f64 / stock_area as f64 * 100.0
        };
        debug!(
            sheet = sheet.id,
            pieces = sheet.placements.len(),
            efficiency = format_args!("{efficiency:.1}"),
            "sheet closed"
        );

        Sheet {
            id: sheet.id,
            stock: self.config.sheet,
            placements: sheet.placements,
            free_rects: sheet.free_space.into_rects(),
            used_area: sheet.used_area,
            efficiency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PackConfig {
        PackConfig::default()
    }

    /// Validates a complete result:
    /// 1. Every placement lies within the sheet
    /// 2. Placements on one sheet are at least `gap` apart along some axis
    /// 3. `used_area` matches the placed areas
    /// 4. Every unit is placed or reported unplaceable, exactly once
    fn assert_result_valid(result: &PackingResult, pieces: &[PieceSpec]) {
        let stock = result.stock;
        let gap = result.gap;

        for sheet in &result.sheets {
            for p in &sheet.placements {
                assert!(
                    p.right() <= stock.w && p.bottom() <= stock.h,
                    "sheet {}: {} ({}) @ ({},{}) exceeds stock {}",
                    sheet.id,
                    p.unit_id,
                    p.rect,
                    p.x,
                    p.y,
                    stock
                );
            }
            assert_gap_respected(sheet, gap);

            let placed_area: u64 = sheet.placements.iter().map(|p| p.rect.area()).sum();
            assert_eq!(sheet.used_area, placed_area, "sheet {} area", sheet.id);
        }

        let mut seen: Vec<&str> = result
            .sheets
            .iter()
            .flat_map(|s| &s.placements)
            .map(|p| p.unit_id.as_str())
            .chain(result.unplaceable.iter().map(|u| u.unit_id.as_str()))
            .collect();
        seen.sort_unstable();
        let mut expected: Vec<String> = expand_units(pieces)
            .into_iter()
            .map(|u| u.unit_id)
            .collect();
        expected.sort_unstable();
        assert_eq!(seen, expected, "every unit exactly once");
    }

    fn assert_gap_respected(sheet: &Sheet, gap: u32) {
        let placements = &sheet.placements;
        for i in 0..placements.len() {
            for j in (i + 1)..placements.len() {
                let a = &placements[i];
                let b = &placements[j];
                let apart = a.right() + gap <= b.x
                    || b.right() + gap <= a.x
                    || a.bottom() + gap <= b.y
                    || b.bottom() + gap <= a.y;
                assert!(
                    apart,
                    "sheet {}: {} ({} @ ({},{})) too close to {} ({} @ ({},{}))",
                    sheet.id, a.unit_id, a.rect, a.x, a.y, b.unit_id, b.rect, b.x, b.y
                );
            }
        }
    }

    #[test]
    fn test_expand_units_orders_by_area() {
        let pieces = vec![
            PieceSpec::new(1, 100, 100, 2),
            PieceSpec::new(2, 300, 200, 1),
            PieceSpec::new(3, 200, 50, 1),
        ];
        let ids: Vec<String> = expand_units(&pieces).into_iter().map(|u| u.unit_id).collect();
        assert_eq!(ids, vec!["2-0", "1-0", "1-1", "3-0"]);
    }

    #[test]
    fn test_expand_units_drops_malformed_pieces() {
        let pieces = vec![
            PieceSpec::new(1, 0, 100, 2),
            PieceSpec::new(2, 100, 0, 1),
            PieceSpec::new(3, 100, 100, 0),
            PieceSpec::new(4, 100, 100, 1),
        ];
        let units = expand_units(&pieces);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].original_id, 4);
    }

    #[test]
    fn test_no_pieces() {
        let result = pack(&[], &config());
        assert!(result.sheets.is_empty());
        assert!(result.unplaceable.is_empty());
    }

    #[test]
    fn test_identical_squares_share_one_sheet() {
        let pieces = vec![PieceSpec::new(1, 1000, 1000, 5)];
        let result = pack(&pieces, &config());
        assert_result_valid(&result, &pieces);

        assert_eq!(result.sheet_count(), 1);
        let sheet = &result.sheets[0];
        assert_eq!(sheet.id, 1);
        assert_eq!(sheet.placements.len(), 5);
        assert!(sheet.placements.iter().all(|p| !p.rotated));
        assert_eq!(sheet.used_area, 5_000_000);
        let xs: Vec<u32> = sheet.placements.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![0, 1005, 2010, 3015, 4020]);
        assert!(sheet.placements.iter().all(|p| p.y == 0));
    }

    #[test]
    fn test_rotation_when_upright_does_not_fit() {
        let pieces = vec![PieceSpec::new(1, 3100, 5800, 1)];
        let result = pack(&pieces, &config());
        assert_result_valid(&result, &pieces);

        assert_eq!(result.sheet_count(), 1);
        let p = &result.sheets[0].placements[0];
        assert!(p.rotated);
        assert_eq!(p.rect, Rect::new(5800, 3100));
        assert_eq!((p.x, p.y), (0, 0));
    }

    #[test]
    fn test_upright_wins_even_if_rotation_wastes_less() {
        // Rotated, 2000x1000 would leave less area in the 6000x3210 sheet,
        // but the upright orientation fits and is taken first.
        let pieces = vec![PieceSpec::new(1, 2000, 1000, 1)];
        let result = pack(&pieces, &config());
        assert!(!result.sheets[0].placements[0].rotated);
    }

    #[test]
    fn test_no_rotate_reports_unplaceable() {
        let pieces = vec![PieceSpec::new(1, 3100, 5800, 1)];
        let config = PackConfig {
            allow_rotate: false,
            ..config()
        };
        let result = pack(&pieces, &config);
        assert_result_valid(&result, &pieces);
        assert!(result.sheets.is_empty());
        assert_eq!(result.unplaceable.len(), 1);
    }

    #[test]
    fn test_oversized_piece_is_unplaceable() {
        let pieces = vec![PieceSpec::new(1, 7000, 7000, 1)];
        let result = pack(&pieces, &config());
        assert_result_valid(&result, &pieces);

        assert!(result.sheets.is_empty());
        assert_eq!(result.unplaceable.len(), 1);
        assert_eq!(result.unplaceable[0].unit_id, "1-0");
    }

    #[test]
    fn test_oversized_piece_does_not_block_others() {
        let pieces = vec![
            PieceSpec::new(1, 7000, 7000, 2),
            PieceSpec::new(2, 1000, 1000, 3),
        ];
        let result = pack(&pieces, &config());
        assert_result_valid(&result, &pieces);

        assert_eq!(result.sheet_count(), 1);
        assert_eq!(result.placed_count(), 3);
        let ids: Vec<&str> = result.unplaceable.iter().map(|u| u.unit_id.as_str()).collect();
        assert_eq!(ids, vec!["1-0", "1-1"]);
    }

    #[test]
    fn test_piece_touching_sheet_edge_needs_gap() {
        // 6000x3210 exactly leaves no room for the kerf.
        let pieces = vec![PieceSpec::new(1, 6000, 3210, 1)];
        let result = pack(&pieces, &config());
        assert_eq!(result.unplaceable.len(), 1);

        let pieces = vec![PieceSpec::new(1, 5995, 3205, 1)];
        let result = pack(&pieces, &config());
        assert_result_valid(&result, &pieces);
        assert_eq!(result.sheet_count(), 1);
        let expected = 5995.0 * 3205.0 / (6000.0 * 3210.0) * 100.0;
        assert!((result.sheets[0].efficiency - expected).abs() < 1e-9);
    }

    #[test]
    fn test_zero_sized_sheet_terminates() {
        let config = PackConfig {
            sheet: Rect::new(0, 0),
            ..config()
        };
        let pieces = vec![PieceSpec::new(1, 100, 100, 3)];
        let result = pack(&pieces, &config);
        assert!(result.sheets.is_empty());
        assert_eq!(result.unplaceable.len(), 3);
    }

    #[test]
    fn test_overflow_opens_more_sheets() {
        let pieces = vec![PieceSpec::new(1, 3000, 2000, 4)];
        let result = pack(&pieces, &config());
        assert_result_valid(&result, &pieces);

        assert!(result.sheet_count() > 1);
        let used: u64 = result.sheets.iter().map(|s| s.used_area).sum();
        assert_eq!(used, 4 * 3000 * 2000);
        let ids: Vec<usize> = result.sheets.iter().map(|s| s.id).collect();
        let expected: Vec<usize> = (1..=result.sheet_count()).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_small_piece_fills_gap_on_current_sheet() {
        // After the big piece the pass restarts from the front of the queue, so
        // the later small piece still lands on the first sheet.
        let pieces = vec![
            PieceSpec::new(1, 5000, 3000, 2),
            PieceSpec::new(2, 800, 800, 1),
        ];
        let result = pack(&pieces, &config());
        assert_result_valid(&result, &pieces);

        assert_eq!(result.sheet_count(), 2);
        let first: Vec<&str> = result.sheets[0]
            .placements
            .iter()
            .map(|p| p.unit_id.as_str())
            .collect();
        assert_eq!(first, vec!["1-0", "2-0"]);
    }

    #[test]
    fn test_free_rects_exposed_on_sheet() {
        let pieces = vec![PieceSpec::new(1, 1000, 1000, 1)];
        let result = pack(&pieces, &config());
        let free = &result.sheets[0].free_rects;
        assert_eq!(free.len(), 2);
        let free_area: u64 = free.iter().map(|r| r.area()).sum();
        assert!(free_area > 0);
    }

    #[test]
    fn test_deterministic() {
        let pieces = vec![
            PieceSpec::new(1, 2000, 1500, 3),
            PieceSpec::new(2, 1000, 800, 5),
            PieceSpec::new(3, 500, 500, 8),
            PieceSpec::new(4, 1500, 1200, 4),
        ];
        let a = pack(&pieces, &config());
        let b = pack(&pieces, &config());
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn test_mixed_sizes() {
        let pieces = vec![
            PieceSpec::new(1, 2000, 1500, 3),
            PieceSpec::new(2, 1000, 800, 5),
            PieceSpec::new(3, 500, 500, 8),
            PieceSpec::new(4, 1500, 1200, 4),
        ];
        let result = pack(&pieces, &config());
        assert_result_valid(&result, &pieces);
        assert!(result.unplaceable.is_empty());

        let requested: u64 = pieces.iter().map(|p| p.rect().area() * p.quantity as u64).sum();
        let min_sheets = requested.div_ceil(result.stock.area()) as usize;
        assert!(result.sheet_count() >= min_sheets);
        assert_eq!(result.summary().requested_area, requested);
    }

    #[test]
    fn test_large_pieces_with_fillers() {
        let pieces = vec![
            PieceSpec::new(1, 3000, 2000, 2),
            PieceSpec::new(2, 2500, 1800, 3),
            PieceSpec::new(3, 1000, 1000, 10),
        ];
        let result = pack(&pieces, &config());
        assert_result_valid(&result, &pieces);
        assert!(result.unplaceable.is_empty());
        assert!(result.sheets.iter().all(|s| s.efficiency > 0.0 && s.efficiency <= 100.0));
    }

    #[test]
    fn test_fallback_sample_all_placed() {
        let pieces = crate::extract::fallback_pieces();
        let result = pack(&pieces, &config());
        assert_result_valid(&result, &pieces);
        assert_eq!(result.placed_count(), 20);
        assert!(result.unplaceable.is_empty());
    }

    #[test]
    fn test_many_small_pieces_with_custom_sheet() {
        let config = PackConfig {
            sheet: Rect::new(2440, 1220),
            gap: 3,
            min_free_size: 50,
            allow_rotate: true,
        };
        let pieces = vec![
            PieceSpec::new(1, 700, 500, 6),
            PieceSpec::new(2, 350, 250, 5),
            PieceSpec::new(3, 1000, 400, 3),
            PieceSpec::new(4, 450, 450, 4),
            PieceSpec::new(5, 600, 300, 7),
            PieceSpec::new(6, 250, 150, 5),
            PieceSpec::new(7, 800, 400, 5),
        ];
        let result = pack(&pieces, &config);
        assert_result_valid(&result, &pieces);
        assert_eq!(result.placed_count(), 35);

        let summary = result.summary();
        assert_eq!(summary.total_sheets, result.sheet_count());
        assert_eq!(
            summary.total_waste_area,
            summary.total_sheet_area - summary.total_used_area
        );
        assert!((100.0 - summary.overall_efficiency - result.total_waste_percent()).abs() < 1e-9);
    }
}
