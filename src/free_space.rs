use std::cmp::Reverse;

use serde::{Deserialize, Serialize};

use crate::types::Rect;

/// Unoccupied area of a sheet that a piece may still be placed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeRect {
    pub x: u32,
    pub y: u32,
    pub rect: Rect,
}

impl FreeRect {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self {
            x,
            y,
            rect: Rect::new(w, h),
        }
    }

    pub fn right(&self) -> u32 {
        self.x + self.rect.w
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.rect.h
    }

    pub fn area(&self) -> u64 {
        self.rect.area()
    }

    /// True unless the piece, padded by `gap` on its right and bottom edges,
    /// stays clear of this rectangle.
    fn overlaps(&self, x: u32, y: u32, piece: Rect, gap: u32) -> bool {
        !(x >= self.right()
            || x + piece.w + gap <= self.x
            || y >= self.bottom()
            || y + piece.h + gap <= self.y)
    }

    /// Pushes the parts of `self` left over around the padded piece: the full
    /// width strips above and below, then the left and right strips clipped
    /// to the piece's vertical band.
    fn fragment(&self, x: u32, y: u32, piece: Rect, gap: u32, out: &mut Vec<FreeRect>) {
        let piece_right = x + piece.w + gap;
        let piece_bottom = y + piece.h + gap;
        let band_top = self.y.max(y);
        let band_h = self.bottom().min(piece_bottom).saturating_sub(band_top);

        let mut fragments = Vec::with_capacity(4);
        if y > self.y {
            fragments.push(FreeRect::new(self.x, self.y, self.rect.w, y - self.y));
        }
        if piece_bottom < self.bottom() {
            fragments.push(FreeRect::new(
                self.x,
                piece_bottom,
                self.rect.w,
                self.bottom() - piece_bottom,
            ));
        }
        if x > self.x {
            fragments.push(FreeRect::new(self.x, band_top, x - self.x, band_h));
        }
        if piece_right < self.right() {
            fragments.push(FreeRect::new(
                piece_right,
                band_top,
                self.right() - piece_right,
                band_h,
            ));
        }

        out.extend(fragments.into_iter().filter(|f| !f.rect.is_empty()));
    }

    fn can_merge(&self, other: &FreeRect) -> bool {
        if self.x == other.x && self.rect.w == other.rect.w {
            return self.bottom() == other.y || other.bottom() == self.y;
        }
        if self.y == other.y && self.rect.h == other.rect.h {
            return self.right() == other.x || other.right() == self.x;
        }
        false
    }

    fn union(&self, other: &FreeRect) -> FreeRect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        FreeRect::new(
            x,
            y,
            self.right().max(other.right()) - x,
            self.bottom().max(other.bottom()) - y,
        )
    }
}

/// Where a piece would go and how much of the chosen free rectangle it leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fit {
    pub x: u32,
    pub y: u32,
    pub waste: u64,
}

/// The free rectangles of one sheet, kept ordered by `(y, x)`.
#[derive(Debug, Clone)]
pub struct FreeSpace {
    gap: u32,
    min_size: u32,
    rects: Vec<FreeRect>,
}

impl FreeSpace {
    pub fn new(sheet: Rect, gap: u32, min_size: u32) -> Self {
        let rects = if sheet.is_empty() {
            Vec::new()
        } else {
            vec![FreeRect::new(0, 0, sheet.w, sheet.h)]
        };
        Self {
            gap,
            min_size,
            rects,
        }
    }

    pub fn rects(&self) -> &[FreeRect] {
        &self.rects
    }

    pub fn into_rects(self) -> Vec<FreeRect> {
        self.rects
    }

    /// Best area fit: among free rectangles that hold the piece plus its gap,
    /// pick the one with the smallest leftover area. Ties go to the topmost,
    /// then leftmost rectangle.
    pub fn find_best_fit(&self, piece: Rect) -> Option<Fit> {
        let need_w = piece.w as u64 + self.gap as u64;
        let need_h = piece.h as u64 + self.gap as u64;

        let mut best: Option<Fit> = None;
        for free in &self.rects {
            let (free_w, free_h) = (free.rect.w as u64, free.rect.h as u64);
            if free_w < need_w || free_h < need_h {
                continue;
            }
            let waste = (free_w - need_w) * (free_h - need_h);
            if best.is_none_or(|b| waste < b.waste) {
                best = Some(Fit {
                    x: free.x,
                    y: free.y,
                    waste,
                });
            }
        }
        best
    }

    /// Marks `piece` at `(x, y)` as occupied and rebuilds the free set:
    /// overlapped rectangles are fragmented, fragments are merged in a single
    /// forward sweep (largest first) and undersized leftovers are dropped.
    pub fn occupy(&mut self, x: u32, y: u32, piece: Rect) {
        let mut candidates = Vec::with_capacity(self.rects.len() + 4);
        for free in &self.rects {
            if free.overlaps(x, y, piece, self.gap) {
                free.fragment(x, y, piece, self.gap, &mut candidates);
            } else {
                candidates.push(*free);
            }
        }

        candidates.sort_by_key(|r| Reverse(r.area()));
        let mut merged = merge_forward(&candidates);
        merged.retain(|r| r.rect.w >= self.min_size && r.rect.h >= self.min_size);
        merged.sort_by_key(|r| (r.y, r.x));
        self.rects = merged;
    }
}

/// Each rectangle not yet absorbed keeps swallowing later neighbours until
/// none is left; rectangles already emitted are not revisited.
fn merge_forward(candidates: &[FreeRect]) -> Vec<FreeRect> {
    let mut consumed = vec![false; candidates.len()];
    let mut merged = Vec::with_capacity(candidates.len());

    for i in 0..candidates.len() {
        if consumed[i] {
            continue;
        }
        let mut current = candidates[i];
        loop {
            let mut absorbed = false;
            for j in (i + 1)..candidates.len() {
                if !consumed[j] && current.can_merge(&candidates[j]) {
                    current = current.union(&candidates[j]);
                    consumed[j] = true;
                    absorbed = true;
                }
            }
            if !absorbed {
                break;
            }
        }
        merged.push(current);
    }

    merged
}
