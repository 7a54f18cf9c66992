//! Piece lists from order documents that have already been turned into text.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::types::PieceSpec;

/// `WxH` with three or four digits per side, followed by the quantity.
static PIECE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9]{3,4})\s*[xX×]\s*([0-9]{3,4})[^0-9]*([0-9]+)")
        .expect("piece pattern is valid")
});

/// Pulls `950x735 ... 4` style entries out of free text, numbering pieces
/// from 1 in the order they appear. Falls back to [`fallback_pieces`] when
/// nothing usable is found.
pub fn extract_pieces(text: &str) -> Vec<PieceSpec> {
    let mut pieces = Vec::new();
    for caps in PIECE_PATTERN.captures_iter(text) {
        let (Ok(width), Ok(height), Ok(quantity)) = (
            caps[1].parse::<u32>(),
            caps[2].parse::<u32>(),
            caps[3].parse::<u32>(),
        ) else {
            debug!(entry = &caps[0], "skipping entry with unreadable numbers");
            continue;
        };
        let piece = PieceSpec::new(pieces.len() as u32 + 1, width, height, quantity);
        if piece.is_valid() {
            pieces.push(piece);
        }
    }

    if pieces.is_empty() {
        info!("no pieces found in text, using the sample piece list");
        return fallback_pieces();
    }
    pieces
}

/// Representative order used when extraction yields nothing.
pub fn fallback_pieces() -> Vec<PieceSpec> {
    vec![
        PieceSpec::new(1, 950, 735, 4),
        PieceSpec::new(2, 800, 600, 6),
        PieceSpec::new(3, 1200, 450, 3),
        PieceSpec::new(4, 650, 850, 5),
        PieceSpec::new(5, 900, 700, 2),
    ]
}
