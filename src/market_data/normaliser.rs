// Convert wire strings into internal prices/volumes.
// Fail-soft: anything unreadable becomes 0.0, which the spread engine treats as "no quote".

use crate::market_data::order_book::{Levels, PriceLevel};

pub fn parse_decimal(s: &str) -> f64 {
    match s.trim().trim_matches('"').parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

/// Normalise one side of the book, keeping the feed's ordering (best level first).
pub fn norm_side<'a, I>(side: I) -> Levels
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    side.into_iter()
        .map(|(px, sz)| PriceLevel {
            price: parse_decimal(px),
            volume: parse_decimal(sz),
        })
        .collect()
}
