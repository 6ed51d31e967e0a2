pub mod delivery;
pub mod price;

pub use delivery::delivery_days;
pub use price::parse_price_rub;

/// Collapse every whitespace run (including NBSP and thin spaces) to one space and trim.
pub fn norm_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_mixed_whitespace() {
        assert_eq!(norm_text("  Доставим\u{a0}\n 5\u{2009}января "), "Доставим 5 января");
    }

    #[test]
    fn empty_stays_empty() {
        assert_eq!(norm_text(" \t\n"), "");
    }
}
