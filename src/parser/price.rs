use std::sync::LazyLock;

use regex::Regex;

static RUB_PRICE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d[\d ]*)\s*₽").unwrap());

/// Whitespace variants the storefront puts between digit groups.
const SPACE_VARIANTS: &[char] = &['\u{a0}', '\u{2009}', '\u{202f}', '\u{2007}'];

/// Parse the first `<digits> ₽` amount in `text` into whole roubles.
///
/// Digit groups may be separated by ordinary, non-breaking or thin spaces.
/// Returns `None` when no amount followed by the rouble sign is present.
pub fn parse_price_rub(text: &str) -> Option<i64> {
    if text.is_empty() {
        return None;
    }
    let normalized = text.replace(SPACE_VARIANTS, " ");
    let caps = RUB_PRICE_RE.captures(&normalized)?;
    let digits: String = caps[1].chars().filter(|c| !c.is_whitespace()).collect();
    digits.parse().ok()
}
