use crate::models::Product;

/// Unit words meaning "piece(s)" that may follow a count.
const PIECE_UNITS: [char; 4] = ['件', '个', '條', '条'];

const NUMERAL_WORDS: [(char, i64); 11] = [
    ('一', 1),
    ('二', 2),
    ('两', 2),
    ('三', 3),
    ('四', 4),
    ('五', 5),
    ('六', 6),
    ('七', 7),
    ('八', 8),
    ('九', 9),
    ('十', 10),
];

/// Extracts a piece count from a free-text size such as `"3件"`, `"两条"` or
/// `"均码"`.
///
/// 1. The first digit run followed (after optional whitespace) by a piece unit
///    wins, if it is positive.
/// 2. Otherwise, when a piece unit appears anywhere, the numeral word that
///    occurs first in the text wins.
/// 3. Otherwise any non-empty text counts as one piece; empty text is zero.
pub fn parse_quantity(size: &str) -> i64 {
    if size.is_empty() {
        return 0;
    }

    if let Some(qty) = digits_before_unit(size) {
        return qty;
    }

    if size.chars().any(|c| PIECE_UNITS.contains(&c)) {
        let first_numeral = size.chars().find_map(|c| {
            NUMERAL_WORDS
                .iter()
                .find(|(word, _)| *word == c)
                .map(|(_, value)| *value)
        });
        if let Some(qty) = first_numeral {
            return qty;
        }
    }

    1
}

/// Returns the count from the first `<digits>\s*<unit>` match, or `None` when
/// there is no match or the matched count is zero or out of range.
fn digits_before_unit(size: &str) -> Option<i64> {
    let bytes = size.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if !bytes[i].is_ascii_digit() {
            i += 1;
            continue;
        }
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        let digits = &size[start..i];
        let unit = size[i..].trim_start_matches(|c: char| c.is_ascii_whitespace()).chars().next();
        if unit.is_some_and(|c| PIECE_UNITS.contains(&c)) {
            return digits.parse::<i64>().ok().filter(|qty| *qty > 0);
        }
    }
    None
}

/// Recomputes every derived field of a product from its inputs.
pub fn derive_fields(product: &mut Product) {
    product.quantity = parse_quantity(&product.size);
    product.cost_rmb = product.cost_eur * product.exchange_rate;
    product.total_cost = product.cost_rmb + product.shipping_fee;
    product.profit = product.price_rmb - product.total_cost;
}
