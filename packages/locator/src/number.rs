//! House-number parsing.
//!
//! Raw `addr:housenumber` values come in many shapes: `"12"`, `"12a"`,
//! `"12-14"`, `"12, 14"`, and the American `block-house` form `"12-34"`.
//! [`ParsedNumber`] reduces them to a leading integer plus an optional
//! short range. Parsing never fails: an unparsable value yields `0`,
//! which simply matches nothing.

/// Normalized form of a house number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedNumber {
    full: String,
    start: u32,
    end: Option<u32>,
}

/// Options that influence how ranges are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberRules {
    /// Ranges spanning `2 * nearby_distance` or more are dropped.
    pub nearby_distance: u32,
    /// Fold `block-house` (`12-34`) into a single value (`1234`).
    pub american: bool,
}

impl Default for NumberRules {
    fn default() -> Self {
        Self {
            nearby_distance: 4,
            american: false,
        }
    }
}

/// Reads a run of ASCII digits at the start of `s`.
///
/// Returns the value (saturating) and the number of bytes consumed.
fn leading_digits(s: &str) -> Option<(u32, usize)> {
    let len = s.bytes().take_while(u8::is_ascii_digit).count();
    if len == 0 {
        return None;
    }
    let value = s[..len].bytes().fold(0u32, |acc, b| {
        acc.saturating_mul(10).saturating_add(u32::from(b - b'0'))
    });
    Some((value, len))
}

impl ParsedNumber {
    /// Parses a raw house number.
    #[must_use]
    pub fn parse(number: &str, rules: NumberRules) -> Self {
        let full = number.to_lowercase();

        let trimmed = number.trim_start();
        let (mut start, consumed) = leading_digits(trimmed).unwrap_or((0, 0));
        let mut rest = &trimmed[consumed..];

        let mut end = None;
        let mut has_comma = false;
        let mut has_minus = false;

        while let Some(c) = rest.chars().next() {
            match c {
                ' ' | '\t' => rest = &rest[1..],
                ',' | ';' => {
                    has_comma = true;
                    rest = &rest[1..];
                }
                '-' => {
                    has_minus = true;
                    rest = &rest[1..];
                }
                _ => {
                    if !(has_comma || has_minus) {
                        break;
                    }
                    let Some((value, len)) = leading_digits(rest) else {
                        break;
                    };
                    end = Some(value);
                    rest = &rest[len..];
                }
            }
        }

        if let Some(e) = end {
            if has_minus && rules.american {
                start = start.saturating_mul(100).saturating_add(e);
                end = None;
            } else if start.abs_diff(e) >= 2 * rules.nearby_distance {
                end = None;
            } else if start > e {
                end = Some(start);
                start = e;
            }
        }

        Self { full, start, end }
    }

    /// The lower-cased original text.
    #[must_use]
    pub fn full(&self) -> &str {
        &self.full
    }

    /// Leading integer (the lower bound of a range).
    #[must_use]
    pub const fn int_number(&self) -> u32 {
        self.start
    }

    #[must_use]
    pub const fn is_odd(&self) -> bool {
        self.start % 2 == 1
    }

    /// Whether two numbers may denote the same address within `offset`.
    ///
    /// Both numbers are treated as closed intervals (a single value is a
    /// degenerate interval); `self` is widened by `offset` on both sides.
    #[must_use]
    pub fn intersects(&self, other: &Self, offset: u32) -> bool {
        let self_end = self.end.unwrap_or(self.start);
        let other_end = other.end.unwrap_or(other.start);
        u64::from(self.start) <= u64::from(other_end) + u64::from(offset)
            && u64::from(other.start) <= u64::from(self_end) + u64::from(offset)
    }
}

/// Whether a raw tag value looks like a house number at all.
#[must_use]
pub fn is_house_number(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty()
        && value.len() <= 15
        && value.chars().next().is_some_and(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> ParsedNumber {
        ParsedNumber::parse(s, NumberRules::default())
    }

    fn american(s: &str) -> ParsedNumber {
        ParsedNumber::parse(
            s,
            NumberRules {
                american: true,
                ..NumberRules::default()
            },
        )
    }

    #[test]
    fn parses_single_value() {
        let n = parse("12");
        assert_eq!(n.int_number(), 12);
        assert_eq!(n.end, None);
        assert!(!n.is_odd());
    }

    #[test]
    fn parses_hyphen_range() {
        let n = parse("12-14");
        assert_eq!(n.int_number(), 12);
        assert_eq!(n.end, Some(14));
    }

    #[test]
    fn parses_comma_range() {
        let n = parse("12, 14");
        assert_eq!(n.int_number(), 12);
        assert_eq!(n.end, Some(14));
    }

    #[test]
    fn orders_reversed_range() {
        let n = parse("15;13");
        assert_eq!(n.int_number(), 13);
        assert_eq!(n.end, Some(15));
        assert!(n.is_odd());
    }

    #[test]
    fn folds_american_block_numbers() {
        let n = american("12-34");
        assert_eq!(n.int_number(), 1234);
        assert_eq!(n.end, None);
    }

    #[test]
    fn american_mode_keeps_comma_ranges() {
        let n = american("12, 14");
        assert_eq!(n.int_number(), 12);
        assert_eq!(n.end, Some(14));
    }

    #[test]
    fn drops_wide_range_keeping_start() {
        let n = parse("12-40");
        assert_eq!(n.int_number(), 12);
        assert_eq!(n.end, None);

        // Exactly 2 * nearby_distance apart is already too wide.
        assert_eq!(parse("10-18").end, None);
        assert_eq!(parse("10-17").end, Some(17));
    }

    #[test]
    fn space_alone_does_not_form_range() {
        let n = parse("12 14");
        assert_eq!(n.int_number(), 12);
        assert_eq!(n.end, None);
    }

    #[test]
    fn keeps_full_text_lower_cased() {
        let n = parse("12A");
        assert_eq!(n.full(), "12a");
        assert_eq!(n.int_number(), 12);
        assert_eq!(n.end, None);
    }

    #[test]
    fn malformed_input_degrades_to_zero() {
        assert_eq!(parse("abc").int_number(), 0);
        assert_eq!(parse("").int_number(), 0);
        assert_eq!(parse("-").int_number(), 0);
    }

    #[test]
    fn intersects_single_values_within_offset() {
        assert!(parse("12").intersects(&parse("12"), 0));
        assert!(!parse("12").intersects(&parse("14"), 0));
        assert!(parse("12").intersects(&parse("16"), 4));
        assert!(!parse("12").intersects(&parse("17"), 4));
    }

    #[test]
    fn intersects_ranges() {
        assert!(parse("12-14").intersects(&parse("13"), 0));
        assert!(parse("13").intersects(&parse("12-14"), 0));
        assert!(!parse("12-14").intersects(&parse("18"), 0));
        assert!(parse("12-14").intersects(&parse("18"), 4));
        assert!(parse("12-14").intersects(&parse("16-18"), 2));
        assert!(!parse("12-14").intersects(&parse("17-19"), 2));
    }

    #[test]
    fn recognizes_house_numbers() {
        assert!(is_house_number("12"));
        assert!(is_house_number(" 7b "));
        assert!(!is_house_number("b7"));
        assert!(!is_house_number(""));
        assert!(!is_house_number("1234567890123456"));
    }
}
