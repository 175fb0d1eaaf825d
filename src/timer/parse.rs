use once_cell::sync::Lazy;
use regex::Regex;

static TIME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{1,2}:\d{2}(:\d{2})?$").expect("time pattern is a valid regex")
});

/// True when the (already trimmed) text looks like `M:SS`, `MM:SS` or `H:MM:SS`.
pub fn looks_like_time(text: &str) -> bool {
    TIME_RE.is_match(text)
}

/// Convert a displayed countdown into total seconds.
///
/// Two segments are minutes:seconds, three are hours:minutes:seconds. Anything
/// that fails the pattern yields `None`. Segments are not range-checked, so
/// `"1:75"` is 135 seconds exactly as the page would have meant it.
pub fn parse_time_to_seconds(text: &str) -> Option<u32> {
    let text = text.trim();
    if !looks_like_time(text) {
        return None;
    }

    let parts = text
        .split(':')
        .map(|part| part.parse::<u32>().ok())
        .collect::<Option<Vec<_>>>()?;

    match parts.as_slice() {
        [minutes, seconds] => Some(minutes * 60 + seconds),
        [hours, minutes, seconds] => Some(hours * 3600 + minutes * 60 + seconds),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_minutes_and_hours() {
        assert_eq!(parse_time_to_seconds("5:30"), Some(330));
        assert_eq!(parse_time_to_seconds("05:30"), Some(330));
        assert_eq!(parse_time_to_seconds("1:02:03"), Some(3723));
        assert_eq!(parse_time_to_seconds("0:00"), Some(0));
        assert_eq!(parse_time_to_seconds("  24:59 "), Some(1499));
    }

    #[test]
    fn rejects_non_time_text() {
        for text in ["abc", "5:3", "", ":30", "123:00", "1:2:3", "5:30 PM", "1:02:03:04"] {
            assert_eq!(parse_time_to_seconds(text), None, "{text:?}");
        }
    }

    proptest! {
        #[test]
        fn two_segment_values_roundtrip(m in 0u32..100, s in 0u32..100) {
            let text = format!("{m}:{s:02}");
            prop_assert_eq!(parse_time_to_seconds(&text), Some(m * 60 + s));
        }

        #[test]
        fn three_segment_values_roundtrip(h in 0u32..100, m in 0u32..100, s in 0u32..100) {
            let text = format!("{h}:{m:02}:{s:02}");
            prop_assert_eq!(parse_time_to_seconds(&text), Some(h * 3600 + m * 60 + s));
        }

        #[test]
        fn text_with_letters_never_parses(text in "[a-zA-Z ]{0,8}") {
            prop_assert_eq!(parse_time_to_seconds(&text), None);
        }
    }
}
