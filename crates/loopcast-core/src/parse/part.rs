//! Multi-part markers in episode titles: "(Part 1)", ", Part 2", "Part 3", "(1)".

use once_cell::sync::Lazy;
use regex::Regex;

const PART_NUM: &str = r"(\d{1,2}|one|two|three|four|five|i{1,3}|iv|v)";

static PAREN_PART: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\(\s*part\s+{}\s*\)", PART_NUM)).expect("part regex")
});
static TRAILING_PART: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)(?:^|[\s,:.-])part\s+{}\s*$", PART_NUM)).expect("part regex")
});
static TRAILING_NUM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\((\d{1,2})\)\s*$").expect("part regex"));

fn part_value(token: &str) -> Option<u32> {
    match token.to_ascii_lowercase().as_str() {
        "one" | "i" => Some(1),
        "two" | "ii" => Some(2),
        "three" | "iii" => Some(3),
        "four" | "iv" => Some(4),
        "five" | "v" => Some(5),
        digits => digits.parse().ok(),
    }
}

/// Part number encoded in an episode title, if any.
pub fn part_number(title: &str) -> Option<u32> {
    [&*PAREN_PART, &*TRAILING_PART, &*TRAILING_NUM]
        .iter()
        .find_map(|re| re.captures(title))
        .and_then(|c| c.get(1))
        .and_then(|m| part_value(m.as_str()))
        .filter(|n| *n > 0)
}

/// Title with its part marker removed ("Into the Deep (Part 1)" -> "Into the Deep").
pub fn strip_part_marker(title: &str) -> String {
    let mut out = title.to_string();
    for re in [&*PAREN_PART, &*TRAILING_PART, &*TRAILING_NUM] {
        if let Some(m) = re.find(&out) {
            out.replace_range(m.range(), "");
            break;
        }
    }
    out.trim_end_matches(|c: char| c.is_whitespace() || matches!(c, ',' | ':' | '-' | '.'))
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_marker_styles() {
        assert_eq!(part_number("Into the Deep (Part 1)"), Some(1));
        assert_eq!(part_number("Into the Deep, Part 2"), Some(2));
        assert_eq!(part_number("Into the Deep Part 3"), Some(3));
        assert_eq!(part_number("Into the Deep (2)"), Some(2));
        assert_eq!(part_number("Into the Deep: Part Two"), Some(2));
        assert_eq!(part_number("Partners"), None);
        assert_eq!(part_number("Party Time"), None);
        assert_eq!(part_number("Part of the Crew"), None);
    }

    #[test]
    fn strips_marker() {
        assert_eq!(strip_part_marker("Into the Deep (Part 1)"), "Into the Deep");
        assert_eq!(strip_part_marker("Into the Deep, Part 2"), "Into the Deep");
        assert_eq!(strip_part_marker("Homecoming (2)"), "Homecoming");
        assert_eq!(strip_part_marker("Plain Title"), "Plain Title");
    }
}
