//! CJK text utilities.

/// Normalize a string into a lookup key.
///
/// Fullwidth ASCII is folded to halfwidth, letters are lowercased and runs of
/// whitespace collapse to a single space.
pub fn normalize(s: &str) -> String {
    to_halfwidth(s)
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Fold fullwidth ASCII variants (U+FF01..U+FF5E) and the ideographic space.
pub fn to_halfwidth(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '\u{3000}' => ' ',
            '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
            _ => c,
        })
        .collect()
}

/// Check if a string contains CJK characters.
pub fn contains_cjk(s: &str) -> bool {
    s.chars().any(is_cjk_char)
}

/// Check if a character is a Chinese, Japanese kana or Hangul character.
pub fn is_cjk_char(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}' |  // CJK Unified Ideographs
        '\u{3400}'..='\u{4DBF}' |  // CJK Unified Ideographs Extension A
        '\u{F900}'..='\u{FAFF}' |  // CJK Compatibility Ideographs
        '\u{20000}'..='\u{2A6DF}' | // CJK Unified Ideographs Extension B
        '\u{3040}'..='\u{309F}' |  // Hiragana
        '\u{30A0}'..='\u{30FF}' |  // Katakana
        '\u{AC00}'..='\u{D7AF}'    // Hangul syllables
    )
}

/// Parse a number written with ASCII digits or Chinese numerals up to 99.
///
/// Accepts `12`, `十二` and `二十`.
pub fn parse_number(s: &str) -> Option<u16> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if s.chars().all(|c| c.is_ascii_digit()) {
        return s.parse().ok();
    }

    let digit = |c: char| -> Option<u16> {
        Some(match c {
            '零' | '〇' => 0,
            '一' => 1,
            '二' | '两' => 2,
            '三' => 3,
            '四' => 4,
            '五' => 5,
            '六' => 6,
            '七' => 7,
            '八' => 8,
            '九' => 9,
            _ => return None,
        })
    };

    let chars: Vec<char> = s.chars().collect();
    match chars.iter().position(|&c| c == '十') {
        None if chars.len() == 1 => digit(chars[0]),
        None => None,
        Some(pos) => {
            let tens = match pos {
                0 => 1,
                1 => digit(chars[0])?,
                _ => return None,
            };
            let ones = match &chars[pos + 1..] {
                [] => 0,
                [c] => digit(*c)?,
                _ => return None,
            };
            Some(tens * 10 + ones)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_cjk() {
        assert!(contains_cjk("葬送的芙莉莲"));
        assert!(contains_cjk("Frieren フリーレン"));
        assert!(!contains_cjk("Sousou no Frieren"));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  The   Matrix "), "the matrix");
        assert_eq!(normalize("ＡＢＣ　１２"), "abc 12");
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("07"), Some(7));
        assert_eq!(parse_number("三"), Some(3));
        assert_eq!(parse_number("十"), Some(10));
        assert_eq!(parse_number("十二"), Some(12));
        assert_eq!(parse_number("二十"), Some(20));
        assert_eq!(parse_number("二十四"), Some(24));
        assert_eq!(parse_number("百"), None);
        assert_eq!(parse_number(""), None);
    }
}
