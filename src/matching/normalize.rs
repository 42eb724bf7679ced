/// Canonical form of a horse name used as the cache key.
///
/// Lowercases, folds curly and backtick apostrophes into `'`, turns every
/// other punctuation mark into a space, then collapses and trims whitespace.
/// "Sea The Stars (IRE)" and "sea the  stars ire" normalise identically.
///
/// Non-ASCII letters are kept ("mémoire" stays "mémoire"). No Unicode
/// composition is applied: a decomposed accent is a combining mark, which is
/// not alphanumeric and becomes a space, so callers must pass NFC text.
pub fn normalize_horse_name(raw: &str) -> String {
    let folded: String = raw
        .to_lowercase()
        .chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' | '`' => '\'',
            c if c.is_alphanumeric() || c == '_' || c == '\'' || c.is_whitespace() => c,
            _ => ' ',
        })
        .collect();

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercase and trim, the base form for track comparisons.
pub fn normalize_track_name(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Drop every parenthesised segment, e.g. "chelmsford (aw)" → "chelmsford".
pub fn strip_parenthesized(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut depth = 0usize;
    for c in name.chars() {
        match c {
            '(' => {
                depth += 1;
                out.push(' ');
            }
            ')' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove a trailing standalone "city" word ("chelmsford city" → "chelmsford").
pub fn strip_city_suffix(name: &str) -> &str {
    let trimmed = name.trim_end();
    match trimmed.strip_suffix("city") {
        Some(rest) if rest.is_empty() || rest.ends_with(char::is_whitespace) => rest.trim(),
        _ => trimmed.trim_start(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_basic() {
        assert_eq!(normalize_horse_name("  Frankel  "), "frankel");
        assert_eq!(normalize_horse_name("SEA THE STARS"), "sea the stars");
    }

    #[test]
    fn test_normalize_apostrophes_unified() {
        assert_eq!(normalize_horse_name("Ruler\u{2019}s Gold"), "ruler's gold");
        assert_eq!(normalize_horse_name("Ruler`s Gold"), "ruler's gold");
        assert_eq!(normalize_horse_name("Ruler's Gold"), "ruler's gold");
    }

    #[test]
    fn test_normalize_punctuation_becomes_space() {
        assert_eq!(normalize_horse_name("Desert-Crown (IRE)"), "desert crown ire");
        assert_eq!(normalize_horse_name("Mr. Big!!"), "mr big");
    }

    #[test]
    fn test_normalize_keeps_non_ascii_letters() {
        assert_eq!(normalize_horse_name("M\u{e9}moire"), "m\u{e9}moire");
        assert_eq!(normalize_horse_name("\u{c9}CLAIR D'OR"), "\u{e9}clair d'or");
        // decomposed form is not folded into the composed one
        assert_eq!(normalize_horse_name("Me\u{301}moire"), "me moire");
    }

    #[test]
    fn test_normalize_empty_and_whitespace() {
        assert_eq!(normalize_horse_name(""), "");
        assert_eq!(normalize_horse_name(" \t\n "), "");
        assert_eq!(normalize_horse_name("..."), "");
    }

    #[test]
    fn test_normalize_idempotent() {
        let samples = [
            "Frankel",
            "  Desert-Crown (IRE) ",
            "Ruler\u{2019}s  Gold",
            "Mémoire d'Été",
            "A_B  c`d",
            "İstanbul Express",
            "",
            "!!!",
        ];
        for s in samples {
            let once = normalize_horse_name(s);
            assert_eq!(normalize_horse_name(&once), once, "not idempotent for {:?}", s);
        }
    }

    #[test]
    fn test_strip_parenthesized() {
        assert_eq!(strip_parenthesized("chelmsford (aw)"), "chelmsford");
        assert_eq!(strip_parenthesized("kempton (aw) park"), "kempton park");
        assert_eq!(strip_parenthesized("york"), "york");
    }

    #[test]
    fn test_strip_city_suffix() {
        assert_eq!(strip_city_suffix("chelmsford city"), "chelmsford");
        assert_eq!(strip_city_suffix("city"), "");
        // Only a whole trailing word counts
        assert_eq!(strip_city_suffix("velocity"), "velocity");
    }
}
