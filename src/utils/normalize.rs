//! Title normalization for owned/expected album matching.
//!
//! `normalize_title` projects any album title to the canonical comparison
//! form used as the equality unit throughout the catalog. The projection is
//! idempotent: normalizing an already-normalized title is a no-op.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

static YEAR_BRACKETED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*[(\[](19|20)\d{2}[)\]]\s*$").unwrap());
static YEAR_DASHED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+[-\u{2013}\u{2014}]\s*(19|20)\d{2}\s*$").unwrap());
static YEAR_BARE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+(19|20)\d{2}\s*$").unwrap());

static PUNCTUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{P}\p{S}]").unwrap());
static EDITION_NOISE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(special edition|bonus tracks|bonus track|remastered|remaster|anniversary|expanded|deluxe|edition)\b",
    )
    .unwrap()
});
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Titles where a bare trailing year is part of the name, not an edition
/// marker ("Live 1998", "The 1975").
const BARE_YEAR_EXCLUSIONS: &[&str] = &["live", "the"];

/// Remove a trailing year suffix: ` (YYYY)`, ` [YYYY]`, ` - YYYY` (any dash),
/// or a bare ` YYYY`, with YYYY in 1900..=2099.
///
/// The bare form is only stripped when the remaining prefix is non-empty and
/// not in the exclusion list. Applied to a fixpoint so stacked suffixes
/// ("Album 1999 (2005)") collapse fully, keeping `normalize_title` idempotent.
pub fn strip_trailing_year_suffix(title: &str) -> String {
    let mut current = title.to_string();
    loop {
        let next = strip_one_year_suffix(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn strip_one_year_suffix(title: &str) -> String {
    if let Some(m) = YEAR_BRACKETED.find(title) {
        return title[..m.start()].trim_end().to_string();
    }
    if let Some(m) = YEAR_DASHED.find(title) {
        return title[..m.start()].trim_end().to_string();
    }
    if let Some(m) = YEAR_BARE.find(title) {
        let prefix = title[..m.start()].trim().to_lowercase();
        if !prefix.is_empty() && !BARE_YEAR_EXCLUSIONS.contains(&prefix.as_str()) {
            return title[..m.start()].trim_end().to_string();
        }
    }
    title.to_string()
}

/// Project a title to its canonical comparison form.
///
/// Year suffix stripping happens first, then NFKD, quote folding,
/// lowercasing, `+`/`&` -> " and ", combining-mark removal, punctuation and
/// edition-noise removal, and whitespace collapse. Noise removal can expose
/// a trailing year that was previously shielded ("Rumours [2004 Remaster]"),
/// so the year strip runs once more at the end to keep the projection
/// idempotent.
pub fn normalize_title(title: &str) -> String {
    let stripped = strip_trailing_year_suffix(title);
    let decomposed: String = stripped.nfkd().collect();
    let quoted = decomposed
        .replace(['\u{2018}', '\u{2019}', '\u{02bc}'], "'")
        .replace(['\u{201c}', '\u{201d}'], "\"");
    let lowered = quoted.to_lowercase();
    let anded = lowered.replace('+', " and ").replace('&', " and ");
    let unmarked: String = anded.chars().filter(|c| !is_combining_mark(*c)).collect();
    let depunctuated = PUNCTUATION.replace_all(&unmarked, " ");
    let denoised = EDITION_NOISE.replace_all(&depunctuated, " ");
    let collapsed = WHITESPACE.replace_all(denoised.trim(), " ").to_string();
    strip_trailing_year_suffix(&collapsed)
}

/// Whether two normalized titles are a strong alias of each other.
///
/// Exact equality always matches. Otherwise one must fully contain the other
/// and the smaller token set (>= 3 tokens) must overlap the larger by at
/// least `min_overlap`.
pub fn is_strong_title_alias_match(a: &str, b: &str) -> bool {
    is_strong_title_alias_match_with(a, b, 0.75)
}

pub fn is_strong_title_alias_match_with(a: &str, b: &str, min_overlap: f64) -> bool {
    if a == b {
        return true;
    }
    if !a.contains(b) && !b.contains(a) {
        return false;
    }
    let tokens_a: HashSet<&str> = a.split(' ').filter(|t| !t.is_empty()).collect();
    let tokens_b: HashSet<&str> = b.split(' ').filter(|t| !t.is_empty()).collect();
    let (smaller, larger) = if tokens_a.len() <= tokens_b.len() {
        (&tokens_a, &tokens_b)
    } else {
        (&tokens_b, &tokens_a)
    };
    if smaller.len() < 3 {
        return false;
    }
    let overlap = smaller.intersection(larger).count();
    overlap as f64 / smaller.len() as f64 >= min_overlap
}

/// URL- and filesystem-safe slug: ASCII-folded, lowercased, dash-separated.
pub fn slugify(input: &str) -> String {
    let folded: String = input.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    let mut slug = String::with_capacity(folded.len());
    let mut pending_dash = false;
    for c in folded.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            slug.push(c);
            pending_dash = false;
        } else {
            pending_dash = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_bracketed_and_dashed_year_suffixes() {
        assert_eq!(strip_trailing_year_suffix("Waiting (1998)"), "Waiting");
        assert_eq!(strip_trailing_year_suffix("Waiting [1998]"), "Waiting");
        assert_eq!(strip_trailing_year_suffix("Waiting - 1998"), "Waiting");
        assert_eq!(strip_trailing_year_suffix("Waiting \u{2013} 1998"), "Waiting");
        assert_eq!(strip_trailing_year_suffix("Waiting 1998"), "Waiting");
    }

    #[test]
    fn keeps_years_that_are_part_of_the_title() {
        assert_eq!(strip_trailing_year_suffix("1984"), "1984");
        assert_eq!(strip_trailing_year_suffix("Live 1998"), "Live 1998");
        assert_eq!(strip_trailing_year_suffix("The 1975"), "The 1975");
        // outside the plausible year range
        assert_eq!(strip_trailing_year_suffix("Symphony 1812"), "Symphony 1812");
    }

    #[test]
    fn strips_stacked_suffixes_to_a_fixpoint() {
        assert_eq!(strip_trailing_year_suffix("Album 1999 (2005)"), "Album");
    }

    #[test]
    fn year_forms_normalize_identically() {
        let expected = normalize_title("Waiting");
        assert_eq!(normalize_title("Waiting (1998)"), expected);
        assert_eq!(normalize_title("Waiting [1998]"), expected);
        assert_eq!(normalize_title("Waiting - 1998"), expected);
        assert_eq!(normalize_title("Waiting 1998"), expected);
    }

    #[test]
    fn normalize_is_idempotent() {
        let titles = [
            "Waiting (1998)",
            "Sticks & Stones",
            "Caf\u{e9} Del Mar",
            "Rumours [2004 Remaster]",
            "Album 1999 (2005)",
            "The Best Of (Deluxe Edition)",
            "1984",
            "Live 1998",
        ];
        for t in titles {
            let once = normalize_title(t);
            assert_eq!(normalize_title(&once), once, "not idempotent for {t:?}");
        }
    }

    #[test]
    fn ampersand_and_plus_become_and() {
        assert_eq!(normalize_title("Sticks & Stones"), "sticks and stones");
        assert_eq!(normalize_title("Sticks + Stones"), "sticks and stones");
        assert_eq!(normalize_title("Sticks and Stones"), "sticks and stones");
    }

    #[test]
    fn accents_and_punctuation_fold_away() {
        assert_eq!(normalize_title("Caf\u{e9} Del Mar"), "cafe del mar");
        assert_eq!(normalize_title("R.E.M."), "r e m");
        assert_eq!(normalize_title("What\u{2019}s Going On"), "what s going on");
    }

    #[test]
    fn edition_noise_tokens_are_removed() {
        assert_eq!(normalize_title("Nevermind (Deluxe Edition)"), "nevermind");
        assert_eq!(
            normalize_title("Rumours [2004 Remaster]"),
            normalize_title("Rumours")
        );
        assert_eq!(normalize_title("Ten (Bonus Tracks)"), "ten");
        // "remaster" must not eat into unrelated words
        assert_eq!(normalize_title("Remastering"), "remastering");
    }

    #[test]
    fn bare_year_exclusions_survive_normalization() {
        assert_eq!(normalize_title("1984"), "1984");
        assert_eq!(normalize_title("Live 1998"), "live 1998");
        assert_eq!(normalize_title("The 1975"), "the 1975");
    }

    #[test]
    fn alias_match_requires_containment_and_overlap() {
        assert!(is_strong_title_alias_match("ok computer", "ok computer"));
        assert!(is_strong_title_alias_match(
            "the dark side of the moon",
            "dark side of the moon"
        ));
        // too few tokens in the smaller set
        assert!(!is_strong_title_alias_match("greatest hits", "greatest hits live"));
        // no containment
        assert!(!is_strong_title_alias_match(
            "a night at the opera",
            "a day at the races"
        ));
    }

    #[test]
    fn slugify_folds_and_separates() {
        assert_eq!(slugify("New Found Glory"), "new-found-glory");
        assert_eq!(slugify("AC/DC"), "ac-dc");
        assert_eq!(slugify("Bj\u{f6}rk"), "bjork");
        assert_eq!(slugify("  Spaced  Out  "), "spaced-out");
        assert_eq!(slugify("!!!"), "");
    }
}
