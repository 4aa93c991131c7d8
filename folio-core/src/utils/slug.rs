use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

static SLUG_SEGMENT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("Failed to compile slug segment regex")
});

const MAX_SLUG_LENGTH: usize = 100;

/// Generate a URL-friendly slug from a title
pub fn generate_slug_from_title(title: &str) -> String {
    generate_localized_slug(title, "")
}

/// Generate a slug, applying the transliteration rules of `locale` before the
/// generic ASCII folding.
pub fn generate_localized_slug(title: &str, locale: &str) -> String {
    let lowered = title.trim().to_lowercase();
    let transliterated = transliterate_for_locale(&lowered, locale);

    // Folds remaining diacritics and collapses everything else into hyphens
    let mut slug = ::slug::slugify(transliterated.as_ref());

    if slug.is_empty() {
        slug = "untitled".to_string();
    }

    if slug.len() > MAX_SLUG_LENGTH {
        slug = slug
            .chars()
            .take(MAX_SLUG_LENGTH)
            .collect::<String>()
            .trim_end_matches('-')
            .to_string();
    }

    slug
}

/// Normalize an explicit slug. Each `/`-separated segment is slugged on its
/// own so custom slugs may describe nested paths.
pub fn normalize_custom_slug(custom_slug: &str, locale: &str) -> String {
    let segments: Vec<String> = custom_slug
        .split('/')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            if segment.len() <= MAX_SLUG_LENGTH && is_normalized_segment(segment) {
                segment.to_string()
            } else {
                generate_localized_slug(segment, locale)
            }
        })
        .collect();

    if segments.is_empty() {
        return "untitled".to_string();
    }

    segments.join("/")
}

/// True when `segment` is already in normalized form.
pub fn is_normalized_segment(segment: &str) -> bool {
    SLUG_SEGMENT_REGEX.is_match(segment)
}

fn transliterate_for_locale<'a>(text: &'a str, locale: &str) -> Cow<'a, str> {
    let language = locale
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();

    let table: &[(char, &str)] = match language.as_str() {
        "de" => &[('ä', "ae"), ('ö', "oe"), ('ü', "ue"), ('ß', "ss")],
        "da" | "nb" | "nn" | "no" => &[('æ', "ae"), ('ø', "oe"), ('å', "aa")],
        _ => return Cow::Borrowed(text),
    };

    if !text.chars().any(|c| table.iter().any(|(from, _)| *from == c)) {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match table.iter().find(|(from, _)| *from == c) {
            Some((_, to)) => out.push_str(to),
            None => out.push(c),
        }
    }
    Cow::Owned(out)
}
