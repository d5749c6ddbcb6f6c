//! Name derivation for collections and generated types.
//!
//! Case conversion goes through `convert_case`; English pluralization is a small
//! rule table with irregulars and uncountables. Kinds whose names defeat the
//! rules declare an explicit plural instead.

use convert_case::{Case, Casing};

use super::kind::KindTag;

/// (singular, plural)
const IRREGULAR: &[(&str, &str)] = &[
    ("person", "people"),
    ("man", "men"),
    ("woman", "women"),
    ("child", "children"),
    ("mouse", "mice"),
    ("goose", "geese"),
    ("foot", "feet"),
    ("tooth", "teeth"),
    ("ox", "oxen"),
    ("datum", "data"),
    ("medium", "media"),
    ("criterion", "criteria"),
];

const UNCOUNTABLE: &[&str] = &[
    "equipment",
    "information",
    "news",
    "series",
    "species",
    "sheep",
    "fish",
    "metadata",
];

pub fn snake_case(name: &str) -> String {
    name.to_case(Case::Snake)
}

pub fn pascal_case(name: &str) -> String {
    name.to_case(Case::Pascal)
}

pub fn camel_case(name: &str) -> String {
    name.to_case(Case::Camel)
}

/// Physical collection name for a kind.
///
/// Node kinds are lower-snake and pluralized (`GroupMember` -> `group_members`),
/// edge kinds are lower-snake only (`MemberOf` -> `member_of`).
pub fn collection_name(name: &str, tag: KindTag, plural: Option<&str>) -> String {
    match (tag, plural) {
        (KindTag::Node, Some(plural)) => snake_case(plural),
        (KindTag::Node, None) => pluralize(&snake_case(name)),
        (KindTag::Edge, _) => snake_case(name),
    }
}

/// Pluralize a lower-snake word; only the last segment is inflected.
pub fn pluralize(word: &str) -> String {
    let (head, last) = split_last_segment(word);
    format!("{head}{}", pluralize_word(last))
}

/// Singularize a lower-snake word.
///
/// Returns `None` when the last segment is not recognizably plural, mirroring
/// what callers need to decide on a verbatim fallback.
pub fn singularize(word: &str) -> Option<String> {
    let (head, last) = split_last_segment(word);
    singularize_word(last).map(|s| format!("{head}{s}"))
}

fn split_last_segment(word: &str) -> (&str, &str) {
    match word.rfind('_') {
        Some(pos) => (&word[..=pos], &word[pos + 1..]),
        None => ("", word),
    }
}

fn pluralize_word(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }
    let lower = word.to_ascii_lowercase();
    if UNCOUNTABLE.contains(&lower.as_str()) {
        return word.to_string();
    }
    if let Some((_, plural)) = IRREGULAR.iter().find(|(s, _)| *s == lower) {
        return (*plural).to_string();
    }
    // Already an irregular plural
    if IRREGULAR.iter().any(|(_, p)| *p == lower) {
        return word.to_string();
    }

    if ["s", "x", "z", "ch", "sh"].iter().any(|e| lower.ends_with(e)) {
        return format!("{word}es");
    }
    if let Some(stem) = lower.strip_suffix('y') {
        if !stem.is_empty() && !ends_with_vowel(stem) {
            return format!("{}ies", &word[..word.len() - 1]);
        }
    }
    if lower.ends_with("fe") {
        return format!("{}ves", &word[..word.len() - 2]);
    }
    if lower.ends_with("lf") {
        return format!("{}ves", &word[..word.len() - 1]);
    }
    format!("{word}s")
}

fn singularize_word(word: &str) -> Option<String> {
    let lower = word.to_ascii_lowercase();
    if lower.is_empty() {
        return None;
    }
    if UNCOUNTABLE.contains(&lower.as_str()) {
        return Some(word.to_string());
    }
    if let Some((singular, _)) = IRREGULAR.iter().find(|(_, p)| *p == lower) {
        return Some((*singular).to_string());
    }
    if IRREGULAR.iter().any(|(s, _)| *s == lower) {
        return None;
    }

    if lower.len() > 3 && lower.ends_with("ies") {
        return Some(format!("{}y", &word[..word.len() - 3]));
    }
    if lower.ends_with("lves") {
        return Some(format!("{}f", &word[..word.len() - 3]));
    }
    if lower.ends_with("ives") {
        return Some(format!("{}fe", &word[..word.len() - 3]));
    }
    if ["sses", "xes", "zes", "ches", "shes"]
        .iter()
        .any(|e| lower.ends_with(e))
    {
        return Some(word[..word.len() - 2].to_string());
    }
    if lower.ends_with("ss") || lower.ends_with("us") || lower.ends_with("is") {
        return None;
    }
    if lower.len() > 1 && lower.ends_with('s') {
        return Some(word[..word.len() - 1].to_string());
    }
    None
}

fn ends_with_vowel(s: &str) -> bool {
    s.chars()
        .last()
        .is_some_and(|c| matches!(c, 'a' | 'e' | 'i' | 'o' | 'u'))
}
