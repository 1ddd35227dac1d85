use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Everything after the first standalone "to"
    static ref AFTER_TO: Regex = Regex::new(r"(?is)\bto\s+(.+)$").expect("static regex");

    /// Item-number shaped token: DLX-100, STD.200, FB-12.1A
    static ref ITEM_TOKEN: Regex =
        Regex::new(r"(?i)\b([A-Z]{2,4}[-.]\d+(?:\.\d+)?[A-Z]?)\b").expect("static regex");
}

/// Identifiers a dependent record applies to, read from text such as
/// `"Vinyl to DLX-100, DLX-101 and STD-200"`. Only text after the first
/// standalone "to" is considered. Tokens come back uppercased, in order,
/// without repeats.
pub fn extract_references(text: &str) -> Vec<String> {
    let Some(caps) = AFTER_TO.captures(text) else {
        return Vec::new();
    };
    let rest = &caps[1];

    let mut out: Vec<String> = Vec::new();
    for m in ITEM_TOKEN.captures_iter(rest) {
        let token = m[1].to_uppercase();
        if !out.contains(&token) {
            out.push(token);
        }
    }
    out
}

/// Split an explicit reference list given as one string ("A-1, A-2").
pub fn split_reference_list(s: &str) -> Vec<String> {
    s.split([',', ';'])
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_after_to() {
        assert_eq!(extract_references("Vinyl to DLX-100"), vec!["DLX-100"]);
        assert_eq!(
            extract_references("Fabric to dlx-100, DLX-101 and STD-200.1A"),
            vec!["DLX-100", "DLX-101", "STD-200.1A"]
        );
    }

    #[test]
    fn ignores_tokens_before_to() {
        assert_eq!(extract_references("FB-900 Leather to STD-200"), vec!["STD-200"]);
    }

    #[test]
    fn no_to_no_references() {
        assert!(extract_references("King Bed DLX-100").is_empty());
        assert!(extract_references("Tomato DLX-100").is_empty());
    }

    #[test]
    fn duplicates_collapsed() {
        assert_eq!(extract_references("Vinyl to DLX-100 and dlx-100"), vec!["DLX-100"]);
    }

    #[test]
    fn split_list() {
        assert_eq!(split_reference_list("A-1, A-2;A-3 ,"), vec!["A-1", "A-2", "A-3"]);
        assert!(split_reference_list(" , ").is_empty());
    }
}
