use std::sync::OnceLock;

use regex::Regex;

/// Characters the extraction rules understand: Latin letters (accented
/// included), Arabic letters, digits, whitespace, and a short list of
/// punctuation seen on ID cards. Everything else is OCR noise.
fn re_disallowed() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"[^A-Za-z0-9À-ÿء-ي\s'/,،.-]").expect("invalid regex"))
}

fn re_whitespace_runs() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"\s{2,}").expect("invalid regex"))
}

/// Normalize raw OCR output: strip disallowed characters, collapse
/// whitespace runs of two or more into a single space, trim the ends.
/// A lone newline survives; only runs are collapsed.
pub fn clean_text(raw: &str) -> String {
    let stripped = re_disallowed().replace_all(raw, "");
    let collapsed = re_whitespace_runs().replace_all(&stripped, " ");
    collapsed.trim().to_string()
}
