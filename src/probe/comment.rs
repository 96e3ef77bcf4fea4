//! Report comment composition.

/// Leading segment when a dataset opens but a constrained open does not.
pub const OPEN_ONLY_NOTE: &str = "Dataset can open without subset only";

fn present(comment: Option<&str>) -> Option<&str> {
    comment.filter(|c| !c.is_empty())
}

/// `(n) text` for every present comment, `n` being its 1-based position, joined by `; `.
pub fn label_segments(comments: &[Option<&str>]) -> String {
    comments
        .iter()
        .enumerate()
        .filter_map(|(i, c)| present(*c).map(|text| format!("({}) {text}", i + 1)))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Comment for the numeric (1), visualization (2), and cache (3) probes.
///
/// Identical numeric and visualization diagnostics collapse into one segment, and the cache
/// diagnostic joins it when it is identical too.
pub fn merge_probe_comments(
    numeric: Option<&str>,
    visualization: Option<&str>,
    cache: Option<&str>,
) -> String {
    let numeric = present(numeric);
    let visualization = present(visualization);
    let cache = present(cache);

    match numeric {
        Some(shared) if numeric == visualization => {
            if cache == Some(shared) {
                format!("(1) & (2) & (3) {shared}")
            } else if let Some(cache) = cache {
                format!("(1) & (2) {shared}; (3) {cache}")
            } else {
                format!("(1) & (2) {shared}")
            }
        }
        _ => label_segments(&[numeric, visualization, cache]),
    }
}
