//! Pagination `Link` header parsing

use std::collections::HashMap;

/// Parses a `Link` header into a map from relation name to URL
///
/// The header is a comma-separated list of `<url>; rel="name"` entries.
/// Entries without a URL or a `rel` parameter are skipped. An absent header
/// yields an empty map.
///
/// # Example
///
/// ```
/// use devrank_crawler::api::parse_link_header;
///
/// let links = parse_link_header(Some(
///     r#"<https://api.github.com/users/x/repos?page=2>; rel="next", <https://api.github.com/users/x/repos?page=5>; rel="last""#,
/// ));
/// assert_eq!(links["next"], "https://api.github.com/users/x/repos?page=2");
/// assert_eq!(links["last"], "https://api.github.com/users/x/repos?page=5");
/// ```
pub fn parse_link_header(header: Option<&str>) -> HashMap<String, String> {
    let mut links = HashMap::new();
    let Some(header) = header else {
        return links;
    };

    for entry in split_entries(header) {
        let mut parts = entry.split(';');

        let target = parts.next().unwrap_or("").trim();
        let Some(url) = target
            .strip_prefix('<')
            .and_then(|rest| rest.strip_suffix('>'))
        else {
            continue;
        };

        for param in parts {
            let Some((key, value)) = param.split_once('=') else {
                continue;
            };
            if key.trim().eq_ignore_ascii_case("rel") {
                let rel = value.trim().trim_matches('"');
                // rel may carry several space-separated relation types
                for name in rel.split_whitespace() {
                    links.insert(name.to_string(), url.to_string());
                }
            }
        }
    }

    links
}

/// Splits on commas outside `<...>`, so a URL may contain literal commas
fn split_entries(header: &str) -> Vec<&str> {
    let mut entries = Vec::new();
    let mut in_url = false;
    let mut start = 0;

    for (i, c) in header.char_indices() {
        match c {
            '<' => in_url = true,
            '>' => in_url = false,
            ',' if !in_url => {
                entries.push(&header[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    entries.push(&header[start..]);
    entries
}
