//! URL and header helpers for guest-supplied request strings.

use url::Url;

use crate::error::Error;

/// Split an absolute URL into the host (with port, if not the scheme's
/// default) and the path including a non-empty `?query`.
pub fn parse_url(url: &str) -> Result<(String, String), Error> {
    let parsed = Url::parse(url)?;

    let host = match (parsed.host_str(), parsed.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => {
            return Err(Error::InvalidUrl {
                message: format!("{url} has no host"),
            })
        }
    };

    let mut path = parsed.path().to_string();
    if let Some(query) = parsed.query().filter(|q| !q.is_empty()) {
        path.push('?');
        path.push_str(query);
    }

    Ok((host, path))
}

/// Parse a block of `Name:Value` lines separated by `\n`.
///
/// Each line is split at its first `:` and both sides are trimmed. Lines
/// without a colon, or with an empty name or value, are skipped.
pub fn parse_header_block(block: &str) -> Vec<(String, String)> {
    block
        .split('\n')
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim(), value.trim()))
        .filter(|(name, value)| !name.is_empty() && !value.is_empty())
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_keeps_explicit_port() {
        let (host, path) = parse_url("http://example.com:8080/a/b").unwrap();
        assert_eq!(host, "example.com:8080");
        assert_eq!(path, "/a/b");
    }

    #[test]
    fn default_port_is_dropped() {
        let (host, _) = parse_url("https://example.com:443/").unwrap();
        assert_eq!(host, "example.com");
    }

    #[test]
    fn query_is_part_of_path() {
        let (_, path) = parse_url("https://example.com/search?q=rust&page=2").unwrap();
        assert_eq!(path, "/search?q=rust&page=2");

        let (_, path) = parse_url("https://example.com/search?").unwrap();
        assert_eq!(path, "/search");
    }

    #[test]
    fn root_path_when_absent() {
        let (_, path) = parse_url("https://example.com").unwrap();
        assert_eq!(path, "/");
    }

    #[test]
    fn relative_url_fails() {
        assert!(matches!(parse_url("/just/a/path"), Err(Error::UrlParse(_))));
    }

    #[test]
    fn header_values_keep_later_colons() {
        let headers = parse_header_block("Authorization: Bearer a:b\nHost:h");
        assert_eq!(
            headers,
            vec![
                ("Authorization".to_string(), "Bearer a:b".to_string()),
                ("Host".to_string(), "h".to_string()),
            ]
        );
    }

    #[test]
    fn malformed_header_lines_are_skipped() {
        let headers = parse_header_block("\nnocolon\n:novalue\nEmpty:\n  A : 1  \n");
        assert_eq!(headers, vec![("A".to_string(), "1".to_string())]);
    }
}
