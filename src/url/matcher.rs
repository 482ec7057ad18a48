/// Tests a URL host against one admission pattern
///
/// `cdn.example.com` admits that host only. `*.example.com` admits
/// `example.com` itself and every host below it. Comparison ignores ASCII
/// case and a trailing root dot on the host (`example.com.`).
///
/// # Examples
///
/// ```
/// use site_mirror::url::matches_wildcard;
///
/// assert!(matches_wildcard("*.example.com", "static.example.com"));
/// assert!(matches_wildcard("*.example.com", "Example.COM"));
/// assert!(!matches_wildcard("*.example.com", "badexample.com"));
/// assert!(!matches_wildcard("docs.example.com", "example.com"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    let host = candidate.strip_suffix('.').unwrap_or(candidate);
    if host.is_empty() {
        return false;
    }

    match pattern.strip_prefix("*.") {
        Some(domain) => {
            if host.eq_ignore_ascii_case(domain) {
                return true;
            }
            // a subdomain needs at least one label plus the separating dot
            let bytes = host.as_bytes();
            let split = host.len().saturating_sub(domain.len());
            split > 1
                && bytes[split - 1] == b'.'
                && bytes[split..].eq_ignore_ascii_case(domain.as_bytes())
        }
        None => host.eq_ignore_ascii_case(pattern),
    }
}
