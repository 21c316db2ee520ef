//! Domain-name helpers shared by the router, the translator and the
//! storage backends. All comparisons in this crate happen on normalized
//! names: lowercase, fully qualified, trailing dot.

/// Lowercase a name and ensure it carries a trailing dot. The empty
/// string normalizes to the root zone `"."`.
pub fn normalize(name: &str) -> String {
    let lower = name.trim().to_ascii_lowercase();
    if lower.is_empty() || lower == "." {
        return ".".to_string();
    }
    if lower.ends_with('.') {
        lower
    } else {
        format!("{}.", lower)
    }
}

/// Split a normalized name into labels, dropping the root label.
pub fn labels(name: &str) -> Vec<&str> {
    name.trim_end_matches('.')
        .split('.')
        .filter(|l| !l.is_empty())
        .collect()
}

/// True when `qname` equals `zone` or sits beneath it. Both sides must be
/// normalized. The root zone `"."` matches every name.
pub fn is_subdomain(zone: &str, qname: &str) -> bool {
    if zone == "." {
        return true;
    }
    if qname == zone {
        return true;
    }
    if !qname.ends_with(zone) {
        return false;
    }
    // label boundary check: "example.org." must not match "badexample.org."
    qname.as_bytes()[qname.len() - zone.len() - 1] == b'.'
}

/// Pick the most specific origin matching `qname` (longest suffix wins).
pub fn best_zone<'a, I>(origins: I, qname: &str) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    origins
        .into_iter()
        .filter(|z| is_subdomain(z, qname))
        .max_by_key(|z| z.len())
}

/// Convert a storage key back into a domain name.
///
/// Keys are slash-separated paths with the labels reversed under a prefix:
/// `/strata/org/example/www` becomes `www.example.org.`. The leading empty
/// segment and the prefix segment are dropped.
pub fn domain_from_key(key: &str) -> String {
    let mut parts: Vec<&str> = key.split('/').filter(|p| !p.is_empty()).skip(1).collect();
    parts.reverse();
    if parts.is_empty() {
        return ".".to_string();
    }
    format!("{}.", parts.join("."))
}

/// Convert a normalized domain name into a storage key under `prefix`.
/// `www.example.org.` with prefix `strata` becomes `/strata/org/example/www`.
pub fn key_for_name(name: &str, prefix: &str) -> String {
    let mut parts = labels(name);
    parts.reverse();
    format!("/{}/{}", prefix, parts.join("/"))
}
