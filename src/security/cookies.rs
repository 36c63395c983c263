//! Session cookie extraction and invalidation.

use axum::http::header::COOKIE;
use axum::http::HeaderMap;

/// Find the value of cookie `name` across all `Cookie` headers.
///
/// Returns the first occurrence. Surrounding double quotes are removed.
pub fn find_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|header| header.split(';'))
        .find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            if key.trim() == name {
                let value = value.trim();
                Some(
                    value
                        .strip_prefix('"')
                        .and_then(|v| v.strip_suffix('"'))
                        .unwrap_or(value),
                )
            } else {
                None
            }
        })
}

/// `Set-Cookie` value that removes cookie `name` immediately.
pub fn clearing_cookie(name: &str) -> String {
    format!(
        "{}=; Path=/; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; SameSite=Lax",
        name
    )
}
