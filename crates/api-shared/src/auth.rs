/// Request header carrying the caller's API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Body returned by the stats endpoint when the permission check fails.
pub const PERMISSION_DENIED_BODY: &str = "Permission denied";

/// Normalises a raw API key value.
///
/// Returns `None` for a missing or blank key so callers treat the request as anonymous.
pub fn normalise_api_key(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|k| !k.is_empty())
}
