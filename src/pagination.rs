use axum::http::header::{HeaderMap, HeaderName, HeaderValue};

pub const CONTENT_RANGE: HeaderName = HeaderName::from_static("content-range");

/// `Content-Range` header for one page of a listing, e.g. `cars 0-24/120`.
///
/// An empty page is reported as `cars */120`.
#[must_use]
pub fn calculate_content_range(
    offset: u64,
    limit: u64,
    total_count: u64,
    resource_name: &str,
) -> HeaderMap {
    let content_range = if limit == 0 || offset >= total_count {
        format!("{resource_name} */{total_count}")
    } else {
        let last = offset
            .saturating_add(limit - 1)
            .min(total_count.saturating_sub(1));
        format!("{resource_name} {offset}-{last}/{total_count}")
    };

    let mut headers = HeaderMap::new();
    match HeaderValue::from_str(&content_range) {
        Ok(value) => {
            headers.insert(CONTENT_RANGE, value);
        }
        Err(err) => tracing::warn!(error = %err, "Invalid Content-Range header"),
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(offset: u64, limit: u64, total: u64) -> String {
        calculate_content_range(offset, limit, total, "cars")[CONTENT_RANGE]
            .to_str()
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_full_page() {
        assert_eq!(range(0, 25, 120), "cars 0-24/120");
    }

    #[test]
    fn test_last_page_is_clamped() {
        assert_eq!(range(100, 25, 120), "cars 100-119/120");
    }

    #[test]
    fn test_empty_page() {
        assert_eq!(range(0, 25, 0), "cars */0");
        assert_eq!(range(5, 0, 10), "cars */10");
    }
}
