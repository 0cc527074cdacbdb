use axum::http::HeaderMap;

pub mod auth;
pub mod health;
pub mod roles;
pub mod users;

/// Header naming the user on whose behalf a request is made.
pub const CAUSER_HEADER: &str = "x-causer-id";

/// The acting user for the activity log, if the request names one.
pub fn causer_id(headers: &HeaderMap) -> Option<i32> {
    headers
        .get(CAUSER_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_causer_id_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(causer_id(&headers), None);

        headers.insert(CAUSER_HEADER, HeaderValue::from_static("17"));
        assert_eq!(causer_id(&headers), Some(17));

        headers.insert(CAUSER_HEADER, HeaderValue::from_static("someone"));
        assert_eq!(causer_id(&headers), None);
    }
}
