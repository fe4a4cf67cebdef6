//! Redirect responses.
//!
//! # Responsibilities
//! - Build the 301 answer for a redirect decision
//!
//! # Design Decisions
//! - Fixed plain-text body so clients that ignore `Location` still see why

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::Response,
};
use url::Url;

/// Body sent with every redirect.
pub const REDIRECT_BODY: &str = "Moved Permanently\n";

/// `301 Moved Permanently` pointing at `location`.
pub fn redirect_response(location: &Url) -> Result<Response, header::InvalidHeaderValue> {
    let location = HeaderValue::from_str(location.as_str())?;

    let mut response = Response::new(Body::from(REDIRECT_BODY));
    *response.status_mut() = StatusCode::MOVED_PERMANENTLY;
    let headers = response.headers_mut();
    headers.insert(header::LOCATION, location);
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_redirect_response() {
        let url = Url::parse("http://a.example.com/x?y=1").unwrap();
        let response = redirect_response(&url).unwrap();

        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(response.headers()[header::LOCATION], "http://a.example.com/x?y=1");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], REDIRECT_BODY.as_bytes());
    }
}
