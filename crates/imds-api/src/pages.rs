//! Fixed response pages.
//!
//! The bodies mirror the real metadata service byte for byte, including the
//! odd indentation difference between the 401 page and the others.

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

pub const NOT_FOUND: &str = r#"<?xml version="1.0" encoding="iso-8859-1"?>
<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Transitional//EN"
	"http://www.w3.org/TR/xhtml1/DTD/xhtml1-transitional.dtd">
<html xmlns="http://www.w3.org/1999/xhtml" xml:lang="en" lang="en">
 <head>
  <title>404 - Not Found</title>
 </head>
 <body>
  <h1>404 - Not Found</h1>
 </body>
</html>"#;

pub const BAD_REQUEST: &str = r#"<?xml version="1.0" encoding="iso-8859-1"?>
<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Transitional//EN"
	"http://www.w3.org/TR/xhtml1/DTD/xhtml1-transitional.dtd">
<html xmlns="http://www.w3.org/1999/xhtml" xml:lang="en" lang="en">
 <head>
  <title>400 - Bad Request</title>
 </head>
 <body>
  <h1>400 - Bad Request</h1>
 </body>
</html>"#;

pub const UNAUTHORIZED: &str = r#"<?xml version="1.0" encoding="iso-8859-1"?>
<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Transitional//EN"
	"http://www.w3.org/TR/xhtml1/DTD/xhtml1-transitional.dtd">
<html xmlns="http://www.w3.org/1999/xhtml" xml:lang="en" lang="en">
  <head>
    <title>401 - Unauthorized</title>
  </head>
  <body>
    <h1>401 - Unauthorized</h1>
  </body>
</html>"#;

const TEXT_PLAIN: &str = "text/plain";
const TEXT_HTML: &str = "text/html";

/// A `200` with a plain text body.
pub fn plain_text(body: impl Into<String>) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, TEXT_PLAIN)],
        body.into(),
    )
        .into_response()
}

fn html(status: StatusCode, page: &'static str) -> Response {
    (status, [(header::CONTENT_TYPE, TEXT_HTML)], page).into_response()
}

pub fn not_found() -> Response {
    html(StatusCode::NOT_FOUND, NOT_FOUND)
}

pub fn bad_request() -> Response {
    html(StatusCode::BAD_REQUEST, BAD_REQUEST)
}

pub fn unauthorized() -> Response {
    html(StatusCode::UNAUTHORIZED, UNAUTHORIZED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_pages_carry_html_content_type() {
        for (response, status) in [
            (not_found(), StatusCode::NOT_FOUND),
            (bad_request(), StatusCode::BAD_REQUEST),
            (unauthorized(), StatusCode::UNAUTHORIZED),
        ] {
            assert_eq!(response.status(), status);
            assert_eq!(response.headers()[header::CONTENT_TYPE], TEXT_HTML);
        }
    }

    #[test]
    fn unauthorized_page_uses_two_space_indent() {
        assert!(UNAUTHORIZED.contains("\n  <head>\n    <title>"));
        assert!(NOT_FOUND.contains("\n <head>\n  <title>"));
        assert!(BAD_REQUEST.contains("\n <head>\n  <title>"));
    }

    #[test]
    fn plain_text_is_ok() {
        let response = plain_text("ami-0e34bbddc66def5ac");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], TEXT_PLAIN);
    }
}
