//! The narrow view of an inbound request that token extraction needs.

use http::header;
use http::request::Parts;
use url::form_urlencoded;

/// Read access to the request fields a token can arrive in.
pub trait TokenRequest {
    /// A header value, if present and valid UTF-8.
    fn header(&self, name: &str) -> Option<&str>;

    /// A query (or form) parameter.
    fn param(&self, name: &str) -> Option<String>;

    /// A cookie from the `Cookie` header.
    fn cookie(&self, name: &str) -> Option<&str> {
        find_cookie(self.header(header::COOKIE.as_str())?, name)
    }

    /// Whether the caller expects a JSON answer rather than a page.
    ///
    /// True for `X-Requested-With: XMLHttpRequest`, or when the first
    /// `Accept` media range is a JSON type.
    fn wants_json(&self) -> bool {
        let ajax = self
            .header("x-requested-with")
            .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"));

        let accepts_json = self
            .header(header::ACCEPT.as_str())
            .and_then(|accept| accept.split(',').next())
            .map(|range| range.split(';').next().unwrap_or_default().trim())
            .is_some_and(|media| media.contains("/json") || media.contains("+json"));

        ajax || accepts_json
    }
}

impl TokenRequest for Parts {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    fn param(&self, name: &str) -> Option<String> {
        find_param(self.uri.query()?.as_bytes(), name)
    }

    /// Searches every `Cookie` header; HTTP/2 clients may send several.
    fn cookie(&self, name: &str) -> Option<&str> {
        self.headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(|cookies| find_cookie(cookies, name))
    }
}

/// A request head plus its buffered url-encoded form body.
///
/// Query parameters win over form fields of the same name.
pub struct FormRequest<'a> {
    pub parts: &'a Parts,
    pub form: &'a [u8],
}

impl TokenRequest for FormRequest<'_> {
    fn header(&self, name: &str) -> Option<&str> {
        self.parts.header(name)
    }

    fn cookie(&self, name: &str) -> Option<&str> {
        self.parts.cookie(name)
    }

    fn param(&self, name: &str) -> Option<String> {
        self.parts
            .param(name)
            .or_else(|| find_param(self.form, name))
    }
}

/// Whether the body is `application/x-www-form-urlencoded`.
pub fn is_form(parts: &Parts) -> bool {
    parts
        .header(header::CONTENT_TYPE.as_str())
        .and_then(|ct| ct.split(';').next())
        .is_some_and(|mime| {
            mime.trim()
                .eq_ignore_ascii_case("application/x-www-form-urlencoded")
        })
}

fn find_cookie<'a>(cookies: &'a str, name: &str) -> Option<&'a str> {
    cookies
        .split(';')
        .filter_map(|part| part.split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim())
}

fn find_param(encoded: &[u8], name: &str) -> Option<String> {
    form_urlencoded::parse(encoded)
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}
