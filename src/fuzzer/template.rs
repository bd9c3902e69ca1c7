//! Request templating
//!
//! A template field is split once at every marker; rendering interleaves the
//! payload between the literal segments. Fields without a marker are kept as
//! a single segment and rendered without allocation.

use std::borrow::Cow;

use crate::http::FuzzRequest;

/// Default payload marker
pub const DEFAULT_MARKER: &str = "$";

/// One templated string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateField {
    segments: Vec<String>,
}

impl TemplateField {
    pub fn parse(text: &str, marker: &str) -> Self {
        let segments = if marker.is_empty() {
            vec![text.to_string()]
        } else {
            text.split(marker).map(str::to_string).collect()
        };
        Self { segments }
    }

    pub fn has_marker(&self) -> bool {
        self.segments.len() > 1
    }

    pub fn markers(&self) -> usize {
        self.segments.len() - 1
    }

    pub fn render<'a>(&'a self, payload: &str) -> Cow<'a, str> {
        if !self.has_marker() {
            return Cow::Borrowed(&self.segments[0]);
        }
        Cow::Owned(self.segments.join(payload))
    }
}

/// Form or query parameter; an empty default receives the whole payload,
/// a marked default is substituted like any other field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyParam {
    pub key: String,
    pub value: TemplateField,
}

impl BodyParam {
    pub fn new(key: &str, default: &str, marker: &str) -> Self {
        Self {
            key: key.to_string(),
            value: TemplateField::parse(default, marker),
        }
    }

    fn is_bare(&self) -> bool {
        !self.value.has_marker() && self.value.segments[0].is_empty()
    }

    pub fn is_fuzzed(&self) -> bool {
        self.is_bare() || self.value.has_marker()
    }

    pub fn render<'a>(&'a self, payload: &'a str) -> Cow<'a, str> {
        if self.is_bare() {
            Cow::Borrowed(payload)
        } else {
            self.value.render(payload)
        }
    }
}

/// A request with payload markers in any of its fields
#[derive(Debug, Clone)]
pub struct RequestTemplate {
    pub marker: String,
    pub url: TemplateField,
    pub method: TemplateField,
    pub headers: Vec<(String, TemplateField)>,
    pub params: Vec<BodyParam>,
}

impl RequestTemplate {
    pub fn new(url: &str, method: &str, marker: &str) -> Self {
        Self {
            marker: marker.to_string(),
            url: TemplateField::parse(url, marker),
            method: TemplateField::parse(method, marker),
            headers: Vec::new(),
            params: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        let field = TemplateField::parse(value, &self.marker);
        self.headers.push((name.to_string(), field));
        self
    }

    pub fn with_param(mut self, key: &str, default: &str) -> Self {
        let param = BodyParam::new(key, default, &self.marker);
        self.params.push(param);
        self
    }

    /// Same template with a different method field
    pub fn with_method(&self, method: &str) -> Self {
        Self {
            method: TemplateField::parse(method, &self.marker),
            ..self.clone()
        }
    }

    /// Whether any field receives the payload
    pub fn is_fuzzed(&self) -> bool {
        self.url.has_marker()
            || self.method.has_marker()
            || self.headers.iter().any(|(_, v)| v.has_marker())
            || self.params.iter().any(BodyParam::is_fuzzed)
    }

    pub fn fuzzes_url(&self) -> bool {
        self.url.has_marker()
    }

    /// Broadcast one payload into every marked location
    pub fn render(&self, payload: &str) -> FuzzRequest {
        FuzzRequest {
            method: self.method.render(payload).to_uppercase(),
            url: self.url.render(payload).into_owned(),
            headers: self
                .headers
                .iter()
                .map(|(name, value)| (name.clone(), value.render(payload).into_owned()))
                .collect(),
            params: self
                .params
                .iter()
                .map(|param| (param.key.clone(), param.render(payload).into_owned()))
                .collect(),
            proxy: None,
            timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_marker_at_end() {
        let field = TemplateField::parse("SESSID=$", DEFAULT_MARKER);
        assert_eq!(field.render("abc123"), "SESSID=abc123");
    }

    #[test]
    fn test_header_markers_at_both_ends() {
        let field = TemplateField::parse("$-mid-$", DEFAULT_MARKER);
        assert_eq!(field.markers(), 2);
        assert_eq!(field.render("X"), "X-mid-X");
    }

    #[test]
    fn test_adjacent_markers_and_empty_payload() {
        let field = TemplateField::parse("a$$b", DEFAULT_MARKER);
        assert_eq!(field.render("1"), "a11b");
        assert_eq!(field.render(""), "ab");
    }

    #[test]
    fn test_static_field_is_borrowed() {
        let field = TemplateField::parse("Mozilla/5.0", DEFAULT_MARKER);
        assert!(!field.has_marker());
        assert!(matches!(field.render("x"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_same_payload_everywhere() {
        let template = RequestTemplate::new("http://x/$", "GET", DEFAULT_MARKER)
            .with_header("X-Token", "t-$")
            .with_header("Accept", "*/*")
            .with_param("user", "")
            .with_param("submit", "Login");

        let request = template.render("admin");
        assert_eq!(request.url, "http://x/admin");
        assert_eq!(request.method, "GET");
        assert_eq!(
            request.headers,
            vec![
                ("X-Token".to_string(), "t-admin".to_string()),
                ("Accept".to_string(), "*/*".to_string()),
            ]
        );
        assert_eq!(
            request.params,
            vec![
                ("user".to_string(), "admin".to_string()),
                ("submit".to_string(), "Login".to_string()),
            ]
        );
    }

    #[test]
    fn test_marked_param_defaults_are_substituted() {
        let template = RequestTemplate::new("http://x/login", "POST", DEFAULT_MARKER)
            .with_param("user", "$")
            .with_param("q", "pre-$")
            .with_param("pass", "")
            .with_param("submit", "Login");
        assert!(template.params.iter().take(3).all(BodyParam::is_fuzzed));
        assert!(!template.params[3].is_fuzzed());

        let request = template.render("admin");
        assert_eq!(
            request.params,
            vec![
                ("user".to_string(), "admin".to_string()),
                ("q".to_string(), "pre-admin".to_string()),
                ("pass".to_string(), "admin".to_string()),
                ("submit".to_string(), "Login".to_string()),
            ]
        );
    }

    #[test]
    fn test_method_fuzzing() {
        let template = RequestTemplate::new("http://x/", "$", DEFAULT_MARKER);
        assert!(template.is_fuzzed());
        assert!(!template.fuzzes_url());
        assert_eq!(template.render("put").method, "PUT");
    }

    #[test]
    fn test_custom_marker() {
        let template = RequestTemplate::new("http://x/FUZZ.php", "GET", "FUZZ");
        assert_eq!(template.render("index").url, "http://x/index.php");
    }
}
