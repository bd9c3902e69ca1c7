//! Payload encoding support for fuzzing
//!
//! Provides the encoders the mutator fans payloads out over. An encoder may be
//! scoped to the substrings matched by a regex; everything outside the matches
//! is passed through untouched.

use std::fmt;
use std::str::FromStr;

use regex::Regex;

use crate::error::ConfigError;

/// Payload encoding types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PayloadEncoding {
    /// No encoding - raw payload
    #[default]
    None,
    /// URL encoding (percent encoding)
    UrlEncode,
    /// Double URL encoding
    DoubleUrlEncode,
    /// Percent-encode every byte
    UrlEncodeAll,
    /// Base64 encoding
    Base64,
    /// HTML entity encoding
    HtmlEntity,
    /// HTML entity encoding (decimal)
    HtmlEntityDecimal,
    /// JavaScript Unicode escape
    JavaScriptUnicode,
    /// JavaScript hex escape
    JavaScriptHex,
    /// Hex encoding
    Hex,
    /// Unicode encoding (\uXXXX)
    Unicode,
    /// ASCII hex encoding
    AsciiHex,
}

impl PayloadEncoding {
    /// Get all encoding types
    pub fn all() -> &'static [PayloadEncoding] {
        &[
            PayloadEncoding::None,
            PayloadEncoding::UrlEncode,
            PayloadEncoding::DoubleUrlEncode,
            PayloadEncoding::UrlEncodeAll,
            PayloadEncoding::Base64,
            PayloadEncoding::HtmlEntity,
            PayloadEncoding::HtmlEntityDecimal,
            PayloadEncoding::JavaScriptUnicode,
            PayloadEncoding::JavaScriptHex,
            PayloadEncoding::Hex,
            PayloadEncoding::Unicode,
            PayloadEncoding::AsciiHex,
        ]
    }

    /// Get the display name
    pub fn name(&self) -> &'static str {
        match self {
            PayloadEncoding::None => "None",
            PayloadEncoding::UrlEncode => "URL Encode",
            PayloadEncoding::DoubleUrlEncode => "Double URL Encode",
            PayloadEncoding::UrlEncodeAll => "URL Encode (all bytes)",
            PayloadEncoding::Base64 => "Base64",
            PayloadEncoding::HtmlEntity => "HTML Entity",
            PayloadEncoding::HtmlEntityDecimal => "HTML Entity (Decimal)",
            PayloadEncoding::JavaScriptUnicode => "JavaScript Unicode",
            PayloadEncoding::JavaScriptHex => "JavaScript Hex",
            PayloadEncoding::Hex => "Hex",
            PayloadEncoding::Unicode => "Unicode (\\uXXXX)",
            PayloadEncoding::AsciiHex => "ASCII Hex",
        }
    }

    /// Get short name, also the name accepted in configuration
    pub fn short_name(&self) -> &'static str {
        match self {
            PayloadEncoding::None => "none",
            PayloadEncoding::UrlEncode => "url",
            PayloadEncoding::DoubleUrlEncode => "url2",
            PayloadEncoding::UrlEncodeAll => "urlall",
            PayloadEncoding::Base64 => "b64",
            PayloadEncoding::HtmlEntity => "html",
            PayloadEncoding::HtmlEntityDecimal => "htmld",
            PayloadEncoding::JavaScriptUnicode => "jsu",
            PayloadEncoding::JavaScriptHex => "jsx",
            PayloadEncoding::Hex => "hex",
            PayloadEncoding::Unicode => "uni",
            PayloadEncoding::AsciiHex => "ahex",
        }
    }

    /// Encode a payload using this encoding type
    pub fn encode(&self, payload: &str) -> String {
        match self {
            PayloadEncoding::None => payload.to_string(),
            PayloadEncoding::UrlEncode => url_encode(payload),
            PayloadEncoding::DoubleUrlEncode => url_encode(&url_encode(payload)),
            PayloadEncoding::UrlEncodeAll => url_encode_all(payload),
            PayloadEncoding::Base64 => base64_encode(payload),
            PayloadEncoding::HtmlEntity => html_entity_encode(payload),
            PayloadEncoding::HtmlEntityDecimal => html_entity_decimal_encode(payload),
            PayloadEncoding::JavaScriptUnicode => javascript_unicode_encode(payload),
            PayloadEncoding::JavaScriptHex => javascript_hex_encode(payload),
            PayloadEncoding::Hex => hex_encode(payload),
            PayloadEncoding::Unicode => unicode_encode(payload),
            PayloadEncoding::AsciiHex => ascii_hex_encode(payload),
        }
    }
}

impl fmt::Display for PayloadEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for PayloadEncoding {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|e| e.short_name() == wanted)
            .ok_or_else(|| ConfigError::InvalidEncoder(s.to_string()))
    }
}

/// An encoding, optionally restricted to the parts of a payload matching `scope`
#[derive(Debug, Clone)]
pub struct Encoder {
    pub encoding: PayloadEncoding,
    pub scope: Option<Regex>,
}

impl Encoder {
    pub fn new(encoding: PayloadEncoding) -> Self {
        Self {
            encoding,
            scope: None,
        }
    }

    /// Restrict encoding to substrings matching `pattern`
    pub fn scoped(encoding: PayloadEncoding, pattern: &str) -> Result<Self, ConfigError> {
        let scope =
            Regex::new(pattern).map_err(|e| ConfigError::invalid_regex("encoder", pattern, &e))?;
        Ok(Self {
            encoding,
            scope: Some(scope),
        })
    }

    /// Parse `name` or `name@regex`
    pub fn parse(spec: &str) -> Result<Self, ConfigError> {
        match spec.split_once('@') {
            Some((name, pattern)) => Self::scoped(name.parse()?, pattern),
            None => Ok(Self::new(spec.parse()?)),
        }
    }

    pub fn apply(&self, payload: &str) -> String {
        let Some(scope) = &self.scope else {
            return self.encoding.encode(payload);
        };

        let mut out = String::with_capacity(payload.len());
        let mut last = 0;
        for m in scope.find_iter(payload) {
            out.push_str(&payload[last..m.start()]);
            out.push_str(&self.encoding.encode(m.as_str()));
            last = m.end();
        }
        out.push_str(&payload[last..]);
        out
    }

    /// Label recorded in payload provenance
    pub fn label(&self) -> String {
        match &self.scope {
            Some(scope) => format!("{}@{}", self.encoding.short_name(), scope.as_str()),
            None => self.encoding.short_name().to_string(),
        }
    }
}

/// URL encode (percent encoding) a string
pub fn url_encode(input: &str) -> String {
    let mut encoded = String::with_capacity(input.len() * 3);
    for byte in input.bytes() {
        match byte {
            // Unreserved characters (RFC 3986)
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char);
            }
            _ => {
                encoded.push('%');
                encoded.push_str(&format!("{:02X}", byte));
            }
        }
    }
    encoded
}

/// URL encode all characters (aggressive encoding for WAF bypass)
pub fn url_encode_all(input: &str) -> String {
    let mut encoded = String::with_capacity(input.len() * 3);
    for byte in input.bytes() {
        encoded.push('%');
        encoded.push_str(&format!("{:02X}", byte));
    }
    encoded
}

/// Base64 encode a string
pub fn base64_encode(input: &str) -> String {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    STANDARD.encode(input.as_bytes())
}

/// HTML entity encode (named entities for special chars, hex for others)
pub fn html_entity_encode(input: &str) -> String {
    let mut encoded = String::with_capacity(input.len() * 6);
    for ch in input.chars() {
        match ch {
            '<' => encoded.push_str("&lt;"),
            '>' => encoded.push_str("&gt;"),
            '&' => encoded.push_str("&amp;"),
            '"' => encoded.push_str("&quot;"),
            '\'' => encoded.push_str("&#x27;"),
            '/' => encoded.push_str("&#x2F;"),
            _ if !ch.is_alphanumeric() && !ch.is_whitespace() => {
                encoded.push_str(&format!("&#x{:X};", ch as u32));
            }
            _ => encoded.push(ch),
        }
    }
    encoded
}

/// HTML entity encode using decimal entities
pub fn html_entity_decimal_encode(input: &str) -> String {
    let mut encoded = String::with_capacity(input.len() * 8);
    for ch in input.chars() {
        if ch.is_alphanumeric() {
            encoded.push(ch);
        } else {
            encoded.push_str(&format!("&#{};", ch as u32));
        }
    }
    encoded
}

/// JavaScript Unicode escape (\uXXXX)
pub fn javascript_unicode_encode(input: &str) -> String {
    let mut encoded = String::with_capacity(input.len() * 6);
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            encoded.push(ch);
        } else {
            encoded.push_str(&format!("\\u{:04X}", ch as u32));
        }
    }
    encoded
}

/// JavaScript hex escape (\xXX)
pub fn javascript_hex_encode(input: &str) -> String {
    let mut encoded = String::with_capacity(input.len() * 4);
    for byte in input.bytes() {
        if byte.is_ascii_alphanumeric() {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("\\x{:02X}", byte));
        }
    }
    encoded
}

/// Hex encode
pub fn hex_encode(input: &str) -> String {
    input.bytes().map(|b| format!("{:02x}", b)).collect()
}

/// Unicode encode (\uXXXX for all chars)
pub fn unicode_encode(input: &str) -> String {
    input
        .chars()
        .map(|ch| format!("\\u{:04X}", ch as u32))
        .collect()
}

/// ASCII hex encode (\xXX for all bytes)
pub fn ascii_hex_encode(input: &str) -> String {
    input.bytes().map(|b| format!("\\x{:02X}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_encode() {
        assert_eq!(url_encode("test"), "test");
        assert_eq!(url_encode("<script>"), "%3Cscript%3E");
        assert_eq!(url_encode("a b"), "a%20b");
        assert_eq!(url_encode("'\""), "%27%22");
    }

    #[test]
    fn test_double_url_encode() {
        assert_eq!(PayloadEncoding::DoubleUrlEncode.encode("<"), "%253C");
    }

    #[test]
    fn test_base64_encode() {
        assert_eq!(base64_encode("test"), "dGVzdA==");
    }

    #[test]
    fn test_html_entity_encode() {
        assert_eq!(html_entity_encode("<"), "&lt;");
        assert_eq!(html_entity_encode("&"), "&amp;");
        assert_eq!(html_entity_encode("\""), "&quot;");
    }

    #[test]
    fn test_javascript_escapes() {
        assert_eq!(javascript_unicode_encode("a<"), "a\\u003C");
        assert_eq!(javascript_hex_encode("a<"), "a\\x3C");
    }

    #[test]
    fn test_parse_short_names() {
        assert_eq!("url".parse::<PayloadEncoding>().unwrap(), PayloadEncoding::UrlEncode);
        assert_eq!(" B64 ".parse::<PayloadEncoding>().unwrap(), PayloadEncoding::Base64);
        assert!(matches!(
            "rot13".parse::<PayloadEncoding>(),
            Err(ConfigError::InvalidEncoder(_))
        ));
    }

    #[test]
    fn test_scoped_encoder_leaves_unmatched_text() {
        let encoder = Encoder::parse("url@[<>]").unwrap();
        assert_eq!(encoder.apply("<a b>"), "%3Ca b%3E");
        assert_eq!(encoder.label(), "url@[<>]");
    }

    #[test]
    fn test_scoped_encoder_bad_regex_fails_at_parse() {
        let err = Encoder::parse("url@(").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRegex { ref component, .. } if component == "encoder"));
    }
}
