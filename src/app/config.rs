//! Application configuration management

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::fuzzer::{
    scanner_from_name, CaseTransform, Encoder, Filter, FuzzerConfig, Matcher, MutationConfig,
    RequestTemplate, Scanner, ScannerContext, DEFAULT_MARKER,
};
use crate::http::TransportSettings;
use crate::reporting::ReportFormat;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Dispatch and transport settings
    pub engine: EngineConfig,

    /// Request template
    pub request: RequestConfig,

    /// Payload mutation pipeline
    pub mutation: MutationSettings,

    /// Positive match rules
    pub matcher: MatcherConfig,

    /// Negative exclusion rules
    pub filter: FilterConfig,

    /// Result scanners
    pub scanners: ScannersConfig,

    /// Report output
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Wordlist source (`file:`, `list:`, `range:`, `builtin:` or a path)
    pub wordlist: Option<String>,

    /// Worker pool size
    pub threads: usize,

    /// Delay each worker waits after a request, in milliseconds
    pub delay_ms: u64,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Deepest recursion level promoted to a job
    pub max_rlevel: usize,

    /// Index of the first request
    pub index_base: usize,

    /// Abort the run on the first transport error
    pub abort_on_error: bool,

    /// Follow redirects
    pub follow_redirects: bool,

    /// Maximum redirect depth
    pub max_redirects: usize,

    /// Accept invalid TLS certificates
    pub insecure: bool,

    /// User agent string
    pub user_agent: String,

    /// Methods each job runs with; empty means `request.method`
    pub methods: Vec<String>,

    /// Proxies rotated by request index
    pub proxies: Vec<String>,

    /// Response body size kept per result (bytes)
    pub max_response_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    /// Target URL, may contain the marker
    pub url: String,

    /// HTTP method, may contain the marker
    pub method: String,

    /// Payload marker
    pub marker: String,

    /// Headers as `Name: value`
    pub headers: Vec<String>,

    /// Parameters as `key=value`; an empty value receives the payload
    pub params: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationSettings {
    pub prefixes: Vec<String>,
    pub suffixes: Vec<String>,
    /// `upper`, `lower` or `capitalize`
    pub case: Option<String>,
    /// Encoder names, optionally scoped as `name@regex`
    pub encoders: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Status codes and ranges, e.g. `200,301-302`
    pub status: Option<String>,
    pub time: Option<String>,
    pub size: Option<String>,
    pub words: Option<String>,
    pub lines: Option<String>,
    pub regex: Option<String>,
    /// Compare against a baseline request (status < 400, +300 bytes or +5s)
    pub legacy_delta: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub status: Option<String>,
    pub regex: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannersConfig {
    /// Scanner names to run on matched results
    pub enabled: Vec<String>,
    /// Header names the `headers` scanner records
    pub headers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// `txt`, `csv` or `json`
    pub format: String,
    /// Report destination; stdout when unset
    pub path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            wordlist: None,
            threads: 1,
            delay_ms: 0,
            timeout_secs: 10,
            max_rlevel: 0,
            index_base: 1,
            abort_on_error: false,
            follow_redirects: false,
            max_redirects: 10,
            insecure: false,
            user_agent: format!("Intruder/{}", env!("CARGO_PKG_VERSION")),
            methods: Vec::new(),
            proxies: Vec::new(),
            max_response_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            method: "GET".to_string(),
            marker: DEFAULT_MARKER.to_string(),
            headers: Vec::new(),
            params: Vec::new(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "txt".to_string(),
            path: None,
        }
    }
}

impl Config {
    /// Load configuration from file; a missing file means defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_config_path()?,
        };

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(|source| ConfigError::ReadError {
                path: config_path.display().to_string(),
                source,
            })?;

            let config = Self::from_toml(&contents)
                .with_context(|| format!("Failed to load {}", config_path.display()))?;

            tracing::info!("Loaded configuration from {:?}", config_path);
            Ok(config)
        } else {
            tracing::info!("No configuration file found, using defaults");
            Ok(Self::default())
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }

    /// Save configuration to file
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_config_path()?,
        };

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(&config_path, self.to_toml()?)?;

        tracing::info!("Saved configuration to {:?}", config_path);
        Ok(())
    }

    /// Get default configuration file path
    pub fn default_config_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("io", "intruder", "intruder")
            .context("Failed to determine config directory")?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Check everything that can be checked without sending a request
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.threads == 0 {
            return Err(ConfigError::ValidationError {
                field: "engine.threads".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.engine.timeout_secs == 0 {
            return Err(ConfigError::ValidationError {
                field: "engine.timeout_secs".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.request.marker.is_empty() {
            return Err(ConfigError::ValidationError {
                field: "request.marker".into(),
                reason: "must not be empty".into(),
            });
        }

        self.matcher()?;
        self.filter()?;
        self.mutation()?;
        self.report_format()?;
        for name in &self.scanners.enabled {
            scanner_from_name(name, &ScannerContext::default())?;
        }
        if !self.request.url.is_empty() {
            self.template()?;
        }
        Ok(())
    }

    pub fn matcher(&self) -> Result<Matcher, ConfigError> {
        let cfg = &self.matcher;
        let mut matcher = Matcher::new();
        if let Some(status) = &cfg.status {
            matcher = matcher.with_status_spec(status)?;
        }
        if let Some(time) = &cfg.time {
            matcher = matcher.with_time(time)?;
        }
        if let Some(size) = &cfg.size {
            matcher = matcher.with_size(size)?;
        }
        if let Some(words) = &cfg.words {
            matcher = matcher.with_words(words)?;
        }
        if let Some(lines) = &cfg.lines {
            matcher = matcher.with_lines(lines)?;
        }
        if let Some(regex) = &cfg.regex {
            matcher = matcher.with_regex(regex)?;
        }
        Ok(matcher)
    }

    pub fn filter(&self) -> Result<Filter, ConfigError> {
        let mut filter = Filter::new();
        if let Some(status) = &self.filter.status {
            filter = filter.with_status_str(status)?;
        }
        if let Some(regex) = &self.filter.regex {
            filter = filter.with_regex(regex)?;
        }
        Ok(filter)
    }

    pub fn mutation(&self) -> Result<MutationConfig, ConfigError> {
        let cfg = &self.mutation;
        let encoders = cfg
            .encoders
            .iter()
            .map(|spec| Encoder::parse(spec))
            .collect::<Result<Vec<_>, _>>()?;

        let mut mutation = MutationConfig::default()
            .with_prefixes(cfg.prefixes.clone())
            .with_suffixes(cfg.suffixes.clone())
            .with_encoders(encoders);
        if let Some(case) = &cfg.case {
            mutation = mutation.with_case(case.parse::<CaseTransform>()?);
        }
        Ok(mutation)
    }

    pub fn template(&self) -> Result<RequestTemplate, ConfigError> {
        let req = &self.request;
        if req.url.is_empty() {
            return Err(ConfigError::MissingField("request.url".into()));
        }

        let mut template = RequestTemplate::new(&req.url, &req.method, &req.marker);
        for header in &req.headers {
            let (name, value) = header.split_once(':').ok_or_else(|| ConfigError::ValidationError {
                field: "request.headers".into(),
                reason: format!("expected 'Name: value', got '{}'", header),
            })?;
            template = template.with_header(name.trim(), value.trim_start());
        }
        for param in &req.params {
            let (key, default) = param.split_once('=').unwrap_or((param.as_str(), ""));
            template = template.with_param(key, default);
        }

        if !template.is_fuzzed() {
            tracing::warn!(marker = %req.marker, "No field contains the payload marker");
        }
        Ok(template)
    }

    pub fn scanners(&self, wordlist: Arc<Vec<String>>) -> Result<Vec<Arc<dyn Scanner>>, ConfigError> {
        let context = ScannerContext {
            wordlist,
            headers: self.scanners.headers.clone(),
        };
        self.scanners
            .enabled
            .iter()
            .map(|name| scanner_from_name(name, &context))
            .collect()
    }

    pub fn report_format(&self) -> Result<ReportFormat, ConfigError> {
        self.output.format.parse()
    }

    pub fn fuzzer_config(&self) -> FuzzerConfig {
        let engine = &self.engine;
        FuzzerConfig {
            threads: engine.threads,
            delay_ms: engine.delay_ms,
            timeout_secs: Some(engine.timeout_secs),
            index_base: engine.index_base,
            max_rlevel: engine.max_rlevel,
            methods: engine.methods.clone(),
            proxies: engine.proxies.clone(),
            max_response_size: engine.max_response_size,
            legacy_delta: self.matcher.legacy_delta,
        }
    }

    pub fn transport_settings(&self) -> TransportSettings {
        let engine = &self.engine;
        TransportSettings {
            timeout_secs: engine.timeout_secs,
            follow_redirects: engine.follow_redirects,
            max_redirects: engine.max_redirects,
            user_agent: engine.user_agent.clone(),
            proxies: engine.proxies.clone(),
            insecure: engine.insecure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.engine.threads, 1);
        assert_eq!(config.engine.index_base, 1);
        assert_eq!(config.request.marker, "$");
        assert!(!config.matcher.legacy_delta);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[engine]
threads = 8
proxies = ["http://127.0.0.1:8080"]

[request]
url = "http://target/$"
headers = ["Cookie: SESSID=$"]

[matcher]
status = "200,300-399"
size = ">=1500"
"#
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.engine.threads, 8);
        assert_eq!(config.engine.timeout_secs, 10);
        assert_eq!(config.request.method, "GET");
        assert!(config.validate().is_ok());

        let template = config.template().unwrap();
        assert_eq!(template.render("x").headers[0].1, "SESSID=x");
        assert!(config.matcher().unwrap().status_matches(302));
        assert_eq!(config.fuzzer_config().proxies.len(), 1);
    }

    #[test]
    fn test_missing_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(Some(dir.path().join("absent.toml").as_path())).unwrap();
        assert_eq!(config.output.format, "txt");
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.mutation.prefixes = vec!["../".into()];
        config.save(Some(path.as_path())).unwrap();

        let loaded = Config::load(Some(path.as_path())).unwrap();
        assert_eq!(loaded.mutation.prefixes, vec!["../".to_string()]);
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            Config::from_toml("[engine]\nthreads = \"many\""),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.engine.threads = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError { .. })));

        let mut config = Config::default();
        config.matcher.regex = Some("[".into());
        assert!(matches!(config.validate(), Err(ConfigError::InvalidRegex { .. })));

        let mut config = Config::default();
        config.matcher.time = Some(">slow".into());
        assert!(matches!(config.validate(), Err(ConfigError::InvalidComparator { .. })));

        let mut config = Config::default();
        config.mutation.encoders = vec!["rot13".into()];
        assert!(matches!(config.validate(), Err(ConfigError::InvalidEncoder(_))));

        let mut config = Config::default();
        config.scanners.enabled = vec!["sqlmap".into()];
        assert!(matches!(config.validate(), Err(ConfigError::UnknownScanner(_))));

        let mut config = Config::default();
        config.output.format = "xml".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_template_requires_url() {
        assert!(matches!(Config::default().template(), Err(ConfigError::MissingField(_))));
    }

    #[test]
    fn test_params_parse() {
        let mut config = Config::default();
        config.request.url = "http://x/login".into();
        config.request.method = "POST".into();
        config.request.params = vec!["user=".into(), "pass".into(), "token=t-$".into(), "submit=Login".into()];

        let request = config.template().unwrap().render("admin");
        assert_eq!(
            request.params,
            vec![
                ("user".to_string(), "admin".to_string()),
                ("pass".to_string(), "admin".to_string()),
                ("token".to_string(), "t-admin".to_string()),
                ("submit".to_string(), "Login".to_string()),
            ]
        );
    }
}
