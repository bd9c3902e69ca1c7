//! Wordlist sources
//!
//! A source is only asked for its entries once, before the job manager is
//! built; every later job works from that snapshot.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::error::FuzzError;

/// Anything that can produce the raw entries of a wordlist
pub trait WordlistSource {
    fn name(&self) -> String;

    fn build(&self) -> Result<Vec<String>, FuzzError>;
}

/// Newline separated file; blank lines and `#` comments are skipped
#[derive(Debug, Clone)]
pub struct FileWordlist {
    path: PathBuf,
}

impl FileWordlist {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl WordlistSource for FileWordlist {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn build(&self) -> Result<Vec<String>, FuzzError> {
        let file = File::open(&self.path).map_err(|e| {
            FuzzError::Wordlist(format!("Failed to open wordlist {}: {}", self.path.display(), e))
        })?;
        let reader = BufReader::new(file);

        let mut words = Vec::new();
        for line in reader.lines() {
            let line = line?;
            let line = line.trim_end_matches('\r');
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            words.push(line.to_string());
        }
        Ok(words)
    }
}

/// Comma separated entries given inline
#[derive(Debug, Clone)]
pub struct InlineWordlist {
    words: Vec<String>,
}

impl InlineWordlist {
    pub fn new(words: Vec<String>) -> Self {
        Self { words }
    }

    pub fn parse(list: &str) -> Self {
        Self::new(list.split(',').map(str::to_string).collect())
    }
}

impl WordlistSource for InlineWordlist {
    fn name(&self) -> String {
        "inline".to_string()
    }

    fn build(&self) -> Result<Vec<String>, FuzzError> {
        Ok(self.words.clone())
    }
}

/// Inclusive range of integers, optionally zero padded to `width`
#[derive(Debug, Clone)]
pub struct RangeWordlist {
    start: i64,
    end: i64,
    width: usize,
}

impl RangeWordlist {
    pub fn new(start: i64, end: i64) -> Self {
        Self {
            start: start.min(end),
            end: start.max(end),
            width: 0,
        }
    }

    /// Parse `start-end`; a leading zero on `start` sets the padding width
    pub fn parse(spec: &str) -> Result<Self, FuzzError> {
        let invalid = || FuzzError::Wordlist(format!("Invalid range: {}", spec));
        let (a, b) = spec.split_once('-').ok_or_else(invalid)?;
        let start: i64 = a.trim().parse().map_err(|_| invalid())?;
        let end: i64 = b.trim().parse().map_err(|_| invalid())?;

        let mut range = Self::new(start, end);
        if a.trim().len() > 1 && a.trim().starts_with('0') {
            range.width = a.trim().len();
        }
        Ok(range)
    }
}

impl WordlistSource for RangeWordlist {
    fn name(&self) -> String {
        format!("range {}-{}", self.start, self.end)
    }

    fn build(&self) -> Result<Vec<String>, FuzzError> {
        Ok((self.start..=self.end)
            .map(|n| format!("{:0width$}", n, width = self.width))
            .collect())
    }
}

/// Small payload sets shipped with the binary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinWordlist {
    Directories,
    Usernames,
    Passwords,
    Sqli,
    Xss,
}

impl BuiltinWordlist {
    pub fn all() -> &'static [BuiltinWordlist] {
        &[
            BuiltinWordlist::Directories,
            BuiltinWordlist::Usernames,
            BuiltinWordlist::Passwords,
            BuiltinWordlist::Sqli,
            BuiltinWordlist::Xss,
        ]
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            BuiltinWordlist::Directories => "directories",
            BuiltinWordlist::Usernames => "common_usernames",
            BuiltinWordlist::Passwords => "common_passwords",
            BuiltinWordlist::Sqli => "sqli",
            BuiltinWordlist::Xss => "xss",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|b| b.short_name() == name)
    }

    fn entries(&self) -> &'static [&'static str] {
        match self {
            BuiltinWordlist::Directories => &[
                "admin", "administrator", "login", "wp-admin", "phpmyadmin", "api", "api/v1",
                "graphql", "swagger", "docs", ".git", ".env", "robots.txt", "sitemap.xml",
                "backup", "backups", "config", "debug", "test", "tmp", "upload", "uploads",
                "static", "assets", "server-status", "health", "metrics", "actuator", "console",
            ],
            BuiltinWordlist::Usernames => &[
                "admin", "administrator", "root", "user", "test", "guest", "info", "mysql",
                "postgres", "oracle", "ftp", "anonymous", "deploy",
            ],
            BuiltinWordlist::Passwords => &[
                "password", "123456", "12345678", "qwerty", "abc123", "letmein", "trustno1",
                "dragon", "iloveyou", "master", "admin", "admin123", "root", "toor", "pass",
            ],
            BuiltinWordlist::Sqli => &[
                "' OR '1'='1", "' OR '1'='1' --", "' OR 1=1--", "admin'--",
                "' UNION SELECT NULL--", "1' ORDER BY 10--", "1 AND 1=2", "' AND SLEEP(5)--",
            ],
            BuiltinWordlist::Xss => &[
                "<script>alert(1)</script>", "<img src=x onerror=alert(1)>", "<svg onload=alert(1)>",
                "\"><script>alert(1)</script>", "javascript:alert(1)", "'-alert(1)-'",
            ],
        }
    }
}

impl WordlistSource for BuiltinWordlist {
    fn name(&self) -> String {
        format!("builtin:{}", self.short_name())
    }

    fn build(&self) -> Result<Vec<String>, FuzzError> {
        Ok(self.entries().iter().map(|s| s.to_string()).collect())
    }
}

/// Pick a source from `file:path`, `list:a,b`, `range:1-9`, `builtin:name` or a bare path
pub fn wordlist_from_spec(spec: &str) -> Result<Box<dyn WordlistSource>, FuzzError> {
    match spec.split_once(':') {
        Some(("file", path)) => Ok(Box::new(FileWordlist::new(path))),
        Some(("list", list)) => Ok(Box::new(InlineWordlist::parse(list))),
        Some(("range", range)) => Ok(Box::new(RangeWordlist::parse(range)?)),
        Some(("builtin", name)) => BuiltinWordlist::from_name(name)
            .map(|b| Box::new(b) as Box<dyn WordlistSource>)
            .ok_or_else(|| FuzzError::Wordlist(format!("Unknown builtin wordlist: {}", name))),
        _ => Ok(Box::new(FileWordlist::new(spec))),
    }
}
