//! Tool configuration stored in `labelsync.toml`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::policy::ForbiddenPolicy;
use crate::core::redirects::TitleSplitter;

pub const DEFAULT_CONFIG_FILE: &str = "labelsync.toml";
pub const USERNAME_ENV: &str = "LABELSYNC_USERNAME";
pub const PASSWORD_ENV: &str = "LABELSYNC_PASSWORD";

/// Tool configuration (TOML).
///
/// Meant to be edited by humans. Missing fields fall back to the defaults
/// below, so an absent file is a valid configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Directory holding cursors and journals.
    pub state_dir: PathBuf,

    /// Maximum number of move events handled per run.
    pub batch_limit: usize,

    /// Namespace whose moves are tracked (0 = articles).
    pub namespace: i64,

    /// Action API endpoint of the item repository.
    pub repo_api: String,

    pub user_agent: String,

    /// `maxlag` sent with every API request, in seconds.
    pub maxlag: u32,

    /// Retries for requests refused with `maxlag` or a 5xx status.
    pub max_retries: u32,

    /// Minimum spacing between two write requests.
    pub write_interval_ms: u64,

    pub editions: BTreeMap<String, EditionConfig>,
}

/// One language edition of the wiki.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EditionConfig {
    /// Wiki subdomain and site id prefix (`no` for nowiki).
    pub site: String,
    /// Label language code on the item repository.
    pub lang: String,
    /// Action API endpoint; defaults to `https://<site>.wikipedia.org/w/api.php`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<String>,
    /// Substrings an automatic label change must not introduce.
    #[serde(default)]
    pub forbidden: Vec<String>,
    /// Redirect titles are truncated at these; defaults to `forbidden`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split_patterns: Option<Vec<String>>,
}

impl EditionConfig {
    fn new(site: &str, lang: &str, forbidden: &[&str]) -> Self {
        Self {
            site: site.to_string(),
            lang: lang.to_string(),
            api: None,
            forbidden: forbidden.iter().map(|s| s.to_string()).collect(),
            split_patterns: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let editions = BTreeMap::from([
            ("nb".to_string(), EditionConfig::new("no", "nb", &[" ("])),
            ("nn".to_string(), EditionConfig::new("nn", "nn", &[" (", " i "])),
            (
                "sv".to_string(),
                EditionConfig::new("sv", "sv", &[" (", ", ", "#"]),
            ),
        ]);
        Self {
            state_dir: PathBuf::from(".labelsync"),
            batch_limit: 500,
            namespace: 0,
            repo_api: "https://www.wikidata.org/w/api.php".to_string(),
            user_agent: concat!("labelsync/", env!("CARGO_PKG_VERSION")).to_string(),
            maxlag: 5,
            max_retries: 3,
            write_interval_ms: 1_000,
            editions,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.batch_limit == 0 {
            return Err(anyhow!("batch_limit must be > 0"));
        }
        if self.repo_api.trim().is_empty() {
            return Err(anyhow!("repo_api must be set"));
        }
        if self.editions.is_empty() {
            return Err(anyhow!("at least one [editions.<id>] table is required"));
        }
        for (id, edition) in &self.editions {
            if edition.site.trim().is_empty() {
                return Err(anyhow!("editions.{id}.site must be non-empty"));
            }
            if edition.lang.trim().is_empty() {
                return Err(anyhow!("editions.{id}.lang must be non-empty"));
            }
            if edition.forbidden.iter().any(String::is_empty) {
                return Err(anyhow!("editions.{id}.forbidden must not contain empty strings"));
            }
            if edition
                .split_patterns
                .as_ref()
                .is_some_and(|patterns| patterns.iter().any(String::is_empty))
            {
                return Err(anyhow!(
                    "editions.{id}.split_patterns must not contain empty strings"
                ));
            }
        }
        Ok(())
    }

    /// Resolve an edition into the immutable profile used for a run.
    pub fn profile(&self, edition: &str) -> Result<EditionProfile> {
        let cfg = self.editions.get(edition).ok_or_else(|| {
            let known: Vec<&str> = self.editions.keys().map(String::as_str).collect();
            anyhow!(
                "unknown edition '{edition}' (configured: {})",
                known.join(", ")
            )
        })?;
        let split_patterns = cfg.split_patterns.as_ref().unwrap_or(&cfg.forbidden);
        let splitter = TitleSplitter::new(split_patterns)
            .with_context(|| format!("compile split patterns for edition {edition}"))?;
        Ok(EditionProfile {
            edition: edition.to_string(),
            site: cfg.site.clone(),
            lang: cfg.lang.clone(),
            wiki_api: cfg
                .api
                .clone()
                .unwrap_or_else(|| format!("https://{}.wikipedia.org/w/api.php", cfg.site)),
            namespace: self.namespace,
            policy: ForbiddenPolicy::new(cfg.forbidden.iter().cloned()),
            splitter,
        })
    }

    pub fn write_interval(&self) -> Duration {
        Duration::from_millis(self.write_interval_ms)
    }
}

/// Everything a run needs to know about its language edition.
///
/// Built once from [`Config`] and passed by reference; never mutated.
#[derive(Debug, Clone)]
pub struct EditionProfile {
    pub edition: String,
    pub site: String,
    pub lang: String,
    pub wiki_api: String,
    pub namespace: i64,
    pub policy: ForbiddenPolicy,
    pub splitter: TitleSplitter,
}

impl EditionProfile {
    /// Site id of the wiki on the item repository (`nowiki`).
    pub fn site_id(&self) -> String {
        format!("{}wiki", self.site)
    }
}

/// Bot password credentials. Never stored in the config file.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Both variables must be set and non-empty.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let username = lookup(USERNAME_ENV).filter(|v| !v.trim().is_empty())?;
        let password = lookup(PASSWORD_ENV).filter(|v| !v.is_empty())?;
        Some(Self { username, password })
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `Config::default()`.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        let cfg = Config::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: Config =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &Config) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("labelsync.toml");
        let cfg = Config::default();
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("labelsync.toml");
        fs::write(
            &path,
            "batch_limit = 50\n\n[editions.da]\nsite = \"da\"\nlang = \"da\"\nforbidden = [\" (\"]\n",
        )
        .expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.batch_limit, 50);
        assert_eq!(cfg.maxlag, 5);
        assert_eq!(cfg.editions.len(), 1);
        assert!(cfg.editions.contains_key("da"));
    }

    #[test]
    fn validate_rejects_empty_forbidden_entry() {
        let mut cfg = Config::default();
        if let Some(sv) = cfg.editions.get_mut("sv") {
            sv.forbidden.push(String::new());
        }
        let err = cfg.validate().expect_err("invalid");
        assert!(err.to_string().contains("editions.sv.forbidden"));
    }

    #[test]
    fn profile_defaults_split_patterns_and_api() {
        let profile = Config::default().profile("nb").expect("profile");
        assert_eq!(profile.site_id(), "nowiki");
        assert_eq!(profile.lang, "nb");
        assert_eq!(profile.wiki_api, "https://no.wikipedia.org/w/api.php");
        assert_eq!(profile.policy.substrings(), [" (".to_string()]);
        assert_eq!(profile.splitter.truncate("Oslo (by)"), "Oslo");
    }

    #[test]
    fn credentials_need_both_variables() {
        let full = |key: &str| match key {
            USERNAME_ENV => Some("Bot@labelsync".to_string()),
            PASSWORD_ENV => Some("secret".to_string()),
            _ => None,
        };
        let creds = Credentials::from_lookup(full).expect("credentials");
        assert_eq!(creds.username, "Bot@labelsync");

        let no_password = |key: &str| (key == USERNAME_ENV).then(|| "Bot@labelsync".to_string());
        assert!(Credentials::from_lookup(no_password).is_none());
        assert!(Credentials::from_lookup(|_| Some(String::new())).is_none());
    }

    #[test]
    fn unknown_edition_lists_known_ones() {
        let err = Config::default().profile("de").expect_err("unknown");
        assert!(err.to_string().contains("nb, nn, sv"));
    }
}
