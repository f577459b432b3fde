//! Server configuration loading.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rollcall_attendance::{
    KNOWN_MATCH_THRESHOLD, MatchConfig, SessionConfig, UNKNOWN_NOVELTY_THRESHOLD,
};
use rollcall_roster::{GroupId, MemoryRosterSource, RestRosterSource, RosterSource, StudentRecord};
use serde::Deserialize;

const DEFAULT_PORT: &str = "5000";

/// Configuration file format.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: Option<String>,
    pub session: SessionSection,
    pub roster: Option<RosterConfig>,
    pub detector: DetectorConfig,
}

impl ServerConfig {
    /// Builds the configured roster source.
    pub fn roster_source(&self) -> Result<Arc<dyn RosterSource>> {
        match &self.roster {
            Some(roster) => roster.build(),
            None => anyhow::bail!("no roster source configured (set roster.kind)"),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    pub config_timeout_secs: u64,
    pub known_threshold: f32,
    pub novelty_threshold: f32,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            config_timeout_secs: 10,
            known_threshold: KNOWN_MATCH_THRESHOLD,
            novelty_threshold: UNKNOWN_NOVELTY_THRESHOLD,
        }
    }
}

impl SessionSection {
    pub fn to_session_config(&self) -> SessionConfig {
        SessionConfig {
            config_timeout: Duration::from_secs(self.config_timeout_secs),
            matching: MatchConfig {
                known_threshold: self.known_threshold,
                novelty_threshold: self.novelty_threshold,
            },
        }
    }
}

/// Where student rosters come from.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RosterConfig {
    /// PostgREST endpoint of a Supabase project.
    Supabase {
        url: String,
        #[serde(default)]
        api_key: String,
        #[serde(default = "default_roster_timeout_secs")]
        timeout_secs: u64,
    },
    /// Local YAML or JSON file: `groups: {group_id: [student records]}`.
    File { path: PathBuf },
}

fn default_roster_timeout_secs() -> u64 {
    15
}

#[derive(Debug, Deserialize)]
struct RosterFile {
    #[serde(default)]
    groups: HashMap<GroupId, Vec<StudentRecord>>,
}

impl RosterConfig {
    pub fn build(&self) -> Result<Arc<dyn RosterSource>> {
        match self {
            RosterConfig::Supabase {
                url,
                api_key,
                timeout_secs,
            } => {
                let key = expand_env(api_key);
                if key.is_empty() && !api_key.is_empty() {
                    tracing::warn!(
                        api_key = %api_key,
                        "roster api key resolved to empty (env var not set?)"
                    );
                }
                let client = reqwest::Client::builder()
                    .timeout(Duration::from_secs(*timeout_secs))
                    .build()?;
                Ok(Arc::new(RestRosterSource::with_client(client, url, &key)))
            }
            RosterConfig::File { path } => {
                let file: RosterFile = read_document(path)
                    .with_context(|| format!("load roster file {}", path.display()))?;
                let source = MemoryRosterSource::from_groups(file.groups);
                tracing::info!(
                    groups = source.group_count(),
                    path = %path.display(),
                    "roster file loaded"
                );
                Ok(Arc::new(source))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:7000/detect".to_string(),
            timeout_secs: 30,
        }
    }
}

impl DetectorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Loads a config file, YAML or JSON by extension.
pub fn load(path: &Path) -> Result<ServerConfig> {
    read_document(path).with_context(|| format!("load config {}", path.display()))
}

fn read_document<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let data = std::fs::read(path)?;
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
    let doc = match ext {
        "json" => serde_json::from_slice(&data)?,
        _ => serde_yaml::from_slice(&data)?,
    };
    Ok(doc)
}

/// Picks the listen address: flag, then config file, then `$PORT`.
pub fn resolve_addr(
    flag: Option<&str>,
    config: Option<&str>,
    port_env: Option<String>,
) -> Result<SocketAddr> {
    match flag.or(config) {
        Some(addr) => parse_addr(addr),
        None => {
            let port = port_env.unwrap_or_else(|| DEFAULT_PORT.to_string());
            parse_addr(&format!(":{}", port.trim()))
        }
    }
}

/// Parses an address string; `:8080` binds all interfaces.
pub fn parse_addr(addr: &str) -> Result<SocketAddr> {
    let addr = if addr.starts_with(':') {
        format!("0.0.0.0{}", addr)
    } else {
        addr.to_string()
    };
    addr.parse()
        .with_context(|| format!("invalid listen address: {}", addr))
}

/// Expands `$VAR` or `${VAR}` from the environment; other strings pass
/// through unchanged.
fn expand_env(s: &str) -> String {
    let Some(rest) = s.strip_prefix('$') else {
        return s.to_string();
    };
    let var_name = rest
        .strip_prefix('{')
        .and_then(|r| r.strip_suffix('}'))
        .unwrap_or(rest);
    std::env::var(var_name).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_yaml_config() {
        let yaml = r#"
addr: ":8080"
session:
  known_threshold: 0.2
roster:
  kind: supabase
  url: https://example.supabase.co
  api_key: literal-key
detector:
  url: http://detector:7000/detect
"#;
        let cfg: ServerConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.addr.as_deref(), Some(":8080"));
        assert_eq!(cfg.session.known_threshold, 0.2);
        assert_eq!(cfg.session.novelty_threshold, 0.5);
        assert_eq!(cfg.session.config_timeout_secs, 10);
        assert_eq!(cfg.detector.url, "http://detector:7000/detect");
        assert_eq!(cfg.detector.timeout_secs, 30);
        assert!(matches!(
            cfg.roster,
            Some(RosterConfig::Supabase { ref api_key, timeout_secs: 15, .. })
                if api_key == "literal-key"
        ));
        assert!(cfg.roster_source().is_ok());
    }

    #[test]
    fn empty_config_uses_defaults() {
        let cfg: ServerConfig = serde_json::from_str("{}").unwrap();
        let session = cfg.session.to_session_config();
        assert_eq!(session.config_timeout, Duration::from_secs(10));
        assert_eq!(session.matching, MatchConfig::default());
        assert!(cfg.roster_source().is_err());
    }

    #[test]
    fn unknown_roster_kind_rejected() {
        let res: Result<ServerConfig, _> =
            serde_json::from_str(r#"{"roster": {"kind": "mysql"}}"#);
        assert!(res.is_err());
    }

    #[test]
    fn resolve_addr_precedence() {
        let flag = resolve_addr(Some(":9000"), Some(":8000"), Some("7000".into())).unwrap();
        assert_eq!(flag.port(), 9000);

        let cfg = resolve_addr(None, Some("127.0.0.1:8000"), Some("7000".into())).unwrap();
        assert_eq!(cfg.to_string(), "127.0.0.1:8000");

        let env = resolve_addr(None, None, Some("7000".into())).unwrap();
        assert_eq!(env.to_string(), "0.0.0.0:7000");

        let default = resolve_addr(None, None, None).unwrap();
        assert_eq!(default.to_string(), "0.0.0.0:5000");
    }

    #[test]
    fn parse_addr_rejects_garbage() {
        assert!(parse_addr("not an address").is_err());
        assert!(resolve_addr(None, None, Some("http".into())).is_err());
    }

    #[test]
    fn expand_env_forms() {
        // SAFETY: test-only, variable name unique to this test.
        unsafe { std::env::set_var("ROLLCALL_TEST_KEY", "secret") };
        assert_eq!(expand_env("$ROLLCALL_TEST_KEY"), "secret");
        assert_eq!(expand_env("${ROLLCALL_TEST_KEY}"), "secret");
        assert_eq!(expand_env("$ROLLCALL_TEST_MISSING"), "");
        assert_eq!(expand_env("plain"), "plain");
        assert_eq!(expand_env(""), "");
    }

    #[tokio::test]
    async fn file_roster_source() {
        let dir = std::env::temp_dir().join(format!("rollcall-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("roster.yaml");
        std::fs::write(
            &path,
            r#"
groups:
  cs-101:
    - id: 1
      name: Asha
      roll_number: 7
      face_embedding: "[1.0, 0.0]"
    - id: s2
      name: Bilal
      face_embedding: [0.0, 1.0]
"#,
        )
        .unwrap();

        let source = RosterConfig::File { path: path.clone() }.build().unwrap();
        let records = source.fetch(&[GroupId::new("cs-101")]).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id.as_str(), "1");
        assert_eq!(records[0].roll_number.as_deref(), Some("7"));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
