use std::path::{Path, PathBuf};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{env_subst::substitute_env, schema::HandoffConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "handoff.toml",
    "handoff.yaml",
    "handoff.yml",
    "handoff.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<HandoffConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations, then apply environment
/// overrides.
///
/// Search order:
/// 1. `./handoff.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/handoff/handoff.{toml,yaml,yml,json}` (user-global)
///
/// Falls back to `HandoffConfig::default()` when no file is found or the file
/// fails to load.
pub fn discover_and_load() -> HandoffConfig {
    let mut config = if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                HandoffConfig::default()
            },
        }
    } else {
        debug!("no config file found, using defaults");
        HandoffConfig::default()
    };
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    config
}

/// Find the first config file in standard locations.
pub(crate) fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let config_dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| config_dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/handoff/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "handoff").map(|d| d.config_dir().to_path_buf())
}

/// Returns the directory conversation state is stored in.
///
/// `storage.data_dir` wins; otherwise the platform data directory, or
/// `./data` when none can be determined.
pub fn data_dir(config: &HandoffConfig) -> PathBuf {
    if let Some(ref dir) = config.storage.data_dir {
        return dir.clone();
    }
    directories::ProjectDirs::from("", "", "handoff")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("data"))
}

/// Overlay credentials and the port from well-known environment variables.
///
/// | Variable | Field |
/// |---|---|
/// | `WHATSAPP_TOKEN` | `whatsapp.access_token` |
/// | `WHATSAPP_PHONE_ID` | `whatsapp.phone_number_id` |
/// | `VERIFY_TOKEN` | `whatsapp.verify_token` |
/// | `WHATSAPP_APP_SECRET` | `whatsapp.app_secret` |
/// | `OPENAI_API_KEY` | `responder.api_key` |
/// | `HANDOFF_AGENT_TOKEN` | `gateway.agent_token` |
/// | `HANDOFF_PORT` | `server.port` |
pub fn apply_env_overrides(config: &mut HandoffConfig, lookup: impl Fn(&str) -> Option<String>) {
    let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(v) = get("WHATSAPP_TOKEN") {
        config.whatsapp.access_token = Secret::new(v);
    }
    if let Some(v) = get("WHATSAPP_PHONE_ID") {
        config.whatsapp.phone_number_id = v;
    }
    if let Some(v) = get("VERIFY_TOKEN") {
        config.whatsapp.verify_token = Secret::new(v);
    }
    if let Some(v) = get("WHATSAPP_APP_SECRET") {
        config.whatsapp.app_secret = Some(Secret::new(v));
    }
    if let Some(v) = get("OPENAI_API_KEY") {
        config.responder.api_key = Secret::new(v);
    }
    if let Some(v) = get("HANDOFF_AGENT_TOKEN") {
        config.gateway.agent_token = Some(Secret::new(v));
    }
    if let Some(v) = get("HANDOFF_PORT") {
        match v.parse() {
            Ok(port) => config.server.port = port,
            Err(e) => warn!(value = %v, error = %e, "ignoring invalid HANDOFF_PORT"),
        }
    }
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<HandoffConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

#[cfg(test)]
mod tests {
    use {super::*, secrecy::ExposeSecret};

    #[test]
    fn loads_toml_yaml_and_json() {
        let dir = tempfile::tempdir().unwrap();

        let toml_path = dir.path().join("handoff.toml");
        std::fs::write(&toml_path, "[server]\nport = 8080\n").unwrap();
        assert_eq!(load_config(&toml_path).unwrap().server.port, 8080);

        let yaml_path = dir.path().join("handoff.yaml");
        std::fs::write(&yaml_path, "server:\n  port: 8081\n").unwrap();
        assert_eq!(load_config(&yaml_path).unwrap().server.port, 8081);

        let json_path = dir.path().join("handoff.json");
        std::fs::write(&json_path, r#"{"server": {"port": 8082}}"#).unwrap();
        assert_eq!(load_config(&json_path).unwrap().server.port, 8082);
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handoff.ini");
        std::fs::write(&path, "port=1").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn env_overrides_apply() {
        let mut cfg = HandoffConfig::default();
        apply_env_overrides(&mut cfg, |name| match name {
            "WHATSAPP_TOKEN" => Some("wa-token".into()),
            "WHATSAPP_PHONE_ID" => Some("998877".into()),
            "OPENAI_API_KEY" => Some("sk-test".into()),
            "HANDOFF_PORT" => Some("not-a-port".into()),
            "VERIFY_TOKEN" => Some(String::new()),
            _ => None,
        });
        assert_eq!(cfg.whatsapp.access_token.expose_secret(), "wa-token");
        assert_eq!(cfg.whatsapp.phone_number_id, "998877");
        assert_eq!(cfg.responder.api_key.expose_secret(), "sk-test");
        assert_eq!(cfg.server.port, 3001);
        assert!(cfg.whatsapp.verify_token.expose_secret().is_empty());
        assert!(cfg.gateway.agent_token.is_none());
    }

    #[test]
    fn data_dir_prefers_configured_path() {
        let mut cfg = HandoffConfig::default();
        cfg.storage.data_dir = Some(PathBuf::from("/srv/handoff"));
        assert_eq!(data_dir(&cfg), PathBuf::from("/srv/handoff"));
    }
}
