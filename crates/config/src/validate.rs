//! Configuration validation engine.
//!
//! Validates TOML configuration files against the known schema, detects
//! unknown/misspelled fields, and reports settings that would make the
//! gateway misbehave at runtime (missing credentials, no handoff keywords).

use std::{collections::HashMap, path::Path};

use secrecy::ExposeSecret;

use crate::schema::HandoffConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "syntax", "unknown-field", "type-error", "credentials",
    /// "routing", "security"
    pub category: &'static str,
    /// Dotted path, e.g. "whatsapp.acess_token"
    pub path: String,
    pub message: String,
}

/// Result of validating a configuration file.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<std::path::PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

// ── Schema tree for unknown-field detection ─────────────────────────────────

enum KnownKeys {
    Struct(HashMap<&'static str, KnownKeys>),
    Leaf,
}

fn build_schema_map() -> KnownKeys {
    use KnownKeys::{Leaf, Struct};

    let fields = |names: &[&'static str]| {
        Struct(names.iter().map(|n| (*n, Leaf)).collect::<HashMap<_, _>>())
    };

    Struct(HashMap::from([
        ("server", fields(&["bind", "port"])),
        (
            "gateway",
            fields(&["ack_timeout_secs", "agent_token", "inbox_enabled"]),
        ),
        (
            "whatsapp",
            fields(&[
                "api_base",
                "api_version",
                "phone_number_id",
                "access_token",
                "verify_token",
                "app_secret",
                "timeout_secs",
            ]),
        ),
        (
            "responder",
            fields(&[
                "base_url",
                "api_key",
                "model",
                "max_tokens",
                "temperature",
                "timeout_secs",
            ]),
        ),
        (
            "routing",
            fields(&[
                "handoff_keywords",
                "fallback_reply",
                "acknowledgment",
                "closing_notice",
                "system_prompt",
                "log_automated_turns",
                "automated_history_limit",
                "dedupe_capacity",
            ]),
        ),
        ("storage", fields(&["backend", "data_dir", "database_url"])),
    ]))
}

// ── Levenshtein distance ────────────────────────────────────────────────────

fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_chars.len()]
}

fn suggest<'a>(needle: &str, candidates: &[&'a str], max_distance: usize) -> Option<&'a str> {
    candidates
        .iter()
        .map(|c| (*c, levenshtein(needle, c)))
        .filter(|(_, d)| *d > 0 && *d <= max_distance)
        .min_by_key(|(_, d)| *d)
        .map(|(c, _)| c)
}

// ── Core validation ─────────────────────────────────────────────────────────

/// Validate a config file at the given path, or discover the default config
/// file location if `path` is `None`.
#[must_use]
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => crate::loader::find_config_file(),
    };

    let Some(ref actual_path) = config_path else {
        let mut result = validate_config(&HandoffConfig::default());
        result.diagnostics.insert(0, Diagnostic {
            severity: Severity::Info,
            category: "syntax",
            path: String::new(),
            message: "no config file found; using defaults".into(),
        });
        return result;
    };

    let is_toml = actual_path
        .extension()
        .and_then(|e| e.to_str())
        .is_none_or(|e| e == "toml");

    let mut result = if is_toml {
        match std::fs::read_to_string(actual_path) {
            Ok(content) => validate_toml_str(&crate::env_subst::substitute_env(&content)),
            Err(e) => ValidationResult {
                diagnostics: vec![Diagnostic {
                    severity: Severity::Error,
                    category: "syntax",
                    path: String::new(),
                    message: format!("failed to read config file: {e}"),
                }],
                config_path: None,
            },
        }
    } else {
        match crate::loader::load_config(actual_path) {
            Ok(config) => validate_config(&config),
            Err(e) => ValidationResult {
                diagnostics: vec![Diagnostic {
                    severity: Severity::Error,
                    category: "type-error",
                    path: String::new(),
                    message: e.to_string(),
                }],
                config_path: None,
            },
        }
    };
    result.config_path = Some(actual_path.clone());
    result
}

/// Validate a TOML string without file-system side effects.
#[must_use]
pub fn validate_toml_str(toml_str: &str) -> ValidationResult {
    let mut diagnostics = Vec::new();

    let toml_value: toml::Value = match toml::from_str(toml_str) {
        Ok(v) => v,
        Err(e) => {
            diagnostics.push(Diagnostic {
                severity: Severity::Error,
                category: "syntax",
                path: String::new(),
                message: format!("TOML syntax error: {e}"),
            });
            return ValidationResult {
                diagnostics,
                config_path: None,
            };
        },
    };

    check_unknown_fields(&toml_value, &build_schema_map(), "", &mut diagnostics);

    match toml::from_str::<HandoffConfig>(toml_str) {
        Ok(config) => check_semantics(&config, &mut diagnostics),
        Err(e) => diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "type-error",
            path: String::new(),
            message: format!("type error: {e}"),
        }),
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

/// Semantic checks on an already-parsed config.
#[must_use]
pub fn validate_config(config: &HandoffConfig) -> ValidationResult {
    let mut diagnostics = Vec::new();
    check_semantics(config, &mut diagnostics);
    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

fn check_unknown_fields(
    value: &toml::Value,
    schema: &KnownKeys,
    prefix: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let (toml::Value::Table(table), KnownKeys::Struct(fields)) = (value, schema) else {
        return;
    };
    let known_keys: Vec<&str> = fields.keys().copied().collect();
    for (key, child_value) in table {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match fields.get(key.as_str()) {
            Some(child_schema) => {
                check_unknown_fields(child_value, child_schema, &path, diagnostics);
            },
            None => {
                let message = match suggest(key, &known_keys, 3) {
                    Some(s) => format!("unknown field (did you mean \"{s}\"?)"),
                    None => "unknown field".to_string(),
                };
                diagnostics.push(Diagnostic {
                    severity: Severity::Error,
                    category: "unknown-field",
                    path,
                    message,
                });
            },
        }
    }
}

fn check_semantics(config: &HandoffConfig, diagnostics: &mut Vec<Diagnostic>) {
    let mut push = |severity, category, path: &str, message: &str| {
        diagnostics.push(Diagnostic {
            severity,
            category,
            path: path.to_string(),
            message: message.to_string(),
        });
    };

    if config.whatsapp.access_token.expose_secret().is_empty() {
        push(
            Severity::Warning,
            "credentials",
            "whatsapp.access_token",
            "no access token; replies cannot be delivered (set WHATSAPP_TOKEN)",
        );
    }
    if config.whatsapp.phone_number_id.is_empty() {
        push(
            Severity::Warning,
            "credentials",
            "whatsapp.phone_number_id",
            "no phone number id (set WHATSAPP_PHONE_ID)",
        );
    }
    if config.whatsapp.verify_token.expose_secret().is_empty() {
        push(
            Severity::Warning,
            "credentials",
            "whatsapp.verify_token",
            "no verify token; webhook subscription handshakes will be refused",
        );
    }
    if config.whatsapp.app_secret.is_none() {
        push(
            Severity::Info,
            "security",
            "whatsapp.app_secret",
            "webhook signatures are not verified",
        );
    }
    if config.responder.api_key.expose_secret().is_empty() {
        push(
            Severity::Warning,
            "credentials",
            "responder.api_key",
            "no API key; automated replies will fail (set OPENAI_API_KEY)",
        );
    }
    if !(0.0..=2.0).contains(&config.responder.temperature) {
        push(
            Severity::Error,
            "routing",
            "responder.temperature",
            "temperature must be between 0.0 and 2.0",
        );
    }
    if config.responder.max_tokens == 0 {
        push(
            Severity::Error,
            "routing",
            "responder.max_tokens",
            "max_tokens must be greater than zero",
        );
    }
    if config
        .routing
        .handoff_keywords
        .iter()
        .all(|k| k.trim().is_empty())
    {
        push(
            Severity::Warning,
            "routing",
            "routing.handoff_keywords",
            "no handoff keywords; users can only reach a person through the fallback reply",
        );
    }
    if config.routing.fallback_reply.trim().is_empty() {
        push(
            Severity::Error,
            "routing",
            "routing.fallback_reply",
            "fallback reply must not be empty",
        );
    }
    for (path, text) in [
        ("routing.acknowledgment", &config.routing.acknowledgment),
        ("routing.closing_notice", &config.routing.closing_notice),
    ] {
        if text.trim().is_empty() {
            push(Severity::Error, "routing", path, "message text must not be empty");
        }
    }
    if config.gateway.agent_token.is_none() && config.server.bind != "127.0.0.1" {
        push(
            Severity::Warning,
            "security",
            "gateway.agent_token",
            "agent API is unauthenticated on a non-localhost bind address",
        );
    }
}
