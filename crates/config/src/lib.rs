//! Configuration loading, validation, and env substitution.
//!
//! Config files: `handoff.toml`, `handoff.yaml`, or `handoff.json`
//! Searched in `./` then `~/.config/handoff/`.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-default}` substitution in the raw
//! file, plus direct overrides from the environment variables the WhatsApp
//! deployment conventionally uses (see [`apply_env_overrides`]).

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{apply_env_overrides, config_dir, data_dir, discover_and_load, load_config},
    schema::{
        GatewayConfig, HandoffConfig, ResponderConfig, RoutingConfig, ServerConfig,
        StorageBackend, StorageConfig, WhatsAppConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult},
};
