use std::path::PathBuf;

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Canonical sentence the assistant uses when it cannot answer; also the
/// acknowledgment sent when a user asks for a person.
pub const DEFAULT_FALLBACK_REPLY: &str =
    "Derivo tu consulta a una persona del equipo. En breve se contactará con vos 😊";

/// Notice sent to the user when a human agent closes the conversation.
pub const DEFAULT_CLOSING_NOTICE: &str = "Gracias por comunicarte con nosotros. Damos por \
     finalizada la atención personalizada; a partir de ahora te responde nuevamente el \
     asistente virtual 😊";

/// Handoff-intent phrases. Matched case-insensitively as substrings.
pub const DEFAULT_HANDOFF_KEYWORDS: &[&str] = &[
    "asesor",
    "humano",
    "persona",
    "hablar con alguien",
    "me atiende",
    "human",
    "advisor",
    "a person",
    "speak with someone",
];

/// Business knowledge given to the automated responder.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
Sos un asistente virtual del Consultorio 11 de Abril, ubicado en 11 de abril 130, Bahía Blanca.
Tu tarea es responder preguntas de pacientes sobre estudios, horarios, precios y cómo consultar resultados.
Respondé únicamente con la siguiente información:

- Dirección: 11 de abril 130 (Bahía Blanca)
- Horario: lunes a viernes de 9 a 19 hs
- No se necesita turno. Se atiende por orden de llegada.
- Resultados online: www.11deabril.com (usuario y contraseña: el DNI, salvo que la hayan cambiado)

Estudios y precios:
- Panorámica dental: $20.000
- Tórax frente y perfil (\"f y p\"): $15.000
- Tórax solo frente (\"frente\" o \"f\"): $10.000
- Tórax solo perfil (\"perfil\" o \"p\"): $9.000
- Columna: $7.000

Si la pregunta no tiene respuesta en esta información, respondé exactamente:
\"Derivo tu consulta a una persona del equipo. En breve se contactará con vos 😊\"

Respondé de forma clara, amable y profesional, en menos de 60 palabras cuando sea posible.";

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HandoffConfig {
    pub server: ServerConfig,
    pub gateway: GatewayConfig,
    pub whatsapp: WhatsAppConfig,
    pub responder: ResponderConfig,
    pub routing: RoutingConfig,
    pub storage: StorageConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to. Defaults to "127.0.0.1".
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 3001,
        }
    }
}

/// Webhook and agent-surface behavior.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Longest time the webhook waits for routing before acknowledging.
    pub ack_timeout_secs: u64,
    /// Bearer token required on the agent API and inbox. `None` leaves
    /// them open (only sensible on localhost).
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_option_secret"
    )]
    pub agent_token: Option<Secret<String>>,
    /// Serve the HTML inbox at `/inbox`.
    pub inbox_enabled: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            ack_timeout_secs: 10,
            agent_token: None,
            inbox_enabled: true,
        }
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("ack_timeout_secs", &self.ack_timeout_secs)
            .field("agent_token", &self.agent_token.as_ref().map(|_| "[REDACTED]"))
            .field("inbox_enabled", &self.inbox_enabled)
            .finish()
    }
}

/// WhatsApp Business Cloud API account.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WhatsAppConfig {
    /// Graph API base URL.
    pub api_base: String,
    pub api_version: String,
    /// Sending phone number id (`WHATSAPP_PHONE_ID`).
    pub phone_number_id: String,
    /// Permanent or system-user access token (`WHATSAPP_TOKEN`).
    #[serde(serialize_with = "serialize_secret")]
    pub access_token: Secret<String>,
    /// Token echoed during the subscription handshake (`VERIFY_TOKEN`).
    #[serde(serialize_with = "serialize_secret")]
    pub verify_token: Secret<String>,
    /// App secret for `X-Hub-Signature-256` checks. Unset disables them.
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_option_secret"
    )]
    pub app_secret: Option<Secret<String>>,
    /// Per-request timeout for outbound delivery.
    pub timeout_secs: u64,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            api_base: "https://graph.facebook.com".into(),
            api_version: "v19.0".into(),
            phone_number_id: String::new(),
            access_token: Secret::new(String::new()),
            verify_token: Secret::new(String::new()),
            app_secret: None,
            timeout_secs: 10,
        }
    }
}

impl std::fmt::Debug for WhatsAppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhatsAppConfig")
            .field("api_base", &self.api_base)
            .field("api_version", &self.api_version)
            .field("phone_number_id", &self.phone_number_id)
            .field("access_token", &"[REDACTED]")
            .field("verify_token", &"[REDACTED]")
            .field("app_secret", &self.app_secret.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// OpenAI-compatible chat completions endpoint used for automated replies.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponderConfig {
    pub base_url: String,
    #[serde(serialize_with = "serialize_secret")]
    pub api_key: Secret<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            api_key: Secret::new(String::new()),
            model: "gpt-3.5-turbo".into(),
            max_tokens: 120,
            temperature: 0.7,
            timeout_secs: 20,
        }
    }
}

impl std::fmt::Debug for ResponderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponderConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Handoff rules and fixed texts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub handoff_keywords: Vec<String>,
    /// Sentence whose presence in an automated reply forces a handoff.
    pub fallback_reply: String,
    /// Reply sent when the user asks for a person.
    pub acknowledgment: String,
    pub closing_notice: String,
    pub system_prompt: String,
    /// Also keep transcripts of turns answered by the assistant.
    pub log_automated_turns: bool,
    /// Newest automated-turn entries kept per sender that is not escalated.
    /// 0 keeps everything.
    pub automated_history_limit: usize,
    /// How many recent inbound message ids are remembered for duplicate
    /// webhook deliveries.
    pub dedupe_capacity: usize,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            handoff_keywords: DEFAULT_HANDOFF_KEYWORDS
                .iter()
                .map(|k| (*k).to_string())
                .collect(),
            fallback_reply: DEFAULT_FALLBACK_REPLY.into(),
            acknowledgment: DEFAULT_FALLBACK_REPLY.into(),
            closing_notice: DEFAULT_CLOSING_NOTICE.into(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            log_automated_turns: false,
            automated_history_limit: 20,
            dedupe_capacity: 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// `escalations.json` + `transcripts.json` in the data directory.
    #[default]
    File,
    Sqlite,
}

/// Where conversation state is kept.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Overrides the default data directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    /// SQLite URL; defaults to `handoff.db` in the data directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}
