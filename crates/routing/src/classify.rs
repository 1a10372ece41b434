use handoff_config::RoutingConfig;

/// Decides when a conversation needs a person.
#[derive(Debug, Clone)]
pub struct EscalationClassifier {
    /// Lowercased, non-empty keywords.
    keywords: Vec<String>,
    /// Lowercased, trimmed fallback sentence.
    fallback: String,
}

impl EscalationClassifier {
    pub fn new<I, S>(keywords: I, fallback_reply: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self {
            keywords,
            fallback: fallback_reply.trim().to_lowercase(),
        }
    }

    pub fn from_config(config: &RoutingConfig) -> Self {
        Self::new(&config.handoff_keywords, &config.fallback_reply)
    }

    /// Whether the user is asking for a person. Case-insensitive substring
    /// match, no stemming.
    #[must_use]
    pub fn wants_human(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.keywords.iter().any(|k| text.contains(k.as_str()))
    }

    /// Whether an automated reply is the "I cannot answer this" sentence.
    #[must_use]
    pub fn is_fallback_reply(&self, reply: &str) -> bool {
        !self.fallback.is_empty() && reply.trim().to_lowercase().contains(&self.fallback)
    }
}

impl Default for EscalationClassifier {
    fn default() -> Self {
        Self::from_config(&RoutingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use {super::*, handoff_config::schema::DEFAULT_FALLBACK_REPLY};

    #[test]
    fn detects_handoff_requests() {
        let c = EscalationClassifier::default();
        assert!(c.wants_human("Quiero hablar con un asesor"));
        assert!(c.wants_human("ME ATIENDE ALGUIEN?"));
        assert!(c.wants_human("Necesito una Persona"));
        assert!(c.wants_human("can I speak with someone"));
        assert!(!c.wants_human("2x3"));
        assert!(!c.wants_human("¿Cuánto sale la panorámica?"));
    }

    #[test]
    fn substring_match_has_no_word_boundaries() {
        let c = EscalationClassifier::default();
        assert!(c.wants_human("asesoramiento"));
    }

    #[test]
    fn blank_keywords_are_ignored() {
        let c = EscalationClassifier::new(["", "  "], DEFAULT_FALLBACK_REPLY);
        assert!(!c.wants_human("cualquier cosa"));
    }

    #[test]
    fn recognizes_fallback_reply() {
        let c = EscalationClassifier::default();
        assert!(c.is_fallback_reply(DEFAULT_FALLBACK_REPLY));
        assert!(c.is_fallback_reply(&format!(
            "  {}\n",
            DEFAULT_FALLBACK_REPLY.to_uppercase()
        )));
        assert!(c.is_fallback_reply(&format!(
            "Disculpá, no tengo esa información. {DEFAULT_FALLBACK_REPLY}"
        )));
        assert!(!c.is_fallback_reply("Horario: lunes a viernes de 9 a 19 hs"));
    }

    #[test]
    fn empty_fallback_never_matches() {
        let c = EscalationClassifier::new(["asesor"], "   ");
        assert!(!c.is_fallback_reply("anything"));
    }
}
