// src/reasons.rs

use serde::{Deserialize, Serialize};

/// One entry of the cancellation-reason catalog. The server owns the
/// authoritative list; the fallback below keeps the workflow usable when the
/// catalog endpoint is down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancellationReason {
    pub code: String,
    pub label: String,
    #[serde(default)]
    pub description: String,
}

/// Known codes with their operator-facing labels. Must stay in sync with the
/// server's catalog seed.
pub const FALLBACK_REASONS: [(&str, &str); 8] = [
    ("no_show", "No se presentó"),
    ("patient_request", "Solicitud del paciente"),
    ("auto_expired", "Expiró sin confirmar"),
    ("emergency", "Emergencia del paciente"),
    ("scheduling_conflict", "Conflicto de horario"),
    ("specialist_unavailable", "Especialista no disponible"),
    ("clinic_decision", "Decisión administrativa"),
    ("other", "Otro motivo"),
];

pub fn fallback_reasons() -> Vec<CancellationReason> {
    FALLBACK_REASONS
        .iter()
        .map(|(code, label)| CancellationReason {
            code: (*code).to_string(),
            label: (*label).to_string(),
            description: String::new(),
        })
        .collect()
}

/// Label for a stored reason code, for rendering cancelled appointments even
/// when the catalog was never fetched.
pub fn label_for(code: &str) -> Option<&'static str> {
    FALLBACK_REASONS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, label)| *label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_has_exactly_eight_codes() {
        let reasons = fallback_reasons();
        assert_eq!(reasons.len(), 8);
        let codes: Vec<&str> = reasons.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(
            codes,
            vec![
                "no_show",
                "patient_request",
                "auto_expired",
                "emergency",
                "scheduling_conflict",
                "specialist_unavailable",
                "clinic_decision",
                "other",
            ]
        );
        assert!(reasons.iter().all(|r| r.description.is_empty()));
    }

    #[test]
    fn test_label_lookup() {
        assert_eq!(label_for("no_show"), Some("No se presentó"));
        assert_eq!(label_for("bogus"), None);
    }

    #[test]
    fn test_catalog_entry_deserializes_without_description() {
        let r: CancellationReason =
            serde_json::from_str(r#"{"code":"other","label":"Otro motivo"}"#).unwrap();
        assert_eq!(r.code, "other");
        assert!(r.description.is_empty());
    }
}
