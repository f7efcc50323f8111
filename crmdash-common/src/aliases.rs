//! Field alias and keyword vocabularies
//!
//! The exports come from a Brazilian CRM, so every list starts with the
//! Portuguese labels actually seen in payloads and then carries the English
//! equivalents. Order is priority: [`FieldIndex::lookup`] returns the first
//! alias that hits.
//!
//! [`FieldIndex::lookup`]: crate::field_index::FieldIndex::lookup

// ============================================================================
// Field aliases (priority ordered)
// ============================================================================

/// Contract / fee amount when the card has no primary monetary amount.
pub const AMOUNT: &[&str] = &[
    "valor",
    "honorarios",
    "honor-rios",
    "preco",
    "valor-contrato",
    "valor-do-contrato",
    "valor-causa",
    "honorarios-contratuais",
    "valor-total",
    "montante",
    "receita",
    "value",
    "fees",
    "price",
    "contract value",
    "cause value",
    "total amount",
];

pub const MEETING_DATE: &[&str] = &[
    "data-da-reuni-o",
    "data da reuniao",
    "agendamento",
    "dt reuniao",
    "data agendamento",
    "meeting date",
    "scheduling",
];

pub const CONTRACT_DATE: &[&str] = &[
    "assinatura-do-contra",
    "assinatura",
    "data assinatura",
    "fechamento",
    "contrato",
    "data fechamento",
    "signature date",
    "signature",
    "closing date",
    "contract date",
];

pub const PAYMENT_DATE: &[&str] = &[
    "data-do-pagamento",
    "pagamento",
    "data pagamento",
    "payment date",
];

/// Deposit collected at signing; the commission base.
pub const ENTRY_VALUE: &[&str] = &[
    "-valor-da-entrada",
    "valor-da-entrada",
    "valor da entrada",
    "entrada",
    "sinal",
    "entry value",
    "deposit",
];

/// Narrower date aliases used when deciding whether a pipeline card is visible.
pub const PIPELINE_CONTRACT_DATE: &[&str] = &["assinatura-do-contra", "assinatura", "signature"];
pub const PIPELINE_MEETING_DATE: &[&str] = &["data-da-reuni-o", "reuniao", "meeting"];

/// Custom fields that may carry the owner's name instead of an id.
pub const RESPONSIBLE_NAME: &[&str] = &[
    "responsavel",
    "vendedor",
    "closer",
    "sdr",
    "responsible",
    "seller",
];

// ============================================================================
// Attribution keys (exact normalized keys, priority ordered)
// ============================================================================

pub const TRAFFIC_SOURCE_KEYS: &[&str] = &["utm_source", "utm source", "lead_origin", "origin", "source"];

pub const CAMPAIGN_KEYS: &[&str] = &[
    "utm_campaign",
    "utm campaign",
    "campaign",
    "ad_name",
    "adname",
    "criativo",
    "creative",
];

/// Key fragments scanned when no exact campaign key is present.
pub const CAMPAIGN_FRAGMENTS: &[&str] = &["campaign", "ad_name"];

pub const REFERRAL_URL_KEYS: &[&str] = &["ad_referral_url", "referral_url"];
pub const REFERRAL_URL_FRAGMENT: &str = "referral";

// ============================================================================
// Stage keywords (matched against normalized stage names)
// ============================================================================

pub const CONTRACT_SIGNED_STAGE: &[&str] = &["contrato assinado", "contract signed"];
pub const PAYMENT_CONFIRMED_STAGE: &[&str] = &["pagamento confirmado", "payment confirmed"];
pub const PROPOSAL_STAGE: &[&str] = &["proposta", "negocia", "proposal", "negotiation"];

/// True when the normalized stage name contains any keyword.
pub fn stage_mentions(normalized_stage: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| normalized_stage.contains(k))
}

// ============================================================================
// Tags
// ============================================================================

/// Workflow and channel tags that say nothing about the contracted service.
///
/// Compared after [`normalize_key`](crate::text::normalize_key), so accents
/// here are irrelevant.
pub const OPERATIONAL_TAGS: &[&str] = &[
    "quente", "frio", "morno", "follow", "reunião", "agendada", "lead",
    "novo", "cliente", "importado", "wts", "arquivado", "perdido",
    "desqualificado", "contato", "agendado", "pendente", "sdr", "closer",
    "indicação", "google", "instagram", "facebook", "ads", "orgânico",
    "conversapp", "sistema", "automático", "clie", "prosp", "ativo",
    "etapa", "funil", "card", "won", "lost", "open",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_mentions() {
        assert!(stage_mentions("contrato assinado", CONTRACT_SIGNED_STAGE));
        assert!(stage_mentions("em negociacao", PROPOSAL_STAGE));
        assert!(stage_mentions("proposal sent (v2)", PROPOSAL_STAGE));
        assert!(!stage_mentions("follow-up", PROPOSAL_STAGE));
    }
}
