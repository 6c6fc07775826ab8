//! Subject aggregates as read from the backing store.

use crate::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Opaque subject identifier (a citizen fiscal code).
pub type SubjectId = String;

/// Partner identifier (a TPP id).
pub type PartnerId = String;

/// A consent relationship between a subject and one partner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    /// Whether the consent is currently enabled.
    #[serde(alias = "tppState")]
    pub active: bool,
    /// Last time the consent state changed.
    #[serde(default, alias = "lastUpdateDate", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
}

impl Relationship {
    pub fn active() -> Self {
        Self {
            active: true,
            updated_at: Some(chrono::Utc::now()),
        }
    }

    pub fn inactive() -> Self {
        Self {
            active: false,
            updated_at: Some(chrono::Utc::now()),
        }
    }
}

/// A subject with all of its relationships, keyed by partner id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,
    #[serde(default, alias = "consents")]
    pub relationships: BTreeMap<PartnerId, Relationship>,
}

impl Subject {
    pub fn new(id: impl Into<SubjectId>) -> Self {
        Self {
            id: id.into(),
            relationships: BTreeMap::new(),
        }
    }

    /// Builder-style helper that records a relationship.
    pub fn with_relationship(mut self, partner_id: impl Into<PartnerId>, active: bool) -> Self {
        let relationship = if active {
            Relationship::active()
        } else {
            Relationship::inactive()
        };
        self.relationships.insert(partner_id.into(), relationship);
        self
    }

    /// A subject belongs in the membership structure iff at least one of its
    /// relationships is active.
    pub fn is_cache_eligible(&self) -> bool {
        self.relationships.values().any(|r| r.active)
    }

    /// Partner ids of all active relationships, in key order.
    pub fn active_partner_ids(&self) -> Vec<PartnerId> {
        self.relationships
            .iter()
            .filter(|(_, r)| r.active)
            .map(|(partner, _)| partner.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_without_relationships_is_not_eligible() {
        assert!(!Subject::new("RSSMRA85T10A562S").is_cache_eligible());
    }

    #[test]
    fn test_subject_eligibility_requires_one_active() {
        let inactive = Subject::new("A").with_relationship("tpp-1", false);
        assert!(!inactive.is_cache_eligible());

        let mixed = inactive.with_relationship("tpp-2", true);
        assert!(mixed.is_cache_eligible());
        assert_eq!(mixed.active_partner_ids(), vec!["tpp-2".to_string()]);
    }

    #[test]
    fn test_deserialize_document_store_shape() {
        let json = serde_json::json!({
            "id": "RSSMRA85T10A562S",
            "consents": {
                "tpp-1": { "tppState": true, "lastUpdateDate": "2024-01-01T00:00:00Z" },
                "tpp-2": { "tppState": false }
            }
        });
        let subject: Subject = serde_json::from_value(json).unwrap();
        assert_eq!(subject.relationships.len(), 2);
        assert!(subject.relationships["tpp-1"].active);
        assert!(subject.relationships["tpp-1"].updated_at.is_some());
        assert!(subject.relationships["tpp-2"].updated_at.is_none());
    }
}
