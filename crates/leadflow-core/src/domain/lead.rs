//! Lead records and the artifacts produced for them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{BusinessProfileId, LeadId, TaskId, UserId};

/// Social media handles known for a lead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialMedia {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instagram: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facebook: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
}

impl SocialMedia {
    pub fn is_empty(&self) -> bool {
        self.linkedin.is_none()
            && self.instagram.is_none()
            && self.facebook.is_none()
            && self.twitter.is_none()
    }

    /// Fill empty handles from `other`, keeping the ones already known.
    pub fn merge_missing(&mut self, other: &SocialMedia) {
        fn fill(slot: &mut Option<String>, value: &Option<String>) {
            if slot.is_none() {
                slot.clone_from(value);
            }
        }
        fill(&mut self.linkedin, &other.linkedin);
        fill(&mut self.instagram, &other.instagram);
        fill(&mut self.facebook, &other.facebook);
        fill(&mut self.twitter, &other.twitter);
    }
}

/// Company partner listed in a business registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partner {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Registry lookup fields (e.g. a CNPJ query), used as content when no
/// website can be scraped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtraData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cnpj: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legal_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_activity: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secondary_activities: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub founded_on: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_capital: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_status: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub partners: Vec<Partner>,
}

/// Workflow status strings written by the pipeline.
pub mod workflow {
    pub const EMAIL_DRAFTED: &str = "email_drafted";
}

/// The unit being enriched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub user_id: UserId,
    pub company_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_role: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub websites: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub emails: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub phones: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(default)]
    pub social_media: SocialMedia,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_data: Option<ExtraData>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_status: Option<String>,
}

impl Lead {
    pub fn new(id: impl Into<LeadId>, user_id: impl Into<UserId>, company_name: &str) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            company_name: company_name.to_string(),
            contact_name: None,
            contact_role: None,
            websites: Vec::new(),
            emails: Vec::new(),
            phones: Vec::new(),
            address: None,
            city: None,
            state: None,
            category: None,
            social_media: SocialMedia::default(),
            extra_data: None,
            workflow_status: None,
        }
    }

    pub fn with_website(mut self, url: &str) -> Self {
        self.websites.push(url.to_string());
        self
    }

    pub fn with_email(mut self, email: &str) -> Self {
        self.emails.push(email.to_string());
        self
    }

    pub fn with_extra_data(mut self, extra: ExtraData) -> Self {
        self.extra_data = Some(extra);
        self
    }

    /// First non-blank website, if any.
    pub fn primary_website(&self) -> Option<&str> {
        self.websites
            .iter()
            .map(|w| w.trim())
            .find(|w| !w.is_empty())
    }

    /// First known email address, used as the draft recipient.
    pub fn primary_email(&self) -> Option<&str> {
        self.emails.iter().map(|e| e.trim()).find(|e| !e.is_empty())
    }

    /// Apply extracted fields: lists are extended without duplicates, scalar
    /// fields only fill gaps.
    pub fn apply_extracted(&mut self, fields: &ExtractedFields) {
        fn extend_unique(target: &mut Vec<String>, values: &[String]) {
            for value in values {
                let value = value.trim();
                if !value.is_empty() && !target.iter().any(|v| v.eq_ignore_ascii_case(value)) {
                    target.push(value.to_string());
                }
            }
        }
        extend_unique(&mut self.emails, &fields.emails);
        extend_unique(&mut self.phones, &fields.phones);
        if self.contact_name.is_none() {
            self.contact_name.clone_from(&fields.contact_name);
        }
        if self.contact_role.is_none() {
            self.contact_role.clone_from(&fields.contact_role);
        }
        if self.address.is_none() {
            self.address.clone_from(&fields.address);
        }
        self.social_media.merge_missing(&fields.social_media);
    }
}

/// Structured fields the extraction stage pulls out of scraped content.
///
/// Only emails, phones, contact, address and social fields ever reach the
/// lead record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFields {
    #[serde(default)]
    pub emails: Vec<String>,
    #[serde(default)]
    pub phones: Vec<String>,
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub contact_role: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub social_media: SocialMedia,
}

impl ExtractedFields {
    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
            && self.phones.is_empty()
            && self.contact_name.is_none()
            && self.contact_role.is_none()
            && self.address.is_none()
            && self.social_media.is_empty()
    }
}

/// Pre-call briefing stored for a lead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Briefing {
    pub lead_id: LeadId,
    pub user_id: UserId,
    pub task_id: TaskId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Drafted cold email stored for a lead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailDraft {
    pub lead_id: LeadId,
    pub user_id: UserId,
    pub task_id: TaskId,
    pub subject: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_profile_id: Option<BusinessProfileId>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_website_skips_blank_entries() {
        let lead = Lead::new("l1", "u1", "Acme")
            .with_website("  ")
            .with_website("https://acme.com.br");
        assert_eq!(lead.primary_website(), Some("https://acme.com.br"));
    }

    #[test]
    fn apply_extracted_fills_gaps_without_overwriting() {
        let mut lead = Lead::new("l1", "u1", "Acme").with_email("contato@acme.com.br");
        lead.contact_name = Some("Maria".to_string());

        let fields = ExtractedFields {
            emails: vec!["CONTATO@acme.com.br".into(), "vendas@acme.com.br".into()],
            phones: vec!["+55 11 4000-0000".into()],
            contact_name: Some("João".into()),
            contact_role: Some("CEO".into()),
            address: Some("Av. Paulista, 1000".into()),
            social_media: SocialMedia {
                linkedin: Some("acme".into()),
                ..SocialMedia::default()
            },
        };
        lead.apply_extracted(&fields);

        assert_eq!(lead.emails, vec!["contato@acme.com.br", "vendas@acme.com.br"]);
        assert_eq!(lead.phones, vec!["+55 11 4000-0000"]);
        assert_eq!(lead.contact_name.as_deref(), Some("Maria"));
        assert_eq!(lead.contact_role.as_deref(), Some("CEO"));
        assert_eq!(lead.social_media.linkedin.as_deref(), Some("acme"));
    }

    #[test]
    fn empty_extraction_is_detected() {
        assert!(ExtractedFields::default().is_empty());
    }
}
