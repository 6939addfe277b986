use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Onboarding lead stages: new -> contacted -> qualified -> converted | lost.
/// A lead can be marked lost from any pre-terminal stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadStage {
    New,
    Contacted,
    Qualified,
    Converted,
    Lost,
}

impl LeadStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStage::New => "new",
            LeadStage::Contacted => "contacted",
            LeadStage::Qualified => "qualified",
            LeadStage::Converted => "converted",
            LeadStage::Lost => "lost",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(LeadStage::New),
            "contacted" => Some(LeadStage::Contacted),
            "qualified" => Some(LeadStage::Qualified),
            "converted" => Some(LeadStage::Converted),
            "lost" => Some(LeadStage::Lost),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LeadStage::Converted | LeadStage::Lost)
    }

    pub fn can_transition_to(&self, next: LeadStage) -> bool {
        if next == LeadStage::Lost {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (LeadStage::New, LeadStage::Contacted)
                | (LeadStage::Contacted, LeadStage::Qualified)
                | (LeadStage::Qualified, LeadStage::Converted)
        )
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Lead {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub contact_name: String,
    pub contact_email: String,
    pub company: Option<String>,
    pub stage: String,
    pub converted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateLeadRequest {
    pub contact_name: String,
    pub contact_email: String,
    pub company: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LeadStageRequest {
    pub stage: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_advance_in_order() {
        assert!(LeadStage::New.can_transition_to(LeadStage::Contacted));
        assert!(LeadStage::Contacted.can_transition_to(LeadStage::Qualified));
        assert!(LeadStage::Qualified.can_transition_to(LeadStage::Converted));
        assert!(!LeadStage::New.can_transition_to(LeadStage::Converted));
    }

    #[test]
    fn lost_from_any_open_stage_only() {
        assert!(LeadStage::New.can_transition_to(LeadStage::Lost));
        assert!(LeadStage::Qualified.can_transition_to(LeadStage::Lost));
        assert!(!LeadStage::Converted.can_transition_to(LeadStage::Lost));
    }
}
