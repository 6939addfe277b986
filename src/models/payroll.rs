use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Payroll run lifecycle: pending -> approved -> paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayrollStatus {
    Pending,
    Approved,
    Paid,
}

impl PayrollStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayrollStatus::Pending => "pending",
            PayrollStatus::Approved => "approved",
            PayrollStatus::Paid => "paid",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PayrollStatus::Pending),
            "approved" => Some(PayrollStatus::Approved),
            "paid" => Some(PayrollStatus::Paid),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: PayrollStatus) -> bool {
        matches!(
            (self, next),
            (PayrollStatus::Pending, PayrollStatus::Approved)
                | (PayrollStatus::Approved, PayrollStatus::Paid)
        )
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PayrollRun {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub gross_cents: i64,
    pub status: String,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePayrollRunRequest {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub gross_cents: i64,
}

impl CreatePayrollRunRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.period_end < self.period_start {
            return Err("pay period end precedes start".to_string());
        }
        if self.gross_cents < 0 {
            return Err("gross amount cannot be negative".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approval_precedes_payment() {
        assert!(PayrollStatus::Pending.can_transition_to(PayrollStatus::Approved));
        assert!(PayrollStatus::Approved.can_transition_to(PayrollStatus::Paid));
        assert!(!PayrollStatus::Pending.can_transition_to(PayrollStatus::Paid));
        assert!(!PayrollStatus::Paid.can_transition_to(PayrollStatus::Pending));
    }

    #[test]
    fn inverted_period_is_rejected() {
        let req = CreatePayrollRunRequest {
            period_start: NaiveDate::from_ymd_opt(2026, 2, 15).unwrap(),
            period_end: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
            gross_cents: 100_000,
        };
        assert!(req.validate().is_err());
    }
}
