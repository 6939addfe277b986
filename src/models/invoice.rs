use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Invoice lifecycle: draft -> open -> paid | void. Finalizing a draft
/// assigns the per-tenant sequential invoice number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceStatus {
    Draft,
    Open,
    Paid,
    Void,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Open => "open",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Void => "void",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(InvoiceStatus::Draft),
            "open" => Some(InvoiceStatus::Open),
            "paid" => Some(InvoiceStatus::Paid),
            "void" => Some(InvoiceStatus::Void),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: InvoiceStatus) -> bool {
        matches!(
            (self, next),
            (InvoiceStatus::Draft, InvoiceStatus::Open)
                | (InvoiceStatus::Open, InvoiceStatus::Paid)
                | (InvoiceStatus::Draft, InvoiceStatus::Void)
                | (InvoiceStatus::Open, InvoiceStatus::Void)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

impl LineItem {
    /// None when the product overflows i64; callers reject such items.
    pub fn total_cents(&self) -> Option<i64> {
        self.quantity.checked_mul(self.unit_price_cents)
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Invoice {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub customer_name: String,
    /// Line items as JSONB; totals are denormalized into amount_cents
    pub line_items: sqlx::types::Json<Vec<LineItem>>,
    pub amount_cents: i64,
    pub currency: String,
    pub status: String,
    /// Assigned when the draft is finalized, sequential per tenant
    pub invoice_number: Option<i64>,
    pub issued_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateInvoiceRequest {
    pub customer_name: String,
    pub line_items: Vec<LineItem>,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "USD".to_string()
}

#[derive(Debug, Deserialize)]
pub struct InvoiceListQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_finalizes_to_open() {
        assert!(InvoiceStatus::Draft.can_transition_to(InvoiceStatus::Open));
        assert!(!InvoiceStatus::Draft.can_transition_to(InvoiceStatus::Paid));
    }

    #[test]
    fn paid_and_void_are_terminal() {
        for next in [
            InvoiceStatus::Draft,
            InvoiceStatus::Open,
            InvoiceStatus::Paid,
            InvoiceStatus::Void,
        ] {
            assert!(!InvoiceStatus::Paid.can_transition_to(next));
            assert!(!InvoiceStatus::Void.can_transition_to(next));
        }
    }

    #[test]
    fn open_can_be_voided_or_paid() {
        assert!(InvoiceStatus::Open.can_transition_to(InvoiceStatus::Paid));
        assert!(InvoiceStatus::Open.can_transition_to(InvoiceStatus::Void));
    }

    #[test]
    fn line_item_totals() {
        let item = LineItem {
            description: "consulting".to_string(),
            quantity: 3,
            unit_price_cents: 12500,
        };
        assert_eq!(item.total_cents(), Some(37500));
    }

    #[test]
    fn overflowing_line_item_has_no_total() {
        let item = LineItem {
            description: "absurd".to_string(),
            quantity: i64::MAX,
            unit_price_cents: 2,
        };
        assert_eq!(item.total_cents(), None);
    }
}
