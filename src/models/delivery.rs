use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Delivery order lifecycle: pending -> assigned -> in_transit -> delivered,
/// with cancellation allowed from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Pending,
    Assigned,
    InTransit,
    Delivered,
    Cancelled,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Assigned => "assigned",
            DeliveryStatus::InTransit => "in_transit",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(DeliveryStatus::Pending),
            "assigned" => Some(DeliveryStatus::Assigned),
            "in_transit" => Some(DeliveryStatus::InTransit),
            "delivered" => Some(DeliveryStatus::Delivered),
            "cancelled" => Some(DeliveryStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryStatus::Delivered | DeliveryStatus::Cancelled)
    }

    pub fn can_transition_to(&self, next: DeliveryStatus) -> bool {
        if next == DeliveryStatus::Cancelled {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (DeliveryStatus::Pending, DeliveryStatus::Assigned)
                | (DeliveryStatus::Assigned, DeliveryStatus::InTransit)
                | (DeliveryStatus::InTransit, DeliveryStatus::Delivered)
        )
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DeliveryOrder {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub pickup_address: String,
    pub dropoff_address: String,
    pub courier_name: Option<String>,
    pub status: String,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateDeliveryRequest {
    pub pickup_address: String,
    pub dropoff_address: String,
}

#[derive(Debug, Deserialize)]
pub struct AssignCourierRequest {
    pub courier_name: String,
}

#[derive(Debug, Deserialize)]
pub struct DeliveryStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct DeliveryListQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_is_linear() {
        assert!(DeliveryStatus::Pending.can_transition_to(DeliveryStatus::Assigned));
        assert!(DeliveryStatus::Assigned.can_transition_to(DeliveryStatus::InTransit));
        assert!(DeliveryStatus::InTransit.can_transition_to(DeliveryStatus::Delivered));
        assert!(!DeliveryStatus::Pending.can_transition_to(DeliveryStatus::Delivered));
    }

    #[test]
    fn cancel_allowed_until_terminal() {
        assert!(DeliveryStatus::Pending.can_transition_to(DeliveryStatus::Cancelled));
        assert!(DeliveryStatus::InTransit.can_transition_to(DeliveryStatus::Cancelled));
        assert!(!DeliveryStatus::Delivered.can_transition_to(DeliveryStatus::Cancelled));
        assert!(!DeliveryStatus::Cancelled.can_transition_to(DeliveryStatus::Cancelled));
    }
}
