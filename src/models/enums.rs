//! Shared domain enums

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ---------------------------------------------------------------------------
// ReservationStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of a reservation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Pending,
    Ready,
    InUse,
    Cleaning,
    Completed,
    Maintenance,
    NoShow,
    Cancelled,
    Returned,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "PENDING",
            ReservationStatus::Ready => "READY",
            ReservationStatus::InUse => "IN_USE",
            ReservationStatus::Cleaning => "CLEANING",
            ReservationStatus::Completed => "COMPLETED",
            ReservationStatus::Maintenance => "MAINTENANCE",
            ReservationStatus::NoShow => "NO_SHOW",
            ReservationStatus::Cancelled => "CANCELLED",
            ReservationStatus::Returned => "RETURNED",
        }
    }

    /// Statuses whose line items consume stock over their time window
    pub fn holds_stock(&self) -> bool {
        matches!(
            self,
            ReservationStatus::Pending | ReservationStatus::Ready | ReservationStatus::InUse
        )
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parses canonical names plus the legacy labels found in older rows.
///
/// Only labels with an unambiguous meaning are mapped; anything else is rejected
/// rather than guessed.
impl std::str::FromStr for ReservationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "PENDING" | "PENDIENTE" => Ok(ReservationStatus::Pending),
            "READY" | "LISTO" | "LISTO_PARA_ENTREGA" | "READY_FOR_DELIVERY" => Ok(ReservationStatus::Ready),
            "IN_USE" | "EN_USO" | "DELIVERED" | "ENTREGADO" => Ok(ReservationStatus::InUse),
            "CLEANING" | "LIMPIEZA" | "EN_LIMPIEZA" => Ok(ReservationStatus::Cleaning),
            "COMPLETED" | "COMPLETADO" | "FINALIZADO" => Ok(ReservationStatus::Completed),
            "MAINTENANCE" | "MANTENIMIENTO" | "EN_MANTENIMIENTO" => Ok(ReservationStatus::Maintenance),
            "NO_SHOW" | "NO_PRESENTADO" => Ok(ReservationStatus::NoShow),
            "CANCELLED" | "CANCELED" | "CANCELADO" => Ok(ReservationStatus::Cancelled),
            "RETURNED" | "DEVUELTO" => Ok(ReservationStatus::Returned),
            _ => Err(format!("Unknown reservation status: {}", s)),
        }
    }
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Staff and customer roles carried in the access token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Mechanic,
    Seller,
    Admin,
    Owner,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Mechanic => "mechanic",
            Role::Seller => "seller",
            Role::Admin => "admin",
            Role::Owner => "owner",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin | Role::Owner)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Promotions
// ---------------------------------------------------------------------------

/// Which condition a promotion tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PromotionKind {
    /// Some eligible line is booked for at least `threshold` hours
    TimeRule,
    /// Eligible lines add up to at least `threshold` units
    QuantityRule,
}

impl PromotionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromotionKind::TimeRule => "time_rule",
            PromotionKind::QuantityRule => "quantity_rule",
        }
    }
}

impl std::str::FromStr for PromotionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "time_rule" | "time" => Ok(PromotionKind::TimeRule),
            "quantity_rule" | "quantity" => Ok(PromotionKind::QuantityRule),
            _ => Err(format!("Unknown promotion kind: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BenefitKind {
    Percentage,
    Fixed,
}

impl BenefitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BenefitKind::Percentage => "percentage",
            BenefitKind::Fixed => "fixed",
        }
    }
}

impl std::str::FromStr for BenefitKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "percentage" | "percent" => Ok(BenefitKind::Percentage),
            "fixed" | "amount" => Ok(BenefitKind::Fixed),
            _ => Err(format!("Unknown benefit kind: {}", s)),
        }
    }
}

// ---------------------------------------------------------------------------
// Lifecycle inputs
// ---------------------------------------------------------------------------

/// Result of the post-return inspection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TriageOutcome {
    Ok,
    Faulty,
}

/// Why a reservation is being moved (free text at the API, parsed here)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RescheduleReason {
    Weather,
    ForceMajeure,
    SystemError,
    Personal,
    Other(String),
}

impl RescheduleReason {
    /// Reasons for which the customer is not charged a fee
    pub fn is_no_fault(&self) -> bool {
        matches!(
            self,
            RescheduleReason::Weather | RescheduleReason::ForceMajeure | RescheduleReason::SystemError
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            RescheduleReason::Weather => "weather",
            RescheduleReason::ForceMajeure => "force-majeure",
            RescheduleReason::SystemError => "system-error",
            RescheduleReason::Personal => "personal",
            RescheduleReason::Other(s) => s.as_str(),
        }
    }
}

impl From<&str> for RescheduleReason {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "weather" => RescheduleReason::Weather,
            "force-majeure" => RescheduleReason::ForceMajeure,
            "system-error" => RescheduleReason::SystemError,
            "personal" => RescheduleReason::Personal,
            _ => RescheduleReason::Other(s.to_string()),
        }
    }
}

/// Entry types in a reservation's adjustment ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentKind {
    Manual,
    RescheduleFee,
    LatePenalty,
}

impl AdjustmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustmentKind::Manual => "manual",
            AdjustmentKind::RescheduleFee => "reschedule_fee",
            AdjustmentKind::LatePenalty => "late_penalty",
        }
    }
}

impl std::str::FromStr for AdjustmentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(AdjustmentKind::Manual),
            "reschedule_fee" => Ok(AdjustmentKind::RescheduleFee),
            "late_penalty" => Ok(AdjustmentKind::LatePenalty),
            _ => Err(format!("Unknown adjustment kind: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    Cash,
    Transfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::Cash => "cash",
            PaymentMethod::Transfer => "transfer",
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "card" => Ok(PaymentMethod::Card),
            "cash" => Ok(PaymentMethod::Cash),
            "transfer" => Ok(PaymentMethod::Transfer),
            _ => Err(format!("Unknown payment method: {}", s)),
        }
    }
}
