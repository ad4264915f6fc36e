//! Promotion rule model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::enums::{BenefitKind, PromotionKind};

/// Automatic or coupon-gated discount rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Promotion {
    pub id: i32,
    pub name: String,
    pub kind: PromotionKind,
    /// Applied without a coupon when the condition holds
    pub automatic: bool,
    /// Required when `automatic` is false
    pub coupon_code: Option<String>,
    /// Scope to one resource; takes precedence over `category_id`
    pub resource_id: Option<i32>,
    pub category_id: Option<i32>,
    /// min_hours for time rules, min_quantity for quantity rules
    pub threshold: i32,
    pub benefit: BenefitKind,
    #[schema(value_type = String)]
    pub value: Decimal,
    pub active: bool,
}

/// Promotion row from database
#[derive(Debug, Clone, FromRow)]
pub struct PromotionRow {
    pub id: i32,
    pub name: String,
    pub kind: String,
    pub automatic: bool,
    pub coupon_code: Option<String>,
    pub resource_id: Option<i32>,
    pub category_id: Option<i32>,
    pub threshold: i32,
    pub benefit: String,
    pub value: Decimal,
    pub active: bool,
}

impl TryFrom<PromotionRow> for Promotion {
    type Error = String;

    fn try_from(row: PromotionRow) -> Result<Self, Self::Error> {
        Ok(Promotion {
            id: row.id,
            name: row.name,
            kind: row.kind.parse()?,
            automatic: row.automatic,
            coupon_code: row.coupon_code,
            resource_id: row.resource_id,
            category_id: row.category_id,
            threshold: row.threshold,
            benefit: row.benefit.parse()?,
            value: row.value,
            active: row.active,
        })
    }
}
