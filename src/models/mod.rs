//! Data models for Rentdesk

pub mod enums;
pub mod promotion;
pub mod quote;
pub mod reservation;
pub mod resource;
pub mod site;
pub mod user;

// Re-export commonly used types
pub use enums::{
    AdjustmentKind, BenefitKind, PaymentMethod, PromotionKind, RescheduleReason, ReservationStatus,
    Role, TriageOutcome,
};
pub use promotion::Promotion;
pub use quote::{CartLine, PricedLine, Quote};
pub use reservation::{
    Adjustment, BookReservationRequest, CreateReservationRequest, LineItem, PaymentDetails, Reservation,
    ReservationDetails,
};
pub use resource::Resource;
pub use site::{Site, SiteHours};
pub use user::{RequestContext, UserClaims};
