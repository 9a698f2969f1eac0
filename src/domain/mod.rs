//! Pure business rules shared by the services. Nothing in here touches the database.

pub mod availability;
pub mod invoice;
pub mod order_rules;
pub mod pricing;
pub mod slug;
pub mod validation;
