//! Raw query functions, one module per table family.

pub mod meals;
pub mod participants;
pub mod plan_items;
pub mod posts;
pub mod relationships;
