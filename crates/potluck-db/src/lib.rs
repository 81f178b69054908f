//! PostgreSQL persistence for potluck: schema migrations, row models, and
//! query functions used by the coordination engine.

pub mod config;
pub mod models;
pub mod pool;
pub mod queries;
