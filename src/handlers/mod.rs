pub mod health;
pub mod mpesa_handlers;
