pub mod contracts;
pub mod delegation_manager;
pub mod deploy;
pub mod events;
pub mod signature;
pub mod strategy;
pub mod withdrawal;
