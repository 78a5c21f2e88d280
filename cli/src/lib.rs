pub mod config;
pub mod error;
pub mod events;
pub mod operator;
pub mod staker;
pub mod utils;
pub mod withdrawal;
