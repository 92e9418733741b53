pub mod client;
pub mod error;
pub mod parser;
pub mod types;

pub use client::GoldRushClient;
pub use error::GoldRushError;
pub use parser::BalanceParser;
pub use types::*;
