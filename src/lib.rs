pub mod chain;
pub use chain::*;

pub mod codec;
pub use codec::*;

pub mod crypto;
pub use crypto::*;

pub mod error;
pub use error::*;

mod config;
pub use config::Config;
pub use config::GLOBAL_CONFIG;

pub mod store;
pub use store::*;

pub mod wallet;
pub use wallet::*;
