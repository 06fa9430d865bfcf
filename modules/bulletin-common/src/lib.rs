pub mod config;
pub mod error;
pub mod parishes;
pub mod site;
pub mod types;

pub use config::Config;
pub use error::BulletinError;
pub use types::*;
