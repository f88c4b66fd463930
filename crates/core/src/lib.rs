pub mod calendar;
pub mod config;
pub mod error;
pub mod snapshot;

pub use calendar::*;
pub use config::{load_dotenv, Config, RegistryConfig};
pub use error::*;
pub use snapshot::*;
