pub mod app_config;
pub mod environment;
pub mod sources;
pub mod validation;

pub use app_config::*;
pub use environment::*;
pub use sources::*;
pub use validation::*;
