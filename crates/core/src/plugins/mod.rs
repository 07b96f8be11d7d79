//! Plugin lifecycle: declarative definitions, evaluated descriptors,
//! load ordering, watched resources and change propagation.

pub mod definition;
pub mod descriptor;
pub mod events;
pub mod manager;
pub mod plugin;
pub mod scope;
pub mod watch;

pub use definition::*;
pub use descriptor::*;
pub use events::*;
pub use manager::*;
pub use plugin::*;
pub use scope::*;
pub use watch::*;
