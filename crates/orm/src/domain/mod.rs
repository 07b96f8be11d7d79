//! Domain classes and relationship inference
//!
//! Types are registered as [`TypeDefinition`]s, flattened through their
//! hierarchy, extracted into property descriptors and resolved into
//! [`DomainClass`]es by the [`DomainRegistry`].

pub mod domain_class;
pub mod extractor;
pub mod hierarchy;
pub mod hints;
pub mod property;
pub mod registry;
pub mod resolver;

pub use domain_class::*;
pub use extractor::*;
pub use hierarchy::*;
pub use hints::*;
pub use property::*;
pub use registry::*;
pub use resolver::*;
