//! Schema type model consumed by the navigator
//!
//! The [`TypeProvider`] trait is the only way the rest of the crate reaches
//! schema data. [`InMemoryTypeProvider`] is the bundled implementation.

pub mod in_memory;
pub mod provider;
pub mod type_info;

pub use in_memory::InMemoryTypeProvider;
pub use provider::{EmptyTypeProvider, ProviderCapabilities, ProviderResult, TypeProvider};
pub use type_info::{BindingStrength, ElementDefinition, ElementMap, TerminologyBinding, TypeInfo};
