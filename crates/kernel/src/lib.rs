//! Kernel of the Stacks service: settings, the `Module` contract and the registry
//! that drives module lifecycles.

pub mod module;
pub mod registry;
pub mod settings;

pub use module::{InitCtx, Migration, Module};
pub use registry::ModuleRegistry;
