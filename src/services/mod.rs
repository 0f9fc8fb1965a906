pub mod registry;

pub use registry::{EmbeddedRegistry, NotifyListener, Registry, RegistryError, RegistryState};
