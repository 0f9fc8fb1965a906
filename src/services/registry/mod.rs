//! Registry module
//!
//! This module contains the local registry bookkeeping split into logical components:
//! - `types`: listener and registry traits, shared container aliases
//! - `state`: the registered/subscribed state store with recover and destroy
//! - `embedded`: an in-process registry composed over the state store
//! - `error`: registry error type

pub mod embedded;
pub mod error;
pub mod state;
pub mod types;

// Re-export public types for easier access
pub use embedded::EmbeddedRegistry;
pub use error::RegistryError;
pub use state::RegistryState;
pub use types::{
    Listener, ListenerRef, ListenerSet, NotifyListener, RegisteredSet, Registry, SubscriptionMap,
};
