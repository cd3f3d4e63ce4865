//! Sugbo Trails sync core.
//!
//! Client-side content sync and cache engine: a typed catalog cache with
//! TTL and realtime updates, identity-scoped user collections over a
//! key-value store, auth-driven rescoping, category resets, and the
//! startup orchestration that ties them together. [`AppCore`] is the
//! embedder-facing handle.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod app;
pub mod cache;
pub mod capability;
pub mod collections;
pub mod config;
pub mod error;
pub mod identity;
pub mod orchestrator;
pub mod realtime;
pub mod remote;
pub mod reset;
pub mod store;

pub use app::{AppCore, AppCoreBuilder};
pub use cache::{ContentCache, ContentSubscription};
pub use capability::{CapabilityDecision, DeviceCapabilities};
pub use collections::UserCollections;
pub use config::SyncConfig;
pub use error::{ErrorKind, Result, SyncError};
pub use identity::{AuthProvider, AuthUser, IdentityContext, SignUpProfile};
pub use orchestrator::{EngineState, HealthReport, Orchestrator};
pub use realtime::{ChangeStream, ChannelStatus, RealtimeManager};
pub use remote::{CatalogBackend, ListQuery, Page};
pub use reset::{MigrationReport, ResetCategory, ResetService};
pub use store::{FileStore, KeyValueStore, MemoryStore, ScopedKeys};
