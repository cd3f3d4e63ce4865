//! Core types for Sugbo Trails.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod catalog;
pub mod email;
pub mod event;
pub mod id;
pub mod identity;
pub mod language;
pub mod settings;
pub mod user;

pub use catalog::{
    CatalogEntry, Coordinates, Delicacy, Destination, DietaryFlag, EntityKind,
};
pub use email::{Email, EmailError};
pub use event::{ChangeEvent, ChangeKind};
pub use id::*;
pub use identity::{GUEST_SCOPE, Identity};
pub use language::{LanguageError, LanguageTag};
pub use settings::{SettingKey, Settings, SettingsError};
pub use user::{EmailHistoryEntry, Favorite, FavoriteSnapshot, Review, SupportRequest};
