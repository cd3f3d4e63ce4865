//! Device capability provider.
//!
//! Capability-gated settings (notifications, location) must ask the
//! platform before they flip on. The platform prompt is external; the core
//! only consumes the decision.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;

use crate::error::Result;

/// Outcome of a platform permission prompt or query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityDecision {
    pub granted: bool,
}

impl CapabilityDecision {
    pub const GRANTED: Self = Self { granted: true };
    pub const DENIED: Self = Self { granted: false };
}

/// Platform capabilities the sync core depends on.
///
/// Request methods resolve after the platform prompt; query methods never
/// prompt.
#[async_trait]
pub trait DeviceCapabilities: Send + Sync {
    /// Prompt for notification permission.
    async fn request_notification_permission(&self) -> CapabilityDecision;

    /// Query notification permission without prompting.
    async fn notification_permission(&self) -> CapabilityDecision;

    /// Schedule a local notification.
    async fn schedule_notification(&self, title: &str, body: &str) -> Result<()>;

    /// Cancel all scheduled notifications.
    async fn cancel_scheduled_notifications(&self) -> Result<()>;

    /// Current app badge count.
    async fn badge_count(&self) -> Result<u32>;

    /// Set the app badge count.
    async fn set_badge_count(&self, count: u32) -> Result<()>;

    /// Prompt for location permission.
    async fn request_location_permission(&self) -> CapabilityDecision;

    /// Query location permission without prompting.
    async fn location_permission(&self) -> CapabilityDecision;
}

/// A provider that grants every request. Headless/test wiring.
#[derive(Debug, Default)]
pub struct GrantAllCapabilities {
    badge: AtomicU32,
}

#[async_trait]
impl DeviceCapabilities for GrantAllCapabilities {
    async fn request_notification_permission(&self) -> CapabilityDecision {
        CapabilityDecision::GRANTED
    }

    async fn notification_permission(&self) -> CapabilityDecision {
        CapabilityDecision::GRANTED
    }

    async fn schedule_notification(&self, _title: &str, _body: &str) -> Result<()> {
        Ok(())
    }

    async fn cancel_scheduled_notifications(&self) -> Result<()> {
        Ok(())
    }

    async fn badge_count(&self) -> Result<u32> {
        Ok(self.badge.load(Ordering::SeqCst))
    }

    async fn set_badge_count(&self, count: u32) -> Result<()> {
        self.badge.store(count, Ordering::SeqCst);
        Ok(())
    }

    async fn request_location_permission(&self) -> CapabilityDecision {
        CapabilityDecision::GRANTED
    }

    async fn location_permission(&self) -> CapabilityDecision {
        CapabilityDecision::GRANTED
    }
}

/// A provider that denies every request. Exercises the refusal paths.
#[derive(Debug, Default)]
pub struct DenyAllCapabilities;

#[async_trait]
impl DeviceCapabilities for DenyAllCapabilities {
    async fn request_notification_permission(&self) -> CapabilityDecision {
        CapabilityDecision::DENIED
    }

    async fn notification_permission(&self) -> CapabilityDecision {
        CapabilityDecision::DENIED
    }

    async fn schedule_notification(&self, _title: &str, _body: &str) -> Result<()> {
        Ok(())
    }

    async fn cancel_scheduled_notifications(&self) -> Result<()> {
        Ok(())
    }

    async fn badge_count(&self) -> Result<u32> {
        Ok(0)
    }

    async fn set_badge_count(&self, _count: u32) -> Result<()> {
        Ok(())
    }

    async fn request_location_permission(&self) -> CapabilityDecision {
        CapabilityDecision::DENIED
    }

    async fn location_permission(&self) -> CapabilityDecision {
        CapabilityDecision::DENIED
    }
}
