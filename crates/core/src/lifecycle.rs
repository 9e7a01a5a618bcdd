//! Lifecycle event kinds.

use serde::{Deserialize, Serialize};

/// Named points in an object's load/persist/remove flow and in a flush cycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LifecycleEvent {
    PreLoad,
    PostLoad,
    PrePersist,
    PostPersist,
    PreUpdate,
    PostUpdate,
    PreRemove,
    PostRemove,
    PreFlush,
    OnFlush,
    PostFlush,
    OnClear,
}

impl LifecycleEvent {
    pub const ALL: [LifecycleEvent; 12] = [
        LifecycleEvent::PreLoad,
        LifecycleEvent::PostLoad,
        LifecycleEvent::PrePersist,
        LifecycleEvent::PostPersist,
        LifecycleEvent::PreUpdate,
        LifecycleEvent::PostUpdate,
        LifecycleEvent::PreRemove,
        LifecycleEvent::PostRemove,
        LifecycleEvent::PreFlush,
        LifecycleEvent::OnFlush,
        LifecycleEvent::PostFlush,
        LifecycleEvent::OnClear,
    ];

    /// Stable event name (e.g. "preUpdate").
    pub fn name(self) -> &'static str {
        match self {
            LifecycleEvent::PreLoad => "preLoad",
            LifecycleEvent::PostLoad => "postLoad",
            LifecycleEvent::PrePersist => "prePersist",
            LifecycleEvent::PostPersist => "postPersist",
            LifecycleEvent::PreUpdate => "preUpdate",
            LifecycleEvent::PostUpdate => "postUpdate",
            LifecycleEvent::PreRemove => "preRemove",
            LifecycleEvent::PostRemove => "postRemove",
            LifecycleEvent::PreFlush => "preFlush",
            LifecycleEvent::OnFlush => "onFlush",
            LifecycleEvent::PostFlush => "postFlush",
            LifecycleEvent::OnClear => "onClear",
        }
    }

    /// Whether listeners receive a subject object for this event.
    ///
    /// `PreFlush` still reaches per-object callbacks, but its listener
    /// dispatch is manager-wide.
    pub fn has_subject(self) -> bool {
        !matches!(
            self,
            LifecycleEvent::PreFlush
                | LifecycleEvent::OnFlush
                | LifecycleEvent::PostFlush
                | LifecycleEvent::OnClear
        )
    }
}

impl core::fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}
