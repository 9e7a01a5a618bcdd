//! Event-args handed to process-wide listeners.

use objmap_core::{ChangeSet, ClassMetadataRegistry, LifecycleEvent, ObjectHandle, Payload, RawData};

/// Arguments of one dispatched event.
///
/// Carries the subject object (absent for flush/clear events), the metadata
/// registry acting as the manager handle, and the shared mutable payload.
#[derive(Debug)]
pub struct EventArgs<'a> {
    event: LifecycleEvent,
    object: Option<&'a ObjectHandle>,
    metadata: &'a ClassMetadataRegistry,
    payload: Payload<'a>,
    cleared_class: Option<&'a str>,
}

impl<'a> EventArgs<'a> {
    /// Args for an object-bearing event without payload.
    pub fn lifecycle(
        event: LifecycleEvent,
        object: &'a ObjectHandle,
        metadata: &'a ClassMetadataRegistry,
    ) -> Self {
        Self::with_payload(event, object, metadata, Payload::None)
    }

    /// Args for an object-bearing event whose payload listeners may edit.
    pub fn with_payload(
        event: LifecycleEvent,
        object: &'a ObjectHandle,
        metadata: &'a ClassMetadataRegistry,
        payload: Payload<'a>,
    ) -> Self {
        Self {
            event,
            object: Some(object),
            metadata,
            payload,
            cleared_class: None,
        }
    }

    /// Args for a manager-wide event (flush phases).
    pub fn manager(event: LifecycleEvent, metadata: &'a ClassMetadataRegistry) -> Self {
        Self {
            event,
            object: None,
            metadata,
            payload: Payload::None,
            cleared_class: None,
        }
    }

    /// Args for `OnClear`; `class_name` is `None` when everything is cleared.
    pub fn on_clear(metadata: &'a ClassMetadataRegistry, class_name: Option<&'a str>) -> Self {
        Self {
            cleared_class: class_name,
            ..Self::manager(LifecycleEvent::OnClear, metadata)
        }
    }

    pub fn event(&self) -> LifecycleEvent {
        self.event
    }

    pub fn object(&self) -> Option<&ObjectHandle> {
        self.object
    }

    pub fn metadata(&self) -> &ClassMetadataRegistry {
        self.metadata
    }

    pub fn payload(&self) -> &Payload<'a> {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut Payload<'a> {
        &mut self.payload
    }

    pub fn change_set(&self) -> Option<&ChangeSet> {
        self.payload.change_set()
    }

    pub fn change_set_mut(&mut self) -> Option<&mut ChangeSet> {
        self.payload.change_set_mut()
    }

    pub fn raw_data(&self) -> Option<&RawData> {
        self.payload.raw_data()
    }

    pub fn raw_data_mut(&mut self) -> Option<&mut RawData> {
        self.payload.raw_data_mut()
    }

    /// Class cleared by an `OnClear` (`None` means all classes).
    pub fn cleared_class(&self) -> Option<&str> {
        self.cleared_class
    }

    pub fn clears_all(&self) -> bool {
        self.event == LifecycleEvent::OnClear && self.cleared_class.is_none()
    }
}
