//! Lifecycle event dispatcher.
//!
//! Every object-bearing event is dispatched in two stages:
//!
//! 1. the subject's class callbacks (from its metadata callback table), run
//!    with the object write-locked and the payload borrowed mutably;
//! 2. the process-wide listeners, in registration order, receiving the same
//!    payload.
//!
//! A stage with nothing registered is skipped. When no listener exists for an
//! event, the event-args value is never built.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

use objmap_core::{
    ChangeSet, ClassMetadataRegistry, LifecycleEvent, MapperResult, ObjectHandle, Payload, RawData,
};

use crate::args::EventArgs;
use crate::listener::EventManager;

#[derive(Debug)]
pub struct EventDispatcher {
    metadata: Arc<ClassMetadataRegistry>,
    events: Arc<EventManager>,
    args_constructed: AtomicU64,
}

impl EventDispatcher {
    pub fn new(metadata: Arc<ClassMetadataRegistry>, events: Arc<EventManager>) -> Self {
        Self {
            metadata,
            events,
            args_constructed: AtomicU64::new(0),
        }
    }

    pub fn metadata(&self) -> &Arc<ClassMetadataRegistry> {
        &self.metadata
    }

    pub fn event_manager(&self) -> &Arc<EventManager> {
        &self.events
    }

    /// How many event-args values have been built so far.
    pub fn args_constructed(&self) -> u64 {
        self.args_constructed.load(Ordering::Relaxed)
    }

    /// Deliver an event to listeners, building its args only if one exists.
    pub fn dispatch_event<'a>(
        &'a self,
        event: LifecycleEvent,
        build: impl FnOnce(&'a ClassMetadataRegistry) -> EventArgs<'a>,
    ) -> MapperResult<()> {
        if !self.events.has_listeners(event)? {
            trace!(event = event.name(), "no listeners");
            return Ok(());
        }

        self.args_constructed.fetch_add(1, Ordering::Relaxed);
        let mut args = build(self.metadata.as_ref());
        self.events.dispatch(&mut args)
    }

    /// Run the subject class's callbacks for `event`, if it has any.
    pub fn dispatch_object_lifecycle_callback(
        &self,
        event: LifecycleEvent,
        object: &ObjectHandle,
        payload: &mut Payload<'_>,
    ) -> MapperResult<()> {
        let class_name = object.class_name()?;
        let metadata = self.metadata.get(&class_name)?;
        if !metadata.has_lifecycle_callbacks(event) {
            return Ok(());
        }

        trace!(event = event.name(), class = %class_name, "invoking lifecycle callbacks");
        let mut guard = object.write()?;
        metadata.invoke_lifecycle_callbacks(event, &mut *guard, payload)
    }

    pub fn dispatch_objects_lifecycle_callbacks(
        &self,
        event: LifecycleEvent,
        objects: &[ObjectHandle],
    ) -> MapperResult<()> {
        for object in objects {
            self.dispatch_object_lifecycle_callback(event, object, &mut Payload::None)?;
        }
        Ok(())
    }

    /// Callbacks, then listeners, for an object event without payload.
    pub fn dispatch_lifecycle_event(
        &self,
        event: LifecycleEvent,
        object: &ObjectHandle,
    ) -> MapperResult<()> {
        self.dispatch_object_lifecycle_callback(event, object, &mut Payload::None)?;
        self.dispatch_event(event, |metadata| {
            EventArgs::lifecycle(event, object, metadata)
        })
    }

    pub fn dispatch_pre_flush(&self) -> MapperResult<()> {
        self.dispatch_event(LifecycleEvent::PreFlush, |metadata| {
            EventArgs::manager(LifecycleEvent::PreFlush, metadata)
        })
    }

    pub fn dispatch_pre_flush_lifecycle_callbacks(
        &self,
        objects: &[ObjectHandle],
    ) -> MapperResult<()> {
        self.dispatch_objects_lifecycle_callbacks(LifecycleEvent::PreFlush, objects)
    }

    pub fn dispatch_on_flush(&self) -> MapperResult<()> {
        self.dispatch_event(LifecycleEvent::OnFlush, |metadata| {
            EventArgs::manager(LifecycleEvent::OnFlush, metadata)
        })
    }

    pub fn dispatch_post_flush(&self) -> MapperResult<()> {
        self.dispatch_event(LifecycleEvent::PostFlush, |metadata| {
            EventArgs::manager(LifecycleEvent::PostFlush, metadata)
        })
    }

    pub fn dispatch_on_clear(&self, class_name: Option<&str>) -> MapperResult<()> {
        self.dispatch_event(LifecycleEvent::OnClear, |metadata| {
            EventArgs::on_clear(metadata, class_name)
        })
    }

    /// `PreLoad`: callbacks may rewrite the raw data before listeners see it
    /// and before it is hydrated.
    pub fn dispatch_pre_load(&self, object: &ObjectHandle, data: &mut RawData) -> MapperResult<()> {
        self.dispatch_object_lifecycle_callback(
            LifecycleEvent::PreLoad,
            object,
            &mut Payload::RawData(&mut *data),
        )?;
        self.dispatch_event(LifecycleEvent::PreLoad, |metadata| {
            EventArgs::with_payload(LifecycleEvent::PreLoad, object, metadata, Payload::RawData(data))
        })
    }

    pub fn dispatch_post_load(&self, object: &ObjectHandle) -> MapperResult<()> {
        self.dispatch_lifecycle_event(LifecycleEvent::PostLoad, object)
    }

    pub fn dispatch_pre_persist(&self, object: &ObjectHandle) -> MapperResult<()> {
        self.dispatch_lifecycle_event(LifecycleEvent::PrePersist, object)
    }

    pub fn dispatch_post_persist(&self, object: &ObjectHandle) -> MapperResult<()> {
        self.dispatch_lifecycle_event(LifecycleEvent::PostPersist, object)
    }

    /// `PreUpdate`: callbacks may edit the change set; listeners observe the
    /// edited version.
    pub fn dispatch_pre_update(
        &self,
        object: &ObjectHandle,
        change_set: &mut ChangeSet,
    ) -> MapperResult<()> {
        self.dispatch_object_lifecycle_callback(
            LifecycleEvent::PreUpdate,
            object,
            &mut Payload::ChangeSet(&mut *change_set),
        )?;
        self.dispatch_event(LifecycleEvent::PreUpdate, |metadata| {
            EventArgs::with_payload(
                LifecycleEvent::PreUpdate,
                object,
                metadata,
                Payload::ChangeSet(change_set),
            )
        })
    }

    pub fn dispatch_post_update(&self, object: &ObjectHandle) -> MapperResult<()> {
        self.dispatch_lifecycle_event(LifecycleEvent::PostUpdate, object)
    }

    pub fn dispatch_pre_remove(&self, object: &ObjectHandle) -> MapperResult<()> {
        self.dispatch_lifecycle_event(LifecycleEvent::PreRemove, object)
    }

    pub fn dispatch_post_remove(&self, object: &ObjectHandle) -> MapperResult<()> {
        self.dispatch_lifecycle_event(LifecycleEvent::PostRemove, object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use objmap_core::{ClassMetadata, MapperError, MappedObject, Value, raw_data};
    use serde_json::json;

    #[derive(Debug, Default)]
    struct Article {
        id: i64,
        title: String,
        loads: u32,
    }

    impl MappedObject for Article {
        fn class_name(&self) -> &str {
            "Article"
        }

        fn get_field(&self, field: &str) -> Option<Value> {
            match field {
                "id" => Some(json!(self.id)),
                "title" => Some(json!(self.title)),
                _ => None,
            }
        }

        fn set_field(&mut self, field: &str, value: Value) -> MapperResult<()> {
            match field {
                "id" => self.id = value.as_i64().unwrap_or_default(),
                "title" => self.title = value.as_str().unwrap_or_default().to_string(),
                _ => return Err(MapperError::hydration(field)),
            }
            Ok(())
        }
    }

    fn setup(metadata: ClassMetadata) -> EventDispatcher {
        let registry = Arc::new(ClassMetadataRegistry::new());
        registry.register(metadata).unwrap();
        EventDispatcher::new(registry, Arc::new(EventManager::new()))
    }

    fn article_metadata() -> objmap_core::ClassMetadataBuilder {
        ClassMetadata::builder("Article")
            .fields(["id", "title"])
            .identifier(["id"])
    }

    #[test]
    fn pre_update_listener_sees_change_set_edited_by_callback() {
        let dispatcher = setup(
            article_metadata()
                .on::<Article, _>(LifecycleEvent::PreUpdate, |_, payload| {
                    let cs = payload.change_set_mut().expect("change set payload");
                    cs.set_new_value("title", json!("edited by callback"));
                    cs.add_change("slug", Value::Null, json!("injected"));
                    Ok(())
                })
                .build()
                .unwrap(),
        );

        let observed = Arc::new(Mutex::new(None));
        let observed_clone = observed.clone();
        dispatcher
            .event_manager()
            .listen(LifecycleEvent::PreUpdate, move |args| {
                *observed_clone.lock().unwrap() = args.change_set().cloned();
                Ok(())
            })
            .unwrap();

        let object = ObjectHandle::new(Article::default());
        let mut cs = ChangeSet::new();
        cs.add_change("title", json!("a"), json!("b"));
        dispatcher.dispatch_pre_update(&object, &mut cs).unwrap();

        let seen = observed.lock().unwrap().clone().unwrap();
        assert_eq!(seen, cs);
        assert_eq!(seen.get("title").unwrap().new_value, json!("edited by callback"));
        assert!(seen.contains("slug"));
    }

    #[test]
    fn listener_edits_are_visible_to_the_caller() {
        let dispatcher = setup(article_metadata().build().unwrap());
        dispatcher
            .event_manager()
            .listen(LifecycleEvent::PreUpdate, |args| {
                if let Some(cs) = args.change_set_mut() {
                    cs.remove("title");
                }
                Ok(())
            })
            .unwrap();

        let object = ObjectHandle::new(Article::default());
        let mut cs = ChangeSet::new();
        cs.add_change("title", json!("a"), json!("b"));
        dispatcher.dispatch_pre_update(&object, &mut cs).unwrap();
        assert!(cs.is_empty());
    }

    #[test]
    fn no_callback_and_no_listener_builds_no_args() {
        let dispatcher = setup(article_metadata().build().unwrap());
        let object = ObjectHandle::new(Article::default());

        for event in LifecycleEvent::ALL {
            if event.has_subject() {
                dispatcher.dispatch_lifecycle_event(event, &object).unwrap();
            }
        }
        let mut cs = ChangeSet::new();
        dispatcher.dispatch_pre_update(&object, &mut cs).unwrap();
        let mut data = raw_data([("id", json!(1))]);
        dispatcher.dispatch_pre_load(&object, &mut data).unwrap();
        dispatcher.dispatch_pre_flush().unwrap();
        dispatcher.dispatch_on_flush().unwrap();
        dispatcher.dispatch_post_flush().unwrap();
        dispatcher.dispatch_on_clear(None).unwrap();

        assert_eq!(dispatcher.args_constructed(), 0);
    }

    #[test]
    fn callback_only_still_builds_no_args() {
        let dispatcher = setup(
            article_metadata()
                .on::<Article, _>(LifecycleEvent::PostLoad, |a, _| {
                    a.loads += 1;
                    Ok(())
                })
                .build()
                .unwrap(),
        );
        let object = ObjectHandle::new(Article::default());
        dispatcher.dispatch_post_load(&object).unwrap();

        assert_eq!(object.with(|a: &Article| a.loads).unwrap(), 1);
        assert_eq!(dispatcher.args_constructed(), 0);
    }

    #[test]
    fn pre_load_callback_injects_raw_fields_before_listeners() {
        let dispatcher = setup(
            article_metadata()
                .on::<Article, _>(LifecycleEvent::PreLoad, |_, payload| {
                    if let Some(data) = payload.raw_data_mut() {
                        data.insert("title".into(), json!("from callback"));
                    }
                    Ok(())
                })
                .build()
                .unwrap(),
        );

        let observed = Arc::new(Mutex::new(None));
        let observed_clone = observed.clone();
        dispatcher
            .event_manager()
            .listen(LifecycleEvent::PreLoad, move |args| {
                *observed_clone.lock().unwrap() = args.raw_data().and_then(|d| d.get("title").cloned());
                Ok(())
            })
            .unwrap();

        let object = ObjectHandle::new(Article::default());
        let mut data = raw_data([("id", json!(1)), ("title", json!("from row"))]);
        dispatcher.dispatch_pre_load(&object, &mut data).unwrap();

        assert_eq!(*observed.lock().unwrap(), Some(json!("from callback")));
        assert_eq!(data["title"], json!("from callback"));
        assert_eq!(dispatcher.args_constructed(), 1);
    }

    #[test]
    fn callback_runs_before_listener() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let cb_log = log.clone();
        let dispatcher = setup(
            article_metadata()
                .on::<Article, _>(LifecycleEvent::PrePersist, move |_, _| {
                    cb_log.lock().unwrap().push("callback");
                    Ok(())
                })
                .build()
                .unwrap(),
        );
        let listener_log = log.clone();
        dispatcher
            .event_manager()
            .listen(LifecycleEvent::PrePersist, move |args| {
                assert!(args.object().is_some());
                listener_log.lock().unwrap().push("listener");
                Ok(())
            })
            .unwrap();

        let object = ObjectHandle::new(Article::default());
        dispatcher.dispatch_pre_persist(&object).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["callback", "listener"]);
    }

    #[test]
    fn callback_error_propagates_and_skips_listeners() {
        let dispatcher = setup(
            article_metadata()
                .on::<Article, _>(LifecycleEvent::PreRemove, |_, _| {
                    Err(anyhow::anyhow!("removal vetoed"))
                })
                .build()
                .unwrap(),
        );
        let reached = Arc::new(Mutex::new(false));
        let reached_clone = reached.clone();
        dispatcher
            .event_manager()
            .listen(LifecycleEvent::PreRemove, move |_| {
                *reached_clone.lock().unwrap() = true;
                Ok(())
            })
            .unwrap();

        let object = ObjectHandle::new(Article::default());
        let err = dispatcher.dispatch_pre_remove(&object).unwrap_err();
        assert!(matches!(err, MapperError::Callback(_)));
        assert_eq!(err.to_string(), "removal vetoed");
        assert!(!*reached.lock().unwrap());
    }

    #[test]
    fn on_clear_carries_the_cleared_class() {
        let dispatcher = setup(article_metadata().build().unwrap());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        dispatcher
            .event_manager()
            .listen(LifecycleEvent::OnClear, move |args| {
                assert!(args.object().is_none());
                seen_clone
                    .lock()
                    .unwrap()
                    .push(args.cleared_class().map(str::to_string));
                Ok(())
            })
            .unwrap();

        dispatcher.dispatch_on_clear(Some("Article")).unwrap();
        dispatcher.dispatch_on_clear(None).unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![Some("Article".to_string()), None]
        );
    }

    #[test]
    fn unregistered_class_is_an_error() {
        let dispatcher = EventDispatcher::new(
            Arc::new(ClassMetadataRegistry::new()),
            Arc::new(EventManager::new()),
        );
        let object = ObjectHandle::new(Article::default());
        let err = dispatcher.dispatch_post_load(&object).unwrap_err();
        assert!(matches!(err, MapperError::UnknownClass(_)));
    }
}
