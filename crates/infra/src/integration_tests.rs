//! Integration tests for the full mapping pipeline.
//!
//! Tests: DataSource → Repository → IdentityMap → ChangeSetEngine → UnitOfWork
//!
//! Verifies:
//! - A loaded object diffs cleanly against its snapshot after every persist
//! - Callbacks and listeners see one shared payload across a flush
//! - Concurrent loaders never produce two instances of one identity

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier, Mutex};
    use std::thread;

    use serde_json::json;

    use objmap_core::{LifecycleEvent, ObjectHandle, Payload, raw_data};

    use crate::data_source::{DataSource, InMemoryDataSource};
    use crate::manager::ObjectManager;
    use crate::testing::{Fixture, Tag, User, tag_metadata, tag_row, user_metadata, user_row};

    #[test]
    fn load_mutate_diff_persist_resnapshot() {
        objmap_observability::init();
        let fx = Fixture::new();
        fx.seed_users([raw_data([("id", json!(1)), ("name", json!("a"))])]);

        let user = fx.users_repository().find(1).unwrap().unwrap();
        assert_eq!(user.with(|u: &User| u.name.clone()).unwrap(), "a");

        user.with_mut(|u: &mut User| u.name = "b".into()).unwrap();
        let engine = fx.engine();
        let snapshot = fx.identity_map.get_snapshot(&user).unwrap();
        let change_set = engine.compute(&user, &snapshot).unwrap();

        // email is missing from the row and null on the object: unchanged
        let name = change_set.get("name").unwrap();
        assert_eq!((&name.old_value, &name.new_value), (&json!("a"), &json!("b")));
        assert_eq!(change_set.len(), 1);

        let payload = engine.prepare_update_change_set(&user, &change_set).unwrap();
        fx.users.update(&raw_data([("id", json!(1))]), &payload).unwrap();
        fx.identity_map
            .update_snapshot(&user, raw_data([("id", json!(1)), ("name", json!("b"))]))
            .unwrap();

        let snapshot = fx.identity_map.get_snapshot(&user).unwrap();
        assert!(engine.compute(&user, &snapshot).unwrap().is_empty());
    }

    #[test]
    fn flush_resnapshots_so_the_next_flush_is_empty() {
        let fx = Fixture::new();
        fx.seed_users([user_row(1, "a")]);
        let user = fx.users_repository().find(1).unwrap().unwrap();
        let uow = fx.unit_of_work();

        user.with_mut(|u: &mut User| u.name = "b".into()).unwrap();
        assert_eq!(uow.flush().unwrap().updated, 1);

        let snapshot = fx.identity_map.get_snapshot(&user).unwrap();
        assert_eq!(snapshot, user_row(1, "b"));
        assert!(fx.engine().compute(&user, &snapshot).unwrap().is_empty());
        assert!(uow.flush().unwrap().is_empty());
    }

    #[test]
    fn callback_then_listener_share_the_change_set_during_flush() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let callback_order = order.clone();
        let fx = Fixture::with_user_metadata(user_metadata().on::<User, _>(
            LifecycleEvent::PreUpdate,
            move |_, payload: &mut Payload<'_>| {
                callback_order.lock().unwrap().push("callback");
                if let Some(change_set) = payload.change_set_mut() {
                    change_set.set_new_value("name", json!("from-callback"));
                }
                Ok(())
            },
        ));
        fx.seed_users([user_row(1, "a")]);

        let listener_order = order.clone();
        fx.events
            .listen(LifecycleEvent::PreUpdate, move |args| {
                let seen = args
                    .change_set()
                    .and_then(|cs| cs.get("name"))
                    .map(|c| c.new_value.clone());
                assert_eq!(seen, Some(json!("from-callback")));
                listener_order.lock().unwrap().push("listener");
                if let Some(change_set) = args.change_set_mut() {
                    change_set.set_new_value("name", json!("from-listener"));
                }
                Ok(())
            })
            .unwrap();

        let user = fx.users_repository().find(1).unwrap().unwrap();
        user.with_mut(|u: &mut User| u.name = "b".into()).unwrap();
        fx.unit_of_work().flush().unwrap();

        assert_eq!(*order.lock().unwrap(), vec!["callback", "listener"]);
        assert_eq!(
            fx.users.find(&json!(1)).unwrap().unwrap()["name"],
            json!("from-listener")
        );
    }

    #[test]
    fn quiet_pipeline_builds_no_event_args() {
        let fx = Fixture::new();
        fx.seed_users([user_row(1, "a"), user_row(2, "b")]);
        let repo = fx.users_repository();
        let uow = fx.unit_of_work();

        let user = repo.find(1).unwrap().unwrap();
        repo.find_all().unwrap();
        user.with_mut(|u: &mut User| u.name = "c".into()).unwrap();
        uow.persist(&ObjectHandle::new(User::new(3, "d"))).unwrap();
        uow.flush().unwrap();
        fx.identity_map.clear(None).unwrap();

        assert_eq!(fx.dispatcher.args_constructed(), 0);
    }

    #[test]
    fn failing_listener_error_reaches_the_caller_unmodified() {
        #[derive(Debug, thiserror::Error)]
        #[error("quota exceeded for {0}")]
        struct QuotaExceeded(i64);

        let fx = Fixture::new();
        fx.events
            .listen(LifecycleEvent::PrePersist, |args| {
                let id = args
                    .object()
                    .and_then(|o| o.with(|u: &User| u.id).ok())
                    .unwrap_or_default();
                Err(QuotaExceeded(id).into())
            })
            .unwrap();

        let uow = fx.unit_of_work();
        uow.persist(&ObjectHandle::new(User::new(4, "d"))).unwrap();
        let err = uow.flush().unwrap_err();

        let quota = err
            .as_callback()
            .and_then(|e| e.downcast_ref::<QuotaExceeded>())
            .unwrap();
        assert_eq!(quota.0, 4);
        assert!(fx.users.is_empty().unwrap());
    }

    #[test]
    fn concurrent_loads_resolve_to_one_instance() {
        let fx = Fixture::new();
        fx.seed_users((1..=4).map(|id| user_row(id, "x")));
        let repo = Arc::new(fx.users_repository());

        let post_loads = Arc::new(Mutex::new(0usize));
        let counter = post_loads.clone();
        fx.events
            .listen(LifecycleEvent::PostLoad, move |_| {
                *counter.lock().unwrap() += 1;
                Ok(())
            })
            .unwrap();

        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let repo = repo.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    repo.find_all().unwrap()
                })
            })
            .collect();
        let results: Vec<Vec<ObjectHandle>> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();

        for result in &results[1..] {
            for (a, b) in result.iter().zip(&results[0]) {
                assert!(a.ptr_eq(b));
            }
        }
        assert_eq!(fx.identity_map.len().unwrap(), 4);
        assert_eq!(*post_loads.lock().unwrap(), 4);
    }

    #[test]
    fn manager_end_to_end() {
        let manager = ObjectManager::default();
        let user_meta = user_metadata().build().unwrap();
        let users = Arc::new(InMemoryDataSource::new(&user_meta));
        manager.register_class::<User>(user_meta, users.clone()).unwrap();
        let tag_meta = tag_metadata().build().unwrap();
        let tags = Arc::new(InMemoryDataSource::new(&tag_meta).with_rows([tag_row("orm")]).unwrap());
        manager.register_class::<Tag>(tag_meta, tags).unwrap();

        let alice = ObjectHandle::new(User::new(1, "alice"));
        manager.persist(&alice).unwrap();
        manager.flush().unwrap();

        let tag = manager.find("Tag", "orm").unwrap().unwrap();
        assert!(manager.contains(&tag).unwrap());
        assert!(manager.find("User", 1).unwrap().unwrap().ptr_eq(&alice));

        alice.with_mut(|u: &mut User| u.email = Some("alice@example.test".into())).unwrap();
        manager.flush().unwrap();
        assert_eq!(
            users.find(&json!(1)).unwrap().unwrap()["email"],
            json!("alice@example.test")
        );

        manager.clear(None).unwrap();
        let reloaded = manager.find("User", 1).unwrap().unwrap();
        assert!(!reloaded.ptr_eq(&alice));
        assert_eq!(
            reloaded.with(|u: &User| u.email.clone()).unwrap().as_deref(),
            Some("alice@example.test")
        );
    }
}
