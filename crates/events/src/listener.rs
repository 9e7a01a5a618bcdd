//! Process-wide listener registry.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use objmap_core::{LifecycleEvent, MapperError, MapperResult};

use crate::args::EventArgs;

/// Receives lifecycle events it subscribed to.
pub trait EventListener: Send + Sync {
    fn handle(&self, args: &mut EventArgs<'_>) -> anyhow::Result<()>;
}

impl<F> EventListener for F
where
    F: Fn(&mut EventArgs<'_>) -> anyhow::Result<()> + Send + Sync,
{
    fn handle(&self, args: &mut EventArgs<'_>) -> anyhow::Result<()> {
        self(args)
    }
}

/// Listener registry, fanning each event out in registration order.
#[derive(Default)]
pub struct EventManager {
    listeners: RwLock<HashMap<LifecycleEvent, Vec<Arc<dyn EventListener>>>>,
}

impl EventManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe one listener to several events.
    pub fn add_listener<I>(&self, events: I, listener: Arc<dyn EventListener>) -> MapperResult<()>
    where
        I: IntoIterator<Item = LifecycleEvent>,
    {
        let mut map = self
            .listeners
            .write()
            .map_err(|_| MapperError::poisoned("event manager"))?;
        for event in events {
            map.entry(event).or_default().push(listener.clone());
        }
        Ok(())
    }

    /// Subscribe a closure to a single event.
    pub fn listen<F>(&self, event: LifecycleEvent, listener: F) -> MapperResult<()>
    where
        F: Fn(&mut EventArgs<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.add_listener([event], Arc::new(listener))
    }

    /// Drop every listener of `event`.
    pub fn remove_listeners(&self, event: LifecycleEvent) -> MapperResult<()> {
        let mut map = self
            .listeners
            .write()
            .map_err(|_| MapperError::poisoned("event manager"))?;
        map.remove(&event);
        Ok(())
    }

    pub fn has_listeners(&self, event: LifecycleEvent) -> MapperResult<bool> {
        Ok(self.listener_count(event)? > 0)
    }

    pub fn listener_count(&self, event: LifecycleEvent) -> MapperResult<usize> {
        let map = self
            .listeners
            .read()
            .map_err(|_| MapperError::poisoned("event manager"))?;
        Ok(map.get(&event).map_or(0, Vec::len))
    }

    /// Deliver `args` to every listener of its event.
    ///
    /// The registry lock is released before listeners run, so a listener may
    /// subscribe further listeners; those see the next dispatch, not this one.
    pub fn dispatch(&self, args: &mut EventArgs<'_>) -> MapperResult<()> {
        let listeners = {
            let map = self
                .listeners
                .read()
                .map_err(|_| MapperError::poisoned("event manager"))?;
            match map.get(&args.event()) {
                Some(listeners) => listeners.clone(),
                None => return Ok(()),
            }
        };

        for listener in listeners {
            listener.handle(args)?;
        }
        Ok(())
    }
}

impl core::fmt::Debug for EventManager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let counts: Vec<(&'static str, usize)> = match self.listeners.read() {
            Ok(map) => {
                let mut counts: Vec<_> = map.iter().map(|(e, l)| (e.name(), l.len())).collect();
                counts.sort_unstable();
                counts
            }
            Err(_) => Vec::new(),
        };
        f.debug_struct("EventManager")
            .field("listeners", &counts)
            .finish()
    }
}
