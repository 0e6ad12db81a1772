//! Reconstructs and keeps in sync a local mirror of a remote device's
//! component tree from a snapshot plus a stream of core events.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::warn;

use crate::component::{Component, ComponentKind, CoreEvent, CoreEventKind, EventBus, EventValue};
use crate::error::{Error, Result};

/// A core event waiting on a parent component that hasn't materialized
/// yet, with the deadline after which it's dropped.
struct BufferedEvent {
    event: CoreEvent,
    deadline: Instant,
}

/// Rebuilds a component tree from a `GetComponentTreeSnapshot` reply and
/// applies subsequent core events to keep it current.
pub struct MirrorEngine {
    root: Mutex<Option<Arc<Component>>>,
    events: Arc<EventBus>,
    buffer: Mutex<VecDeque<BufferedEvent>>,
    buffer_timeout: Duration,
}

impl MirrorEngine {
    #[must_use]
    pub fn new(buffer_timeout: Duration) -> Self {
        Self {
            root: Mutex::new(None),
            events: EventBus::new(),
            buffer: Mutex::new(VecDeque::new()),
            buffer_timeout,
        }
    }

    pub fn set_root(&self, root: Arc<Component>) {
        *self.root.lock() = Some(root);
    }

    #[must_use]
    pub fn root(&self) -> Option<Arc<Component>> {
        self.root.lock().clone()
    }

    /// Apply one event in receipt order. If the event's parent doesn't
    /// exist yet, it is buffered and retried on the next call until
    /// `buffer_timeout` elapses, after which it's dropped with a
    /// warning (a device racing its own events ahead of the snapshot
    /// reply is expected, not an error).
    pub fn apply(&self, event: CoreEvent) {
        self.drain_expired();
        match self.try_apply(&event) {
            Ok(true) => {}
            Ok(false) => {
                self.buffer.lock().push_back(BufferedEvent {
                    event,
                    deadline: Instant::now() + self.buffer_timeout,
                });
            }
            Err(err) => {
                warn!(error = %err, global_id = %event.global_id, "failed to apply mirrored core event, continuing");
            }
        }
        self.retry_buffered();
    }

    fn retry_buffered(&self) {
        let mut still_pending = VecDeque::new();
        let pending: Vec<_> = self.buffer.lock().drain(..).collect();
        for buffered in pending {
            match self.try_apply(&buffered.event) {
                Ok(true) => {}
                Ok(false) => still_pending.push_back(buffered),
                Err(err) => warn!(error = %err, "dropping buffered core event that failed to apply"),
            }
        }
        *self.buffer.lock() = still_pending;
    }

    fn drain_expired(&self) {
        let now = Instant::now();
        let mut buffer = self.buffer.lock();
        let before = buffer.len();
        buffer.retain(|b| b.deadline > now);
        let dropped = before - buffer.len();
        if dropped > 0 {
            warn!(dropped, "dropped buffered core events waiting on a parent that never appeared");
        }
    }

    /// Returns `Ok(true)` if applied, `Ok(false)` if the parent doesn't
    /// exist yet (caller should buffer and retry).
    fn try_apply(&self, event: &CoreEvent) -> Result<bool> {
        let Some(root) = self.root() else { return Ok(false) };
        let Some(component) = find_by_global_id(&root, &event.global_id) else {
            return Ok(false);
        };
        match event.kind {
            // `component` here is the parent the child was added to /
            // removed from, since `Component::publish` stamps events
            // with the originating node's own global id.
            CoreEventKind::ComponentAdded => {
                if let Some(local_id) = child_local_id(event) {
                    let placeholder = Component::new(local_id, ComponentKind::Folder, self.events.clone());
                    if let Err(err) = component.add_component(placeholder) {
                        if !matches!(err, Error::DuplicateItem(_)) {
                            warn!(error = %err, global_id = %event.global_id, "failed to mirror ComponentAdded");
                        }
                    }
                }
            }
            CoreEventKind::ComponentRemoved => {
                if let Some(local_id) = child_local_id(event) {
                    if let Err(err) = component.remove_component(local_id) {
                        if !matches!(err, Error::NotFound(_)) {
                            warn!(error = %err, global_id = %event.global_id, "failed to mirror ComponentRemoved");
                        }
                    }
                }
            }
            _ => {}
        }
        self.events.publish(event);
        Ok(true)
    }
}

/// Pull the child's local id out of a `ComponentAdded`/`ComponentRemoved`
/// event's `Id` parameter, which carries the child's full global id.
fn child_local_id(event: &CoreEvent) -> Option<&str> {
    match event.params.get("Id") {
        Some(EventValue::GlobalId(child_id)) => child_id.rsplit('/').next(),
        _ => None,
    }
}

fn find_by_global_id(root: &Arc<Component>, global_id: &str) -> Option<Arc<Component>> {
    if root.global_id() == global_id {
        return Some(root.clone());
    }
    for child in root.children() {
        if let Some(found) = find_by_global_id(&child, global_id) {
            return Some(found);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> Arc<Component> {
        Component::new("dev", ComponentKind::Folder, EventBus::new())
    }

    fn added_event(parent_global_id: &str, child_global_id: &str) -> CoreEvent {
        let mut event = CoreEvent::new(parent_global_id, CoreEventKind::ComponentAdded);
        event.params.insert("Id".to_string(), EventValue::GlobalId(child_global_id.to_string()));
        event
    }

    fn removed_event(parent_global_id: &str, child_global_id: &str) -> CoreEvent {
        let mut event = CoreEvent::new(parent_global_id, CoreEventKind::ComponentRemoved);
        event.params.insert("Id".to_string(), EventValue::GlobalId(child_global_id.to_string()));
        event
    }

    #[test]
    fn component_added_attaches_a_placeholder_child() {
        let engine = MirrorEngine::new(Duration::from_millis(50));
        let root = root();
        engine.set_root(root.clone());

        engine.apply(added_event(&root.global_id(), &format!("{}/ch", root.global_id())));

        let child = find_by_global_id(&root, &format!("{}/ch", root.global_id()));
        assert!(child.is_some());
        assert!(matches!(*child.unwrap().kind.read(), ComponentKind::Folder));
    }

    #[test]
    fn component_removed_detaches_the_child() {
        let engine = MirrorEngine::new(Duration::from_millis(50));
        let root = root();
        engine.set_root(root.clone());
        engine.apply(added_event(&root.global_id(), &format!("{}/ch", root.global_id())));
        assert!(find_by_global_id(&root, &format!("{}/ch", root.global_id())).is_some());

        engine.apply(removed_event(&root.global_id(), &format!("{}/ch", root.global_id())));
        assert!(find_by_global_id(&root, &format!("{}/ch", root.global_id())).is_none());
    }

    #[test]
    fn event_for_an_unseen_parent_is_buffered_then_dropped_after_timeout() {
        let engine = MirrorEngine::new(Duration::from_millis(10));
        let root = root();
        engine.set_root(root.clone());

        engine.apply(added_event("dev/missing", "dev/missing/ch"));
        assert_eq!(engine.buffer.lock().len(), 1);

        std::thread::sleep(Duration::from_millis(20));
        engine.apply(added_event(&root.global_id(), &format!("{}/other", root.global_id())));
        assert_eq!(engine.buffer.lock().len(), 0);
    }

    #[test]
    fn event_for_a_parent_that_appears_later_applies_on_retry() {
        let engine = MirrorEngine::new(Duration::from_secs(5));
        let root = root();
        engine.set_root(root.clone());
        let folder_id = format!("{}/folder", root.global_id());

        engine.apply(added_event(&folder_id, &format!("{folder_id}/ch")));
        assert_eq!(engine.buffer.lock().len(), 1);

        engine.apply(added_event(&root.global_id(), "dev/folder"));
        assert_eq!(engine.buffer.lock().len(), 0);
        assert!(find_by_global_id(&root, &format!("{folder_id}/ch")).is_some());
    }
}
