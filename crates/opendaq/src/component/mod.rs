//! The typed, polymorphic component tree every device, channel, function
//! block and signal inhabits.

pub mod events;
pub mod specialized;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

pub use events::{CoreEvent, CoreEventKind, CoreEventSubscription, EventBus, EventValue};
pub use specialized::{ChannelExt, DeviceExt, FunctionBlockExt};

use crate::error::{Error, Result};
use crate::property::{PropertyDescriptor, PropertyObject, PropertyValue};
use crate::signal::{InputPortExt, OverflowPolicy, PortNotification, SignalExt};

/// What kind of node this is, and the data specific to that kind.
///
/// A single concrete [`Component`] type models every node in the tree;
/// `ComponentKind` carries the per-kind payload rather than using a
/// trait-object hierarchy.
pub enum ComponentKind {
    Folder,
    Device(DeviceExt),
    FunctionBlock(FunctionBlockExt),
    Channel(ChannelExt),
    Signal(SignalExt),
    InputPort(InputPortExt),
}

impl ComponentKind {
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            ComponentKind::Folder => "Folder",
            ComponentKind::Device(_) => "Device",
            ComponentKind::FunctionBlock(_) => "FunctionBlock",
            ComponentKind::Channel(_) => "Channel",
            ComponentKind::Signal(_) => "Signal",
            ComponentKind::InputPort(_) => "InputPort",
        }
    }
}

/// A node in the device tree.
pub struct Component {
    local_id: String,
    parent: RwLock<Option<Weak<Component>>>,
    active: AtomicBool,
    visible: AtomicBool,
    removed: AtomicBool,
    tags: RwLock<HashSet<String>>,
    status: RwLock<std::collections::HashMap<String, String>>,
    properties: PropertyObject,
    children: RwLock<Vec<Arc<Component>>>,
    pub kind: RwLock<ComponentKind>,
    events: Arc<EventBus>,
}

/// Shared handle to a [`Component`].
pub type ComponentRef = Arc<Component>;

impl Component {
    /// Construct a new, un-parented component. Callers attach it to a
    /// parent via [`Component::add_component`], which fires
    /// `ComponentAdded`.
    #[must_use]
    pub fn new(local_id: impl Into<String>, kind: ComponentKind, events: Arc<EventBus>) -> ComponentRef {
        Arc::new(Component {
            local_id: local_id.into(),
            parent: RwLock::new(None),
            active: AtomicBool::new(true),
            visible: AtomicBool::new(true),
            removed: AtomicBool::new(false),
            tags: RwLock::new(HashSet::new()),
            status: RwLock::new(std::collections::HashMap::new()),
            properties: PropertyObject::new(),
            children: RwLock::new(Vec::new()),
            kind: RwLock::new(kind),
            events,
        })
    }

    #[must_use]
    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    /// `globalId = parent.globalId + "/" + localId`; the root has no
    /// parent and its global id is `/localId`.
    #[must_use]
    pub fn global_id(&self) -> String {
        match self.parent.read().as_ref().and_then(Weak::upgrade) {
            Some(parent) => format!("{}/{}", parent.global_id(), self.local_id),
            None => format!("/{}", self.local_id),
        }
    }

    #[must_use]
    pub fn parent(&self) -> Option<ComponentRef> {
        self.parent.read().as_ref().and_then(Weak::upgrade)
    }

    #[must_use]
    pub fn active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn set_active(&self, active: bool) -> Result<()> {
        self.check_alive()?;
        self.active.store(active, Ordering::Release);
        self.publish_attribute_changed("Active", EventValue::Bool(active));
        Ok(())
    }

    #[must_use]
    pub fn visible(&self) -> bool {
        self.visible.load(Ordering::Acquire)
    }

    pub fn set_visible(&self, visible: bool) -> Result<()> {
        self.check_alive()?;
        self.visible.store(visible, Ordering::Release);
        self.publish_attribute_changed("Visible", EventValue::Bool(visible));
        Ok(())
    }

    #[must_use]
    pub fn removed(&self) -> bool {
        self.removed.load(Ordering::Acquire)
    }

    pub fn check_alive(&self) -> Result<()> {
        if self.removed() {
            Err(Error::ComponentRemoved(self.global_id()))
        } else {
            Ok(())
        }
    }

    pub fn add_tag(&self, tag: impl Into<String>) -> Result<()> {
        self.check_alive()?;
        let tag = tag.into();
        self.tags.write().insert(tag.clone());
        self.publish_attribute_changed("Tags", EventValue::String(tag));
        Ok(())
    }

    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.read().contains(tag)
    }

    /// Set a named status enumeration value.
    pub fn set_status(&self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        self.check_alive()?;
        let name = name.into();
        let value = value.into();
        self.status.write().insert(name.clone(), value.clone());
        self.publish(
            CoreEventKind::StatusChanged,
            [("StatusName".to_string(), EventValue::String(name)),
             ("StatusValue".to_string(), EventValue::String(value))],
        );
        Ok(())
    }

    #[must_use]
    pub fn status(&self, name: &str) -> Option<String> {
        self.status.read().get(name).cloned()
    }

    #[must_use]
    pub fn properties(&self) -> &PropertyObject {
        &self.properties
    }

    pub fn add_property(&self, descriptor: PropertyDescriptor) -> Result<()> {
        self.check_alive()?;
        let name = descriptor.name.clone();
        self.properties.add_property(descriptor)?;
        self.publish(CoreEventKind::PropertyAdded, [("Name".to_string(), EventValue::String(name))]);
        Ok(())
    }

    pub fn remove_property(&self, name: &str) -> Result<()> {
        self.check_alive()?;
        self.properties.remove_property(name)?;
        self.publish(CoreEventKind::PropertyRemoved, [("Name".to_string(), EventValue::String(name.to_string()))]);
        Ok(())
    }

    pub fn set_property_value(&self, name: &str, value: PropertyValue) -> Result<()> {
        self.check_alive()?;
        self.properties.set_property_value(name, value.clone())?;
        self.publish(
            CoreEventKind::PropertyValueChanged,
            [("Name".to_string(), EventValue::String(name.to_string()))],
        );
        Ok(())
    }

    pub fn set_property_value_protected(&self, name: &str, value: PropertyValue) -> Result<()> {
        self.check_alive()?;
        self.properties.set_property_value_protected(name, value)?;
        self.publish(
            CoreEventKind::PropertyValueChanged,
            [("Name".to_string(), EventValue::String(name.to_string()))],
        );
        Ok(())
    }

    pub fn get_property_value(&self, name: &str) -> Result<PropertyValue> {
        self.check_alive()?;
        self.properties.get_property_value(name)
    }

    /// Close a batched update bracket, firing one
    /// `PropertyObjectUpdateEnd` event for the whole batch instead of one
    /// `PropertyValueChanged` per property.
    pub fn end_update(&self) -> Result<()> {
        self.check_alive()?;
        let changed = self.properties.end_update();
        if !changed.is_empty() {
            self.publish(CoreEventKind::PropertyObjectUpdateEnd, []);
        }
        Ok(())
    }

    pub fn begin_update(&self) {
        self.properties.begin_update();
    }

    /// List direct children in add order.
    #[must_use]
    pub fn children(&self) -> Vec<ComponentRef> {
        self.children.read().clone()
    }

    /// Find a direct child by local id.
    #[must_use]
    pub fn child(&self, local_id: &str) -> Option<ComponentRef> {
        self.children.read().iter().find(|c| c.local_id == local_id).cloned()
    }

    /// Attach `child` under `self`, rejecting a local-id collision among
    /// siblings with [`Error::DuplicateItem`].
    pub fn add_component(self: &Arc<Self>, child: ComponentRef) -> Result<()> {
        self.check_alive()?;
        {
            let mut children = self.children.write();
            if children.iter().any(|c| c.local_id == child.local_id) {
                return Err(Error::DuplicateItem(child.local_id.clone()));
            }
            *child.parent.write() = Some(Arc::downgrade(self));
            children.push(child.clone());
        }
        self.publish(
            CoreEventKind::ComponentAdded,
            [("Id".to_string(), EventValue::GlobalId(child.global_id()))],
        );
        Ok(())
    }

    /// Remove the child `local_id`, recursively marking its subtree
    /// `removed`. Idempotent: removing twice is a no-op for the
    /// already-removed subtree but fails [`Error::NotFound`] if the
    /// child never existed.
    pub fn remove_component(self: &Arc<Self>, local_id: &str) -> Result<()> {
        self.check_alive()?;
        let child = {
            let mut children = self.children.write();
            let idx = children
                .iter()
                .position(|c| c.local_id == local_id)
                .ok_or_else(|| Error::NotFound(local_id.to_string()))?;
            children.remove(idx)
        };
        let global_id = child.global_id();
        child.mark_removed_recursive();
        self.publish(CoreEventKind::ComponentRemoved, [("Id".to_string(), EventValue::GlobalId(global_id))]);
        Ok(())
    }

    fn mark_removed_recursive(&self) {
        self.removed.store(true, Ordering::Release);
        if let ComponentKind::Signal(sig) = &*self.kind.read() {
            sig.disconnect_all();
        }
        for child in self.children.read().iter() {
            child.mark_removed_recursive();
        }
    }

    /// Subscribe to core events from this component and its descendants.
    #[must_use]
    pub fn on_core_event(&self) -> CoreEventSubscription {
        CoreEventSubscription::new(self.events.clone(), self.global_id())
    }

    /// Connect this input port to `signal`, checking the port's
    /// acceptance predicate, allocating the bounded `Connection`, and
    /// wiring the port's notify callback so a dropped packet surfaces
    /// as a `PacketOverflow` core event instead of vanishing silently.
    /// Fires `SignalConnected` on success.
    pub fn connect_signal(self: &Arc<Self>, signal: &Arc<Component>, capacity: usize, overflow: OverflowPolicy) -> Result<()> {
        self.check_alive()?;
        signal.check_alive()?;

        let descriptor = match &*signal.kind.read() {
            ComponentKind::Signal(sig) => sig.descriptor(),
            _ => return Err(Error::InvalidParameter(format!("`{}` is not a signal", signal.global_id()))),
        };

        let connection = {
            let kind = self.kind.read();
            let port = match &*kind {
                ComponentKind::InputPort(port) => port,
                _ => return Err(Error::InvalidParameter(format!("`{}` is not an input port", self.global_id()))),
            };
            if let Some(descriptor) = &descriptor {
                if !port.accepts(descriptor) {
                    return Err(Error::SignalNotAccepted(signal.global_id()));
                }
            }
            let connection = port.connect(capacity, overflow);
            port.set_source_signal_global_id(Some(signal.global_id()));

            let events = self.events.clone();
            let port_global_id = self.global_id();
            port.set_notify_callback(Some(Arc::new(move |notification| {
                let PortNotification::PacketOverflow { packets_dropped } = notification;
                events.publish(
                    &CoreEvent::new(port_global_id.clone(), CoreEventKind::PacketOverflow)
                        .with_param("PacketsDropped", packets_dropped as i64),
                );
            })));
            connection
        };

        match &*signal.kind.read() {
            ComponentKind::Signal(sig) => sig.add_connection(connection),
            _ => unreachable!("checked above"),
        }

        self.publish(
            CoreEventKind::SignalConnected,
            [("Id".to_string(), EventValue::GlobalId(signal.global_id()))],
        );
        Ok(())
    }

    /// Tear down this input port's connection, if any, clearing the
    /// recorded source signal global id. Fires `SignalDisconnected`.
    pub fn disconnect_input_port(self: &Arc<Self>) -> Result<()> {
        self.check_alive()?;
        let source = match &*self.kind.read() {
            ComponentKind::InputPort(port) => {
                let source = port.source_signal_global_id();
                port.disconnect();
                source
            }
            _ => return Err(Error::InvalidParameter(format!("`{}` is not an input port", self.global_id()))),
        };
        if let Some(source) = source {
            self.publish(CoreEventKind::SignalDisconnected, [("Id".to_string(), EventValue::GlobalId(source))]);
        }
        Ok(())
    }

    /// Emit a `ConnectionStatusChanged` event naming the connection
    /// string involved and, for a streaming status, which streaming
    /// object it concerns.
    pub fn publish_connection_status_changed(
        &self,
        status_name: &str,
        connection_string: &str,
        streaming_object: Option<&str>,
        value: &str,
    ) {
        self.publish(
            CoreEventKind::ConnectionStatusChanged,
            [
                ("StatusName".to_string(), EventValue::String(status_name.to_string())),
                ("ConnectionString".to_string(), EventValue::String(connection_string.to_string())),
                (
                    "StreamingObject".to_string(),
                    streaming_object.map_or(EventValue::Null, |s| EventValue::String(s.to_string())),
                ),
                ("StatusValue".to_string(), EventValue::String(value.to_string())),
            ],
        );
    }

    fn publish(&self, kind: CoreEventKind, params: impl IntoIterator<Item = (String, EventValue)>) {
        let mut event = CoreEvent::new(self.global_id(), kind);
        event.params.extend(params);
        self.events.publish(&event);
    }

    fn publish_attribute_changed(&self, name: &str, value: EventValue) {
        self.publish(
            CoreEventKind::AttributeChanged,
            [
                ("Name".to_string(), EventValue::String(name.to_string())),
                ("Value".to_string(), value),
            ],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn folder(local_id: &str, events: Arc<EventBus>) -> ComponentRef {
        Component::new(local_id, ComponentKind::Folder, events)
    }

    #[test]
    fn global_id_reflects_tree_position() {
        let events = EventBus::new();
        let root = folder("root", events.clone());
        let child = folder("dev", events.clone());
        root.add_component(child.clone()).unwrap();
        assert_eq!(root.global_id(), "/root");
        assert_eq!(child.global_id(), "/root/dev");
    }

    #[test]
    fn add_component_rejects_sibling_collision() {
        let events = EventBus::new();
        let root = folder("root", events.clone());
        root.add_component(folder("a", events.clone())).unwrap();
        let err = root.add_component(folder("a", events)).unwrap_err();
        assert!(matches!(err, Error::DuplicateItem(id) if id == "a"));
    }

    #[test]
    fn remove_component_marks_subtree_removed_and_blocks_further_ops() {
        let events = EventBus::new();
        let root = folder("root", events.clone());
        let child = folder("dev", events.clone());
        let grandchild = folder("ch", events.clone());
        child.add_component(grandchild.clone()).unwrap();
        root.add_component(child.clone()).unwrap();

        root.remove_component("dev").unwrap();
        assert!(child.removed());
        assert!(grandchild.removed());
        assert!(matches!(grandchild.check_alive(), Err(Error::ComponentRemoved(_))));
    }

    #[test]
    fn remove_component_missing_child_is_not_found() {
        let events = EventBus::new();
        let root = folder("root", events);
        let err = root.remove_component("nope").unwrap_err();
        assert!(matches!(err, Error::NotFound(id) if id == "nope"));
    }

    #[test]
    fn core_events_bubble_to_ancestor_subscriptions() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let events = EventBus::new();
        let root = folder("root", events.clone());
        let child = folder("dev", events.clone());

        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        root.on_core_event().subscribe(move |event| {
            if event.kind == CoreEventKind::ComponentAdded {
                seen_clone.fetch_add(1, Ordering::SeqCst);
            }
        });

        root.add_component(child.clone()).unwrap();
        // A grandchild add should still reach root's subscription.
        child.add_component(folder("leaf", events)).unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
