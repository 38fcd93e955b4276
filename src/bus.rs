//! In-process publish/subscribe hub keyed by topic name.
//!
//! Everything here is single-threaded: handlers run synchronously inside `publish`, in the
//! order they subscribed, and each finishes before the next starts. A handler may publish
//! again (re-entrantly) or drop subscriptions; no borrow is held while handlers run.

use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    rc::{Rc, Weak},
};

type Handler<M> = Rc<dyn Fn(&M) -> anyhow::Result<()>>;

/// The broadcast stream behind one topic. Also usable on its own as a change stream.
pub struct Channel<M> {
    name: String,
    next_id: Cell<u64>,
    handlers: RefCell<Vec<(u64, Handler<M>)>>,
    completed: Cell<bool>,
}

impl<M: 'static> Channel<M> {
    pub fn new(name: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            next_id: Cell::new(0),
            handlers: RefCell::new(Vec::new()),
            completed: Cell::new(false),
        })
    }

    /// Attach `handler`. Dropping the returned handle detaches exactly this handler.
    /// Subscribing to a completed channel yields an inert handle.
    pub fn subscribe<F>(self: &Rc<Self>, handler: F) -> Subscription
    where
        F: Fn(&M) -> anyhow::Result<()> + 'static,
    {
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        if self.completed.get() {
            tracing::debug!(channel = %self.name, "subscribe on completed channel ignored");
            return Subscription::inert();
        }

        self.handlers.borrow_mut().push((id, Rc::new(handler)));
        let registry: Weak<dyn Registry> = Rc::downgrade(self) as Weak<Self>;
        Subscription {
            registry: Some(registry),
            id,
        }
    }

    /// Deliver `message` to every handler registered when the call starts.
    /// Returns how many handlers ran. A failing handler is reported and does not stop the rest.
    pub fn emit(&self, message: &M) -> usize {
        let snapshot: Vec<(u64, Handler<M>)> = self
            .handlers
            .borrow()
            .iter()
            .map(|(id, h)| (*id, Rc::clone(h)))
            .collect();

        let mut delivered = 0;
        for (id, handler) in snapshot {
            // An earlier handler may have unsubscribed this one.
            if !self.contains(id) {
                continue;
            }
            delivered += 1;
            if let Err(err) = handler(message) {
                tracing::error!(channel = %self.name, subscriber = id, "subscriber failed: {err:#}");
            }
        }
        delivered
    }

    /// Drop every handler and refuse new ones.
    pub fn complete(&self) {
        self.completed.set(true);
        self.handlers.borrow_mut().clear();
    }

    pub fn is_completed(&self) -> bool {
        self.completed.get()
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers.borrow().len()
    }

    fn contains(&self, id: u64) -> bool {
        self.handlers.borrow().iter().any(|(h, _)| *h == id)
    }
}

trait Registry {
    fn unregister(&self, id: u64);
}

impl<M> Registry for Channel<M> {
    fn unregister(&self, id: u64) {
        self.handlers.borrow_mut().retain(|(h, _)| *h != id);
    }
}

/// Handle for one registered handler.
#[must_use = "dropping a Subscription unsubscribes its handler"]
pub struct Subscription {
    registry: Option<Weak<dyn Registry>>,
    id: u64,
}

impl Subscription {
    fn inert() -> Self {
        Self {
            registry: None,
            id: 0,
        }
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    /// Keep the handler registered for as long as its channel lives.
    pub fn detach(mut self) {
        self.registry = None;
    }

    fn release(&mut self) {
        if let Some(registry) = self.registry.take().and_then(|w| w.upgrade()) {
            registry.unregister(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("attached", &self.registry.is_some())
            .finish()
    }
}

/// Topic name -> channel. At most one channel exists per topic.
pub struct TopicBus<M> {
    channels: RefCell<HashMap<String, Rc<Channel<M>>>>,
}

impl<M: 'static> Default for TopicBus<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: 'static> TopicBus<M> {
    pub fn new() -> Self {
        Self {
            channels: RefCell::new(HashMap::new()),
        }
    }

    pub fn subscribe<F>(&self, topic: &str, handler: F) -> Subscription
    where
        F: Fn(&M) -> anyhow::Result<()> + 'static,
    {
        let channel = Rc::clone(
            self.channels
                .borrow_mut()
                .entry(topic.to_string())
                .or_insert_with(|| Channel::new(topic)),
        );
        channel.subscribe(handler)
    }

    /// Messages sent to a topic nobody has subscribed to are dropped.
    pub fn publish(&self, topic: &str, message: M) {
        let channel = self.channels.borrow().get(topic).cloned();
        let Some(channel) = channel else {
            tracing::trace!(topic, "publish without channel dropped");
            return;
        };
        channel.emit(&message);
    }

    pub fn destroy(&self, topic: &str) {
        let removed = self.channels.borrow_mut().remove(topic);
        if let Some(channel) = removed {
            channel.complete();
        }
    }

    pub fn has_channel(&self, topic: &str) -> bool {
        self.channels.borrow().contains_key(topic)
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.channels
            .borrow()
            .get(topic)
            .map_or(0, |c| c.subscriber_count())
    }
}

#[cfg(test)]
mod tests {
    use super::TopicBus;
    use std::{cell::RefCell, rc::Rc};

    fn recorder() -> Rc<RefCell<Vec<String>>> {
        Rc::new(RefCell::new(Vec::new()))
    }

    #[test]
    fn publish_without_subscribers_is_a_no_op() {
        let bus: TopicBus<String> = TopicBus::new();
        bus.publish("nobody", "hello".to_string());
        assert!(!bus.has_channel("nobody"));
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let bus: TopicBus<u32> = TopicBus::new();
        let seen = recorder();

        let a = {
            let seen = Rc::clone(&seen);
            bus.subscribe("t", move |n| {
                seen.borrow_mut().push(format!("a{n}"));
                Ok(())
            })
        };
        let b = {
            let seen = Rc::clone(&seen);
            bus.subscribe("t", move |n| {
                seen.borrow_mut().push(format!("b{n}"));
                Ok(())
            })
        };

        bus.publish("t", 1);
        bus.publish("t", 2);
        assert_eq!(*seen.borrow(), vec!["a1", "b1", "a2", "b2"]);
        drop((a, b));
    }

    #[test]
    fn dropping_a_subscription_removes_only_that_handler() {
        let bus: TopicBus<u32> = TopicBus::new();
        let seen = recorder();

        let first = {
            let seen = Rc::clone(&seen);
            bus.subscribe("t", move |_| {
                seen.borrow_mut().push("first".into());
                Ok(())
            })
        };
        let _second = {
            let seen = Rc::clone(&seen);
            bus.subscribe("t", move |_| {
                seen.borrow_mut().push("second".into());
                Ok(())
            })
        };

        drop(first);
        bus.publish("t", 0);
        assert_eq!(*seen.borrow(), vec!["second"]);
        assert_eq!(bus.subscriber_count("t"), 1);
    }

    #[test]
    fn failing_handler_does_not_block_siblings() {
        let bus: TopicBus<u32> = TopicBus::new();
        let seen = recorder();

        let _bad = bus.subscribe("t", |_| anyhow::bail!("boom"));
        let _good = {
            let seen = Rc::clone(&seen);
            bus.subscribe("t", move |_| {
                seen.borrow_mut().push("good".into());
                Ok(())
            })
        };

        bus.publish("t", 0);
        assert_eq!(*seen.borrow(), vec!["good"]);
    }

    #[test]
    fn destroy_drops_channel_until_resubscribed() {
        let bus: TopicBus<u32> = TopicBus::new();
        let seen = recorder();

        let old = {
            let seen = Rc::clone(&seen);
            bus.subscribe("t", move |n| {
                seen.borrow_mut().push(format!("old{n}"));
                Ok(())
            })
        };
        bus.destroy("t");
        bus.publish("t", 1);
        assert!(seen.borrow().is_empty());
        assert!(!bus.has_channel("t"));
        drop(old);

        let _new = {
            let seen = Rc::clone(&seen);
            bus.subscribe("t", move |n| {
                seen.borrow_mut().push(format!("new{n}"));
                Ok(())
            })
        };
        bus.publish("t", 2);
        assert_eq!(*seen.borrow(), vec!["new2"]);
    }

    #[test]
    fn reentrant_publish_from_handler_is_delivered() {
        let bus: Rc<TopicBus<u32>> = Rc::new(TopicBus::new());
        let seen = recorder();

        let _forward = {
            let inner = Rc::downgrade(&bus);
            bus.subscribe("in", move |n| {
                if let Some(bus) = inner.upgrade() {
                    bus.publish("out", n * 10);
                }
                Ok(())
            })
        };
        let _sink = {
            let seen = Rc::clone(&seen);
            bus.subscribe("out", move |n| {
                seen.borrow_mut().push(n.to_string());
                Ok(())
            })
        };

        bus.publish("in", 4);
        assert_eq!(*seen.borrow(), vec!["40"]);
    }

    #[test]
    fn detached_subscription_stays_registered() {
        let bus: TopicBus<u32> = TopicBus::new();
        bus.subscribe("t", |_| Ok(())).detach();
        assert_eq!(bus.subscriber_count("t"), 1);
    }

    #[test]
    fn handler_unsubscribed_mid_publish_is_skipped() {
        let bus: TopicBus<u32> = TopicBus::new();
        let seen = recorder();
        let victim = Rc::new(RefCell::new(None));

        let _killer = {
            let victim = Rc::clone(&victim);
            bus.subscribe("t", move |_| {
                victim.borrow_mut().take();
                Ok(())
            })
        };
        let sub = {
            let seen = Rc::clone(&seen);
            bus.subscribe("t", move |_| {
                seen.borrow_mut().push("victim".into());
                Ok(())
            })
        };
        *victim.borrow_mut() = Some(sub);

        bus.publish("t", 0);
        assert!(seen.borrow().is_empty());
    }
}
