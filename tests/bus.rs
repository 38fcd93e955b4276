use pretty_assertions::assert_eq;
use std::{cell::RefCell, rc::Rc};

use argpanel::{Event, EventBus, LogRecord, TopicBus, statics};

type Log = Rc<RefCell<Vec<String>>>;

fn recorder(
    bus: &TopicBus<String>,
    topic: &'static str,
    tag: &'static str,
    log: &Log,
) -> argpanel::Subscription {
    let log = Rc::clone(log);
    bus.subscribe(topic, move |msg| {
        log.borrow_mut().push(format!("{tag}:{msg}"));
        Ok(())
    })
}

#[test]
fn each_subscriber_sees_its_topic_in_publish_order() {
    let bus = TopicBus::new();
    let log: Log = Rc::default();
    let _a = recorder(&bus, "alpha", "a1", &log);
    let _b = recorder(&bus, "beta", "b", &log);
    let _c = recorder(&bus, "alpha", "a2", &log);

    for msg in ["one", "two"] {
        bus.publish("alpha", msg.to_string());
    }
    bus.publish("beta", "three".to_string());

    assert_eq!(
        *log.borrow(),
        vec!["a1:one", "a2:one", "a1:two", "a2:two", "b:three"]
    );
}

#[test]
fn handlers_may_publish_while_being_delivered() {
    let bus = Rc::new(TopicBus::new());
    let log: Log = Rc::default();
    let _tail = recorder(&bus, "second", "s", &log);
    let _relay = {
        let inner = Rc::clone(&bus);
        let log = Rc::clone(&log);
        bus.subscribe("first", move |msg: &String| {
            log.borrow_mut().push(format!("f:{msg}"));
            inner.publish("second", format!("{msg}!"));
            Ok(())
        })
    };

    bus.publish("first", "go".to_string());
    assert_eq!(*log.borrow(), vec!["f:go", "s:go!"]);
}

#[test]
fn a_failing_handler_does_not_stop_delivery() {
    let bus = TopicBus::new();
    let log: Log = Rc::default();
    let _bad = bus.subscribe("t", |_: &String| Err(anyhow::anyhow!("broken")));
    let _good = recorder(&bus, "t", "ok", &log);

    bus.publish("t", "x".to_string());
    assert_eq!(*log.borrow(), vec!["ok:x"]);
}

#[test]
fn destroyed_topics_drop_their_subscribers() {
    let bus = TopicBus::new();
    let log: Log = Rc::default();
    let _old = recorder(&bus, "t", "old", &log);

    bus.destroy("t");
    assert!(!bus.has_channel("t"));
    bus.publish("t", "lost".to_string());

    // A later subscription gets a fresh channel.
    let _new = recorder(&bus, "t", "new", &log);
    bus.publish("t", "kept".to_string());
    assert_eq!(*log.borrow(), vec!["new:kept"]);
}

#[test]
fn log_events_ride_the_logger_topic() {
    let bus = EventBus::new();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let _sub = {
        let seen = Rc::clone(&seen);
        bus.subscribe(statics::TOPIC_LOGGER, move |event| {
            if let Event::Log(record) = event {
                seen.borrow_mut().push(record.message.clone());
            }
            Ok(())
        })
    };

    argpanel::logger::publish(&bus, LogRecord::info("hello"));
    bus.publish(statics::TOPIC_GENERAL_OPTIONS_REFRESH, Event::Refresh(None));
    assert_eq!(*seen.borrow(), vec!["hello".to_string()]);
}

#[test]
fn unsubscribe_detaches_exactly_one_handler() {
    let bus = TopicBus::new();
    let log: Log = Rc::default();
    let first = recorder(&bus, "t", "first", &log);
    let _second = recorder(&bus, "t", "second", &log);

    first.unsubscribe();
    bus.publish("t", "x".to_string());

    assert_eq!(*log.borrow(), vec!["second:x"]);
    assert_eq!(bus.subscriber_count("t"), 1);
}

#[test]
fn completed_channels_refuse_new_handlers() {
    let channel = argpanel::bus::Channel::<u8>::new("changes");
    let _early = channel.subscribe(|_| Ok(()));
    channel.complete();

    assert!(channel.is_completed());
    let _late = channel.subscribe(|_| Ok(()));
    assert_eq!(channel.subscriber_count(), 0);
    assert_eq!(channel.emit(&1), 0);
}
