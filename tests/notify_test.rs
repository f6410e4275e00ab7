use std::cell::RefCell;
use std::rc::Rc;

use map_model_viewer::notify::{Channel, MessageLog, ReplayChannel};

fn collector() -> (Rc<RefCell<Vec<String>>>, impl FnMut(&String) + 'static) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    (seen, move |value: &String| {
        sink.borrow_mut().push(value.clone())
    })
}

#[test]
fn replay_channel_delivers_backlog_in_order_then_live_values() {
    let channel = ReplayChannel::new();
    channel.publish("A".to_string());
    channel.publish("B".to_string());

    let (seen, callback) = collector();
    let _sub = channel.subscribe(callback);
    assert_eq!(*seen.borrow(), vec!["A", "B"]);

    channel.publish("C".to_string());
    assert_eq!(*seen.borrow(), vec!["A", "B", "C"]);
}

#[test]
fn fire_forward_channel_skips_earlier_publications() {
    let channel = Channel::new();
    channel.publish("lost".to_string());

    let (seen, callback) = collector();
    let _sub = channel.subscribe(callback);
    channel.publish("kept".to_string());

    assert_eq!(*seen.borrow(), vec!["kept"]);
}

#[test]
fn reset_starts_a_fresh_history_without_dropping_subscribers() {
    let channel = ReplayChannel::new();
    channel.publish("A".to_string());

    let (before_reset, callback) = collector();
    let sub = channel.subscribe(callback);
    assert_eq!(*before_reset.borrow(), vec!["A"]);

    channel.reset();
    channel.publish("B".to_string());

    // The earlier subscriber stays live and never sees "A" again.
    assert_eq!(*before_reset.borrow(), vec!["A", "B"]);

    // A subscriber attaching after the reset sees only the fresh history.
    let (after_reset, callback) = collector();
    let _sub2 = channel.subscribe(callback);
    assert_eq!(*after_reset.borrow(), vec!["B"]);

    // Late unsubscribe is a safe no-op, twice.
    sub.unsubscribe();
    sub.unsubscribe();
    channel.publish("C".to_string());
    assert_eq!(*before_reset.borrow(), vec!["A", "B"]);
}

#[test]
fn unsubscribing_inside_a_callback_is_safe() {
    let channel: ReplayChannel<String> = ReplayChannel::new();

    let sub_slot: Rc<RefCell<Option<map_model_viewer::notify::Subscription<String>>>> =
        Rc::new(RefCell::new(None));
    let slot = sub_slot.clone();
    let count = Rc::new(RefCell::new(0));
    let counter = count.clone();

    let sub = channel.subscribe(move |_value: &String| {
        *counter.borrow_mut() += 1;
        if let Some(sub) = slot.borrow().as_ref() {
            sub.unsubscribe();
        }
    });
    *sub_slot.borrow_mut() = Some(sub);

    channel.publish("first".to_string());
    channel.publish("second".to_string());

    assert_eq!(*count.borrow(), 1);
}

#[test]
fn message_log_deduplicates_by_text() {
    let warnings = ReplayChannel::new();
    let failures = ReplayChannel::new();
    let log = MessageLog::attach(&warnings, &failures);

    warnings.publish("texture missing".to_string());
    warnings.publish("texture missing".to_string());
    failures.publish("decode failed".to_string());

    let entries = log.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].message, "texture missing");
    assert_eq!(entries[1].message, "decode failed");

    log.detach();
    warnings.publish("after detach".to_string());
    assert_eq!(log.entries().len(), 2);
}
