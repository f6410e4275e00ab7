//! Typed broadcast channels connecting asynchronous engine events to
//! observers.
//!
//! Two channel flavours exist:
//!
//! - [`Channel<T>`] delivers only values published after a subscription was
//!   taken out (fire-forward).
//! - [`ReplayChannel<T>`] additionally redelivers its complete publication
//!   history to every new subscriber, so observers attaching late (for
//!   instance a UI remounting after a model already failed to load) still
//!   see everything. [`ReplayChannel::reset`] starts a fresh history while
//!   keeping existing subscriptions alive.
//!
//! Channels are single-threaded observer lists. Delivery order matches
//! publication order per channel; ordering across channels is unspecified.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use serde::Serialize;

use crate::resources::Stats;

type Callback<T> = Box<dyn FnMut(&T)>;

struct Observer<T> {
    id: u64,
    callback: Callback<T>,
}

struct ChannelState<T> {
    next_id: u64,
    observers: Vec<Observer<T>>,
    dispatch_depth: u32,
    // Unsubscribes that arrived while an observer list was checked out for
    // dispatch; each dispatch frame consumes the ids belonging to it when
    // merging its list back.
    removed: Vec<u64>,
}

impl<T> ChannelState<T> {
    fn new() -> Self {
        Self {
            next_id: 0,
            observers: Vec::new(),
            dispatch_depth: 0,
            removed: Vec::new(),
        }
    }

    fn register(&mut self, callback: Callback<T>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.observers.push(Observer { id, callback });
        id
    }
}

/// Dispatch `value` to every observer of `state`.
///
/// The observer list is swapped out of the `RefCell` for the duration of the
/// callbacks so that a callback may subscribe, unsubscribe or publish again
/// without double-borrowing. Observers added mid-dispatch only see future
/// values.
fn dispatch<T>(state: &Rc<RefCell<ChannelState<T>>>, value: &T) {
    let mut current = {
        let mut state = state.borrow_mut();
        state.dispatch_depth += 1;
        std::mem::take(&mut state.observers)
    };

    for observer in &mut current {
        (observer.callback)(value);
    }

    let mut state = state.borrow_mut();
    state.dispatch_depth -= 1;
    let mut removed = std::mem::take(&mut state.removed);
    current.retain(|observer| {
        match removed.iter().position(|id| *id == observer.id) {
            Some(index) => {
                removed.swap_remove(index);
                false
            }
            None => true,
        }
    });
    // Ids not found here belong to a list checked out by an outer frame.
    state.removed = removed;
    let added_mid_dispatch = std::mem::take(&mut state.observers);
    state.observers = current;
    state.observers.extend(added_mid_dispatch);
}

fn remove_observer<T>(state: &Weak<RefCell<ChannelState<T>>>, id: u64) {
    if let Some(state) = state.upgrade() {
        let mut state = state.borrow_mut();
        let before = state.observers.len();
        state.observers.retain(|observer| observer.id != id);
        if before == state.observers.len() && state.dispatch_depth > 0 {
            state.removed.push(id);
        }
    }
}

/// Handle for detaching an observer from a channel.
///
/// `unsubscribe` is idempotent and stays safe after the channel itself has
/// been dropped or reset.
pub struct Subscription<T> {
    id: u64,
    state: Weak<RefCell<ChannelState<T>>>,
}

impl<T> Subscription<T> {
    pub fn unsubscribe(&self) {
        remove_observer(&self.state, self.id);
    }
}

/// Fire-forward broadcast channel: subscribers receive only values published
/// after they attached.
pub struct Channel<T> {
    state: Rc<RefCell<ChannelState<T>>>,
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<T: 'static> Channel<T> {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(ChannelState::new())),
        }
    }

    pub fn publish(&self, value: T) {
        dispatch(&self.state, &value);
    }

    pub fn subscribe(&self, callback: impl FnMut(&T) + 'static) -> Subscription<T> {
        let id = self.state.borrow_mut().register(Box::new(callback));
        Subscription {
            id,
            state: Rc::downgrade(&self.state),
        }
    }
}

impl<T: 'static> Default for Channel<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Broadcast channel that replays its full publication history to every new
/// subscriber before delivering live values.
pub struct ReplayChannel<T> {
    state: Rc<RefCell<ChannelState<T>>>,
    history: Rc<RefCell<Vec<T>>>,
}

impl<T> Clone for ReplayChannel<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            history: self.history.clone(),
        }
    }
}

impl<T: Clone + 'static> ReplayChannel<T> {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(ChannelState::new())),
            history: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn publish(&self, value: T) {
        self.history.borrow_mut().push(value.clone());
        dispatch(&self.state, &value);
    }

    /// Attach an observer. The complete history is delivered first, in
    /// publication order, then the observer joins the live list.
    pub fn subscribe(&self, mut callback: impl FnMut(&T) + 'static) -> Subscription<T> {
        let backlog = self.history.borrow().clone();
        for value in &backlog {
            callback(value);
        }

        let id = self.state.borrow_mut().register(Box::new(callback));
        Subscription {
            id,
            state: Rc::downgrade(&self.state),
        }
    }

    /// Close out the current history and start a fresh one. Existing
    /// subscriptions stay attached and keep receiving future values; only
    /// subscribers attaching after the reset see the empty backlog.
    pub fn reset(&self) {
        self.history.borrow_mut().clear();
    }

    pub fn history_len(&self) -> usize {
        self.history.borrow().len()
    }
}

impl<T: Clone + 'static> Default for ReplayChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The fixed channel set wired through the viewer and both engines.
///
/// Callers may hand in their own set at construction to bridge the viewer
/// into an existing observer graph; otherwise a fresh set is created.
#[derive(Clone)]
pub struct ViewerChannels {
    /// Rendering warnings intercepted from the asset pipeline.
    pub warnings: ReplayChannel<String>,
    /// Per-model decode failures.
    pub load_failures: ReplayChannel<String>,
    /// Seconds from load start to a model's first rendered frame.
    pub scene_rendered: ReplayChannel<f64>,
    /// Statistics record for single-model sessions.
    pub stats: ReplayChannel<Stats>,
    /// Flipped to `true` while a benchmark sweep is running.
    pub testing: Channel<bool>,
    /// Mean FPS of a completed benchmark sweep.
    pub testing_result: Channel<f64>,
}

impl ViewerChannels {
    pub fn new() -> Self {
        Self {
            warnings: ReplayChannel::new(),
            load_failures: ReplayChannel::new(),
            scene_rendered: ReplayChannel::new(),
            stats: ReplayChannel::new(),
            testing: Channel::new(),
            testing_result: Channel::new(),
        }
    }

    /// Reset every replay channel's history. Part of a model-set reset.
    pub fn reset_replay(&self) {
        self.warnings.reset();
        self.load_failures.reset();
        self.scene_rendered.reset();
        self.stats.reset();
    }
}

impl Default for ViewerChannels {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Warning,
    Error,
}

#[derive(Clone, Debug, Serialize)]
pub struct LogEntry {
    pub kind: LogKind,
    pub message: String,
}

/// Observer-visible accumulation of warnings and load failures,
/// de-duplicated by message text: publishing identical text twice shows one
/// entry.
pub struct MessageLog {
    entries: Rc<RefCell<Vec<LogEntry>>>,
    warning_sub: Subscription<String>,
    failure_sub: Subscription<String>,
}

impl MessageLog {
    pub fn attach(warnings: &ReplayChannel<String>, failures: &ReplayChannel<String>) -> Self {
        let entries = Rc::new(RefCell::new(Vec::new()));

        let sink = entries.clone();
        let warning_sub = warnings.subscribe(move |message: &String| {
            push_unique(&sink, LogKind::Warning, message);
        });

        let sink = entries.clone();
        let failure_sub = failures.subscribe(move |message: &String| {
            push_unique(&sink, LogKind::Error, message);
        });

        Self {
            entries,
            warning_sub,
            failure_sub,
        }
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.borrow().clone()
    }

    pub fn detach(&self) {
        self.warning_sub.unsubscribe();
        self.failure_sub.unsubscribe();
    }
}

fn push_unique(entries: &Rc<RefCell<Vec<LogEntry>>>, kind: LogKind, message: &str) {
    let mut entries = entries.borrow_mut();
    if entries.iter().any(|entry| entry.message == message) {
        return;
    }
    entries.push(LogEntry {
        kind,
        message: message.to_string(),
    });
}
