//! [`Signal`] – synchronous, zero-argument notifications.
//!
//! Listeners run inline, in connection order, on the thread that emits.  A
//! tick therefore observes every side effect of its own notifications before
//! it returns.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! use covr_runtime::signal::Signal;
//!
//! let hits = Arc::new(AtomicUsize::new(0));
//! let mut on_grab = Signal::new("on_grab");
//!
//! let counter = Arc::clone(&hits);
//! let id = on_grab.connect(move || {
//!     counter.fetch_add(1, Ordering::SeqCst);
//! });
//!
//! on_grab.emit();
//! assert!(on_grab.disconnect(id));
//! on_grab.emit();
//! assert_eq!(hits.load(Ordering::SeqCst), 1);
//! ```

use std::fmt;

use tracing::trace;

/// Handle returned by [`Signal::connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut() + Send>;

/// A named list of listeners.
pub struct Signal {
    name: &'static str,
    next_id: u64,
    listeners: Vec<(ListenerId, Listener)>,
}

impl Signal {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            next_id: 0,
            listeners: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn connect(&mut self, listener: impl FnMut() + Send + 'static) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener.  Returns `false` if it was not connected.
    pub fn disconnect(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    /// Call every listener once.
    pub fn emit(&mut self) {
        trace!(signal = self.name, listeners = self.listeners.len(), "emit");
        for (_, listener) in &mut self.listeners {
            listener();
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("name", &self.name)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn listeners_run_in_connection_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut signal = Signal::new("test");
        for i in 0..3 {
            let log = Arc::clone(&log);
            signal.connect(move || log.lock().unwrap().push(i));
        }
        signal.emit();
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn disconnect_unknown_listener_is_false() {
        let mut a = Signal::new("a");
        let mut b = Signal::new("b");
        let id = b.connect(|| {});
        b.connect(|| {});
        assert!(!a.disconnect(id));
        assert!(b.disconnect(id));
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn emit_without_listeners_is_noop() {
        let mut signal = Signal::new("empty");
        assert!(signal.is_empty());
        signal.emit();
    }
}
