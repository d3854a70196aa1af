#![forbid(unsafe_code)]

//! DOM capability interface.
//!
//! The engine never touches a real document. Everything it needs from the
//! host page goes through [`DomAdapter`]: resolve a selector to a live
//! element's geometry, or observe mutations until a selector matches. A
//! host embeds the engine by implementing this trait over its real DOM;
//! tests use [`FakeDom`] for fully deterministic runs.
//!
//! # Observation lifecycle
//!
//! `observe` returns an [`Observation`] handle. Dropping or canceling it
//! tears the underlying watcher down; the adapter must stop delivering
//! matches afterwards. This is how the runner guarantees no callback
//! outlives the step that created it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::mpsc;

use crate::geometry::{Rect, Size};

/// A resolved page element: the selector it matched and its current
/// bounding rectangle in viewport pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementHandle {
    /// The selector that matched.
    pub selector: String,
    /// Bounding rectangle at resolution time.
    pub rect: Rect,
}

/// Capability interface over the host page.
pub trait DomAdapter {
    /// Resolve a selector to a live element, or `None` if nothing matches
    /// right now.
    fn resolve(&self, selector: &str) -> Option<ElementHandle>;

    /// Observe mutations until `selector` matches, delivering each match
    /// through `sender`. The watcher stays active until the returned
    /// [`Observation`] is canceled or dropped.
    fn observe(&self, selector: &str, sender: mpsc::Sender<ElementHandle>) -> Observation;

    /// Current viewport size.
    fn viewport(&self) -> Size;
}

/// Cancelation handle for an active observation.
///
/// Cancels on drop, so holding the handle is what keeps the watcher alive.
pub struct Observation {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Observation {
    /// Wrap a teardown closure.
    #[must_use]
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// An observation with no teardown (already-resolved or unsupported).
    #[must_use]
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    /// Tear the observation down now.
    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Observation {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observation")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// FakeDom
// ---------------------------------------------------------------------------

struct FakeWatcher {
    id: u64,
    selector: String,
    sender: mpsc::Sender<ElementHandle>,
}

struct FakeDomInner {
    elements: HashMap<String, Rect>,
    watchers: Vec<FakeWatcher>,
    next_watcher_id: u64,
    viewport: Size,
}

/// In-memory DOM adapter for deterministic tests.
///
/// Elements are inserted and removed explicitly; insertions notify any
/// active observation whose selector matches, modeling a mutation
/// observer firing on an async render.
#[derive(Clone)]
pub struct FakeDom {
    inner: Rc<RefCell<FakeDomInner>>,
}

impl FakeDom {
    /// Create an empty fake DOM with the given viewport.
    #[must_use]
    pub fn new(viewport: Size) -> Self {
        Self {
            inner: Rc::new(RefCell::new(FakeDomInner {
                elements: HashMap::new(),
                watchers: Vec::new(),
                next_watcher_id: 0,
                viewport,
            })),
        }
    }

    /// Insert (or move) an element, notifying matching observers.
    pub fn insert(&self, selector: impl Into<String>, rect: Rect) {
        let selector = selector.into();
        let mut inner = self.inner.borrow_mut();
        inner.elements.insert(selector.clone(), rect);
        let handle = ElementHandle {
            selector: selector.clone(),
            rect,
        };
        // Watchers whose receiver is gone are pruned here rather than on
        // cancel, mirroring how a mutation observer disconnects lazily.
        inner
            .watchers
            .retain(|w| w.selector != selector || w.sender.send(handle.clone()).is_ok());
    }

    /// Remove an element.
    pub fn remove(&self, selector: &str) {
        self.inner.borrow_mut().elements.remove(selector);
    }

    /// Change the viewport size.
    pub fn set_viewport(&self, viewport: Size) {
        self.inner.borrow_mut().viewport = viewport;
    }

    /// Number of currently registered observers.
    ///
    /// Tests assert this drops to zero across step transitions.
    #[must_use]
    pub fn active_observer_count(&self) -> usize {
        self.inner.borrow().watchers.len()
    }
}

impl DomAdapter for FakeDom {
    fn resolve(&self, selector: &str) -> Option<ElementHandle> {
        let inner = self.inner.borrow();
        inner.elements.get(selector).map(|rect| ElementHandle {
            selector: selector.to_string(),
            rect: *rect,
        })
    }

    fn observe(&self, selector: &str, sender: mpsc::Sender<ElementHandle>) -> Observation {
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_watcher_id;
            inner.next_watcher_id += 1;
            inner.watchers.push(FakeWatcher {
                id,
                selector: selector.to_string(),
                sender,
            });
            id
        };
        let weak = Rc::downgrade(&self.inner);
        Observation::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.borrow_mut().watchers.retain(|w| w.id != id);
            }
        })
    }

    fn viewport(&self) -> Size {
        self.inner.borrow().viewport
    }
}

impl fmt::Debug for FakeDom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("FakeDom")
            .field("elements", &inner.elements.len())
            .field("watchers", &inner.watchers.len())
            .finish()
    }
}
