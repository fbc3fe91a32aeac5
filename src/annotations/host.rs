//! The page the annotation overlay is attached to
//!
//! `PageHost` is everything the canvas needs from its embedding page: the
//! viewport, page scroll locking and input listener bookkeeping.
//! `HeadlessPage` keeps all of that in memory.

use std::collections::BTreeMap;

use crate::domain::Viewport;

/// Input events the canvas subscribes to while active
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ListenerKind {
    PointerDown,
    PointerMove,
    PointerUp,
    KeyDown,
    Resize,
}

impl ListenerKind {
    pub const ALL: [ListenerKind; 5] = [
        ListenerKind::PointerDown,
        ListenerKind::PointerMove,
        ListenerKind::PointerUp,
        ListenerKind::KeyDown,
        ListenerKind::Resize,
    ];
}

/// Handle returned by `PageHost::subscribe`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

/// Scroll overflow of the document element and the body
///
/// `None` means the page did not set an inline value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScrollOverflow {
    pub document: Option<String>,
    pub body: Option<String>,
}

impl ScrollOverflow {
    /// Both elements set to `hidden`
    pub fn locked() -> Self {
        Self {
            document: Some("hidden".to_string()),
            body: Some("hidden".to_string()),
        }
    }
}

pub trait PageHost {
    fn viewport(&self) -> Viewport;

    fn scroll_overflow(&self) -> ScrollOverflow;

    fn set_scroll_overflow(&mut self, overflow: ScrollOverflow);

    fn subscribe(&mut self, kind: ListenerKind) -> ListenerId;

    /// Returns `false` if `id` was not subscribed
    fn unsubscribe(&mut self, id: ListenerId) -> bool;

    fn listener_count(&self) -> usize;

    /// Cursor hint for the overlay element
    fn set_cursor(&mut self, _cursor: &str) {}
}

/// In-memory page used for tests and for driving the canvas without a
/// browser
#[derive(Clone, Debug)]
pub struct HeadlessPage {
    viewport: Viewport,
    overflow: ScrollOverflow,
    listeners: BTreeMap<ListenerId, ListenerKind>,
    next_id: u64,
    cursor: String,
}

impl Default for HeadlessPage {
    fn default() -> Self {
        Self::new(Viewport::default())
    }
}

impl HeadlessPage {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            overflow: ScrollOverflow::default(),
            listeners: BTreeMap::new(),
            next_id: 0,
            cursor: String::new(),
        }
    }

    /// Start from a page that already styles its scroll overflow
    pub fn with_overflow(mut self, overflow: ScrollOverflow) -> Self {
        self.overflow = overflow;
        self
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn cursor(&self) -> &str {
        &self.cursor
    }

    /// Listeners currently registered for `kind`
    pub fn listeners_of(&self, kind: ListenerKind) -> usize {
        self.listeners.values().filter(|k| **k == kind).count()
    }
}

impl PageHost for HeadlessPage {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn scroll_overflow(&self) -> ScrollOverflow {
        self.overflow.clone()
    }

    fn set_scroll_overflow(&mut self, overflow: ScrollOverflow) {
        self.overflow = overflow;
    }

    fn subscribe(&mut self, kind: ListenerKind) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.listeners.insert(id, kind);
        id
    }

    fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn set_cursor(&mut self, cursor: &str) {
        self.cursor = cursor.to_string();
    }
}
