use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use crate::runtime::sync::{lock, read, write};

pub trait OverlayListener: Send + Sync {
    fn overlay_changed(&self, overlay: &Overlay);
}

pub trait RoiListener: Send + Sync {
    fn roi_changed(&self, roi: &Roi);
}

fn live<L: ?Sized>(listeners: &Mutex<Vec<Weak<L>>>) -> Vec<Arc<L>> {
    let mut listeners = lock(listeners);
    listeners.retain(|listener| listener.strong_count() > 0);
    listeners.iter().filter_map(Weak::upgrade).collect()
}

fn register<L: ?Sized>(listeners: &Mutex<Vec<Weak<L>>>, listener: Weak<L>) {
    let mut listeners = lock(listeners);
    if !listeners.iter().any(|known| Weak::ptr_eq(known, &listener)) {
        listeners.push(listener);
    }
}

struct OverlayInner {
    name: RwLock<String>,
    listeners: Mutex<Vec<Weak<dyn OverlayListener>>>,
}

/// Drawable layer attached to sequences. Clones share the same overlay.
#[derive(Clone)]
pub struct Overlay {
    inner: Arc<OverlayInner>,
}

impl PartialEq for Overlay {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Overlay {}

impl fmt::Debug for Overlay {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Overlay")
            .field("name", &self.name())
            .finish()
    }
}

impl Overlay {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(OverlayInner {
                name: RwLock::new(name.into()),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn name(&self) -> String {
        read(&self.inner.name).clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        *write(&self.inner.name) = name.into();
        self.painter_changed();
    }

    pub fn add_listener(&self, listener: Weak<dyn OverlayListener>) {
        register(&self.inner.listeners, listener);
    }

    pub fn remove_listener(&self, listener: &Weak<dyn OverlayListener>) {
        lock(&self.inner.listeners).retain(|known| !Weak::ptr_eq(known, listener));
    }

    /// Tells every holder that the overlay content has to be redrawn.
    pub fn painter_changed(&self) {
        for listener in live(&self.inner.listeners) {
            listener.overlay_changed(self);
        }
    }
}

struct RoiInner {
    name: RwLock<String>,
    selected: AtomicBool,
    focused: AtomicBool,
    read_only: AtomicBool,
    overlay: Overlay,
    listeners: Mutex<Vec<Weak<dyn RoiListener>>>,
}

/// Region of interest with its own drawing overlay. Clones share the same
/// region.
#[derive(Clone)]
pub struct Roi {
    inner: Arc<RoiInner>,
}

impl PartialEq for Roi {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Roi {}

impl fmt::Debug for Roi {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Roi")
            .field("name", &self.name())
            .field("selected", &self.is_selected())
            .field("focused", &self.is_focused())
            .field("read_only", &self.is_read_only())
            .finish()
    }
}

impl Roi {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            inner: Arc::new(RoiInner {
                overlay: Overlay::new(name.clone()),
                name: RwLock::new(name),
                selected: AtomicBool::new(false),
                focused: AtomicBool::new(false),
                read_only: AtomicBool::new(false),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn name(&self) -> String {
        read(&self.inner.name).clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        *write(&self.inner.name) = name.into();
        self.roi_changed();
    }

    pub fn overlay(&self) -> &Overlay {
        &self.inner.overlay
    }

    pub fn is_selected(&self) -> bool {
        self.inner.selected.load(Ordering::Acquire)
    }

    pub fn set_selected(&self, value: bool) {
        if self.inner.selected.swap(value, Ordering::AcqRel) != value {
            self.roi_changed();
        }
    }

    pub fn is_focused(&self) -> bool {
        self.inner.focused.load(Ordering::Acquire)
    }

    pub fn set_focused(&self, value: bool) {
        if self.inner.focused.swap(value, Ordering::AcqRel) != value {
            self.roi_changed();
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.inner.read_only.load(Ordering::Acquire)
    }

    pub fn set_read_only(&self, value: bool) {
        if self.inner.read_only.swap(value, Ordering::AcqRel) != value {
            self.roi_changed();
        }
    }

    pub fn add_listener(&self, listener: Weak<dyn RoiListener>) {
        register(&self.inner.listeners, listener);
    }

    pub fn remove_listener(&self, listener: &Weak<dyn RoiListener>) {
        lock(&self.inner.listeners).retain(|known| !Weak::ptr_eq(known, listener));
    }

    pub fn roi_changed(&self) {
        for listener in live(&self.inner.listeners) {
            listener.roi_changed(self);
        }
    }
}
