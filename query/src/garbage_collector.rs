use std::{cell::Cell, rc::Rc, time::Duration};

use leptos::leptos_dom::helpers::TimeoutHandle;

/// Removes an unobserved cache entry once its gc time has elapsed.
///
/// A gc time of `None` keeps the entry forever. A zero gc time removes it as soon as
/// collection is enabled.
#[derive(Clone)]
pub(crate) struct GarbageCollector {
    gc_time: Rc<Cell<Option<Duration>>>,
    handle: Rc<Cell<Option<TimeoutHandle>>>,
}

impl GarbageCollector {
    pub(crate) fn new(gc_time: Option<Duration>) -> Self {
        Self {
            gc_time: Rc::new(Cell::new(gc_time)),
            handle: Rc::new(Cell::new(None)),
        }
    }

    #[cfg(test)]
    pub(crate) fn gc_time(&self) -> Option<Duration> {
        self.gc_time.get()
    }

    /// Keep max gc time. `None` (forever) is the maximum.
    pub(crate) fn update_gc_time(&self, gc_time: Option<Duration>) {
        match (self.gc_time.get(), gc_time) {
            (Some(current), Some(gc_time)) if gc_time > current => {
                self.gc_time.set(Some(gc_time));
            }
            (Some(_), None) => {
                self.gc_time.set(None);
            }
            _ => {}
        }
    }

    pub(crate) fn enable_gc(&self, evict: impl FnOnce() + 'static) {
        if self.is_scheduled() {
            return;
        }

        match self.gc_time.get() {
            None => {}
            Some(gc_time) if gc_time.is_zero() => evict(),
            Some(gc_time) => self.schedule(evict, gc_time),
        }
    }

    pub(crate) fn disable_gc(&self) {
        if let Some(handle) = self.handle.take() {
            handle.clear();
        }
    }

    fn is_scheduled(&self) -> bool {
        let handle = self.handle.take();
        let scheduled = handle.is_some();
        self.handle.set(handle);
        scheduled
    }

    fn schedule(&self, evict: impl FnOnce() + 'static, gc_time: Duration) {
        cfg_if::cfg_if! {
            if #[cfg(any(feature = "hydrate", feature = "csr"))] {
                let handle = self.handle.clone();
                let new_handle = leptos::set_timeout_with_handle(
                    move || {
                        handle.set(None);
                        evict();
                    },
                    gc_time,
                )
                .ok();
                self.handle.set(new_handle);
            } else {
                // No timers outside the browser. Entries stay until the client is cleared.
                let _ = (evict, gc_time);
            }
        }
    }
}
