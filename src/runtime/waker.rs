//! Waker construction over the standard raw-waker protocol.
//!
//! One vtable serves every wake target in the crate: anything that can be
//! woken through an `Arc` implements [`WakeRef`] and gets a [`Waker`] via
//! [`waker_from`]. Tasks re-enqueue themselves; the root future of
//! `block_on` sets a notification flag.

use std::sync::Arc;
use std::task::{RawWaker, RawWakerVTable, Waker};

/// A wake target addressed through an `Arc`.
pub(crate) trait WakeRef: Send + Sync + 'static {
    fn wake_ref(self: &Arc<Self>);
}

struct VTable<W>(std::marker::PhantomData<W>);

impl<W: WakeRef> VTable<W> {
    const VTABLE: RawWakerVTable =
        RawWakerVTable::new(Self::clone, Self::wake, Self::wake_by_ref, Self::drop);

    fn clone(data: *const ()) -> RawWaker {
        let arc = unsafe { Arc::<W>::from_raw(data as *const W) };
        let cloned = arc.clone();
        std::mem::forget(arc);
        RawWaker::new(Arc::into_raw(cloned) as *const (), &Self::VTABLE)
    }

    fn wake(data: *const ()) {
        let arc = unsafe { Arc::<W>::from_raw(data as *const W) };
        arc.wake_ref();
    }

    fn wake_by_ref(data: *const ()) {
        let arc = unsafe { Arc::<W>::from_raw(data as *const W) };
        arc.wake_ref();
        std::mem::forget(arc);
    }

    fn drop(data: *const ()) {
        unsafe {
            drop(Arc::<W>::from_raw(data as *const W));
        }
    }
}

/// Build a [`Waker`] that forwards to `target.wake_ref()`.
pub(crate) fn waker_from<W: WakeRef>(target: Arc<W>) -> Waker {
    let raw = RawWaker::new(Arc::into_raw(target) as *const (), &VTable::<W>::VTABLE);
    unsafe { Waker::from_raw(raw) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter(AtomicUsize);

    impl WakeRef for Counter {
        fn wake_ref(self: &Arc<Self>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn wake_by_ref_keeps_the_waker_alive() {
        let target = Arc::new(Counter(AtomicUsize::new(0)));
        let waker = waker_from(target.clone());

        waker.wake_by_ref();
        waker.wake_by_ref();
        waker.wake();

        assert_eq!(target.0.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn clone_shares_the_target() {
        let target = Arc::new(Counter(AtomicUsize::new(0)));
        let waker = waker_from(target.clone());
        let second = waker.clone();
        drop(waker);

        second.wake();
        assert_eq!(target.0.load(Ordering::SeqCst), 1);
    }
}
