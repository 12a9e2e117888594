//! Scoped exclusive access to state shared with interrupt-level code.
//!
//! [`Shared`] wraps a value in a critical-section mutex. Access goes through a
//! [`SharedGuard`] that holds the critical section for as long as it lives and
//! releases it on drop, on every exit path.

use core::cell::{RefCell, RefMut};
use core::mem::ManuallyDrop;
use core::ops::{Deref, DerefMut};

use critical_section::{CriticalSection, Mutex, RestoreState};

/// Value that may only be touched inside a critical section.
pub struct Shared<T> {
    inner: Mutex<RefCell<T>>,
}

impl<T> Shared<T> {
    #[must_use]
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(value)),
        }
    }

    /// Enters a critical section and borrows the value.
    ///
    /// Returns `None` if the value is already borrowed further up the stack;
    /// the critical section is released again before returning.
    pub fn try_lock(&self) -> Option<SharedGuard<'_, T>> {
        // SAFETY: paired with the `release` in `SharedGuard::drop` or below.
        let restore = unsafe { critical_section::acquire() };
        // SAFETY: interrupts stay masked until `restore` is released.
        let cs = unsafe { CriticalSection::new() };
        match self.inner.borrow(cs).try_borrow_mut() {
            Ok(value) => Some(SharedGuard {
                value: ManuallyDrop::new(value),
                restore,
            }),
            Err(_) => {
                // SAFETY: `restore` came from the `acquire` above.
                unsafe { critical_section::release(restore) };
                None
            }
        }
    }

    /// Enters a critical section and borrows the value.
    ///
    /// # Panics
    ///
    /// Panics if the value is already borrowed by an outer guard on the same
    /// execution context.
    pub fn lock(&self) -> SharedGuard<'_, T> {
        match self.try_lock() {
            Some(guard) => guard,
            None => panic!("shared state locked re-entrantly"),
        }
    }

    /// Runs `f` with exclusive access to the value.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.lock();
        f(&mut guard)
    }

    /// Consumes the wrapper and returns the value.
    pub fn into_inner(self) -> T {
        self.inner.into_inner().into_inner()
    }
}

/// Borrow of a [`Shared`] value; interrupts stay masked until it is dropped.
pub struct SharedGuard<'a, T> {
    value: ManuallyDrop<RefMut<'a, T>>,
    restore: RestoreState,
}

impl<T> Deref for SharedGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for SharedGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T> Drop for SharedGuard<'_, T> {
    fn drop(&mut self) {
        // SAFETY: the borrow is dropped exactly once, while still inside the
        // critical section, and `restore` came from the matching `acquire`.
        unsafe {
            ManuallyDrop::drop(&mut self.value);
            critical_section::release(self.restore);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_releases_on_drop() {
        let shared = Shared::new(0_u32);
        {
            let mut guard = shared.lock();
            *guard += 1;
        }
        assert_eq!(shared.with(|value| *value), 1);
    }

    #[test]
    fn nested_lock_is_refused() {
        let shared = Shared::new(0_u32);
        let guard = shared.lock();
        assert!(shared.try_lock().is_none());
        drop(guard);
        assert!(shared.try_lock().is_some());
    }

    #[test]
    fn guard_releases_on_early_return() {
        fn bump_unless_odd(shared: &Shared<u32>) -> Result<(), ()> {
            let mut guard = shared.lock();
            if *guard % 2 == 1 {
                return Err(());
            }
            *guard += 1;
            Ok(())
        }

        let shared = Shared::new(1_u32);
        assert!(bump_unless_odd(&shared).is_err());
        assert!(shared.try_lock().is_some());
    }
}
