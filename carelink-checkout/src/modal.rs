//! Modal lifetime and submit lock

use carelink_log::debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{CheckoutError, CheckoutResult};

/// Shared view of the checkout modal.
///
/// Clones share the same flags, so an in-flight operation can observe that
/// the modal was closed underneath it.
#[derive(Debug, Clone)]
pub struct ModalHandle {
    mounted: Arc<AtomicBool>,
    submitting: Arc<AtomicBool>,
}

impl ModalHandle {
    pub fn open() -> Self {
        Self {
            mounted: Arc::new(AtomicBool::new(true)),
            submitting: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::Acquire)
    }

    pub fn close(&self) {
        if self.mounted.swap(false, Ordering::AcqRel) {
            debug!("checkout modal closed");
        }
    }

    /// Fail with [`CheckoutError::ModalClosed`] once the modal is gone.
    pub fn ensure_mounted(&self) -> CheckoutResult<()> {
        if self.is_mounted() {
            Ok(())
        } else {
            Err(CheckoutError::ModalClosed)
        }
    }

    /// Whether the submit control should be disabled.
    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::Acquire)
    }

    /// Take the submit lock for the lifetime of the returned guard.
    pub fn try_begin_submit(&self) -> CheckoutResult<SubmitGuard> {
        self.ensure_mounted()?;
        self.submitting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| CheckoutError::AlreadySubmitting)?;

        Ok(SubmitGuard {
            submitting: self.submitting.clone(),
        })
    }
}

impl Default for ModalHandle {
    fn default() -> Self {
        Self::open()
    }
}

/// Held while a confirmation is in flight; releases the lock on drop.
#[derive(Debug)]
pub struct SubmitGuard {
    submitting: Arc<AtomicBool>,
}

impl Drop for SubmitGuard {
    fn drop(&mut self) {
        self.submitting.store(false, Ordering::Release);
    }
}
