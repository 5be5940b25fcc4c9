use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Coalesces bursts of calls into one.
///
/// In trailing mode (the default) only the last call of a burst runs, `wait`
/// after it was made. In immediate mode the first call of a burst runs at once
/// and the rest are dropped until `wait` has passed without a call.
///
/// Must be used from within a tokio runtime.
pub struct Debouncer {
    wait: Duration,
    immediate: bool,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new(wait: Duration) -> Self {
        Self {
            wait,
            immediate: false,
            timer: Mutex::new(None),
        }
    }

    pub fn immediate(wait: Duration) -> Self {
        Self {
            wait,
            immediate: true,
            timer: Mutex::new(None),
        }
    }

    pub fn call<F>(&self, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut timer = self.timer.lock().unwrap_or_else(|e| e.into_inner());
        let idle = timer.as_ref().is_none_or(|t| t.is_finished());
        if let Some(previous) = timer.take() {
            previous.abort();
        }

        let wait = self.wait;
        if self.immediate {
            if idle {
                tokio::spawn(action);
            }
            *timer = Some(tokio::spawn(tokio::time::sleep(wait)));
        } else {
            *timer = Some(tokio::spawn(async move {
                tokio::time::sleep(wait).await;
                action.await;
            }));
        }
    }

    /// Drop whatever is scheduled without running it.
    pub fn cancel(&self) {
        if let Some(previous) = self.timer.lock().unwrap_or_else(|e| e.into_inner()).take() {
            previous.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.timer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
