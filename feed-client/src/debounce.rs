use std::time::Duration;

use tokio::task::JoinHandle;

/// Таймер «тишины»: каждый новый вызов `schedule` отменяет предыдущий,
/// колбэк срабатывает один раз после `delay` без новых вызовов.
///
/// Колбэк синхронный, поэтому `abort` может прервать задачу только во время
/// ожидания, но не посередине колбэка.
#[derive(Debug)]
pub(crate) struct Debouncer {
    delay: Duration,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub(crate) fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// Требует контекста tokio runtime.
    pub(crate) fn schedule<F>(&mut self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            callback();
        }));
    }

    pub(crate) fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
