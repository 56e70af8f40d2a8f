use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

/// Identity of one scheduled task. Stays current until its slot is
/// cancelled or rescheduled.
#[derive(Debug, Clone)]
pub struct Generation {
    counter: Arc<AtomicU64>,
    value: u64,
}

impl Generation {
    pub fn is_current(&self) -> bool {
        self.counter.load(Ordering::SeqCst) == self.value
    }

    pub fn value(&self) -> u64 {
        self.value
    }
}

/// Holds at most one background task (a polling loop or an auto-hide
/// timer). Scheduling aborts the previous occupant and bumps the
/// generation, so a superseded task that is mid-flight fails its
/// `is_current` check before it can write state.
#[derive(Debug, Default)]
pub struct TaskSlot {
    counter: Arc<AtomicU64>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TaskSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the current task and invalidate its generation
    pub fn cancel(&self) -> Generation {
        let value = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(handle) = self.lock().take() {
            handle.abort();
        }
        Generation {
            counter: Arc::clone(&self.counter),
            value,
        }
    }

    /// Replace whatever is scheduled with the task built by `task`
    pub fn schedule<F, Fut>(&self, task: F) -> Generation
    where
        F: FnOnce(Generation) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let generation = self.cancel();
        let handle = tokio::spawn(task(generation.clone()));
        *self.lock() = Some(handle);
        generation
    }

    /// Run `action` after `delay` unless superseded first
    pub fn schedule_after<F>(&self, delay: std::time::Duration, action: F) -> Generation
    where
        F: FnOnce() + Send + 'static,
    {
        self.schedule(move |generation| async move {
            tokio::time::sleep(delay).await;
            if generation.is_current() {
                action();
            }
        })
    }

    pub fn current(&self) -> Generation {
        Generation {
            counter: Arc::clone(&self.counter),
            value: self.counter.load(Ordering::SeqCst),
        }
    }

    /// Number of live tasks in this slot (0 or 1)
    pub fn scheduled(&self) -> usize {
        match self.lock().as_ref() {
            Some(handle) if !handle.is_finished() => 1,
            _ => 0,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.handle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for TaskSlot {
    fn drop(&mut self) {
        if let Ok(mut handle) = self.handle.lock() {
            if let Some(handle) = handle.take() {
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_supersedes_previous_timer() {
        let slot = TaskSlot::new();
        let fired = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&fired);
        slot.schedule_after(Duration::from_secs(5), move || log.lock().unwrap().push("first"));
        tokio::time::sleep(Duration::from_secs(3)).await;

        let log = Arc::clone(&fired);
        slot.schedule_after(Duration::from_secs(5), move || log.lock().unwrap().push("second"));
        assert_eq!(slot.scheduled(), 1);

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(fired.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(*fired.lock().unwrap(), vec!["second"]);
        assert_eq!(slot.scheduled(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_invalidates_generation() {
        let slot = TaskSlot::new();
        let ticks = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&ticks);
        let generation = slot.schedule(move |generation| async move {
            loop {
                tokio::time::sleep(Duration::from_secs(1)).await;
                if !generation.is_current() {
                    return;
                }
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
        assert!(generation.is_current());

        slot.cancel();
        assert!(!generation.is_current());
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
        assert_eq!(slot.scheduled(), 0);
    }
}
