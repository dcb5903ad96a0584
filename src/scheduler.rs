use std::future::Future;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// A periodic job on the async runtime. Each tick's work is awaited before
/// the next tick fires, so runs never overlap; ticks missed while a run was
/// slow are skipped rather than bunched up. Dropping the poller cancels it,
/// including any run in flight.
pub struct Poller {
    name: &'static str,
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl Poller {
    pub fn spawn<F, Fut>(rt: &Handle, name: &'static str, period: Duration, mut job: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (stop, mut stopped) = oneshot::channel::<()>();
        let handle = rt.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = &mut stopped => break,
                    _ = ticker.tick() => {}
                }
                tokio::select! {
                    _ = &mut stopped => break,
                    _ = job() => {}
                }
            }
            log::debug!("poller {} stopped", name);
        });
        log::debug!("poller {} started every {:?}", name, period);
        Self { name, stop: Some(stop), handle }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Signals the loop to stop and waits for it to exit.
    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        let _ = (&mut self.handle).await;
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Holds at most one in-flight task; installing a new one aborts the old.
#[derive(Debug, Default)]
pub struct TaskSlot {
    current: Option<JoinHandle<()>>,
}

impl TaskSlot {
    pub fn replace(&mut self, handle: JoinHandle<()>) {
        if let Some(old) = self.current.replace(handle) {
            old.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn runs_on_every_tick_until_stopped() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let poller = Poller::spawn(&Handle::current(), "test", Duration::from_secs(5), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        // First tick is immediate, then one every 5s.
        tokio::time::sleep(Duration::from_millis(12_500)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);

        poller.stop().await;
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_runs_never_overlap() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (a, p) = (active.clone(), peak.clone());
        let poller = Poller::spawn(&Handle::current(), "slow", Duration::from_secs(1), move || {
            let (a, p) = (a.clone(), p.clone());
            async move {
                let now = a.fetch_add(1, Ordering::SeqCst) + 1;
                p.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(3)).await;
                a.fetch_sub(1, Ordering::SeqCst);
            }
        });
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert!(poller.is_running());
        drop(poller);
    }

    #[tokio::test(start_paused = true)]
    async fn task_slot_aborts_superseded_task() {
        let done = Arc::new(AtomicUsize::new(0));
        let mut slot = TaskSlot::default();
        for _ in 0..3 {
            let done = done.clone();
            slot.replace(tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                done.fetch_add(1, Ordering::SeqCst);
            }));
        }
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }
}
