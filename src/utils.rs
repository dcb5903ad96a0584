use once_cell::sync::Lazy;
use std::future::Future;
use std::sync::mpsc::Sender;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::api::events::UiEvent;

pub static RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build Tokio runtime")
});

/// Runs `fut` on the runtime and posts its event back to the UI thread.
/// A closed channel means the UI is gone; the event is dropped.
pub fn run_async_to_main<Fut>(rt: &Handle, tx: &Sender<UiEvent>, fut: Fut) -> JoinHandle<()>
where
    Fut: Future<Output = UiEvent> + Send + 'static,
{
    let tx = tx.clone();
    rt.spawn(async move {
        let event = fut.await;
        let _ = tx.send(event);
    })
}

pub fn normalize_url(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}
