//! ============================================================================
//! Debouncer - Settled Value Channel
//! ============================================================================
//! Raw input is pushed as fast as it arrives; the settled value is published
//! on a `watch` channel once no new input has arrived for the configured delay.
//! ============================================================================

use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

pub struct Debouncer<T> {
    input: watch::Sender<T>,
    output: watch::Receiver<T>,
    task: JoinHandle<()>,
}

impl<T> Debouncer<T>
where
    T: Clone + PartialEq + Send + Sync + std::fmt::Debug + 'static,
{
    /// Must be called inside a tokio runtime
    pub fn new(initial: T, delay: Duration) -> Self {
        let (input, mut input_rx) = watch::channel(initial.clone());
        let (output_tx, output) = watch::channel(initial);

        let task = tokio::spawn(async move {
            // Wait for the first change, then restart the timer on every
            // further change until the input has been quiet for `delay`.
            while input_rx.changed().await.is_ok() {
                loop {
                    tokio::select! {
                        changed = input_rx.changed() => {
                            if changed.is_err() {
                                return;
                            }
                        }
                        _ = tokio::time::sleep(delay) => break,
                    }
                }

                let settled = input_rx.borrow_and_update().clone();
                let published = output_tx.send_if_modified(|current| {
                    if *current == settled {
                        false
                    } else {
                        *current = settled.clone();
                        true
                    }
                });
                if published {
                    debug!("Debounced value settled: {:?}", settled);
                }
            }
        });

        Self {
            input,
            output,
            task,
        }
    }

    /// Feed a raw value; restarts the quiet period
    pub fn push(&self, value: T) {
        self.input.send_replace(value);
    }

    /// Most recently pushed value, settled or not
    pub fn pending(&self) -> T {
        self.input.borrow().clone()
    }

    /// Last settled value
    pub fn current(&self) -> T {
        self.output.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.output.clone()
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(500);

    #[tokio::test(start_paused = true)]
    async fn test_publishes_after_quiet_period() {
        let debouncer = Debouncer::new(String::new(), DELAY);
        let mut rx = debouncer.subscribe();

        debouncer.push("shirt".to_string());
        tokio::time::sleep(Duration::from_millis(499)).await;
        assert_eq!(debouncer.current(), "");

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), "shirt");
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_input_restarts_timer() {
        let debouncer = Debouncer::new(String::new(), DELAY);
        let mut rx = debouncer.subscribe();

        debouncer.push("s".to_string());
        tokio::time::sleep(Duration::from_millis(300)).await;
        debouncer.push("sh".to_string());
        tokio::time::sleep(Duration::from_millis(300)).await;
        debouncer.push("shoe".to_string());
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!rx.has_changed().unwrap());
        assert_eq!(debouncer.pending(), "shoe");

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), "shoe");
    }

    #[tokio::test(start_paused = true)]
    async fn test_equal_value_not_republished() {
        let debouncer = Debouncer::new("shoe".to_string(), DELAY);
        let mut rx = debouncer.subscribe();

        debouncer.push("shirt".to_string());
        tokio::time::sleep(Duration::from_millis(100)).await;
        debouncer.push("shoe".to_string());
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert!(!rx.has_changed().unwrap());
        assert_eq!(debouncer.current(), "shoe");
    }
}
