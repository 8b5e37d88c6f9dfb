use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

use crate::error::FetchError;
use crate::notification::Notification;
use crate::platform::Bitmap;

pub trait ImageFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Bitmap, FetchError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOrigin {
    Posted,
    Fired,
}

#[derive(Debug)]
pub struct EnrichmentCompletion {
    pub notification: Notification,
    pub origin: DeliveryOrigin,
    pub bitmap: Result<Bitmap, FetchError>,
    ticket: u64,
}

struct PendingFetch {
    ticket: u64,
    cancelled: Arc<AtomicBool>,
}

/// Background image downloads whose results come back on a channel.
///
/// At most one fetch is pending per notification id; submitting again for the
/// same id cancels the earlier fetch.
pub struct EnrichmentQueue {
    fetcher: Arc<dyn ImageFetcher>,
    pending: Arc<Mutex<HashMap<i32, PendingFetch>>>,
    sender: Sender<EnrichmentCompletion>,
    receiver: Receiver<EnrichmentCompletion>,
    next_ticket: AtomicU64,
}

impl EnrichmentQueue {
    pub fn new(fetcher: Arc<dyn ImageFetcher>) -> Self {
        let (sender, receiver) = unbounded();
        Self {
            fetcher,
            pending: Arc::new(Mutex::new(HashMap::new())),
            sender,
            receiver,
            next_ticket: AtomicU64::new(1),
        }
    }

    pub fn completions(&self) -> Receiver<EnrichmentCompletion> {
        self.receiver.clone()
    }

    pub fn submit(
        &self,
        notification: Notification,
        url: String,
        origin: DeliveryOrigin,
    ) -> std::io::Result<()> {
        let id = notification.id;
        let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst);
        let cancelled = Arc::new(AtomicBool::new(false));
        if let Some(previous) = self.pending.lock().insert(
            id,
            PendingFetch {
                ticket,
                cancelled: Arc::clone(&cancelled),
            },
        ) {
            previous.cancelled.store(true, Ordering::SeqCst);
        }

        let fetcher = Arc::clone(&self.fetcher);
        let sender = self.sender.clone();
        let spawned = thread::Builder::new()
            .name(format!("notif-image-{id}"))
            .spawn(move || {
                let bitmap = fetcher.fetch(&url);
                if cancelled.load(Ordering::SeqCst) {
                    tracing::debug!(id, "image fetch finished after cancellation");
                    return;
                }
                let completion = EnrichmentCompletion {
                    notification,
                    origin,
                    bitmap,
                    ticket,
                };
                if sender.send(completion).is_err() {
                    tracing::debug!(id, "enrichment receiver dropped");
                }
            });

        if let Err(err) = spawned {
            self.forget(id, ticket);
            return Err(err);
        }
        tracing::debug!(id, ticket, "image fetch started");
        Ok(())
    }

    pub fn take_completed(&self, completion: &EnrichmentCompletion) -> bool {
        let mut pending = self.pending.lock();
        match pending.get(&completion.notification.id) {
            Some(entry)
                if entry.ticket == completion.ticket && !entry.cancelled.load(Ordering::SeqCst) =>
            {
                pending.remove(&completion.notification.id);
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&self, id: i32) -> bool {
        match self.pending.lock().remove(&id) {
            Some(entry) => {
                entry.cancelled.store(true, Ordering::SeqCst);
                tracing::debug!(id, "image fetch cancelled");
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        for (_, entry) in self.pending.lock().drain() {
            entry.cancelled.store(true, Ordering::SeqCst);
        }
    }

    pub fn is_pending(&self, id: i32) -> bool {
        self.pending.lock().contains_key(&id)
    }

    fn forget(&self, id: i32, ticket: u64) {
        let mut pending = self.pending.lock();
        if pending.get(&id).map(|entry| entry.ticket) == Some(ticket) {
            pending.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crossbeam_channel::bounded;

    use super::*;

    struct GatedFetcher {
        gate: Receiver<()>,
    }

    impl ImageFetcher for GatedFetcher {
        fn fetch(&self, url: &str) -> Result<Bitmap, FetchError> {
            let _ = self.gate.recv_timeout(Duration::from_secs(5));
            Ok(Bitmap {
                bytes: url.as_bytes().to_vec(),
            })
        }
    }

    fn queue() -> (Sender<()>, EnrichmentQueue) {
        let (open, gate) = bounded(4);
        (open, EnrichmentQueue::new(Arc::new(GatedFetcher { gate })))
    }

    #[test]
    fn completion_is_claimed_once() {
        let (open, queue) = queue();
        queue
            .submit(Notification::new(4, "t", "x"), "file:///a.png".into(), DeliveryOrigin::Posted)
            .unwrap();
        assert!(queue.is_pending(4));
        open.send(()).unwrap();

        let completion = queue
            .completions()
            .recv_timeout(Duration::from_secs(5))
            .unwrap();
        assert_eq!(completion.origin, DeliveryOrigin::Posted);
        assert_eq!(completion.bitmap.as_ref().unwrap().bytes, b"file:///a.png");
        assert!(queue.take_completed(&completion));
        assert!(!queue.take_completed(&completion));
        assert!(!queue.is_pending(4));
    }

    #[test]
    fn cancelled_fetch_never_completes() {
        let (open, queue) = queue();
        queue
            .submit(Notification::new(4, "t", "x"), "file:///a.png".into(), DeliveryOrigin::Fired)
            .unwrap();
        assert!(queue.cancel(4));
        assert!(!queue.cancel(4));
        open.send(()).unwrap();

        assert!(queue
            .completions()
            .recv_timeout(Duration::from_millis(300))
            .is_err());
    }

    #[test]
    fn resubmitting_supersedes_the_earlier_fetch() {
        let (open, queue) = queue();
        let first = Notification::new(4, "first", "x");
        let second = Notification::new(4, "second", "x");
        queue
            .submit(first, "file:///1.png".into(), DeliveryOrigin::Posted)
            .unwrap();
        queue
            .submit(second, "file:///2.png".into(), DeliveryOrigin::Posted)
            .unwrap();
        open.send(()).unwrap();
        open.send(()).unwrap();

        let completion = queue
            .completions()
            .recv_timeout(Duration::from_secs(5))
            .unwrap();
        assert_eq!(completion.notification.title, "second");
        assert!(queue.take_completed(&completion));
    }
}
