use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};
use tokio::sync::oneshot;
use uuid::Uuid;

/// In-process notification channel for payment-order completion.
///
/// One-shot events keyed by order id: the settlement path is the only
/// producer, each subscription is delivered to at most once, and dropping a
/// subscription unregisters its waiter so an abandoned wait never leaks.
pub struct CompletionHub {
    waiters: Mutex<HashMap<Uuid, Vec<Waiter>>>,
    next_waiter_id: AtomicU64,
}

struct Waiter {
    id: u64,
    tx: oneshot::Sender<entity::payment_orders::Model>,
}

pub struct CompletionSubscription {
    hub: Arc<CompletionHub>,
    order_id: Uuid,
    waiter_id: u64,
    rx: oneshot::Receiver<entity::payment_orders::Model>,
}

impl CompletionHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            waiters: Mutex::new(HashMap::new()),
            next_waiter_id: AtomicU64::new(0),
        })
    }

    /// Register interest in one order. The returned subscription resolves
    /// when `notify` runs for that id and unregisters itself on drop.
    pub fn subscribe(self: &Arc<Self>, order_id: Uuid) -> CompletionSubscription {
        let (tx, rx) = oneshot::channel();
        let waiter_id = self.next_waiter_id.fetch_add(1, Ordering::Relaxed);

        self.waiters
            .lock()
            .expect("completion hub lock poisoned")
            .entry(order_id)
            .or_default()
            .push(Waiter { id: waiter_id, tx });

        CompletionSubscription {
            hub: Arc::clone(self),
            order_id,
            waiter_id,
            rx,
        }
    }

    /// Wake every waiter registered for this order.
    pub fn notify(&self, order: entity::payment_orders::Model) {
        let waiters = self
            .waiters
            .lock()
            .expect("completion hub lock poisoned")
            .remove(&order.id);

        if let Some(waiters) = waiters {
            for waiter in waiters {
                // A receiver that went away mid-flight is fine to ignore.
                let _ = waiter.tx.send(order.clone());
            }
        }
    }

    fn unsubscribe(&self, order_id: Uuid, waiter_id: u64) {
        let mut waiters = self.waiters.lock().expect("completion hub lock poisoned");
        if let Some(list) = waiters.get_mut(&order_id) {
            list.retain(|w| w.id != waiter_id);
            if list.is_empty() {
                waiters.remove(&order_id);
            }
        }
    }
}

impl CompletionSubscription {
    /// Resolves with the completed order, or `None` if the hub went away.
    pub async fn wait(&mut self) -> Option<entity::payment_orders::Model> {
        (&mut self.rx).await.ok()
    }
}

impl Drop for CompletionSubscription {
    fn drop(&mut self) {
        self.hub.unsubscribe(self.order_id, self.waiter_id);
    }
}
