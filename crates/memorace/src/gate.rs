use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::oneshot;

/// A one-shot gate that exactly one of several racing participants may pass.
///
/// The gate owns the sending half of a [`oneshot`] channel. Passing the gate means taking
/// that sender out of its slot, which happens under a lock, so there is a single winner even
/// when participants run on different threads. Everyone else finds the slot empty.
#[derive(Debug)]
pub(crate) struct DeliveryGate<T> {
    sender: Mutex<Option<oneshot::Sender<T>>>,
}

impl<T> DeliveryGate<T> {
    /// Creates an open gate, and the receiver that the winner delivers to.
    pub fn new() -> (Arc<Self>, oneshot::Receiver<T>) {
        let (sender, receiver) = oneshot::channel();
        let gate = Self {
            sender: Mutex::new(Some(sender)),
        };
        (Arc::new(gate), receiver)
    }

    fn take(&self) -> Option<oneshot::Sender<T>> {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Tries to pass the gate and deliver `value`.
    ///
    /// Returns `true` if this call passed the gate and the receiver was still around to
    /// accept the value.
    pub fn deliver(&self, value: T) -> bool {
        match self.take() {
            Some(sender) => sender.send(value).is_ok(),
            None => false,
        }
    }

    /// Closes the gate without delivering anything.
    ///
    /// Returns `true` if the gate was still open, i.e. nobody has delivered.
    pub fn close(&self) -> bool {
        self.take().is_some()
    }
}
