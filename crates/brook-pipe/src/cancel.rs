use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use parking_lot::Mutex;

/// Uninhabited message type: the cancellation channel only ever signals by
/// disconnecting.
#[derive(Debug)]
pub enum Never {}

/// Cancels the paired [`CancelToken`]s. Cloneable and idempotent.
#[derive(Clone)]
pub struct Canceller {
    sender: Arc<Mutex<Option<Sender<Never>>>>,
}

impl Canceller {
    pub fn cancel(&self) {
        self.sender.lock().take();
    }
}

/// Observer side of a cancellation. Blocking operations select on
/// [`CancelToken::channel`] next to their primary wait; the channel
/// disconnects when the [`Canceller`] fires.
#[derive(Clone)]
pub struct CancelToken {
    receiver: Receiver<Never>,
}

impl CancelToken {
    /// The channel to use as a `select!` arm.
    pub fn channel(&self) -> &Receiver<Never> {
        &self.receiver
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.receiver.try_recv(), Err(TryRecvError::Disconnected))
    }
}

/// Creates a connected canceller/token pair.
pub fn cancellation() -> (Canceller, CancelToken) {
    let (sender, receiver) = bounded(0);
    (
        Canceller {
            sender: Arc::new(Mutex::new(Some(sender))),
        },
        CancelToken { receiver },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_observes_cancel() {
        let (canceller, token) = cancellation();
        assert!(!token.is_cancelled());
        canceller.cancel();
        assert!(token.is_cancelled());
        canceller.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn clones_share_state() {
        let (canceller, token) = cancellation();
        let other = token.clone();
        canceller.clone().cancel();
        assert!(token.is_cancelled());
        assert!(other.is_cancelled());
    }
}
