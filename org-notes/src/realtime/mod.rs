mod event;
mod routes;

use tokio::sync::broadcast;

use crate::{notes::Note, users::User};

pub use event::{ChangeEvent, EventKind};
pub use routes::router;

/// One fan-out channel per table. Publishing with no subscribers is not an error.
#[derive(Clone)]
pub struct Channel<T> {
    sender: broadcast::Sender<ChangeEvent<T>>,
}

impl<T: Clone> Channel<T> {
    fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: ChangeEvent<T>) {
        let kind = event.kind();
        let receivers = self.sender.send(event).unwrap_or(0);
        tracing::debug!(event = kind.as_str(), receivers, "change published");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent<T>> {
        self.sender.subscribe()
    }
}

#[derive(Clone)]
pub struct Changes {
    pub notes: Channel<Note>,
    pub users: Channel<User>,
}

impl Changes {
    pub fn new(capacity: usize) -> Self {
        Self {
            notes: Channel::new(capacity),
            users: Channel::new(capacity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_see_events_published_after_they_subscribe() {
        let channel = Channel::<u32>::new(4);
        channel.publish(ChangeEvent::Created { new: 0 });

        let mut receiver = channel.subscribe();
        channel.publish(ChangeEvent::Created { new: 1 });
        channel.publish(ChangeEvent::Removed { old: 1 });

        assert_eq!(receiver.recv().await.unwrap(), ChangeEvent::Created { new: 1 });
        assert_eq!(receiver.recv().await.unwrap(), ChangeEvent::Removed { old: 1 });
    }

    #[tokio::test]
    async fn slow_subscribers_lag() {
        let channel = Channel::<u32>::new(2);
        let mut receiver = channel.subscribe();

        for n in 0..5 {
            channel.publish(ChangeEvent::Created { new: n });
        }

        assert!(matches!(
            receiver.recv().await,
            Err(broadcast::error::RecvError::Lagged(3))
        ));
    }
}
