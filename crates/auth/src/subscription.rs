use futures_util::stream::{self, Stream};
use tokio::sync::watch;

use crate::session::Session;

/// Session snapshots as they change, starting with the first resolved one.
///
/// `Loading` is never yielded. Dropping the subscription, or calling
/// [`SessionSubscription::cancel`], releases the underlying receiver.
#[derive(Debug)]
pub struct SessionSubscription {
    receiver: Option<watch::Receiver<Session>>,
    primed: bool,
}

impl SessionSubscription {
    pub(crate) fn new(receiver: watch::Receiver<Session>) -> Self {
        Self {
            receiver: Some(receiver),
            primed: false,
        }
    }

    /// Wait for the next snapshot.
    ///
    /// The first call returns as soon as the session is resolved; later calls
    /// wait for a change. Returns `None` once cancelled or when the session
    /// manager is gone.
    pub async fn next(&mut self) -> Option<Session> {
        if !self.primed {
            return self.resolved().await;
        }

        let receiver = self.receiver.as_mut()?;
        loop {
            receiver.changed().await.ok()?;
            let session = receiver.borrow_and_update().clone();
            if session.is_resolved() {
                return Some(session);
            }
        }
    }

    /// The latest resolved snapshot, waiting only while the session is loading.
    pub async fn resolved(&mut self) -> Option<Session> {
        let receiver = self.receiver.as_mut()?;
        self.primed = true;
        let session = receiver.wait_for(Session::is_resolved).await.ok()?;
        Some(session.clone())
    }

    pub fn cancel(&mut self) {
        self.receiver = None;
    }

    pub fn is_cancelled(&self) -> bool {
        self.receiver.is_none()
    }

    pub fn into_stream(self) -> impl Stream<Item = Session> + Send {
        stream::unfold(self, |mut subscription| async move {
            let session = subscription.next().await?;
            Some((session, subscription))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn first_emission_skips_loading() {
        let (sender, receiver) = watch::channel(Session::Loading);
        let mut subscription = SessionSubscription::new(receiver);

        let waiter = tokio::spawn(async move { subscription.next().await });
        sender.send_replace(Session::Anonymous);

        assert_eq!(waiter.await.unwrap(), Some(Session::Anonymous));
    }

    #[tokio::test]
    async fn cancelled_subscription_ends() {
        let (_sender, receiver) = watch::channel(Session::Anonymous);
        let mut subscription = SessionSubscription::new(receiver);

        subscription.cancel();
        assert!(subscription.is_cancelled());
        assert_eq!(subscription.next().await, None);
    }

    #[tokio::test]
    async fn stream_ends_when_sender_is_dropped() {
        let (sender, receiver) = watch::channel(Session::Anonymous);
        let stream = SessionSubscription::new(receiver).into_stream();
        drop(sender);

        let sessions: Vec<Session> = stream.collect().await;
        assert_eq!(sessions, vec![Session::Anonymous]);
    }
}
