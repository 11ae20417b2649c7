//! Notification of participants once a category is published.
//!
//! Publications are handed to a background task so that a slow webhook never delays the
//! response to the caller.
use tokio::sync::{mpsc, OwnedMutexGuard};

use crate::model::PublicationResult;

pub fn spawn(webhook: Option<String>) -> Notifier {
    let (tx, rx) = mpsc::channel(32);

    tokio::task::spawn(async move {
        let mut rx = NotifyReader { rx };
        let client = reqwest::Client::new();

        while let Some(publication) = rx.recv().await {
            log::info!(
                "Category {} of tournament {} published with {} opening matches",
                publication.category,
                publication.tournament,
                publication.opening_matches.len()
            );

            for m in &publication.opening_matches {
                log::debug!(
                    "Opening match {} ({} {}): {:?}",
                    m.id,
                    m.round,
                    m.number,
                    m.pairs
                );
            }

            if let Some(url) = &webhook {
                if let Err(err) = deliver(&client, url, &publication).await {
                    log::error!("Failed to deliver publication to {}: {}", url, err);
                }
            }
        }

        log::debug!("All Notifiers dropped, stopping publication notifications");
    });

    Notifier { tx }
}

async fn deliver(
    client: &reqwest::Client,
    url: &str,
    publication: &PublicationResult,
) -> Result<(), reqwest::Error> {
    client
        .post(url)
        .json(publication)
        .send()
        .await?
        .error_for_status()?;

    Ok(())
}

#[derive(Debug)]
pub struct NotifyReader {
    rx: mpsc::Receiver<PublicationResult>,
}

impl NotifyReader {
    pub async fn recv(&mut self) -> Option<PublicationResult> {
        self.rx.recv().await
    }
}

#[derive(Clone, Debug)]
pub struct Notifier {
    tx: mpsc::Sender<PublicationResult>,
}

impl Notifier {
    pub async fn send(&self, publication: PublicationResult) {
        if self.tx.send(publication).await.is_err() {
            log::warn!("Publication notifier is not running");
        }
    }

    /// Releases the tournament lock `guard`, then sends `publication`. Waiting for room in
    /// a full queue never blocks other operations on the tournament.
    pub async fn send_unlocked(
        &self,
        guard: OwnedMutexGuard<()>,
        publication: PublicationResult,
    ) {
        drop(guard);
        self.send(publication).await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::{Notifier, NotifyReader};
    use crate::model::{CategoryId, PublicationResult, TournamentId, TournamentState};
    use crate::state::TournamentLocks;

    fn publication(category: u64) -> PublicationResult {
        PublicationResult {
            tournament: TournamentId(1),
            category: CategoryId(category),
            tournament_state: TournamentState::InProgress,
            opening_matches: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_notifier_send() {
        let (tx, rx) = mpsc::channel(1);
        let notifier = Notifier { tx };
        let mut reader = NotifyReader { rx };

        let publication = publication(2);

        notifier.send(publication.clone()).await;
        assert_eq!(reader.recv().await, Some(publication));

        drop(notifier);
        assert_eq!(reader.recv().await, None);
    }

    #[tokio::test]
    async fn test_send_unlocked_with_full_queue() {
        let (tx, rx) = mpsc::channel(1);
        let notifier = Notifier { tx };
        let mut reader = NotifyReader { rx };
        let locks = TournamentLocks::default();

        notifier.send(publication(1)).await;

        let guard = locks.lock(TournamentId(1)).await;
        let sender = notifier.clone();
        let pending =
            tokio::task::spawn(async move { sender.send_unlocked(guard, publication(2)).await });

        // The queue is full, yet the tournament can be locked again.
        let relock = tokio::time::timeout(Duration::from_millis(100), locks.lock(TournamentId(1)));
        assert!(relock.await.is_ok());
        assert!(!pending.is_finished());

        assert_eq!(reader.recv().await, Some(publication(1)));
        pending.await.unwrap();
        assert_eq!(reader.recv().await, Some(publication(2)));
    }
}
