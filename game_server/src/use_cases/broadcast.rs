use crate::use_cases::sessions::SessionRegistry;
use axum::extract::ws::Utf8Bytes;
use engine::wire::{self, Response};
use engine::Change;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Fans engine changes out to every bound session. Runs without the world
/// lock; changes carry everything the wire mapping needs.
pub async fn fan_out_changes(mut changes: mpsc::Receiver<Change>, sessions: Arc<SessionRegistry>) {
    while let Some(change) = changes.recv().await {
        let response = wire::response_for(&change);
        broadcast_response(&sessions, &response).await;
    }
    tracing::debug!("change channel closed; broadcaster exiting");
}

/// Serialises once, then pushes to each session's outbound queue in turn.
/// A session that cannot take the message gets its failure channel
/// signalled; delivery to the others continues.
pub async fn broadcast_response(sessions: &SessionRegistry, response: &Response) {
    let text = match serde_json::to_string(response) {
        Ok(text) => Utf8Bytes::from(text),
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize response");
            return;
        }
    };

    for session in sessions.snapshot().await {
        let Some(outbound) = &session.outbound else {
            continue;
        };
        if outbound.try_send(text.clone()).is_err() {
            tracing::warn!(player_id = %session.player_id, "broadcast failed; signalling session");
            session.signal_failure("failed to broadcast message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::use_cases::sessions::Session;
    use uuid::Uuid;

    #[tokio::test]
    async fn broadcast_reaches_only_bound_sessions() {
        let registry = SessionRegistry::new();

        let bound = Uuid::new_v4();
        registry.insert(Session::new(bound, Uuid::new_v4())).await;
        let (outbound_tx, mut outbound_rx) = mpsc::channel(4);
        registry.bind_stream(&bound, outbound_tx).await.unwrap();

        // A second session that never bound a stream is skipped.
        registry
            .insert(Session::new(Uuid::new_v4(), Uuid::new_v4()))
            .await;

        let id = Uuid::new_v4();
        broadcast_response(&registry, &Response::RemoveEntity { id }).await;

        let text = outbound_rx.try_recv().unwrap();
        let decoded: Response = serde_json::from_str(&text).unwrap();
        assert!(matches!(decoded, Response::RemoveEntity { id: got } if got == id));
    }

    #[tokio::test]
    async fn full_outbound_queue_signals_the_laggard_only() {
        let registry = SessionRegistry::new();

        let laggard = Uuid::new_v4();
        registry.insert(Session::new(laggard, Uuid::new_v4())).await;
        let (full_tx, _full_rx) = mpsc::channel(1);
        full_tx.try_send(Utf8Bytes::from("stale")).unwrap();
        let (_, mut laggard_failure) = registry.bind_stream(&laggard, full_tx).await.unwrap();

        let healthy = Uuid::new_v4();
        registry.insert(Session::new(healthy, Uuid::new_v4())).await;
        let (healthy_tx, mut healthy_rx) = mpsc::channel(4);
        let (_, mut healthy_failure) = registry.bind_stream(&healthy, healthy_tx).await.unwrap();

        broadcast_response(&registry, &Response::RemoveEntity { id: Uuid::new_v4() }).await;

        assert_eq!(
            laggard_failure.recv().await.as_deref(),
            Some("failed to broadcast message")
        );
        assert!(healthy_rx.try_recv().is_ok());
        assert!(healthy_failure.try_recv().is_err());
    }
}
