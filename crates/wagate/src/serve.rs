// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Server assembly: wires storage, the session manager, both queue workers,
//! and the HTTP gateway together, and tears them down in order on shutdown.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use wagate_config::WagateConfig;
use wagate_core::WagateError;
use wagate_gateway::{start_server, AppState};
use wagate_messaging::{MessageSender, MessageWorker};
use wagate_session::SessionManager;
use wagate_storage::Database;
use wagate_transport::loopback::LoopbackTransport;
use wagate_transport::Transport;
use wagate_webhook::{WebhookDispatcher, WebhookWorker};

pub async fn run(config: WagateConfig) -> Result<(), WagateError> {
    let db = Database::open(&config.storage.database_path).await?;
    tracing::info!(path = %config.storage.database_path, "database ready");

    let dispatcher = WebhookDispatcher::new(db.clone(), &config.webhook_queue);
    let transport: Arc<dyn Transport> = Arc::new(LoopbackTransport::new());
    let manager = SessionManager::new(
        db.clone(),
        transport,
        dispatcher,
        config.session.clone(),
        &config.storage.auth_dir,
    );

    let cancel = CancellationToken::new();

    let sender = MessageSender::new(db.clone(), manager.store());
    let message_worker = Arc::new(MessageWorker::new(db.clone(), sender, &config.message_queue));
    let webhook_worker = Arc::new(WebhookWorker::new(db.clone(), &config.webhook_queue));
    let workers = vec![
        tokio::spawn(message_worker.run(cancel.child_token())),
        tokio::spawn(webhook_worker.run(cancel.child_token())),
    ];

    // Restore runs in the background so the HTTP API is up immediately; the
    // per-session throttle can make a large restore take a while.
    let restore_manager = Arc::clone(&manager);
    tokio::spawn(async move {
        match restore_manager.restore().await {
            Ok(restored) => tracing::info!(restored, "session restore complete"),
            Err(e) => tracing::error!(error = %e, "session restore failed"),
        }
    });

    let state = AppState {
        db: db.clone(),
        manager,
        config: Arc::new(config),
    };
    let server_cancel = cancel.child_token();
    let server = tokio::spawn(async move { start_server(state, server_cancel).await });

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| WagateError::Internal(format!("cannot listen for shutdown signal: {e}")))?;
    tracing::info!("shutdown signal received");
    cancel.cancel();

    for worker in workers {
        let _ = worker.await;
    }
    match server.await {
        Ok(result) => result?,
        Err(e) => tracing::warn!(error = %e, "server task aborted"),
    }

    db.close().await?;
    tracing::info!("shutdown complete");
    Ok(())
}
