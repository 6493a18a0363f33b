use actix_web::{web, HttpRequest, HttpResponse};
use actix_ws::{CloseReason, Message};
use tracing::{debug, info};

use crate::AppState;

/// Upgrades to a WebSocket that streams upload progress for `client_id`.
/// Client frames other than ping and close are ignored.
pub async fn progress_socket(
    req: HttpRequest,
    body: web::Payload,
    client_id: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let (response, mut session, mut messages) = actix_ws::handle(&req, body)?;

    let client_id = client_id.into_inner();
    let hub = state.progress.clone();
    let (subscription, mut updates) = hub.subscribe(&client_id);
    info!(%client_id, "progress socket connected");

    actix_web::rt::spawn(async move {
        let reason: Option<CloseReason> = loop {
            tokio::select! {
                update = updates.recv() => match update {
                    Some(text) => {
                        if session.text(text).await.is_err() {
                            break None;
                        }
                    }
                    None => break None,
                },
                incoming = messages.recv() => match incoming {
                    Some(Ok(Message::Ping(bytes))) => {
                        if session.pong(&bytes).await.is_err() {
                            break None;
                        }
                    }
                    Some(Ok(Message::Close(reason))) => break reason,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(%client_id, error = %e, "progress socket protocol error");
                        break None;
                    }
                    None => break None,
                },
            }
        };

        hub.unsubscribe(&client_id, subscription);
        let _ = session.close(reason).await;
        info!(%client_id, "progress socket closed");
    });

    Ok(response)
}
