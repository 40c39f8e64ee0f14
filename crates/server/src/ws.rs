//! Client-facing WebSocket endpoint.
//!
//! One connection maps to one participant. Inbound frames are decoded into
//! [`ClientMessage`] and dispatched through the [`Coordinator`]; outbound
//! [`ServerEvent`]s arrive on the connection's private channel and are pushed
//! by a dedicated send task, so a slow socket never blocks a session.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::routing::get;
use cobrowse::Coordinator;
use cobrowse::error::CoreError;
use cobrowse_protocol::{ClientMessage, ServerEvent};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub async fn run_server(host: &str, port: u16, coordinator: Coordinator) -> Result<()> {
	let app = Router::new()
		.route("/", get(|| async { "OK" }))
		.route(
			"/ws",
			get(
				|ws: WebSocketUpgrade, State(coordinator): State<Coordinator>| async move {
					ws.on_upgrade(|socket| handle_socket(socket, coordinator))
				},
			),
		)
		.with_state(coordinator);

	let addr: SocketAddr = format!("{host}:{port}")
		.parse()
		.with_context(|| format!("invalid host/port combination: {host}:{port}"))?;

	info!(target = "cobrowse.ws", host, port, "listening for clients");

	let listener = TcpListener::bind(addr)
		.await
		.with_context(|| format!("failed to bind {addr}"))?;

	axum::serve(listener, app.into_make_service())
		.await
		.context("server error")
}

async fn handle_socket(socket: WebSocket, coordinator: Coordinator) {
	let connection_id = Uuid::new_v4().to_string();
	info!(target = "cobrowse.ws", connection = %connection_id, "client connected");

	let (events_tx, events_rx) = mpsc::unbounded_channel::<ServerEvent>();
	let mut events = UnboundedReceiverStream::new(events_rx);
	let (mut ws_tx, mut ws_rx) = socket.split();

	let send_task = tokio::spawn(async move {
		while let Some(event) = events.next().await {
			let Ok(json) = serde_json::to_string(&event) else {
				continue;
			};
			if ws_tx.send(Message::Text(json.into())).await.is_err() {
				break;
			}
		}
	});

	while let Some(msg) = ws_rx.next().await {
		match msg {
			Ok(Message::Text(text)) => {
				if let Err(err) = dispatch(&coordinator, &connection_id, &events_tx, &text).await {
					debug!(
						target = "cobrowse.ws",
						connection = %connection_id,
						error = %err,
						"request failed"
					);
					let _ = events_tx.send(ServerEvent::Error {
						code: err.code().to_string(),
						message: err.to_string(),
					});
				}
			}
			Ok(Message::Close(_)) => break,
			Ok(_) => {}
			Err(err) => {
				warn!(
					target = "cobrowse.ws",
					connection = %connection_id,
					error = %err,
					"websocket error"
				);
				break;
			}
		}
	}

	// Transport drop doubles as leave; the session actor decides what that
	// means for control and lifecycle.
	coordinator.disconnect(&connection_id).await;
	send_task.abort();
	info!(target = "cobrowse.ws", connection = %connection_id, "client disconnected");
}

async fn dispatch(
	coordinator: &Coordinator,
	connection_id: &str,
	events: &mpsc::UnboundedSender<ServerEvent>,
	raw: &str,
) -> std::result::Result<(), CoreError> {
	let message: ClientMessage = serde_json::from_str(raw)?;
	match message {
		ClientMessage::CreateSession {
			name,
			user_id,
			user_name,
		} => {
			// The generated ID reaches the client in `session-created`.
			coordinator
				.create_session(&name, &user_id, &user_name, connection_id, events.clone())
				.await?;
		}
		ClientMessage::JoinSession {
			session_id,
			user_id,
			user_name,
		} => {
			coordinator
				.join_session(&session_id, &user_id, &user_name, connection_id, events.clone())
				.await?;
		}
		ClientMessage::Action {
			action,
			force_control,
		} => {
			coordinator
				.perform_action(connection_id, action, force_control)
				.await?;
		}
		ClientMessage::Annotation { annotation } => {
			coordinator.add_annotation(connection_id, annotation).await?;
		}
		ClientMessage::Comment {
			text,
			attached_to,
			is_issue,
		} => {
			coordinator
				.add_comment(connection_id, &text, attached_to, is_issue)
				.await?;
		}
		ClientMessage::RequestControl => {
			coordinator.request_control(connection_id).await?;
		}
	}
	Ok(())
}
