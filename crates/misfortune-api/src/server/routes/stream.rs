#[derive(Debug, Deserialize)]
struct ClientFrame {
    #[serde(rename = "type")]
    frame_type: String,
}

async fn stream_table(
    Query(query): Query<UserQuery>,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, HttpApiError> {
    let session = {
        let inner = state.inner.lock().await;
        let role = inner.require_user(&query.user_id)?.role;
        StreamSession::new(
            query.user_id,
            role,
            inner.module.config().clone(),
            inner.module.pool(),
        )
    };

    Ok(ws.on_upgrade(move |socket| stream_socket(socket, state, session)))
}

/// Per-socket display state. The socket owns its tracker; replication only
/// ever touches this view, never the shared pool.
struct StreamSession {
    user_id: String,
    role: UserRole,
    config: TriggerConfig,
    view: TrackerView,
}

impl StreamSession {
    fn new(user_id: String, role: UserRole, config: TriggerConfig, pool: u64) -> Self {
        let mut view = TrackerView::new(role);
        view.render(&config, pool);
        Self {
            user_id,
            role,
            config,
            view,
        }
    }

    fn state_message(&self) -> StreamMessage {
        StreamMessage::tracker("tracker.state", self.view.current())
    }

    fn rerender(&mut self, config: TriggerConfig, pool: u64) -> StreamMessage {
        self.config = config;
        self.view.teardown();
        self.view.render(&self.config, pool);
        StreamMessage::tracker("tracker.rerender", self.view.current())
    }

    /// Bring the session in line with the roster. A role change redraws the
    /// tracker so controls and visibility follow the new role.
    fn sync_role(&mut self, role: UserRole, pool: u64) -> Option<StreamMessage> {
        if role == self.role {
            return None;
        }

        info!(user_id = %self.user_id, from = ?self.role, to = ?role, "stream role changed");
        self.role = role;
        self.view.set_viewer_role(role);
        let config = self.config.clone();
        Some(self.rerender(config, pool))
    }

    /// Filter one effect against the user's current roster entry. `presence`
    /// is `None` once the user has left the table, which ends the stream.
    fn translate(&mut self, outbound: Outbound, presence: Option<Presence>) -> Delivery {
        let Some(presence) = presence else {
            return Delivery::Close;
        };

        let mut frames: Vec<StreamMessage> =
            self.sync_role(presence.role, presence.pool).into_iter().collect();

        let frame = match outbound {
            Outbound::Replication(message) => {
                let cue = replication::apply_to_view(&mut self.view, &message, &self.config);
                Some(StreamMessage::tracker_update(
                    &message,
                    cue,
                    self.view.current(),
                ))
            }
            Outbound::Chat(card) => card
                .audience
                .includes(&self.user_id, self.role)
                .then(|| StreamMessage::chat_card(&card)),
            // Unaddressed notices belong to whoever acts as the GM at this table.
            Outbound::Notice(notice) => {
                let addressed = notice
                    .recipient
                    .as_deref()
                    .map_or(self.role.is_privileged(), |recipient| recipient == self.user_id);
                addressed.then(|| StreamMessage::notice(&notice))
            }
            Outbound::Rerender { config, pool } => Some(self.rerender(config, pool)),
            Outbound::Warning(warning) => self
                .role
                .is_privileged()
                .then(|| StreamMessage::warning(warning)),
            Outbound::RosterChanged => None,
        };

        frames.extend(frame);
        Delivery::Frames(frames)
    }
}

/// The roster entry a socket is checked against before each delivery.
#[derive(Debug, Clone, Copy)]
struct Presence {
    role: UserRole,
    pool: u64,
}

impl Presence {
    fn lookup(inner: &ServerInner, user_id: &str) -> Option<Self> {
        inner.module.roster().get(user_id).map(|user| Self {
            role: user.role,
            pool: inner.module.pool(),
        })
    }
}

#[derive(Debug)]
enum Delivery {
    Frames(Vec<StreamMessage>),
    Close,
}

async fn stream_socket(mut socket: WebSocket, state: AppState, mut session: StreamSession) {
    if send_stream_message(&mut socket, &session.state_message())
        .await
        .is_err()
    {
        return;
    }

    let mut rx = state.stream_tx.subscribe();

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let Ok(frame) = serde_json::from_str::<ClientFrame>(text.as_str()) else {
                            continue;
                        };
                        if frame.frame_type != "scene_changed" {
                            continue;
                        }

                        let current = {
                            let inner = state.inner.lock().await;
                            Presence::lookup(&inner, &session.user_id)
                                .map(|presence| (presence, inner.module.config().clone()))
                        };
                        let Some((presence, config)) = current else {
                            break;
                        };
                        session.sync_role(presence.role, presence.pool);
                        let message = session.rerender(config, presence.pool);
                        if send_stream_message(&mut socket, &message).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        if socket.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => {
                        break;
                    }
                    _ => {}
                }
            }
            outgoing = rx.recv() => {
                match outgoing {
                    Ok(outbound) => {
                        let presence = {
                            let inner = state.inner.lock().await;
                            Presence::lookup(&inner, &session.user_id)
                        };

                        let frames = match session.translate(outbound, presence) {
                            Delivery::Frames(frames) => frames,
                            Delivery::Close => {
                                info!(user_id = %session.user_id, "user left the table, closing stream");
                                let closing = StreamMessage::session_closed();
                                let _ = send_stream_message(&mut socket, &closing).await;
                                let _ = socket.send(Message::Close(None)).await;
                                break;
                            }
                        };

                        let mut failed = false;
                        for frame in &frames {
                            if send_stream_message(&mut socket, frame).await.is_err() {
                                failed = true;
                                break;
                            }
                        }
                        if failed {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(user_id = %session.user_id, skipped, "stream client lagged");
                        let warning = StreamMessage::warning(format!(
                            "stream client lagged and skipped {skipped} message(s)"
                        ));

                        if send_stream_message(&mut socket, &warning).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        }
    }
}

async fn send_stream_message(
    socket: &mut WebSocket,
    message: &StreamMessage,
) -> Result<(), axum::Error> {
    let payload = serde_json::to_string(message).map_err(axum::Error::new)?;
    socket.send(Message::Text(payload.into())).await
}

#[derive(Debug, Clone, Serialize)]
struct StreamMessage {
    schema_version: String,
    #[serde(rename = "type")]
    message_type: String,
    payload: Value,
}

impl StreamMessage {
    fn new(message_type: &str, payload: Value) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            message_type: message_type.to_string(),
            payload,
        }
    }

    fn tracker(message_type: &str, tracker: Option<&TrackerRender>) -> Self {
        Self::new(message_type, json!({ "tracker": tracker }))
    }

    fn tracker_update(
        message: &ReplicationMessage,
        cue: Option<DisplayCue>,
        tracker: Option<&TrackerRender>,
    ) -> Self {
        Self::new(
            "tracker.update",
            json!({
                "socket": SOCKET_NAME,
                "message": message,
                "cue": cue,
                "tracker": tracker,
            }),
        )
    }

    fn chat_card(card: &ChatCard) -> Self {
        Self::new("chat.message", json!(card))
    }

    fn notice(notice: &Notice) -> Self {
        Self::new("notice", json!(notice))
    }

    fn session_closed() -> Self {
        Self::new(
            "session.closed",
            json!({ "message": "user is no longer connected to the table" }),
        )
    }

    fn warning(warning: String) -> Self {
        Self::new("warning", json!({ "message": warning }))
    }
}
