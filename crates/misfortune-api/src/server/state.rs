#[derive(Clone)]
struct AppState {
    inner: std::sync::Arc<Mutex<ServerInner>>,
    stream_tx: broadcast::Sender<Outbound>,
}

impl AppState {
    fn open(sqlite_path: &Path) -> Result<Self, TableError> {
        Ok(Self::with_module(open_table(sqlite_path)?))
    }

    fn with_module(module: MisfortuneModule<Outbox>) -> Self {
        let (stream_tx, _) = broadcast::channel(STREAM_CAPACITY);
        Self {
            inner: std::sync::Arc::new(Mutex::new(ServerInner {
                module,
                reported_persistence_error: None,
            })),
            stream_tx,
        }
    }
}

struct ServerInner {
    module: MisfortuneModule<Outbox>,
    reported_persistence_error: Option<String>,
}

impl ServerInner {
    fn require_user(&self, user_id: &str) -> Result<&ConnectedUser, HttpApiError> {
        self.module
            .roster()
            .get(user_id)
            .ok_or_else(|| HttpApiError::user_not_found(user_id))
    }
}

/// One effect fanned out to every stream socket. Each socket filters by its
/// own user and role before forwarding.
#[derive(Debug, Clone)]
enum Outbound {
    Replication(ReplicationMessage),
    Chat(ChatCard),
    Notice(Notice),
    Rerender { config: TriggerConfig, pool: u64 },
    Warning(String),
    /// A user joined, left or changed role; sockets re-check their user.
    RosterChanged,
}

fn collect_delta_messages(inner: &mut ServerInner) -> Vec<Outbound> {
    let effects = inner.module.host_mut().take();
    let mut messages = Vec::with_capacity(
        effects.replicated.len() + effects.chat.len() + effects.notices.len() + 1,
    );

    messages.extend(effects.replicated.into_iter().map(Outbound::Replication));
    messages.extend(effects.chat.into_iter().map(Outbound::Chat));
    messages.extend(effects.notices.into_iter().map(Outbound::Notice));

    let last_error = inner.module.last_persistence_error().map(str::to_string);
    if last_error.is_some() && last_error != inner.reported_persistence_error {
        if let Some(error) = &last_error {
            messages.push(Outbound::Warning(format!(
                "failed to persist misfortune state: {error}"
            )));
        }
    }
    inner.reported_persistence_error = last_error;

    messages
}

fn broadcast_messages(state: &AppState, messages: Vec<Outbound>) {
    for message in messages {
        let _ = state.stream_tx.send(message);
    }
}
