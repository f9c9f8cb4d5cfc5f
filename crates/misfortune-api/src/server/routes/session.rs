#[derive(Debug, Deserialize)]
struct DisconnectRequest {
    user_id: String,
}

#[derive(Debug, Serialize)]
struct RosterResponse {
    schema_version: String,
    elected_writer: Option<String>,
    users: Vec<ConnectedUser>,
}

impl RosterResponse {
    fn from_module(module: &MisfortuneModule<Outbox>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            elected_writer: module
                .elected_writer()
                .map(|writer| writer.user_id.clone()),
            users: module.roster().users().to_vec(),
        }
    }
}

async fn connect_user(
    State(state): State<AppState>,
    Json(user): Json<ConnectedUser>,
) -> Result<Json<RosterResponse>, HttpApiError> {
    if user.user_id.trim().is_empty() {
        return Err(HttpApiError::invalid_request("user_id must not be empty", None));
    }

    let (response, messages) = {
        let mut inner = state.inner.lock().await;
        inner.module.connect(user);
        let mut messages = collect_delta_messages(&mut inner);
        messages.push(Outbound::RosterChanged);
        (RosterResponse::from_module(&inner.module), messages)
    };

    broadcast_messages(&state, messages);
    Ok(Json(response))
}

async fn disconnect_user(
    State(state): State<AppState>,
    Json(request): Json<DisconnectRequest>,
) -> Result<Json<RosterResponse>, HttpApiError> {
    let (response, messages) = {
        let mut inner = state.inner.lock().await;
        inner.require_user(&request.user_id)?;
        inner.module.disconnect(&request.user_id);
        let mut messages = collect_delta_messages(&mut inner);
        messages.push(Outbound::RosterChanged);
        (RosterResponse::from_module(&inner.module), messages)
    };

    broadcast_messages(&state, messages);
    Ok(Json(response))
}

async fn get_roster(State(state): State<AppState>) -> Json<RosterResponse> {
    let inner = state.inner.lock().await;
    Json(RosterResponse::from_module(&inner.module))
}
