#[derive(Debug, Serialize)]
struct RollResponse {
    schema_version: String,
    triggered: bool,
    user_id: Option<String>,
    roll: Option<i64>,
    pool: Option<u64>,
    discarded: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    user_id: String,
    text: String,
}

#[derive(Debug, Serialize)]
struct ChatResponse {
    schema_version: String,
    consumed: bool,
    command: Option<&'static str>,
    refusal: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct UserQuery {
    user_id: String,
}

#[derive(Debug, Serialize)]
struct TrackerResponse {
    schema_version: String,
    visible: bool,
    tracker: Option<TrackerRender>,
}

#[derive(Debug, Deserialize)]
struct ControlRequest {
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct ConfirmResetRequest {
    user_id: String,
    confirm: bool,
}

#[derive(Debug, Serialize)]
struct ControlResponse {
    schema_version: String,
    outcome: &'static str,
    pool: Option<u64>,
    prompt: Option<Value>,
}

impl ControlResponse {
    fn from_outcome(outcome: ControlOutcome) -> Self {
        let (label, pool, prompt) = match outcome {
            ControlOutcome::Applied { pool } => ("applied", Some(pool), None),
            ControlOutcome::ConfirmationRequired(prompt) => (
                "confirmation_required",
                None,
                Some(json!({
                    "title": prompt.title,
                    "content": prompt.content,
                    "confirm_label": prompt.confirm_label,
                    "cancel_label": prompt.cancel_label,
                })),
            ),
            ControlOutcome::Cancelled => ("cancelled", None, None),
        };

        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            outcome: label,
            pool,
            prompt,
        }
    }
}

#[derive(Debug, Serialize)]
struct LogResponse {
    schema_version: String,
    entries: Vec<LogViewEntry>,
}

#[derive(Debug, Serialize)]
struct ConfigResponse {
    schema_version: String,
    config: TriggerConfig,
}

#[derive(Debug, Deserialize)]
struct UpdateConfigRequest {
    user_id: String,
    #[serde(flatten)]
    patch: TriggerConfigPatch,
}

async fn submit_roll(
    State(state): State<AppState>,
    Json(event): Json<RollTestEvent>,
) -> Json<RollResponse> {
    let (outcome, messages) = {
        let mut inner = state.inner.lock().await;
        let outcome = inner.module.handle_roll(&event);
        (outcome, collect_delta_messages(&mut inner))
    };

    broadcast_messages(&state, messages);

    let response = match outcome {
        RollOutcome::Triggered {
            user_id, roll, pool, ..
        } => RollResponse {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            triggered: true,
            user_id: Some(user_id),
            roll: Some(roll),
            pool: Some(pool),
            discarded: None,
        },
        RollOutcome::Discarded(discard) => RollResponse {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            triggered: false,
            user_id: None,
            roll: None,
            pool: None,
            discarded: Some(discard_reason(&discard)),
        },
    };

    Json(response)
}

async fn submit_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Json<ChatResponse> {
    let (disposition, messages) = {
        let mut inner = state.inner.lock().await;
        let disposition = inner.module.handle_chat(&request.user_id, &request.text);
        (disposition, collect_delta_messages(&mut inner))
    };

    broadcast_messages(&state, messages);

    let (consumed, command, refusal) = match disposition {
        ChatDisposition::PassThrough => (false, None, None),
        ChatDisposition::Handled(command) => (true, Some(command_name(command)), None),
        ChatDisposition::Refused { command, reason } => (
            true,
            Some(command_name(command)),
            Some(HttpApiError::from_authority(reason).error),
        ),
    };

    Json(ChatResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        consumed,
        command,
        refusal,
    })
}

async fn get_tracker(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<TrackerResponse>, HttpApiError> {
    let inner = state.inner.lock().await;
    let role = inner.require_user(&query.user_id)?.role;
    let tracker = inner.module.tracker_for(role);

    Ok(Json(TrackerResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        visible: tracker.is_some(),
        tracker,
    }))
}

async fn press_control(
    State(state): State<AppState>,
    UrlPath(control): UrlPath<String>,
    Json(request): Json<ControlRequest>,
) -> Result<Json<ControlResponse>, HttpApiError> {
    let Some(control) = TrackerControl::parse(&control) else {
        return Err(HttpApiError::invalid_request(
            "unknown tracker control",
            Some(format!("control={control} expected one of spend, add, reset")),
        ));
    };

    let (outcome, messages) = {
        let mut inner = state.inner.lock().await;
        let outcome = inner.module.press_control(&request.user_id, control);
        (outcome, collect_delta_messages(&mut inner))
    };

    broadcast_messages(&state, messages);
    let outcome = outcome.map_err(HttpApiError::from_authority)?;
    Ok(Json(ControlResponse::from_outcome(outcome)))
}

async fn confirm_reset(
    State(state): State<AppState>,
    Json(request): Json<ConfirmResetRequest>,
) -> Result<Json<ControlResponse>, HttpApiError> {
    let (outcome, messages) = {
        let mut inner = state.inner.lock().await;
        let outcome = inner.module.confirm_reset(&request.user_id, request.confirm);
        (outcome, collect_delta_messages(&mut inner))
    };

    broadcast_messages(&state, messages);
    let outcome = outcome.map_err(HttpApiError::from_authority)?;
    Ok(Json(ControlResponse::from_outcome(outcome)))
}

async fn get_log(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<LogResponse>, HttpApiError> {
    let inner = state.inner.lock().await;
    let entries = inner
        .module
        .log_view(&query.user_id)
        .map_err(HttpApiError::from_authority)?;

    Ok(Json(LogResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        entries,
    }))
}

async fn get_config(State(state): State<AppState>) -> Json<ConfigResponse> {
    let inner = state.inner.lock().await;
    Json(ConfigResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        config: inner.module.config().clone(),
    })
}

async fn update_config(
    State(state): State<AppState>,
    Json(request): Json<UpdateConfigRequest>,
) -> Result<Json<ConfigResponse>, HttpApiError> {
    let (config, messages) = {
        let mut inner = state.inner.lock().await;
        let config = inner
            .module
            .update_config(&request.user_id, &request.patch)
            .map_err(HttpApiError::from_authority)?;
        let mut messages = collect_delta_messages(&mut inner);
        messages.push(Outbound::Rerender {
            config: config.clone(),
            pool: inner.module.pool(),
        });
        (config, messages)
    };

    broadcast_messages(&state, messages);
    Ok(Json(ConfigResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        config,
    }))
}
