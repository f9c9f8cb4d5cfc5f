#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("server io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to open table: {0}")]
    Table(#[from] TableError),
    #[error("failed to flush table state: {0}")]
    Store(#[from] misfortune_core::StoreError),
}

#[derive(Debug)]
struct HttpApiError {
    status: StatusCode,
    error: ApiError,
}

impl HttpApiError {
    fn invalid_request(message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: ApiError::new(ErrorCode::InvalidRequest, message, details),
        }
    }

    fn user_not_found(user_id: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            error: ApiError::new(
                ErrorCode::UserNotFound,
                "user_id does not match a connected user",
                Some(format!("user_id={user_id}")),
            ),
        }
    }

    fn from_authority(err: AuthorityError) -> Self {
        let message = err.to_string();
        match err {
            AuthorityError::UnknownUser(user_id) => Self::user_not_found(&user_id),
            AuthorityError::Unauthorized { user_id, .. } => Self {
                status: StatusCode::FORBIDDEN,
                error: ApiError::new(
                    ErrorCode::Unauthorized,
                    message,
                    Some(format!("user_id={user_id}")),
                ),
            },
            AuthorityError::InsufficientBalance => Self {
                status: StatusCode::CONFLICT,
                error: ApiError::new(
                    ErrorCode::InsufficientBalance,
                    "No Misfortune points to spend!",
                    None,
                ),
            },
            AuthorityError::NegativeTriggerValue(trigger_value) => Self::invalid_request(
                message,
                Some(format!("trigger_value={trigger_value}")),
            ),
            AuthorityError::NoPendingReset(user_id) => Self {
                status: StatusCode::CONFLICT,
                error: ApiError::new(
                    ErrorCode::ConfirmationRequired,
                    message,
                    Some(format!("user_id={user_id}")),
                ),
            },
        }
    }
}

impl IntoResponse for HttpApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.error)).into_response()
    }
}
