fn apply_cors_headers(headers: &mut axum::http::HeaderMap) {
    headers.insert(
        HeaderName::from_static("access-control-allow-origin"),
        HeaderValue::from_static("*"),
    );
    headers.insert(
        HeaderName::from_static("access-control-allow-methods"),
        HeaderValue::from_static("GET,POST,PUT,OPTIONS"),
    );
    headers.insert(
        HeaderName::from_static("access-control-allow-headers"),
        HeaderValue::from_static("*"),
    );
    headers.insert(
        HeaderName::from_static("access-control-max-age"),
        HeaderValue::from_static("3600"),
    );
}

/// `MISFORTUNE_SQLITE_PATH`, or `misfortune.sqlite` in the working directory.
pub fn default_sqlite_path() -> String {
    std::env::var("MISFORTUNE_SQLITE_PATH")
        .ok()
        .filter(|path| !path.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SQLITE_PATH.to_string())
}

fn discard_reason(discard: &Discard) -> &'static str {
    match discard {
        Discard::NotElectedWriter => "not_elected_writer",
        Discard::UnresolvedUser => "unresolved_user",
        Discard::PrivilegedUser { .. } => "privileged_user",
        Discard::UnresolvedRollValue => "unresolved_roll_value",
        Discard::NoMatch { .. } => "no_match",
    }
}

fn command_name(command: ChatCommand) -> &'static str {
    match command {
        ChatCommand::Status => "status",
        ChatCommand::Spend => "spend",
        ChatCommand::Reset => "reset",
        ChatCommand::Help => "help",
    }
}
