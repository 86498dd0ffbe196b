//! Server information
//!
//! A flat string map describing the server. Clients mostly look at
//! `api-version` and `project-samples-enabled`.

use axum::{
    extract::State,
    response::{IntoResponse, Response},
};
use std::collections::BTreeMap;

use crate::{
    access_log, api::response::ApiResponse, auth::Caller, auth::Session, config::ServerInfoConfig,
    error::ApiResult, features::AppState,
};

pub const API_VERSION: &str = "3.6";

pub fn server_information(config: &ServerInfoConfig) -> BTreeMap<String, String> {
    let mut info = BTreeMap::new();
    info.insert("api-version".to_string(), API_VERSION.to_string());
    info.insert(
        "archiving-configured".to_string(),
        config.archiving_configured.to_string(),
    );
    info.insert(
        "authentication-service".to_string(),
        config.authentication_service.clone(),
    );
    info.insert(
        "enabled-technologies".to_string(),
        config.enabled_technologies.join(", "),
    );
    info.insert(
        "project-samples-enabled".to_string(),
        config.project_samples_enabled.to_string(),
    );
    info.insert(
        "openbis-version".to_string(),
        env!("CARGO_PKG_VERSION").to_string(),
    );
    info
}

#[tracing::instrument(skip(session, config), fields(user = %session.user_id))]
pub fn handle(session: &Session, config: &ServerInfoConfig) -> BTreeMap<String, String> {
    access_log::record(&session.user_id, "get-server-information", &[]);
    server_information(config)
}

/// `GET /api/v3/server-information`
pub async fn get_server_information(
    State(state): State<AppState>,
    caller: Caller,
) -> ApiResult<Response> {
    let info = handle(&caller.session, &state.config.server_info);
    Ok(ApiResponse::success(info).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reports_every_key() {
        let info = server_information(&ServerInfoConfig::default());
        for key in [
            "api-version",
            "archiving-configured",
            "authentication-service",
            "enabled-technologies",
            "project-samples-enabled",
            "openbis-version",
        ] {
            assert!(info.contains_key(key), "missing {}", key);
        }
        assert_eq!(info["api-version"], "3.6");
        assert_eq!(info["project-samples-enabled"], "true");
    }
}
