use axum::{extract::State, http::StatusCode, response::Json};
use diesel::{sql_query, RunQueryDsl};
use serde_json::{json, Value};

use crate::error::AppResult;
use crate::state::AppState;

pub async fn index() -> Json<Value> {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "users": "/api/users",
            "protocols": "/api/protocols",
            "health": "/api/health",
        },
    }))
}

/// Reports ok only after a round-trip to the database.
pub async fn health_check(State(state): State<AppState>) -> AppResult<(StatusCode, Json<Value>)> {
    let mut conn = state.db()?;
    sql_query("SELECT 1").execute(&mut conn)?;
    Ok((StatusCode::OK, Json(json!({ "status": "ok" }))))
}
