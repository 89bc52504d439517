use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::models::{ProtocolSummary, User, UserCategory};
use crate::pagination::PageRequest;
use crate::response::ApiResponse;
use crate::routes::record_id;
use crate::services::users::{self as user_service, NewUserInput, UserChanges, UserFilter};
use crate::services::RecordError;
use crate::state::AppState;
use crate::utils::time::to_iso;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListUsersQuery {
    pub category: Option<String>,
    pub active: Option<String>,
    pub search_text: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
}

impl ListUsersQuery {
    fn filter(&self) -> Result<UserFilter, RecordError> {
        let category = self
            .category
            .as_deref()
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| raw.parse::<UserCategory>().map_err(RecordError::invalid))
            .transpose()?;
        Ok(UserFilter {
            category,
            active: self.active.as_deref().map(|raw| raw == "true"),
            search_text: self
                .search_text
                .as_deref()
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .map(str::to_owned),
        })
    }

    fn page_request(&self) -> PageRequest {
        PageRequest::from_params(self.page.as_deref(), self.page_size.as_deref())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: i32,
    pub full_name: String,
    pub email: String,
    pub registration_id: String,
    pub category: String,
    pub active: bool,
    pub validated: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            full_name: user.full_name,
            email: user.email,
            registration_id: user.registration_id,
            category: user.category,
            active: user.active,
            validated: user.validated,
            created_at: to_iso(user.created_at),
            updated_at: to_iso(user.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolSummaryResponse {
    pub id: i32,
    pub protocol_number: String,
    pub subject: String,
    pub status: String,
    pub created_at: String,
}

impl From<ProtocolSummary> for ProtocolSummaryResponse {
    fn from(summary: ProtocolSummary) -> Self {
        Self {
            id: summary.id,
            protocol_number: summary.protocol_number,
            subject: summary.subject,
            status: summary.status,
            created_at: to_iso(summary.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetailResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub protocols: Vec<ProtocolSummaryResponse>,
}

pub async fn create_user(
    State(state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<NewUserInput>, AppError>,
) -> AppResult<(StatusCode, Json<ApiResponse<UserResponse>>)> {
    let new_user = payload.validate()?;

    let mut conn = state.db()?;
    let user = user_service::create_user(&mut conn, &new_user)?;
    tracing::info!(user_id = user.id, category = %user.category, "created user");

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("user created", UserResponse::from(user)),
    ))
}

pub async fn list_users(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<ListUsersQuery>, AppError>,
) -> AppResult<Json<ApiResponse<Vec<UserResponse>>>> {
    let filter = query.filter()?;
    let request = query.page_request();

    let mut conn = state.db()?;
    let page = user_service::list_users(&mut conn, &filter, request)?;
    Ok(ApiResponse::page(page.map(UserResponse::from)))
}

pub async fn get_user(
    State(state): State<AppState>,
    WithRejection(Path(raw_id), _): WithRejection<Path<i64>, AppError>,
) -> AppResult<Json<ApiResponse<UserDetailResponse>>> {
    let user_id = record_id(raw_id, "user not found")?;
    let mut conn = state.db()?;
    let (user, protocols) = user_service::get_user_with_protocols(&mut conn, user_id)?;

    Ok(ApiResponse::data(UserDetailResponse {
        user: user.into(),
        protocols: protocols.into_iter().map(Into::into).collect(),
    }))
}

pub async fn update_user(
    State(state): State<AppState>,
    WithRejection(Path(raw_id), _): WithRejection<Path<i64>, AppError>,
    WithRejection(Json(body), _): WithRejection<Json<Value>, AppError>,
) -> AppResult<Json<ApiResponse<UserResponse>>> {
    let user_id = record_id(raw_id, "user not found")?;
    let changes = UserChanges::from_json(&body)?;

    let mut conn = state.db()?;
    let user = user_service::update_user(&mut conn, user_id, &changes)?;
    Ok(ApiResponse::with_message("user updated", user.into()))
}

pub async fn deactivate_user(
    State(state): State<AppState>,
    WithRejection(Path(raw_id), _): WithRejection<Path<i64>, AppError>,
) -> AppResult<Json<ApiResponse<()>>> {
    let user_id = record_id(raw_id, "user not found")?;
    let mut conn = state.db()?;
    user_service::deactivate_user(&mut conn, user_id)?;
    tracing::info!(user_id, "deactivated user");
    Ok(ApiResponse::message("user deactivated"))
}

pub async fn delete_user_permanently(
    State(state): State<AppState>,
    WithRejection(Path(raw_id), _): WithRejection<Path<i64>, AppError>,
) -> AppResult<Json<ApiResponse<()>>> {
    let user_id = record_id(raw_id, "user not found")?;
    let mut conn = state.db()?;
    user_service::delete_user(&mut conn, user_id)?;
    tracing::info!(user_id, "permanently deleted user");
    Ok(ApiResponse::message("user permanently deleted"))
}
