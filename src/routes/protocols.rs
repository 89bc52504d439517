use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::models::{ProtocolOwner, ProtocolStatus};
use crate::pagination::PageRequest;
use crate::response::ApiResponse;
use crate::routes::record_id;
use crate::services::protocols::{
    self as protocol_service, NewProtocolInput, ProtocolChanges, ProtocolFilter, ProtocolRecord,
};
use crate::services::RecordError;
use crate::state::AppState;
use crate::utils::time::{parse_timestamp, to_iso};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListProtocolsQuery {
    pub status: Option<String>,
    pub user_id: Option<String>,
    pub document_type: Option<String>,
    pub date_start: Option<String>,
    pub date_end: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
}

fn supplied(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|value| !value.is_empty())
}

impl ListProtocolsQuery {
    /// The date range applies only when both ends are supplied.
    fn filter(&self) -> Result<ProtocolFilter, RecordError> {
        let status = supplied(self.status.as_deref())
            .map(|raw| raw.parse::<ProtocolStatus>().map_err(RecordError::invalid))
            .transpose()?;
        let user_id = supplied(self.user_id.as_deref())
            .map(|raw| {
                raw.parse::<i32>().map_err(|_| {
                    RecordError::invalid(format!("userId {raw:?} is not an integer"))
                })
            })
            .transpose()?;
        let range = (
            supplied(self.date_start.as_deref()),
            supplied(self.date_end.as_deref()),
        );
        let created_between = match range {
            (Some(start), Some(end)) => Some((
                query_date("dateStart", start)?,
                query_date("dateEnd", end)?,
            )),
            _ => None,
        };

        Ok(ProtocolFilter {
            status,
            user_id,
            document_type: supplied(self.document_type.as_deref()).map(str::to_owned),
            created_between,
        })
    }

    fn page_request(&self) -> PageRequest {
        PageRequest::from_params(self.page.as_deref(), self.page_size.as_deref())
    }
}

fn query_date(field: &str, raw: &str) -> Result<chrono::NaiveDateTime, RecordError> {
    parse_timestamp(raw)
        .ok_or_else(|| RecordError::invalid(format!("{field} {raw:?} is not a valid date")))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolUserResponse {
    pub id: i32,
    pub full_name: String,
    pub email: String,
    pub registration_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl ProtocolUserResponse {
    fn full(owner: ProtocolOwner) -> Self {
        Self {
            id: owner.id,
            full_name: owner.full_name,
            email: owner.email,
            registration_id: owner.registration_id,
            category: Some(owner.category),
        }
    }

    /// Write responses carry the owner without its category.
    fn reduced(owner: ProtocolOwner) -> Self {
        Self {
            category: None,
            ..Self::full(owner)
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolResponse {
    pub id: i32,
    pub protocol_number: String,
    pub user_id: i32,
    pub document_type: String,
    pub subject: String,
    pub destination: String,
    pub status: String,
    pub current_responsible: Option<String>,
    pub due_date: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub user: Option<ProtocolUserResponse>,
}

impl ProtocolResponse {
    fn build(record: ProtocolRecord, owner: fn(ProtocolOwner) -> ProtocolUserResponse) -> Self {
        let ProtocolRecord { protocol, owner: user } = record;
        Self {
            id: protocol.id,
            protocol_number: protocol.protocol_number,
            user_id: protocol.user_id,
            document_type: protocol.document_type,
            subject: protocol.subject,
            destination: protocol.destination,
            status: protocol.status,
            current_responsible: protocol.current_responsible,
            due_date: protocol.due_date.map(to_iso),
            notes: protocol.notes,
            created_at: to_iso(protocol.created_at),
            updated_at: to_iso(protocol.updated_at),
            user: user.map(owner),
        }
    }

    fn full(record: ProtocolRecord) -> Self {
        Self::build(record, ProtocolUserResponse::full)
    }

    fn reduced(record: ProtocolRecord) -> Self {
        Self::build(record, ProtocolUserResponse::reduced)
    }
}

pub async fn create_protocol(
    State(state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<NewProtocolInput>, AppError>,
) -> AppResult<(StatusCode, Json<ApiResponse<ProtocolResponse>>)> {
    let draft = payload.validate()?;

    let mut conn = state.db()?;
    let record = protocol_service::create_protocol(&mut conn, draft)?;
    tracing::info!(
        protocol_id = record.protocol.id,
        protocol_number = %record.protocol.protocol_number,
        user_id = record.protocol.user_id,
        "created protocol"
    );

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("protocol created", ProtocolResponse::reduced(record)),
    ))
}

pub async fn list_protocols(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<ListProtocolsQuery>, AppError>,
) -> AppResult<Json<ApiResponse<Vec<ProtocolResponse>>>> {
    let filter = query.filter()?;
    let request = query.page_request();

    let mut conn = state.db()?;
    let page = protocol_service::list_protocols(&mut conn, &filter, request)?;
    Ok(ApiResponse::page(page.map(ProtocolResponse::full)))
}

pub async fn get_protocol(
    State(state): State<AppState>,
    WithRejection(Path(raw_id), _): WithRejection<Path<i64>, AppError>,
) -> AppResult<Json<ApiResponse<ProtocolResponse>>> {
    let protocol_id = record_id(raw_id, "protocol not found")?;
    let mut conn = state.db()?;
    let record = protocol_service::find_protocol(&mut conn, protocol_id)?;
    Ok(ApiResponse::data(ProtocolResponse::full(record)))
}

pub async fn get_protocol_by_number(
    State(state): State<AppState>,
    WithRejection(Path(protocol_number), _): WithRejection<Path<String>, AppError>,
) -> AppResult<Json<ApiResponse<ProtocolResponse>>> {
    let mut conn = state.db()?;
    let record = protocol_service::find_protocol_by_number(&mut conn, &protocol_number)?;
    Ok(ApiResponse::data(ProtocolResponse::full(record)))
}

pub async fn update_protocol(
    State(state): State<AppState>,
    WithRejection(Path(raw_id), _): WithRejection<Path<i64>, AppError>,
    WithRejection(Json(body), _): WithRejection<Json<Value>, AppError>,
) -> AppResult<Json<ApiResponse<ProtocolResponse>>> {
    let protocol_id = record_id(raw_id, "protocol not found")?;
    let changes = ProtocolChanges::from_json(&body)?;

    let mut conn = state.db()?;
    let record = protocol_service::update_protocol(&mut conn, protocol_id, &changes)?;
    if let Some(status) = changes.status.as_deref() {
        tracing::info!(protocol_id, status, "protocol status set");
    }
    Ok(ApiResponse::with_message(
        "protocol updated",
        ProtocolResponse::reduced(record),
    ))
}

pub async fn delete_protocol(
    State(state): State<AppState>,
    WithRejection(Path(raw_id), _): WithRejection<Path<i64>, AppError>,
) -> AppResult<Json<ApiResponse<()>>> {
    let protocol_id = record_id(raw_id, "protocol not found")?;
    let mut conn = state.db()?;
    protocol_service::delete_protocol(&mut conn, protocol_id)?;
    tracing::info!(protocol_id, "deleted protocol");
    Ok(ApiResponse::message("protocol deleted"))
}
