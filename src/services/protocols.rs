use std::collections::HashMap;

use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use diesel::{pg::Pg, prelude::*, sql_types::Bool, PgConnection};
use serde::Deserialize;
use serde_json::Value;

use super::validation::{check_length, ensure_object, non_blank, truthy_text};
use super::{like_pattern, translate_write_error, RecordError, RecordResult};
use crate::models::{NewProtocol, Protocol, ProtocolOwner, ProtocolStatus};
use crate::pagination::{Page, PageInfo, PageRequest};
use crate::schema::{protocols, users};
use crate::utils::time::parse_timestamp;

const DOCUMENT_TYPE_MAX: usize = 100;
const DESTINATION_MAX: usize = 150;
const RESPONSIBLE_MAX: usize = 150;

type ProtocolPredicate = Box<dyn BoxableExpression<protocols::table, Pg, SqlType = Bool>>;

type OwnerColumns = (
    users::id,
    users::full_name,
    users::email,
    users::registration_id,
    users::category,
);

const OWNER_COLUMNS: OwnerColumns = (
    users::id,
    users::full_name,
    users::email,
    users::registration_id,
    users::category,
);

/// `PROT-<year>-<epoch millis>`, both taken from the UTC instant.
///
/// Two calls within the same millisecond yield the same number; the unique
/// constraint on `protocol_number` turns such a collision into a conflict.
pub fn protocol_number_at(now: DateTime<Utc>) -> String {
    format!("PROT-{}-{}", now.year(), now.timestamp_millis())
}

pub fn next_protocol_number() -> String {
    protocol_number_at(Utc::now())
}

#[derive(Debug, Clone)]
pub struct ProtocolRecord {
    pub protocol: Protocol,
    pub owner: Option<ProtocolOwner>,
}

/// Raw creation input. `user_id == 0` counts as missing.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProtocolInput {
    #[serde(default, deserialize_with = "loose_id")]
    pub user_id: Option<i64>,
    pub document_type: Option<String>,
    pub subject: Option<String>,
    pub destination: Option<String>,
    pub current_responsible: Option<String>,
    pub due_date: Option<String>,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LooseId {
    Number(i64),
    Text(String),
}

/// Accepts an integer or a decimal string; a blank string counts as absent.
fn loose_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Option::<LooseId>::deserialize(deserializer)? {
        None => Ok(None),
        Some(LooseId::Number(id)) => Ok(Some(id)),
        Some(LooseId::Text(raw)) => {
            let raw = raw.trim();
            if raw.is_empty() {
                return Ok(None);
            }
            raw.parse::<i64>().map(Some).map_err(|_| {
                serde::de::Error::custom(format!("userId {raw:?} is not an integer"))
            })
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolDraft {
    pub user_id: i32,
    pub document_type: String,
    pub subject: String,
    pub destination: String,
    pub current_responsible: Option<String>,
    pub due_date: Option<NaiveDateTime>,
    pub notes: Option<String>,
}

impl NewProtocolInput {
    pub fn validate(self) -> RecordResult<ProtocolDraft> {
        let user_id = self.user_id.filter(|id| *id != 0);
        let document_type = non_blank(self.document_type.as_deref());
        let subject = non_blank(self.subject.as_deref());
        let destination = non_blank(self.destination.as_deref());

        let mut missing = Vec::new();
        if user_id.is_none() {
            missing.push("userId");
        }
        if document_type.is_none() {
            missing.push("documentType");
        }
        if subject.is_none() {
            missing.push("subject");
        }
        if destination.is_none() {
            missing.push("destination");
        }
        let (Some(user_id), Some(document_type), Some(subject), Some(destination)) =
            (user_id, document_type, subject, destination)
        else {
            return Err(RecordError::missing_fields(&missing));
        };

        check_length("documentType", &document_type, DOCUMENT_TYPE_MAX)?;
        check_length("destination", &destination, DESTINATION_MAX)?;
        let current_responsible = non_blank(self.current_responsible.as_deref());
        if let Some(ref responsible) = current_responsible {
            check_length("currentResponsible", responsible, RESPONSIBLE_MAX)?;
        }
        let due_date = non_blank(self.due_date.as_deref())
            .map(|raw| parse_due_date(&raw))
            .transpose()?;
        // No stored user has an id outside the key column range.
        let user_id = i32::try_from(user_id).map_err(|_| RecordError::NotFound("user not found"))?;

        Ok(ProtocolDraft {
            user_id,
            document_type,
            subject,
            destination,
            current_responsible,
            due_date,
            notes: non_blank(self.notes.as_deref()),
        })
    }
}

impl ProtocolDraft {
    fn into_new_protocol(self, protocol_number: String) -> NewProtocol {
        NewProtocol {
            protocol_number,
            user_id: self.user_id,
            document_type: self.document_type,
            subject: self.subject,
            destination: self.destination,
            status: ProtocolStatus::UnderReview.as_str().to_string(),
            current_responsible: self.current_responsible,
            due_date: self.due_date,
            notes: self.notes,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ProtocolFilter {
    pub status: Option<ProtocolStatus>,
    pub user_id: Option<i32>,
    pub document_type: Option<String>,
    pub created_between: Option<(NaiveDateTime, NaiveDateTime)>,
}

/// Partial update of the workflow fields. Falsy values are never applied.
#[derive(Debug, Default, Clone, PartialEq, AsChangeset)]
#[diesel(table_name = protocols)]
pub struct ProtocolChanges {
    pub status: Option<String>,
    pub current_responsible: Option<String>,
    pub due_date: Option<NaiveDateTime>,
    pub notes: Option<String>,
    pub document_type: Option<String>,
    pub subject: Option<String>,
    pub destination: Option<String>,
}

impl ProtocolChanges {
    pub fn from_json(body: &Value) -> RecordResult<Self> {
        ensure_object(body)?;

        let status = truthy_text(body, "status")?
            .map(|raw| raw.parse::<ProtocolStatus>().map_err(RecordError::invalid))
            .transpose()?
            .map(|status| status.as_str().to_string());
        let current_responsible = truthy_text(body, "currentResponsible")?;
        if let Some(ref responsible) = current_responsible {
            check_length("currentResponsible", responsible, RESPONSIBLE_MAX)?;
        }
        let due_date = truthy_text(body, "dueDate")?
            .map(|raw| parse_due_date(&raw))
            .transpose()?;
        let document_type = truthy_text(body, "documentType")?;
        if let Some(ref document_type) = document_type {
            check_length("documentType", document_type, DOCUMENT_TYPE_MAX)?;
        }
        let destination = truthy_text(body, "destination")?;
        if let Some(ref destination) = destination {
            check_length("destination", destination, DESTINATION_MAX)?;
        }

        Ok(Self {
            status,
            current_responsible,
            due_date,
            notes: truthy_text(body, "notes")?,
            document_type,
            subject: truthy_text(body, "subject")?,
            destination,
        })
    }
}

fn parse_due_date(raw: &str) -> RecordResult<NaiveDateTime> {
    parse_timestamp(raw)
        .ok_or_else(|| RecordError::invalid(format!("dueDate {raw:?} is not a valid date")))
}

fn protocol_predicate(filter: &ProtocolFilter) -> ProtocolPredicate {
    let mut predicate: ProtocolPredicate = Box::new(true.into_sql::<Bool>());

    if let Some(status) = filter.status {
        predicate = Box::new(predicate.and(protocols::status.eq(status.as_str())));
    }
    if let Some(user_id) = filter.user_id {
        predicate = Box::new(predicate.and(protocols::user_id.eq(user_id)));
    }
    if let Some(document_type) = filter.document_type.as_deref() {
        predicate = Box::new(
            predicate.and(protocols::document_type.ilike(like_pattern(document_type))),
        );
    }
    if let Some((start, end)) = filter.created_between {
        predicate = Box::new(predicate.and(protocols::created_at.between(start, end)));
    }

    predicate
}

/// Inserts a protocol for an existing user.
///
/// The existence check and the insert are separate statements; a user
/// removed in between surfaces through the foreign key as not found.
pub fn create_protocol(
    conn: &mut PgConnection,
    draft: ProtocolDraft,
) -> RecordResult<ProtocolRecord> {
    let owner: Option<i32> = users::table
        .find(draft.user_id)
        .select(users::id)
        .first(conn)
        .optional()?;
    if owner.is_none() {
        return Err(RecordError::NotFound("user not found"));
    }

    let new_protocol = draft.into_new_protocol(next_protocol_number());
    let protocol: Protocol = diesel::insert_into(protocols::table)
        .values(&new_protocol)
        .get_result(conn)
        .map_err(translate_write_error)?;

    find_protocol(conn, protocol.id)
}

pub fn list_protocols(
    conn: &mut PgConnection,
    filter: &ProtocolFilter,
    request: PageRequest,
) -> RecordResult<Page<ProtocolRecord>> {
    let total: i64 = protocols::table
        .filter(protocol_predicate(filter))
        .count()
        .get_result(conn)?;

    let rows: Vec<Protocol> = protocols::table
        .filter(protocol_predicate(filter))
        .order((protocols::created_at.desc(), protocols::id.desc()))
        .limit(request.limit())
        .offset(request.offset())
        .load(conn)?;

    let owners = load_owners(conn, &rows)?;
    let items = rows
        .into_iter()
        .map(|protocol| {
            let owner = owners.get(&protocol.user_id).cloned();
            ProtocolRecord { protocol, owner }
        })
        .collect();

    Ok(Page {
        items,
        info: PageInfo::new(request, total),
    })
}

pub fn find_protocol(conn: &mut PgConnection, protocol_id: i32) -> RecordResult<ProtocolRecord> {
    protocols::table
        .inner_join(users::table)
        .filter(protocols::id.eq(protocol_id))
        .select((protocols::all_columns, OWNER_COLUMNS))
        .first::<(Protocol, ProtocolOwner)>(conn)
        .optional()?
        .map(|(protocol, owner)| ProtocolRecord {
            protocol,
            owner: Some(owner),
        })
        .ok_or(RecordError::NotFound("protocol not found"))
}

pub fn find_protocol_by_number(
    conn: &mut PgConnection,
    protocol_number: &str,
) -> RecordResult<ProtocolRecord> {
    protocols::table
        .inner_join(users::table)
        .filter(protocols::protocol_number.eq(protocol_number))
        .select((protocols::all_columns, OWNER_COLUMNS))
        .first::<(Protocol, ProtocolOwner)>(conn)
        .optional()?
        .map(|(protocol, owner)| ProtocolRecord {
            protocol,
            owner: Some(owner),
        })
        .ok_or(RecordError::NotFound("protocol not found"))
}

/// Any status may be written over any other; there is no transition table.
pub fn update_protocol(
    conn: &mut PgConnection,
    protocol_id: i32,
    changes: &ProtocolChanges,
) -> RecordResult<ProtocolRecord> {
    let now = Utc::now().naive_utc();
    let updated: Option<Protocol> = diesel::update(protocols::table.find(protocol_id))
        .set((changes, protocols::updated_at.eq(now)))
        .get_result(conn)
        .optional()
        .map_err(translate_write_error)?;
    if updated.is_none() {
        return Err(RecordError::NotFound("protocol not found"));
    }
    find_protocol(conn, protocol_id)
}

pub fn delete_protocol(conn: &mut PgConnection, protocol_id: i32) -> RecordResult<()> {
    let deleted = diesel::delete(protocols::table.find(protocol_id)).execute(conn)?;
    if deleted == 0 {
        return Err(RecordError::NotFound("protocol not found"));
    }
    Ok(())
}

fn load_owners(
    conn: &mut PgConnection,
    rows: &[Protocol],
) -> RecordResult<HashMap<i32, ProtocolOwner>> {
    if rows.is_empty() {
        return Ok(HashMap::new());
    }
    let mut user_ids: Vec<i32> = rows.iter().map(|protocol| protocol.user_id).collect();
    user_ids.sort_unstable();
    user_ids.dedup();

    let owners: Vec<ProtocolOwner> = users::table
        .filter(users::id.eq_any(user_ids))
        .select(OWNER_COLUMNS)
        .load(conn)?;
    Ok(owners.into_iter().map(|owner| (owner.id, owner)).collect())
}
