use chrono::Utc;
use diesel::{pg::Pg, prelude::*, sql_types::Bool, PgConnection};
use serde::Deserialize;
use serde_json::Value;

use super::validation::{
    check_email, check_length, ensure_object, non_blank, present_bool, truthy_text,
};
use super::{like_pattern, translate_write_error, RecordError, RecordResult};
use crate::models::{NewUser, Protocol, ProtocolSummary, User, UserCategory};
use crate::pagination::{Page, PageInfo, PageRequest};
use crate::schema::{protocols, users};

const FULL_NAME_MAX: usize = 200;
const EMAIL_MAX: usize = 150;
const REGISTRATION_ID_MAX: usize = 50;

type UserPredicate = Box<dyn BoxableExpression<users::table, Pg, SqlType = Bool>>;

/// Raw creation input; every field is required.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUserInput {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub registration_id: Option<String>,
    pub category: Option<String>,
}

impl NewUserInput {
    pub fn validate(self) -> RecordResult<NewUser> {
        let full_name = non_blank(self.full_name.as_deref());
        let email = non_blank(self.email.as_deref());
        let registration_id = non_blank(self.registration_id.as_deref());
        let category = non_blank(self.category.as_deref());

        let (Some(full_name), Some(email), Some(registration_id), Some(category)) =
            (full_name, email, registration_id, category)
        else {
            let missing: Vec<&str> = [
                ("fullName", self.full_name.as_deref()),
                ("email", self.email.as_deref()),
                ("registrationId", self.registration_id.as_deref()),
                ("category", self.category.as_deref()),
            ]
            .into_iter()
            .filter(|(_, value)| non_blank(*value).is_none())
            .map(|(field, _)| field)
            .collect();
            return Err(RecordError::missing_fields(&missing));
        };

        check_length("fullName", &full_name, FULL_NAME_MAX)?;
        check_length("email", &email, EMAIL_MAX)?;
        check_email(&email)?;
        check_length("registrationId", &registration_id, REGISTRATION_ID_MAX)?;
        let category: UserCategory = category.parse().map_err(RecordError::invalid)?;

        Ok(NewUser {
            full_name,
            email,
            registration_id,
            category: category.as_str().to_string(),
            active: true,
            validated: false,
        })
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct UserFilter {
    pub category: Option<UserCategory>,
    pub active: Option<bool>,
    pub search_text: Option<String>,
}

/// Partial update. Text keys apply only when truthy; booleans whenever present.
#[derive(Debug, Default, Clone, PartialEq, AsChangeset)]
#[diesel(table_name = users)]
pub struct UserChanges {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub registration_id: Option<String>,
    pub category: Option<String>,
    pub active: Option<bool>,
    pub validated: Option<bool>,
}

impl UserChanges {
    pub fn from_json(body: &Value) -> RecordResult<Self> {
        ensure_object(body)?;

        let full_name = truthy_text(body, "fullName")?;
        if let Some(ref name) = full_name {
            check_length("fullName", name, FULL_NAME_MAX)?;
        }
        let email = truthy_text(body, "email")?;
        if let Some(ref email) = email {
            check_length("email", email, EMAIL_MAX)?;
            check_email(email)?;
        }
        let registration_id = truthy_text(body, "registrationId")?;
        if let Some(ref registration_id) = registration_id {
            check_length("registrationId", registration_id, REGISTRATION_ID_MAX)?;
        }
        let category = truthy_text(body, "category")?
            .map(|raw| raw.parse::<UserCategory>().map_err(RecordError::invalid))
            .transpose()?
            .map(|category| category.as_str().to_string());

        Ok(Self {
            full_name,
            email,
            registration_id,
            category,
            active: present_bool(body, "active")?,
            validated: present_bool(body, "validated")?,
        })
    }
}

fn user_predicate(filter: &UserFilter) -> UserPredicate {
    let mut predicate: UserPredicate = Box::new(true.into_sql::<Bool>());

    if let Some(category) = filter.category {
        predicate = Box::new(predicate.and(users::category.eq(category.as_str())));
    }
    if let Some(active) = filter.active {
        predicate = Box::new(predicate.and(users::active.eq(active)));
    }
    if let Some(text) = filter.search_text.as_deref() {
        let pattern = like_pattern(text);
        predicate = Box::new(
            predicate.and(
                users::full_name
                    .ilike(pattern.clone())
                    .or(users::email.ilike(pattern.clone()))
                    .or(users::registration_id.ilike(pattern)),
            ),
        );
    }

    predicate
}

pub fn create_user(conn: &mut PgConnection, new_user: &NewUser) -> RecordResult<User> {
    diesel::insert_into(users::table)
        .values(new_user)
        .get_result(conn)
        .map_err(translate_write_error)
}

pub fn list_users(
    conn: &mut PgConnection,
    filter: &UserFilter,
    request: PageRequest,
) -> RecordResult<Page<User>> {
    let total: i64 = users::table
        .filter(user_predicate(filter))
        .count()
        .get_result(conn)?;

    let items: Vec<User> = users::table
        .filter(user_predicate(filter))
        .order((users::created_at.desc(), users::id.desc()))
        .limit(request.limit())
        .offset(request.offset())
        .load(conn)?;

    Ok(Page {
        items,
        info: PageInfo::new(request, total),
    })
}

pub fn find_user(conn: &mut PgConnection, user_id: i32) -> RecordResult<User> {
    users::table
        .find(user_id)
        .first(conn)
        .optional()?
        .ok_or(RecordError::NotFound("user not found"))
}

pub fn get_user_with_protocols(
    conn: &mut PgConnection,
    user_id: i32,
) -> RecordResult<(User, Vec<ProtocolSummary>)> {
    let user = find_user(conn, user_id)?;
    let protocols: Vec<ProtocolSummary> = Protocol::belonging_to(&user)
        .select((
            protocols::id,
            protocols::protocol_number,
            protocols::subject,
            protocols::status,
            protocols::created_at,
        ))
        .order((protocols::created_at.desc(), protocols::id.desc()))
        .load(conn)?;
    Ok((user, protocols))
}

pub fn update_user(
    conn: &mut PgConnection,
    user_id: i32,
    changes: &UserChanges,
) -> RecordResult<User> {
    let now = Utc::now().naive_utc();
    diesel::update(users::table.find(user_id))
        .set((changes, users::updated_at.eq(now)))
        .get_result(conn)
        .optional()
        .map_err(translate_write_error)?
        .ok_or(RecordError::NotFound("user not found"))
}

/// Soft delete: the record stays readable with `active = false`.
pub fn deactivate_user(conn: &mut PgConnection, user_id: i32) -> RecordResult<User> {
    let now = Utc::now().naive_utc();
    diesel::update(users::table.find(user_id))
        .set((users::active.eq(false), users::updated_at.eq(now)))
        .get_result(conn)
        .optional()?
        .ok_or(RecordError::NotFound("user not found"))
}

/// Removes the user for good; its protocols go with it.
pub fn delete_user(conn: &mut PgConnection, user_id: i32) -> RecordResult<()> {
    let deleted = diesel::delete(users::table.find(user_id)).execute(conn)?;
    if deleted == 0 {
        return Err(RecordError::NotFound("user not found"));
    }
    Ok(())
}
