mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{acquire_db_lock, read_json, TestApp};
use serde_json::{json, Value};

fn ids(body: &Value) -> Vec<i64> {
    body["data"]
        .as_array()
        .map(|rows| rows.iter().filter_map(|row| row["id"].as_i64()).collect())
        .unwrap_or_default()
}

#[tokio::test]
async fn user_lifecycle_flow() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let created = app.create_user("Ana Souza", "a@x.com", "M001", "student").await?;
    let user_id = created["id"].as_i64().unwrap();
    assert_eq!(created["active"], true);
    assert_eq!(created["validated"], false);
    assert_eq!(created["registrationId"], "M001");

    let update = app
        .put_json(
            &format!("/api/users/{user_id}"),
            &json!({ "fullName": "", "validated": true, "category": "staff" }),
        )
        .await?;
    assert_eq!(update.status(), StatusCode::OK);
    let body = read_json(update).await?;
    assert_eq!(body["data"]["fullName"], "Ana Souza");
    assert_eq!(body["data"]["validated"], true);
    assert_eq!(body["data"]["category"], "staff");

    let soft = app.delete(&format!("/api/users/{user_id}")).await?;
    assert_eq!(soft.status(), StatusCode::OK);
    let fetched = app.get(&format!("/api/users/{user_id}")).await?;
    assert_eq!(fetched.status(), StatusCode::OK);
    let body = read_json(fetched).await?;
    assert_eq!(body["data"]["active"], false);
    assert_eq!(body["data"]["protocols"], json!([]));

    let hard = app.delete(&format!("/api/users/{user_id}/permanent")).await?;
    assert_eq!(hard.status(), StatusCode::OK);
    let gone = app.get(&format!("/api/users/{user_id}")).await?;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
    let again = app.delete(&format!("/api/users/{user_id}/permanent")).await?;
    assert_eq!(again.status(), StatusCode::NOT_FOUND);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn duplicate_identity_fields_conflict() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    app.create_user("Ana", "a@x.com", "M001", "student").await?;

    let same_email = app
        .post_json(
            "/api/users",
            &json!({
                "fullName": "Bruno",
                "email": "a@x.com",
                "registrationId": "M002",
                "category": "professor",
            }),
        )
        .await?;
    assert_eq!(same_email.status(), StatusCode::CONFLICT);
    let body = read_json(same_email).await?;
    assert_eq!(body["message"], "email already registered");

    let same_registration = app
        .post_json(
            "/api/users",
            &json!({
                "fullName": "Carla",
                "email": "c@x.com",
                "registrationId": "M001",
                "category": "staff",
            }),
        )
        .await?;
    assert_eq!(same_registration.status(), StatusCode::CONFLICT);

    let other = app.create_user("Dora", "d@x.com", "M004", "staff").await?;
    let collide = app
        .put_json(
            &format!("/api/users/{}", other["id"]),
            &json!({ "email": "a@x.com" }),
        )
        .await?;
    assert_eq!(collide.status(), StatusCode::CONFLICT);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn list_filters_and_paginates() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let mut created = Vec::new();
    for n in 1..=5 {
        let category = if n % 2 == 0 { "professor" } else { "student" };
        let user = app
            .create_user(
                &format!("User {n}"),
                &format!("user{n}@uni.edu"),
                &format!("R{n:03}"),
                category,
            )
            .await?;
        created.push(user["id"].as_i64().unwrap());
    }
    let inactive = created[0];
    app.delete(&format!("/api/users/{inactive}")).await?;

    let page_one = read_json(app.get("/api/users?page=1&pageSize=2").await?).await?;
    assert_eq!(page_one["pagination"]["total"], 5);
    assert_eq!(page_one["pagination"]["totalPages"], 3);
    assert_eq!(ids(&page_one), vec![created[4], created[3]]);

    let page_three = read_json(app.get("/api/users?page=3&pageSize=2").await?).await?;
    assert_eq!(ids(&page_three), vec![created[0]]);

    let beyond = app.get("/api/users?page=9&pageSize=2").await?;
    assert_eq!(beyond.status(), StatusCode::OK);
    assert_eq!(read_json(beyond).await?["data"], json!([]));

    let active = read_json(app.get("/api/users?active=true").await?).await?;
    assert!(!ids(&active).contains(&inactive));
    assert_eq!(active["pagination"]["total"], 4);

    let inactive_only = read_json(app.get("/api/users?active=false").await?).await?;
    assert_eq!(ids(&inactive_only), vec![inactive]);

    let empty_flag = read_json(app.get("/api/users?active=").await?).await?;
    assert_eq!(ids(&empty_flag), vec![inactive]);

    let professors = read_json(app.get("/api/users?category=professor").await?).await?;
    assert_eq!(ids(&professors), vec![created[3], created[1]]);

    let search = read_json(app.get("/api/users?searchText=USER3%40").await?).await?;
    assert_eq!(ids(&search), vec![created[2]]);

    let wildcard = read_json(app.get("/api/users?searchText=%25").await?).await?;
    assert_eq!(wildcard["pagination"]["total"], 0);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn invalid_updates_are_rejected() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let user = app.create_user("Ana", "a@x.com", "M001", "student").await?;
    let path = format!("/api/users/{}", user["id"]);

    let bad_email = app.put_json(&path, &json!({ "email": "nope" })).await?;
    assert_eq!(bad_email.status(), StatusCode::BAD_REQUEST);

    let null_flag = app.put_json(&path, &json!({ "active": null })).await?;
    assert_eq!(null_flag.status(), StatusCode::BAD_REQUEST);

    let missing = app
        .put_json("/api/users/999999", &json!({ "fullName": "Ghost" }))
        .await?;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    app.cleanup().await?;
    Ok(())
}
