mod common;

use anyhow::Result;
use reqwest::{
    multipart::{Form, Part},
    StatusCode,
};
use serde_json::json;

use common::{expect_status, TestServer};

#[tokio::test]
async fn list_and_get_hide_password_hashes() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (ada_id, token) = server.register("Ada", "ada@example.com").await?;
    server.register("Bob", "bob@example.com").await?;

    let res = server.get("/api/users", Some(&token)).await?;
    let body = expect_status(res, StatusCode::OK).await?;
    assert_eq!(body["message"], "Users retrieved successfully");
    assert_eq!(body["count"], 2);
    for user in body["users"].as_array().into_iter().flatten() {
        assert!(user.get("passwordHash").is_none());
    }

    let res = server.get(&format!("/api/users/{}", ada_id), Some(&token)).await?;
    let body = expect_status(res, StatusCode::OK).await?;
    assert_eq!(body["user"]["name"], "Ada");
    assert_eq!(body["user"]["rating"], 0.0);

    let res = server.get(&format!("/api/users/{}", uuid::Uuid::new_v4()), Some(&token)).await?;
    let body = expect_status(res, StatusCode::NOT_FOUND).await?;
    assert_eq!(body["message"], "User not found");

    let res = server.get("/api/users/not-a-uuid", Some(&token)).await?;
    let body = expect_status(res, StatusCode::BAD_REQUEST).await?;
    assert_eq!(body["message"], "Invalid user ID format");
    Ok(())
}

#[tokio::test]
async fn profile_edits_are_self_only() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (ada_id, ada) = server.register("Ada", "ada@example.com").await?;
    let (_, bob) = server.register("Bob", "bob@example.com").await?;
    let path = format!("/api/users/{}", ada_id);

    let res = server.put(&path, &bob, json!({ "name": "Mallory" })).await?;
    let body = expect_status(res, StatusCode::FORBIDDEN).await?;
    assert_eq!(body["message"], "Not authorized to update this user");

    let res = server.put(&path, &ada, json!({ "name": " A " })).await?;
    let body = expect_status(res, StatusCode::BAD_REQUEST).await?;
    assert_eq!(body["message"], "Name must be at least 2 characters");

    let res = server.put(&path, &ada, json!({})).await?;
    let body = expect_status(res, StatusCode::BAD_REQUEST).await?;
    assert_eq!(body["message"], "No valid fields to update");

    let res = server
        .put(&path, &ada, json!({ "name": "Ada Lovelace", "bio": "Finds things", "link": "https://ada.dev" }))
        .await?;
    let body = expect_status(res, StatusCode::OK).await?;
    assert_eq!(body["message"], "User updated successfully");
    assert_eq!(body["user"]["name"], "Ada Lovelace");
    assert_eq!(body["user"]["bio"], "Finds things");
    Ok(())
}

#[tokio::test]
async fn profile_image_upload_uses_a_stable_name() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (ada_id, ada) = server.register("Ada", "ada@example.com").await?;
    let path = format!("/api/users/{}", ada_id);

    for _ in 0..2 {
        let part = Part::bytes(vec![0x89, b'P', b'N', b'G']).file_name("me.png").mime_str("image/png")?;
        let res = server
            .client
            .put(server.url(&path))
            .bearer_auth(&ada)
            .multipart(Form::new().part("profileimg", part))
            .send()
            .await?;
        let body = expect_status(res, StatusCode::OK).await?;
        let url = body["user"]["profileimg"].as_str().unwrap_or_default();
        assert!(url.contains(&format!("profile-{}", ada_id)), "url: {}", url);
    }

    // The second upload replaced the first under the same name
    assert_eq!(server.media.stored_count().await, 1);
    assert_eq!(server.media.deleted().await.len(), 1);
    Ok(())
}

#[tokio::test]
async fn non_image_files_are_rejected() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (ada_id, ada) = server.register("Ada", "ada@example.com").await?;

    let part = Part::bytes(b"plain text".to_vec()).file_name("notes.txt").mime_str("text/plain")?;
    let res = server
        .client
        .put(server.url(&format!("/api/users/{}", ada_id)))
        .bearer_auth(&ada)
        .multipart(Form::new().part("coverimg", part))
        .send()
        .await?;
    let body = expect_status(res, StatusCode::BAD_REQUEST).await?;
    assert_eq!(body["message"], "Only image files are allowed (jpg, png, gif, webp)");
    assert_eq!(server.media.stored_count().await, 0);
    Ok(())
}

#[tokio::test]
async fn account_deletion_is_self_only_and_final() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (ada_id, ada) = server.register("Ada", "ada@example.com").await?;
    let (_, bob) = server.register("Bob", "bob@example.com").await?;
    let path = format!("/api/users/{}", ada_id);

    let res = server.delete(&path, &bob).await?;
    let body = expect_status(res, StatusCode::FORBIDDEN).await?;
    assert_eq!(body["message"], "Not authorized to delete this user");

    let res = server.delete(&path, &ada).await?;
    let body = expect_status(res, StatusCode::OK).await?;
    assert_eq!(body["message"], "User deleted successfully");

    let res = server.get(&path, Some(&bob)).await?;
    expect_status(res, StatusCode::NOT_FOUND).await?;

    let res = server
        .post("/api/auth/login", None, json!({ "email": "ada@example.com", "password": "secret1" }))
        .await?;
    expect_status(res, StatusCode::NOT_FOUND).await?;
    Ok(())
}
