mod common;

use anyhow::Result;
use reqwest::{
    multipart::{Form, Part},
    StatusCode,
};
use serde_json::{json, Value};
use uuid::Uuid;

use common::{expect_status, item_body, TestServer};

fn item_form(title: &str, image_count: usize) -> Result<Form> {
    let mut form = Form::new()
        .text("title", title.to_string())
        .text("description", "Black wallet with a bus pass")
        .text("type", "lost")
        .text("category", "accessories")
        .text("location[name]", "Cafeteria")
        .text("location[latitude]", "40.7128")
        .text("location[longitude]", "-74.006")
        .text("dateOccurred", "2024-03-01T10:30:00Z");
    for i in 0..image_count {
        let part = Part::bytes(vec![0x89, b'P', b'N', b'G', i as u8])
            .file_name(format!("photo-{}.png", i))
            .mime_str("image/png")?;
        form = form.part("images", part);
    }
    Ok(form)
}

async fn rating_of(server: &TestServer, token: &str, user_id: &str) -> Result<f64> {
    let res = server.get(&format!("/api/users/{}", user_id), Some(token)).await?;
    let body = expect_status(res, StatusCode::OK).await?;
    Ok(body["user"]["rating"].as_f64().unwrap_or_default())
}

#[tokio::test]
async fn create_requires_core_fields_and_a_valid_type() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (_, token) = server.register("Ada", "ada@example.com").await?;

    let res = server.post("/api/items", Some(&token), json!({ "title": "Keys" })).await?;
    let body = expect_status(res, StatusCode::BAD_REQUEST).await?;
    assert_eq!(body["message"], "Missing required fields");

    let mut wrong_type = item_body("Keys");
    wrong_type["type"] = json!("stolen");
    let res = server.post("/api/items", Some(&token), wrong_type).await?;
    let body = expect_status(res, StatusCode::BAD_REQUEST).await?;
    assert_eq!(body["message"], "Type must be 'lost' or 'found'");

    let res = server.post("/api/items", None, item_body("Keys")).await?;
    expect_status(res, StatusCode::UNAUTHORIZED).await?;
    Ok(())
}

#[tokio::test]
async fn create_with_images_stores_hosted_urls() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (ada_id, token) = server.register("Ada", "ada@example.com").await?;

    let res = server
        .client
        .post(server.url("/api/items"))
        .bearer_auth(&token)
        .multipart(item_form("Wallet", 2)?)
        .send()
        .await?;
    let body = expect_status(res, StatusCode::CREATED).await?;

    let item = &body["item"];
    assert_eq!(body["message"], "Item posted successfully");
    assert_eq!(item["type"], "lost");
    assert_eq!(item["reportedBy"], ada_id.as_str());
    assert_eq!(item["location"]["name"], "Cafeteria");
    assert_eq!(item["location"]["latitude"], 40.7128);
    assert_eq!(item["contactMethod"], "in-app");
    assert_eq!(item["images"].as_array().map(Vec::len), Some(2));
    assert_eq!(server.media.stored_count().await, 2);
    Ok(())
}

#[tokio::test]
async fn too_many_images_are_rejected() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (_, token) = server.register("Ada", "ada@example.com").await?;

    let res = server
        .client
        .post(server.url("/api/items"))
        .bearer_auth(&token)
        .multipart(item_form("Wallet", 6)?)
        .send()
        .await?;
    let body = expect_status(res, StatusCode::BAD_REQUEST).await?;
    assert_eq!(body["message"], "Too many files uploaded");
    assert_eq!(server.media.stored_count().await, 0);
    Ok(())
}

#[tokio::test]
async fn images_over_five_megabytes_are_rejected() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (_, token) = server.register("Ada", "ada@example.com").await?;

    let oversized = Part::bytes(vec![0u8; 5 * 1024 * 1024 + 1])
        .file_name("huge.jpg")
        .mime_str("image/jpeg")?;
    let form = item_form("Wallet", 0)?.part("images", oversized);
    let res = server
        .client
        .post(server.url("/api/items"))
        .bearer_auth(&token)
        .multipart(form)
        .send()
        .await?;
    let body = expect_status(res, StatusCode::BAD_REQUEST).await?;
    assert_eq!(body["message"], "File size exceeds 5MB limit");
    assert_eq!(server.media.stored_count().await, 0);

    // Exactly 5 MB is accepted
    let at_limit = Part::bytes(vec![0u8; 5 * 1024 * 1024])
        .file_name("big.jpg")
        .mime_str("image/jpeg")?;
    let form = item_form("Wallet", 0)?.part("images", at_limit);
    let res = server
        .client
        .post(server.url("/api/items"))
        .bearer_auth(&token)
        .multipart(form)
        .send()
        .await?;
    expect_status(res, StatusCode::CREATED).await?;
    Ok(())
}

#[tokio::test]
async fn failed_upload_leaves_no_item_and_no_images() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (ada_id, token) = server.register("Ada", "ada@example.com").await?;
    server.media.fail_uploads_after(1);

    let res = server
        .client
        .post(server.url("/api/items"))
        .bearer_auth(&token)
        .multipart(item_form("Wallet", 3)?)
        .send()
        .await?;
    let body = expect_status(res, StatusCode::BAD_REQUEST).await?;
    assert!(body["message"].as_str().unwrap_or_default().starts_with("Image upload failed"));
    assert_eq!(server.media.stored_count().await, 0);

    let res = server.get(&format!("/api/items/user/{}", ada_id), None).await?;
    let body = expect_status(res, StatusCode::OK).await?;
    assert_eq!(body["count"], 0);
    Ok(())
}

#[tokio::test]
async fn claim_unclaim_resolve_cycle_updates_claimant_rating() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (_, reporter) = server.register("Ada", "ada@example.com").await?;
    let (bob_id, bob) = server.register("Bob", "bob@example.com").await?;
    let (_, carol) = server.register("Carol", "carol@example.com").await?;

    let first = server.report_item(&reporter, "Umbrella").await?;

    // Nobody has claimed yet
    let res = server
        .post(&format!("/api/items/{}/resolve", first), Some(&reporter), json!({}))
        .await?;
    let body = expect_status(res, StatusCode::BAD_REQUEST).await?;
    assert_eq!(body["message"], "No one has claimed this item yet");

    let res = server.post(&format!("/api/items/{}/claim", first), Some(&bob), json!({})).await?;
    let body = expect_status(res, StatusCode::OK).await?;
    assert_eq!(body["message"], "Item claimed successfully. Contact the poster to verify.");
    assert_eq!(body["item"]["claimedBy"], bob_id.as_str());

    let res = server.post(&format!("/api/items/{}/claim", first), Some(&carol), json!({})).await?;
    let body = expect_status(res, StatusCode::BAD_REQUEST).await?;
    assert_eq!(body["message"], "Item is already claimed");

    let res = server.post(&format!("/api/items/{}/unclaim", first), Some(&carol), json!({})).await?;
    let body = expect_status(res, StatusCode::FORBIDDEN).await?;
    assert_eq!(body["message"], "Not authorized to unclaim this item");

    let res = server.post(&format!("/api/items/{}/unclaim", first), Some(&bob), json!({})).await?;
    let body = expect_status(res, StatusCode::OK).await?;
    assert_eq!(body["message"], "Claim cancelled successfully");
    assert_eq!(body["item"]["claimedBy"], Value::Null);

    let res = server.post(&format!("/api/items/{}/claim", first), Some(&bob), json!({})).await?;
    expect_status(res, StatusCode::OK).await?;

    let res = server
        .post(&format!("/api/items/{}/resolve", first), Some(&bob), json!({ "givenRating": 5 }))
        .await?;
    let body = expect_status(res, StatusCode::FORBIDDEN).await?;
    assert_eq!(body["message"], "Not authorized to resolve this item");

    let res = server
        .post(&format!("/api/items/{}/resolve", first), Some(&reporter), json!({ "givenRating": 5 }))
        .await?;
    let body = expect_status(res, StatusCode::OK).await?;
    assert_eq!(body["item"]["isResolved"], true);
    assert_eq!(rating_of(&server, &bob, &bob_id).await?, 2.5);

    let res = server.post(&format!("/api/items/{}/claim", first), Some(&carol), json!({})).await?;
    let body = expect_status(res, StatusCode::BAD_REQUEST).await?;
    assert_eq!(body["message"], "Item is already resolved");

    // Resolving again is allowed and folds in the new rating; a numeric string counts
    let res = server
        .post(&format!("/api/items/{}/resolve", first), Some(&reporter), json!({ "givenRating": "5" }))
        .await?;
    expect_status(res, StatusCode::OK).await?;
    assert_eq!(rating_of(&server, &bob, &bob_id).await?, 3.75);
    Ok(())
}

#[tokio::test]
async fn resolve_without_a_rating_leaves_the_claimant_untouched() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (_, reporter) = server.register("Ada", "ada@example.com").await?;
    let (bob_id, bob) = server.register("Bob", "bob@example.com").await?;
    let item = server.report_item(&reporter, "Lanyard").await?;

    let res = server.post(&format!("/api/items/{}/claim", item), Some(&bob), json!({})).await?;
    expect_status(res, StatusCode::OK).await?;

    let res = server
        .client
        .post(server.url(&format!("/api/items/{}/resolve", item)))
        .bearer_auth(&reporter)
        .send()
        .await?;
    expect_status(res, StatusCode::OK).await?;
    assert_eq!(rating_of(&server, &bob, &bob_id).await?, 0.0);
    Ok(())
}

#[tokio::test]
async fn verify_marks_the_item() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (_, token) = server.register("Ada", "ada@example.com").await?;
    let item = server.report_item(&token, "Laptop").await?;

    let res = server.post(&format!("/api/items/{}/verify", item), Some(&token), json!({})).await?;
    let body = expect_status(res, StatusCode::OK).await?;
    assert_eq!(body["message"], "Item verified successfully");
    assert_eq!(body["item"]["isVerified"], true);
    Ok(())
}

#[tokio::test]
async fn verify_is_limited_to_configured_verifiers() -> Result<()> {
    let mut config = foundit_api::config::AppConfig::development();
    config.security.verifier_ids = vec![Uuid::new_v4()];
    let server = TestServer::spawn_with(config).await?;
    let (_, token) = server.register("Ada", "ada@example.com").await?;
    let item = server.report_item(&token, "Laptop").await?;

    let res = server.post(&format!("/api/items/{}/verify", item), Some(&token), json!({})).await?;
    let body = expect_status(res, StatusCode::FORBIDDEN).await?;
    assert_eq!(body["message"], "Not authorized to verify items");
    Ok(())
}

#[tokio::test]
async fn only_the_reporter_can_update_or_delete() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (_, reporter) = server.register("Ada", "ada@example.com").await?;
    let (_, other) = server.register("Bob", "bob@example.com").await?;
    let item = server.report_item(&reporter, "Backpack").await?;
    let path = format!("/api/items/{}", item);

    let res = server.put(&path, &other, json!({ "title": "Mine now" })).await?;
    let body = expect_status(res, StatusCode::FORBIDDEN).await?;
    assert_eq!(body["message"], "Not authorized to update this item");

    let res = server.delete(&path, &other).await?;
    let body = expect_status(res, StatusCode::FORBIDDEN).await?;
    assert_eq!(body["message"], "Not authorized to delete this item");

    let res = server
        .put(&path, &reporter, json!({ "title": "Blue backpack", "category": "other" }))
        .await?;
    let body = expect_status(res, StatusCode::OK).await?;
    assert_eq!(body["message"], "Item updated successfully");
    assert_eq!(body["item"]["title"], "Blue backpack");
    assert_eq!(body["item"]["category"], "other");
    assert_eq!(body["item"]["type"], "found");
    Ok(())
}

#[tokio::test]
async fn update_with_new_images_replaces_the_old_ones() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (_, token) = server.register("Ada", "ada@example.com").await?;

    let res = server
        .client
        .post(server.url("/api/items"))
        .bearer_auth(&token)
        .multipart(item_form("Wallet", 2)?)
        .send()
        .await?;
    let body = expect_status(res, StatusCode::CREATED).await?;
    let id = body["item"]["id"].as_str().unwrap_or_default().to_string();

    let part = Part::bytes(vec![0xff, 0xd8, 0xff]).file_name("new.jpg").mime_str("image/jpeg")?;
    let res = server
        .client
        .put(server.url(&format!("/api/items/{}", id)))
        .bearer_auth(&token)
        .multipart(Form::new().part("images", part))
        .send()
        .await?;
    let body = expect_status(res, StatusCode::OK).await?;
    assert_eq!(body["item"]["images"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["item"]["title"], "Wallet");
    assert_eq!(server.media.stored_count().await, 1);
    Ok(())
}

#[tokio::test]
async fn deleted_items_disappear_and_lose_their_images() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (_, token) = server.register("Ada", "ada@example.com").await?;

    let res = server
        .client
        .post(server.url("/api/items"))
        .bearer_auth(&token)
        .multipart(item_form("Wallet", 1)?)
        .send()
        .await?;
    let body = expect_status(res, StatusCode::CREATED).await?;
    let id = body["item"]["id"].as_str().unwrap_or_default().to_string();
    let path = format!("/api/items/{}", id);

    // Media failures do not block the delete
    server.media.set_fail_deletes(true);
    let res = server.delete(&path, &token).await?;
    let body = expect_status(res, StatusCode::OK).await?;
    assert_eq!(body["message"], "Item deleted successfully");
    assert_eq!(server.media.deleted().await.len(), 1);

    let res = server.get(&path, None).await?;
    let body = expect_status(res, StatusCode::NOT_FOUND).await?;
    assert_eq!(body["message"], "Item not found");

    let res = server.post(&format!("{}/claim", path), Some(&token), json!({})).await?;
    expect_status(res, StatusCode::NOT_FOUND).await?;
    Ok(())
}

#[tokio::test]
async fn detail_counts_views_and_populates_people() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (ada_id, reporter) = server.register("Ada", "ada@example.com").await?;
    let (bob_id, bob) = server.register("Bob", "bob@example.com").await?;
    let item = server.report_item(&reporter, "Glasses").await?;
    let path = format!("/api/items/{}", item);

    let res = server.post(&format!("{}/claim", path), Some(&bob), json!({})).await?;
    expect_status(res, StatusCode::OK).await?;

    server.get(&path, None).await?;
    let res = server.get(&path, None).await?;
    let body = expect_status(res, StatusCode::OK).await?;

    let item = &body["item"];
    assert_eq!(item["views"], 2);
    assert_eq!(item["reportedBy"]["id"], ada_id.as_str());
    assert_eq!(item["reportedBy"]["name"], "Ada");
    assert!(item["reportedBy"].get("bio").is_some());
    assert_eq!(item["claimedBy"]["id"], bob_id.as_str());
    assert_eq!(item["claimedBy"]["email"], "bob@example.com");
    Ok(())
}

#[tokio::test]
async fn malformed_item_ids_are_bad_requests() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (_, token) = server.register("Ada", "ada@example.com").await?;

    let res = server.get("/api/items/not-an-id", None).await?;
    let body = expect_status(res, StatusCode::BAD_REQUEST).await?;
    assert_eq!(body["message"], "Invalid item ID format");

    let res = server.post("/api/items/42/claim", Some(&token), json!({})).await?;
    expect_status(res, StatusCode::BAD_REQUEST).await?;

    let res = server.get(&format!("/api/items/{}", Uuid::new_v4()), None).await?;
    expect_status(res, StatusCode::NOT_FOUND).await?;
    Ok(())
}
