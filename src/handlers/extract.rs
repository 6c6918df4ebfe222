//! Request extractors shared by the handlers.
//!
//! Item and profile writes accept either `multipart/form-data` (text fields plus image files)
//! or a plain JSON body.

use axum::{
    async_trait,
    body::Bytes,
    extract::{multipart::Field, FromRequest, FromRequestParts, Multipart, Query, Request},
    http::{header::CONTENT_TYPE, request::Parts, StatusCode},
};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::ApiError;
use crate::media::ImageUpload;
use crate::services::item_service::{ItemInput, LocationInput};
use crate::services::user_service::UserInput;

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
pub const MAX_ITEM_IMAGES: usize = 5;

const ALLOWED_MIME_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/gif", "image/webp"];
const ALLOWED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

/// Parses a path id, answering 400 with `message` when it is not a UUID.
pub fn parse_id(raw: &str, message: &'static str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::bad_request(message))
}

/// JSON body where an empty body means `T::default()`. Malformed JSON is a 400 in the
/// usual envelope.
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Default,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        parse_json_body(&bytes).map(JsonBody)
    }
}

/// Query string, rejected with a 400 in the usual envelope when it does not deserialize.
#[derive(Debug)]
pub struct QueryParams<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for QueryParams<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        Ok(QueryParams(value))
    }
}

fn parse_json_body<T: DeserializeOwned + Default>(bytes: &[u8]) -> Result<T, ApiError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(bytes).map_err(|e| ApiError::invalid_json(format!("Invalid JSON body: {}", e)))
}

fn is_multipart(req: &Request) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase().starts_with("multipart/form-data"))
        .unwrap_or(false)
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large("Request body too large")
    } else {
        ApiError::bad_request(format!("File upload error: {}", e.body_text()))
    }
}

/// Checks type and extension, then reads the file with the 5 MB cap.
async fn read_image(field: Field<'_>) -> Result<ImageUpload, ApiError> {
    let file_name = field.file_name().unwrap_or_default().to_string();
    let content_type = field.content_type().unwrap_or_default().to_ascii_lowercase();
    check_image_type(&file_name, &content_type)?;

    let data = field.bytes().await.map_err(multipart_error)?;
    if data.len() > MAX_IMAGE_BYTES {
        return Err(ApiError::bad_request("File size exceeds 5MB limit"));
    }
    Ok(ImageUpload {
        file_name,
        content_type,
        data,
    })
}

fn check_image_type(file_name: &str, content_type: &str) -> Result<(), ApiError> {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    if ALLOWED_MIME_TYPES.contains(&content_type) && ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        Ok(())
    } else {
        Err(ApiError::bad_request("Only image files are allowed (jpg, png, gif, webp)"))
    }
}

async fn read_text(field: Field<'_>) -> Result<String, ApiError> {
    field.text().await.map_err(multipart_error)
}

fn parse_coordinate(value: &str) -> Result<Option<f64>, ApiError> {
    let value = value.trim();
    if value.is_empty() || value == "null" {
        return Ok(None);
    }
    value
        .parse::<f64>()
        .map(Some)
        .map_err(|_| ApiError::bad_request("Invalid location coordinates"))
}

/// `location` sent as one form field: a JSON object, or a bare name.
fn parse_location_field(value: &str) -> LocationInput {
    serde_json::from_str::<LocationInput>(value).unwrap_or_else(|_| LocationInput {
        name: Some(value.to_string()),
        ..Default::default()
    })
}

/// Item create/update body.
#[derive(Debug)]
pub struct ItemForm(pub ItemInput);

#[async_trait]
impl<S> FromRequest<S> for ItemForm
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if !is_multipart(&req) {
            let JsonBody(input) = JsonBody::<ItemInput>::from_request(req, state).await?;
            return Ok(ItemForm(input));
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        let mut input = ItemInput::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();
            if field.file_name().is_some() {
                if name != "images" {
                    return Err(ApiError::bad_request(format!("Unexpected file field '{}'", name)));
                }
                if input.images.len() == MAX_ITEM_IMAGES {
                    return Err(ApiError::bad_request("Too many files uploaded"));
                }
                input.images.push(read_image(field).await?);
                continue;
            }

            let value = read_text(field).await?;
            match name.as_str() {
                "title" => input.title = Some(value),
                "description" => input.description = Some(value),
                "type" => input.item_type = Some(value),
                "category" => input.category = Some(value),
                "dateOccurred" => input.date_occurred = Some(value),
                "contactMethod" => input.contact_method = Some(value),
                "location" => input.location = Some(parse_location_field(&value)),
                "location[name]" => input.location.get_or_insert_with(Default::default).name = Some(value),
                "location[latitude]" => {
                    input.location.get_or_insert_with(Default::default).latitude = parse_coordinate(&value)?
                }
                "location[longitude]" => {
                    input.location.get_or_insert_with(Default::default).longitude = parse_coordinate(&value)?
                }
                other => tracing::debug!("Ignoring form field '{}'", other),
            }
        }

        Ok(ItemForm(input))
    }
}

#[derive(Debug, Default, serde::Deserialize)]
struct ProfileFields {
    name: Option<String>,
    bio: Option<String>,
    link: Option<String>,
}

/// Profile update body.
#[derive(Debug)]
pub struct UserForm(pub UserInput);

#[async_trait]
impl<S> FromRequest<S> for UserForm
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if !is_multipart(&req) {
            let JsonBody(fields) = JsonBody::<ProfileFields>::from_request(req, state).await?;
            return Ok(UserForm(UserInput {
                name: fields.name,
                bio: fields.bio,
                link: fields.link,
                ..Default::default()
            }));
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        let mut input = UserInput::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();
            if field.file_name().is_some() {
                let slot = match name.as_str() {
                    "profileimg" => &mut input.profileimg,
                    "coverimg" => &mut input.coverimg,
                    other => return Err(ApiError::bad_request(format!("Unexpected file field '{}'", other))),
                };
                if slot.is_some() {
                    return Err(ApiError::bad_request("Too many files uploaded"));
                }
                *slot = Some(read_image(field).await?);
                continue;
            }

            let value = read_text(field).await?;
            match name.as_str() {
                "name" => input.name = Some(value),
                "bio" => input.bio = Some(value),
                "link" => input.link = Some(value),
                other => tracing::debug!("Ignoring form field '{}'", other),
            }
        }

        Ok(UserForm(input))
    }
}
