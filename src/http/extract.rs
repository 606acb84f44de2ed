use std::convert::Infallible;

use axum::extract::{FromRequest, FromRequestParts, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use axum::http::request::Parts;
use axum::Form;
use serde::Deserialize;

use crate::app::forms::{ImageUpload, PostForm};
use crate::app::pagination::PageQuery;
use crate::http::AppError;

/// `?page=` never rejects: whatever the query string holds resolves to some page.
#[axum::async_trait]
impl<S> FromRequestParts<S> for PageQuery
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(PageQuery::from_query(parts.uri.query()))
    }
}

/// Post fields submitted either as `multipart/form-data` (the only way to
/// attach an image) or as a urlencoded form.
pub struct PostFormBody(pub PostForm);

#[derive(Deserialize)]
struct PostFields {
    #[serde(default)]
    text: String,
    #[serde(default)]
    group: Option<String>,
}

#[axum::async_trait]
impl<S> FromRequest<S> for PostFormBody
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.starts_with("multipart/form-data"))
            .unwrap_or(false);

        if !is_multipart {
            let Form(fields) = Form::<PostFields>::from_request(req, state)
                .await
                .map_err(|err| AppError::bad_request(err.body_text()))?;
            return Ok(Self(PostForm {
                text: fields.text,
                group: fields.group,
                image: None,
            }));
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|err| AppError::bad_request(err.body_text()))?;

        let mut form = PostForm::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|err| AppError::bad_request(err.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "text" => {
                    form.text = field
                        .text()
                        .await
                        .map_err(|err| AppError::bad_request(err.body_text()))?;
                }
                "group" => {
                    let group = field
                        .text()
                        .await
                        .map_err(|err| AppError::bad_request(err.body_text()))?;
                    form.group = Some(group);
                }
                "image" => {
                    let filename = field.file_name().unwrap_or_default().to_string();
                    let data = field
                        .bytes()
                        .await
                        .map_err(|err| AppError::bad_request(err.body_text()))?;
                    // Browsers send an empty part when no file was picked.
                    if !data.is_empty() {
                        form.image = Some(ImageUpload { filename, data });
                    }
                }
                _ => {}
            }
        }

        Ok(Self(form))
    }
}
