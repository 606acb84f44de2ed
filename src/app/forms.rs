//! Validation and binding of submitted post and comment fields.
//!
//! A form is checked with `validate`, which either reports field errors or
//! hands back a `Valid*` value. Only the validated type can be saved. Authors
//! and target posts are always supplied by the caller, never read from the
//! submitted fields.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::app::comments::CommentService;
use crate::app::groups::GroupService;
use crate::app::images::{sanitize_filename, ImageFile, ImageService};
use crate::app::posts::PostService;
use crate::domain::comment::Comment;
use crate::domain::post::Post;

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_CHOICE: &str =
    "Select a valid choice. That choice is not one of the available choices.";
pub const INVALID_IMAGE: &str = "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";
pub const INVALID_FILENAME: &str = "The submitted file has no usable name.";

/// Field name to messages, in a stable order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn field(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or_default()
    }
}

impl From<ValidationErrors> for FormErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut form_errors = FormErrors::default();
        for (field, errors) in errors.field_errors() {
            for error in errors {
                let message = error
                    .message
                    .as_ref()
                    .map(|message| message.to_string())
                    .unwrap_or_else(|| error.code.to_string());
                form_errors.add(&field, message);
            }
        }
        form_errors
    }
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("required");
        error.message = Some(REQUIRED.into());
        return Err(error);
    }
    Ok(())
}

/// A file part as received from the client, not yet checked.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub data: bytes::Bytes,
}

#[derive(Debug, Clone, Default, Validate)]
pub struct PostForm {
    #[validate(custom(function = "not_blank"))]
    pub text: String,
    /// Raw group id; empty means "no group".
    pub group: Option<String>,
    pub image: Option<ImageUpload>,
}

#[derive(Debug, Clone)]
pub struct ValidPostForm {
    text: String,
    group_id: Option<i64>,
    image: Option<ImageFile>,
}

impl PostForm {
    /// Checks every field. The outer `Result` carries storage failures, the
    /// inner one the verdict on the submitted values.
    pub async fn validate(self, groups: &GroupService) -> Result<Result<ValidPostForm, FormErrors>> {
        let mut errors = match Validate::validate(&self) {
            Ok(()) => FormErrors::default(),
            Err(errors) => errors.into(),
        };

        let group_id = match self.group.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => {
                let group = match raw.parse::<i64>() {
                    Ok(id) => groups.get_by_id(id).await?,
                    Err(_) => None,
                };
                if group.is_none() {
                    errors.add("group", INVALID_CHOICE);
                }
                group.map(|group| group.id)
            }
        };

        let image = match self.image {
            Some(upload) => match check_image(upload) {
                Ok(image) => Some(image),
                Err(message) => {
                    errors.add("image", message);
                    None
                }
            },
            None => None,
        };

        if !errors.is_empty() {
            return Ok(Err(errors));
        }

        Ok(Ok(ValidPostForm {
            text: self.text.trim().to_string(),
            group_id,
            image,
        }))
    }
}

fn check_image(upload: ImageUpload) -> Result<ImageFile, &'static str> {
    let filename = sanitize_filename(&upload.filename).ok_or(INVALID_FILENAME)?;
    let format = image::guess_format(&upload.data).map_err(|_| INVALID_IMAGE)?;
    image::load_from_memory_with_format(&upload.data, format).map_err(|_| INVALID_IMAGE)?;

    Ok(ImageFile {
        filename,
        content_type: format.to_mime_type(),
        data: upload.data,
    })
}

async fn discard_image(images: &ImageService, key: Option<&str>) {
    if let Some(key) = key {
        images.discard(key).await;
    }
}

impl ValidPostForm {
    async fn store_image(&mut self, images: &ImageService) -> Result<Option<String>> {
        match self.image.take() {
            Some(image) => Ok(Some(images.store(image).await?)),
            None => Ok(None),
        }
    }

    /// Persists a new post written by `author_id`.
    pub async fn save(
        mut self,
        posts: &PostService,
        images: &ImageService,
        author_id: Uuid,
    ) -> Result<Post> {
        let image = self.store_image(images).await?;
        let created = posts
            .create_post(author_id, self.text, self.group_id, image.clone())
            .await;
        if created.is_err() {
            discard_image(images, image.as_deref()).await;
        }
        created
    }

    /// Applies the form to an existing post. Yields `None` when `author_id`
    /// does not own it; an omitted image keeps the current one.
    pub async fn save_into(
        mut self,
        posts: &PostService,
        images: &ImageService,
        post_id: i64,
        author_id: Uuid,
    ) -> Result<Option<Post>> {
        let image = self.store_image(images).await?;
        let updated = posts
            .update_post(post_id, author_id, self.text, self.group_id, image.clone())
            .await;
        if !matches!(updated, Ok(Some(_))) {
            discard_image(images, image.as_deref()).await;
        }
        updated
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CommentForm {
    #[serde(default)]
    #[validate(custom(function = "not_blank"))]
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct ValidCommentForm {
    text: String,
}

impl CommentForm {
    pub fn validate(self) -> Result<ValidCommentForm, FormErrors> {
        Validate::validate(&self)?;
        Ok(ValidCommentForm {
            text: self.text.trim().to_string(),
        })
    }
}

impl ValidCommentForm {
    pub async fn save(
        self,
        comments: &CommentService,
        post_id: i64,
        author_id: Uuid,
    ) -> Result<Comment> {
        comments.create_comment(post_id, author_id, self.text).await
    }
}
