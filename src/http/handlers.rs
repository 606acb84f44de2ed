use axum::{
    extract::{rejection::FormRejection, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use validator::{Validate, ValidationError};

use crate::app::auth::{AuthService, Signup};
use crate::app::comments::CommentService;
use crate::app::feed::{FeedScope, FeedService};
use crate::app::forms::{CommentForm, FormErrors};
use crate::app::groups::GroupService;
use crate::app::images::ImageService;
use crate::app::page_cache::PageCache;
use crate::app::pagination::{Page, PageQuery};
use crate::app::posts::PostService;
use crate::app::social::SocialService;
use crate::app::users::UserService;
use crate::domain::comment::Comment;
use crate::domain::group::Group;
use crate::domain::post::Post;
use crate::domain::user::{PublicUser, User};
use crate::http::error::{found, LOGIN_PATH};
use crate::http::extract::PostFormBody;
use crate::http::{AdminToken, AppError, AuthUser};
use crate::AppState;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let db = state.db.ping().await.is_ok();
    let redis = state.cache.ping().await.is_ok();
    let status = if db && redis { "ok" } else { "degraded" };

    Json(HealthResponse { status })
}

pub async fn not_found() -> AppError {
    AppError::not_found("page not found")
}

fn auth_service(state: &AppState) -> AuthService {
    AuthService::new(
        state.db.clone(),
        state.paseto_access_key,
        state.paseto_refresh_key,
        state.access_ttl_minutes,
        state.refresh_ttl_days,
    )
}

fn feed_service(state: &AppState) -> FeedService {
    FeedService::new(state.db.clone(), state.posts_per_page)
}

fn image_service(state: &AppState) -> ImageService {
    ImageService::new(state.cache.clone(), state.storage.clone())
}

fn profile_path(username: &str) -> String {
    format!("/profile/{}/", username)
}

fn post_path(post_id: i64) -> String {
    format!("/posts/{}/", post_id)
}

async fn feed_page(
    state: &AppState,
    scope: FeedScope,
    requested: i64,
) -> Result<Page<Post>, AppError> {
    let mut page = feed_service(state)
        .page(scope, requested)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, scope = ?scope, page = requested, "failed to load feed");
            AppError::internal("failed to load feed")
        })?;
    image_service(state)
        .populate_post_image_urls(&mut page.items)
        .await;
    Ok(page)
}

// Accounts

#[derive(Deserialize)]
pub struct LoginPageQuery {
    pub next: Option<String>,
}

#[derive(Serialize)]
pub struct LoginPage {
    pub action: &'static str,
    pub fields: [&'static str; 2],
    pub next: Option<String>,
}

pub async fn login_page(Query(query): Query<LoginPageQuery>) -> Json<LoginPage> {
    Json(LoginPage {
        action: LOGIN_PATH,
        fields: ["username", "password"],
        next: query.next,
    })
}

#[derive(Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub password: String,
}

const MAX_PASSWORD_LEN: usize = 128;

fn valid_username(username: &str) -> bool {
    !username.is_empty()
        && username.chars().count() <= 150
        && username
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
}

pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let username = payload.username.trim().to_string();
    if !valid_username(&username) {
        return Err(AppError::bad_request(
            "username may contain only letters, digits and @/./+/-/_",
        ));
    }
    if payload.email.trim().is_empty() {
        return Err(AppError::bad_request("email cannot be empty"));
    }
    if payload.password.trim().len() < 8 {
        return Err(AppError::bad_request("password must be at least 8 characters"));
    }
    if payload.password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request("password must be at most 128 characters"));
    }

    let user = auth_service(&state)
        .signup(Signup {
            username,
            email: payload.email.trim().to_string(),
            first_name: payload.first_name.trim().to_string(),
            last_name: payload.last_name.trim().to_string(),
            password: payload.password,
        })
        .await
        .map_err(|err| {
            if let Some(sqlx_err) = err.downcast_ref::<sqlx::Error>() {
                if let Some(db_err) = sqlx_err.as_database_error() {
                    if db_err.constraint() == Some("users_username_key") {
                        return AppError::conflict("username already taken");
                    }
                }
            }
            tracing::error!(error = ?err, "failed to create user");
            AppError::internal("failed to create user")
        })?;

    tracing::info!(user_id = %user.id, username = %user.username, "user signed up");
    Ok((StatusCode::CREATED, Json(user)))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct AuthTokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub access_expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub refresh_expires_at: OffsetDateTime,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthTokenResponse>, AppError> {
    if payload.username.trim().is_empty() || payload.password.trim().is_empty() {
        return Err(AppError::bad_request("username and password are required"));
    }
    if payload.password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request("password must be at most 128 characters"));
    }

    let tokens = auth_service(&state)
        .login(payload.username.trim(), &payload.password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to login");
            AppError::internal("failed to login")
        })?;

    match tokens {
        Some(tokens) => Ok(Json(AuthTokenResponse {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            access_expires_at: tokens.access_expires_at,
            refresh_expires_at: tokens.refresh_expires_at,
        })),
        None => Err(AppError::unauthorized("invalid credentials")),
    }
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthTokenResponse>, AppError> {
    if payload.refresh_token.trim().is_empty() {
        return Err(AppError::bad_request("refresh_token is required"));
    }

    let tokens = auth_service(&state)
        .refresh(&payload.refresh_token)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to refresh token");
            AppError::internal("failed to refresh token")
        })?;

    match tokens {
        Some(tokens) => Ok(Json(AuthTokenResponse {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            access_expires_at: tokens.access_expires_at,
            refresh_expires_at: tokens.refresh_expires_at,
        })),
        None => Err(AppError::unauthorized("invalid refresh token")),
    }
}

pub async fn logout(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<StatusCode, AppError> {
    if payload.refresh_token.trim().is_empty() {
        return Err(AppError::bad_request("refresh_token is required"));
    }

    let revoked = auth_service(&state)
        .revoke_refresh_token(&payload.refresh_token)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to revoke token");
            AppError::internal("failed to revoke token")
        })?;
    tracing::debug!(revoked, "logout");

    Ok(StatusCode::NO_CONTENT)
}

// Feeds

pub async fn index(
    query: PageQuery,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let requested = query.number();
    let cache = PageCache::new(state.cache.clone(), state.index_cache_ttl_seconds);
    if let Some(body) = cache.get(requested).await {
        return Ok(json_bytes(body));
    }

    let page = feed_page(&state, FeedScope::All, requested).await?;
    let body = serde_json::to_vec(&page).map_err(|err| {
        tracing::error!(error = ?err, "failed to render index page");
        AppError::internal("failed to render index page")
    })?;
    cache.put(requested, &body).await;

    Ok(json_bytes(body))
}

fn json_bytes(body: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}

#[derive(Serialize)]
pub struct GroupPage {
    pub group: Group,
    pub page: Page<Post>,
}

pub async fn group_posts(
    Path(slug): Path<String>,
    query: PageQuery,
    State(state): State<AppState>,
) -> Result<Json<GroupPage>, AppError> {
    let group = GroupService::new(state.db.clone())
        .get_by_slug(&slug)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, slug = %slug, "failed to fetch group");
            AppError::internal("failed to fetch group")
        })?
        .ok_or_else(|| AppError::not_found("group not found"))?;

    let page = feed_page(&state, FeedScope::Group(group.id), query.number()).await?;
    Ok(Json(GroupPage { group, page }))
}

#[derive(Serialize)]
pub struct ProfilePage {
    pub author: PublicUser,
    pub posts_count: i64,
    pub following: bool,
    pub page: Page<Post>,
}

pub async fn profile(
    Path(username): Path<String>,
    query: PageQuery,
    viewer: Option<AuthUser>,
    State(state): State<AppState>,
) -> Result<Json<ProfilePage>, AppError> {
    let author = UserService::new(state.db.clone())
        .get_by_username(&username)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, username = %username, "failed to fetch user");
            AppError::internal("failed to fetch user")
        })?
        .ok_or_else(|| AppError::not_found("user not found"))?;

    let posts_count = PostService::new(state.db.clone())
        .count_by_author(author.id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, author_id = %author.id, "failed to count posts");
            AppError::internal("failed to count posts")
        })?;

    let following = match viewer {
        Some(viewer) if viewer.user_id != author.id => SocialService::new(state.db.clone())
            .is_following(viewer.user_id, author.id)
            .await
            .map_err(|err| {
                tracing::error!(error = ?err, user_id = %viewer.user_id, author_id = %author.id, "failed to check follow");
                AppError::internal("failed to check follow")
            })?,
        _ => false,
    };

    let page = feed_page(&state, FeedScope::Author(author.id), query.number()).await?;
    Ok(Json(ProfilePage {
        author: author.into(),
        posts_count,
        following,
        page,
    }))
}

pub async fn follow_index(
    auth: AuthUser,
    query: PageQuery,
    State(state): State<AppState>,
) -> Result<Json<Page<Post>>, AppError> {
    let page = feed_page(&state, FeedScope::FollowedBy(auth.user_id), query.number()).await?;
    Ok(Json(page))
}

// Posts

async fn load_post(state: &AppState, post_id: i64) -> Result<Post, AppError> {
    PostService::new(state.db.clone())
        .get_post(post_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id, "failed to fetch post");
            AppError::internal("failed to fetch post")
        })?
        .ok_or_else(|| AppError::not_found("post not found"))
}

#[derive(Serialize)]
pub struct PostDetail {
    pub post: Post,
    pub posts_count: i64,
    pub comments: Vec<Comment>,
}

pub async fn post_detail(
    Path(post_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<PostDetail>, AppError> {
    let mut post = load_post(&state, post_id).await?;
    if let Some(key) = post.image.as_deref() {
        post.image_url = image_service(&state).image_url(key).await;
    }

    let posts_count = PostService::new(state.db.clone())
        .count_by_author(post.author_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, author_id = %post.author_id, "failed to count posts");
            AppError::internal("failed to count posts")
        })?;

    let comments = CommentService::new(state.db.clone())
        .list_for_post(post_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id, "failed to list comments");
            AppError::internal("failed to list comments")
        })?;

    Ok(Json(PostDetail {
        post,
        posts_count,
        comments,
    }))
}

/// Submitted values echoed back so a client can re-render the form.
#[derive(Serialize, Default)]
pub struct FormValues {
    pub text: String,
    pub group: Option<String>,
}

#[derive(Serialize)]
pub struct FormPage {
    pub form: FormValues,
    pub errors: FormErrors,
    pub is_edit: bool,
    pub post: Option<Post>,
    pub groups: Vec<Group>,
}

async fn form_page(
    state: &AppState,
    form: FormValues,
    errors: FormErrors,
    post: Option<Post>,
) -> Result<FormPage, AppError> {
    let groups = GroupService::new(state.db.clone())
        .list_groups()
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list groups");
            AppError::internal("failed to list groups")
        })?;

    Ok(FormPage {
        form,
        errors,
        is_edit: post.is_some(),
        post,
        groups,
    })
}

fn invalid_form(page: FormPage) -> Response {
    (StatusCode::BAD_REQUEST, Json(page)).into_response()
}

pub async fn post_create_form(
    _auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<FormPage>, AppError> {
    let page = form_page(&state, FormValues::default(), FormErrors::default(), None).await?;
    Ok(Json(page))
}

pub async fn post_create(
    auth: AuthUser,
    State(state): State<AppState>,
    PostFormBody(form): PostFormBody,
) -> Result<Response, AppError> {
    let values = FormValues {
        text: form.text.clone(),
        group: form.group.clone(),
    };
    let groups = GroupService::new(state.db.clone());
    let valid = form.validate(&groups).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to validate post");
        AppError::internal("failed to validate post")
    })?;

    let valid = match valid {
        Ok(valid) => valid,
        Err(errors) => return Ok(invalid_form(form_page(&state, values, errors, None).await?)),
    };

    let post = valid
        .save(
            &PostService::new(state.db.clone()),
            &image_service(&state),
            auth.user_id,
        )
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, author_id = %auth.user_id, "failed to create post");
            AppError::internal("failed to create post")
        })?;

    tracing::info!(post_id = post.id, author_id = %auth.user_id, summary = %post.summary(), "post created");
    Ok(found(profile_path(&post.author_username)))
}

pub async fn post_edit_form(
    Path(post_id): Path<i64>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let post = load_post(&state, post_id).await?;
    if !post.is_authored_by(auth.user_id) {
        return Ok(found(post_path(post_id)));
    }

    let values = FormValues {
        text: post.text.clone(),
        group: post.group.as_ref().map(|group| group.id.to_string()),
    };
    let page = form_page(&state, values, FormErrors::default(), Some(post)).await?;
    Ok(Json(page).into_response())
}

pub async fn post_edit(
    Path(post_id): Path<i64>,
    auth: AuthUser,
    State(state): State<AppState>,
    body: Result<PostFormBody, AppError>,
) -> Result<Response, AppError> {
    let post = load_post(&state, post_id).await?;
    if !post.is_authored_by(auth.user_id) {
        tracing::debug!(post_id, user_id = %auth.user_id, "edit by non-author ignored");
        return Ok(found(post_path(post_id)));
    }
    let PostFormBody(form) = body?;

    let values = FormValues {
        text: form.text.clone(),
        group: form.group.clone(),
    };
    let groups = GroupService::new(state.db.clone());
    let valid = form.validate(&groups).await.map_err(|err| {
        tracing::error!(error = ?err, post_id, "failed to validate post");
        AppError::internal("failed to validate post")
    })?;

    let valid = match valid {
        Ok(valid) => valid,
        Err(errors) => {
            return Ok(invalid_form(
                form_page(&state, values, errors, Some(post)).await?,
            ))
        }
    };

    let updated = valid
        .save_into(
            &PostService::new(state.db.clone()),
            &image_service(&state),
            post_id,
            auth.user_id,
        )
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id, "failed to update post");
            AppError::internal("failed to update post")
        })?;
    if let Some(post) = updated {
        tracing::info!(post_id, summary = %post.summary(), "post updated");
    }

    Ok(found(post_path(post_id)))
}

pub async fn add_comment(
    Path(post_id): Path<i64>,
    auth: AuthUser,
    State(state): State<AppState>,
    form: Result<Form<CommentForm>, FormRejection>,
) -> Result<Response, AppError> {
    load_post(&state, post_id).await?;

    let form = form.map(|Form(form)| form).unwrap_or_default();
    match form.validate() {
        Ok(valid) => {
            let comment = valid
                .save(&CommentService::new(state.db.clone()), post_id, auth.user_id)
                .await
                .map_err(|err| {
                    tracing::error!(error = ?err, post_id, "failed to create comment");
                    AppError::internal("failed to create comment")
                })?;
            tracing::debug!(comment_id = comment.id, post_id, summary = %comment.summary(), "comment added");
        }
        Err(errors) => {
            tracing::debug!(post_id, errors = ?errors.field("text"), "comment rejected");
        }
    }

    Ok(found(post_path(post_id)))
}

// Follows

async fn load_author(state: &AppState, username: &str) -> Result<User, AppError> {
    UserService::new(state.db.clone())
        .get_by_username(username)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, username = %username, "failed to fetch user");
            AppError::internal("failed to fetch user")
        })?
        .ok_or_else(|| AppError::not_found("user not found"))
}

pub async fn profile_follow(
    Path(username): Path<String>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let author = load_author(&state, &username).await?;

    if author.id != auth.user_id {
        let followed = SocialService::new(state.db.clone())
            .follow(auth.user_id, author.id)
            .await
            .map_err(|err| {
                tracing::error!(error = ?err, user_id = %auth.user_id, author_id = %author.id, "failed to follow user");
                AppError::internal("failed to follow user")
            })?;
        tracing::debug!(followed, user_id = %auth.user_id, author_id = %author.id, "follow");
    }

    Ok(found(profile_path(&author.username)))
}

pub async fn profile_unfollow(
    Path(username): Path<String>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let author = load_author(&state, &username).await?;

    let unfollowed = SocialService::new(state.db.clone())
        .unfollow(auth.user_id, author.id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, author_id = %author.id, "failed to unfollow user");
            AppError::internal("failed to unfollow user")
        })?;
    tracing::debug!(unfollowed, user_id = %auth.user_id, author_id = %author.id, "unfollow");

    Ok(found(profile_path(&author.username)))
}

// Administration

fn valid_slug(slug: &str) -> Result<(), ValidationError> {
    if slug
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Ok(());
    }
    let mut error = ValidationError::new("slug");
    error.message = Some("slug may contain only letters, digits, hyphens and underscores".into());
    Err(error)
}

#[derive(Deserialize, Validate)]
pub struct CreateGroupRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 50), custom(function = "valid_slug"))]
    pub slug: String,
    #[serde(default)]
    pub description: String,
}

pub async fn create_group(
    _admin: AdminToken,
    State(state): State<AppState>,
    Json(payload): Json<CreateGroupRequest>,
) -> Result<(StatusCode, Json<Group>), AppError> {
    payload
        .validate()
        .map_err(|err| AppError::bad_request(err.to_string()))?;

    let group = GroupService::new(state.db.clone())
        .create_group(payload.title, payload.slug, payload.description)
        .await
        .map_err(|err| {
            if let Some(sqlx_err) = err.downcast_ref::<sqlx::Error>() {
                if let Some(db_err) = sqlx_err.as_database_error() {
                    if db_err.constraint() == Some("groups_slug_key") {
                        return AppError::conflict("slug already taken");
                    }
                }
            }
            tracing::error!(error = ?err, "failed to create group");
            AppError::internal("failed to create group")
        })?;

    tracing::info!(group_id = group.id, slug = %group.slug, group = %group, "group created");
    Ok((StatusCode::CREATED, Json(group)))
}

pub async fn delete_group(
    _admin: AdminToken,
    Path(slug): Path<String>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let deleted = GroupService::new(state.db.clone())
        .delete_by_slug(&slug)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, slug = %slug, "failed to delete group");
            AppError::internal("failed to delete group")
        })?;

    if !deleted {
        return Err(AppError::not_found("group not found"));
    }
    tracing::info!(slug = %slug, "group deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
pub struct ClearCacheResponse {
    pub removed: usize,
}

pub async fn clear_cache(
    _admin: AdminToken,
    State(state): State<AppState>,
) -> Result<Json<ClearCacheResponse>, AppError> {
    let removed = PageCache::new(state.cache.clone(), state.index_cache_ttl_seconds)
        .clear()
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to clear page cache");
            AppError::internal("failed to clear page cache")
        })?;

    Ok(Json(ClearCacheResponse { removed }))
}
