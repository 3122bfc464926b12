//! Video routes: listings, detail, upload and engagement

use auth::{Capability, User, validation::validate_username};
use axum::{
    Extension, Json, Router,
    extract::{Multipart, Path, Query, State, multipart::Field},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{delete, get, post},
};
use common::background::spawn_best_effort;
use media::{
    ProcessingJob, generate_filename,
    validator::{SIGNATURE_LEN, validate_or_discard},
};
use serde::Deserialize;
use serde_json::json;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    middleware::{AuthUser, optional_auth, require_auth, require_capability},
    models::{AccessMode, ListQuery, NewComment, NewVideo, UpdateVideo, Video},
    policy::{self, ListingScope},
    repositories::{AuditEntry, Feed, VideoPage},
    routes::access,
    state::AppState,
};

const MAX_TITLE_LEN: usize = 255;

pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/", get(list_videos))
        .route("/community", get(community_videos))
        .route("/:id", get(get_video))
        .route("/:id/comments", get(list_comments))
        .route_layer(middleware::from_fn_with_state(state.clone(), optional_auth));

    let upload = Router::new()
        .route("/upload", post(upload_video))
        .route_layer(middleware::from_fn_with_state(
            Capability::Upload,
            require_capability,
        ));

    let protected = Router::new()
        .route("/mine", get(my_videos))
        .route("/favorites", get(favorite_videos))
        .route("/history", get(watch_history))
        .route("/history/all", delete(clear_history))
        .route("/:id", axum::routing::put(update_video).delete(delete_video))
        .route("/:id/rate", post(rate_video))
        .route("/:id/flag", post(flag_video))
        .route("/:id/favorite", post(toggle_favorite))
        .route("/:id/history", post(record_history).delete(remove_history))
        .route("/:id/comments", post(add_comment))
        .route("/comments/:comment_id", delete(delete_comment))
        .route("/:id/removal-request", post(request_removal))
        .merge(access::router())
        .merge(upload)
        .route_layer(middleware::from_fn_with_state(state, require_auth));

    public.merge(protected)
}

fn viewer(auth: &Option<Extension<AuthUser>>) -> Option<&User> {
    auth.as_ref().map(|Extension(AuthUser(user))| user)
}

/// Load a video and run the access policy for `viewer`
pub(crate) async fn load_visible(
    state: &AppState,
    id: Uuid,
    viewer: Option<&User>,
) -> ApiResult<Video> {
    let video = state
        .videos
        .find_by_id(id)
        .await?
        .ok_or_else(ApiError::video_not_found)?;

    policy::decide(&video, viewer, &state.policy_facts())
        .await?
        .into_result()?;

    Ok(video)
}

async fn list_feed(
    state: &AppState,
    viewer: Option<&User>,
    feed: Feed,
    query: &ListQuery,
) -> ApiResult<Json<VideoPage>> {
    let scope = ListingScope::for_viewer(viewer, &state.policy_facts()).await?;
    let page = state.videos.list(&scope, feed, query).await?;
    Ok(Json(page))
}

pub async fn list_videos(
    State(state): State<AppState>,
    auth: Option<Extension<AuthUser>>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<VideoPage>> {
    list_feed(&state, viewer(&auth), Feed::Browse, &query).await
}

pub async fn community_videos(
    State(state): State<AppState>,
    auth: Option<Extension<AuthUser>>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<VideoPage>> {
    list_feed(&state, viewer(&auth), Feed::Community, &query).await
}

pub async fn favorite_videos(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<VideoPage>> {
    list_feed(&state, Some(&user), Feed::Favorites(user.id), &query).await
}

pub async fn watch_history(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<VideoPage>> {
    list_feed(&state, Some(&user), Feed::History(user.id), &query).await
}

/// The caller's own uploads in every status
pub async fn my_videos(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> ApiResult<Json<Vec<Video>>> {
    Ok(Json(state.videos.list_by_uploader(user.id).await?))
}

pub async fn get_video(
    State(state): State<AppState>,
    auth: Option<Extension<AuthUser>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Video>> {
    let video = load_visible(&state, id, viewer(&auth)).await?;

    let videos = state.videos.clone();
    spawn_best_effort("increment_views", async move {
        videos.increment_views(id).await
    });

    Ok(Json(video))
}

/// Form fields of an upload; the file itself is already on disk
#[derive(Debug, Default)]
struct UploadForm {
    filename: Option<String>,
    title: Option<String>,
    description: Option<String>,
    category_id: Option<String>,
    is_private: bool,
    is_community: bool,
    access_mode: Option<String>,
    single_username: Option<String>,
}

fn form_flag(value: &str) -> bool {
    matches!(value.trim(), "true" | "1" | "on")
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

async fn store_video_field(
    state: &AppState,
    mut field: Field<'_>,
    form: &mut UploadForm,
) -> ApiResult<()> {
    if form.filename.is_some() {
        return Err(ApiError::BadRequest("Only one video file per upload".to_string()));
    }

    // The container decides the extension when the client name has none we accept
    let mut header = Vec::with_capacity(SIGNATURE_LEN);
    let mut pending = Vec::new();
    while header.len() < SIGNATURE_LEN {
        let Some(chunk) = field.chunk().await? else {
            break;
        };
        let take = chunk.len().min(SIGNATURE_LEN - header.len());
        header.extend_from_slice(&chunk[..take]);
        pending.push(chunk);
    }

    let filename = generate_filename(field.file_name(), &header)?;
    form.filename = Some(filename.clone());

    let mut writer = state.storage.create(&filename).await?;
    for chunk in pending {
        write_chunk(&mut writer, &chunk).await?;
    }
    while let Some(chunk) = field.chunk().await? {
        write_chunk(&mut writer, &chunk).await?;
    }
    writer
        .shutdown()
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to finish upload: {}", e)))?;

    Ok(())
}

async fn write_chunk<W>(writer: &mut W, chunk: &[u8]) -> ApiResult<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    writer
        .write_all(chunk)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to write upload: {}", e)))
}

async fn read_upload(state: &AppState, multipart: &mut Multipart, form: &mut UploadForm) -> ApiResult<()> {
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "video" {
            store_video_field(state, field, form).await?;
            continue;
        }

        let value = field.text().await?;
        match name.as_str() {
            "title" => form.title = non_empty(value),
            "description" => form.description = non_empty(value),
            "category_id" => form.category_id = non_empty(value),
            "is_private" => form.is_private = form_flag(&value),
            "is_community" => form.is_community = form_flag(&value),
            "access_mode" => form.access_mode = non_empty(value),
            "single_username" => form.single_username = non_empty(value),
            other => warn!("Ignoring unknown upload field {}", other),
        }
    }
    Ok(())
}

/// Validate the stored file and the form, insert the row and queue processing
async fn accept_upload(state: &AppState, uploader: &User, form: UploadForm) -> ApiResult<Video> {
    let filename = form
        .filename
        .ok_or_else(|| ApiError::Validation("No video file uploaded".to_string()))?;

    let title = form
        .title
        .ok_or_else(|| ApiError::Validation("Title is required".to_string()))?;
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ApiError::Validation("Title is too long".to_string()));
    }

    let access_mode = match form.access_mode.as_deref() {
        Some(mode) => mode.parse::<AccessMode>()?,
        None => AccessMode::Public,
    };

    let category_id = form
        .category_id
        .as_deref()
        .map(Uuid::parse_str)
        .transpose()
        .map_err(|_| ApiError::Validation("Invalid category_id".to_string()))?;

    let single_username = match access_mode {
        AccessMode::UsernameOnly => form.single_username,
        _ => None,
    };
    if let Some(name) = single_username.as_deref() {
        validate_username(name).map_err(ApiError::Validation)?;
    }

    validate_or_discard(state.storage.as_ref(), &filename).await?;

    let video = state
        .videos
        .insert(&NewVideo {
            uploader_id: uploader.id,
            title,
            description: form.description,
            video_url: state.storage.file_url(&filename),
            category_id,
            is_private: form.is_private,
            is_community: form.is_community,
            access_mode,
            single_username,
        })
        .await?;

    state
        .queue
        .enqueue(ProcessingJob {
            video_id: video.id,
            file_path: state.storage.local_path(&filename)?,
            filename,
        })
        .await;

    Ok(video)
}

/// Multipart upload. The file is checked before any row exists; on any
/// failure the stored file is removed.
pub async fn upload_video(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let mut form = UploadForm::default();
    let read = read_upload(&state, &mut multipart, &mut form).await;
    let filename = form.filename.clone();

    let outcome = match read {
        Ok(()) => accept_upload(&state, &user, form).await,
        Err(e) => Err(e),
    };

    match outcome {
        Ok(video) => {
            info!("Video {} uploaded by {}", video.id, user.id);
            Ok((
                StatusCode::ACCEPTED,
                Json(json!({
                    "message": "Upload successful, processing started",
                    "video": video,
                })),
            ))
        }
        Err(e) => {
            if let Some(filename) = filename {
                if let Err(cleanup) = state.storage.delete(&filename).await {
                    warn!("Failed to remove rejected upload {}: {}", filename, cleanup);
                }
            }
            Err(e)
        }
    }
}

/// Load a video the user owns, or may manage through `capability`
pub(crate) async fn load_owned(
    state: &AppState,
    id: Uuid,
    user: &User,
    capability: Capability,
) -> ApiResult<Video> {
    let video = load_visible_or_owned(state, id, user).await?;

    if video.uploader_id != user.id && !user.role.has_capability(capability) {
        return Err(ApiError::Forbidden(
            "You do not have permission to manage this video".to_string(),
        ));
    }
    Ok(video)
}

/// Missing and hidden videos both answer 404 so that ownership checks do not
/// reveal unapproved or restricted uploads
async fn load_visible_or_owned(state: &AppState, id: Uuid, user: &User) -> ApiResult<Video> {
    let video = state
        .videos
        .find_by_id(id)
        .await?
        .ok_or_else(ApiError::video_not_found)?;

    if video.uploader_id == user.id {
        return Ok(video);
    }

    policy::decide(&video, Some(user), &state.policy_facts())
        .await?
        .into_result()?;
    Ok(video)
}

pub async fn update_video(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(update): Json<UpdateVideo>,
) -> ApiResult<Json<Video>> {
    load_owned(&state, id, &user, Capability::ManageAnyVideo).await?;

    if let Some(title) = update.title.as_deref() {
        let title = title.trim();
        if title.is_empty() || title.chars().count() > MAX_TITLE_LEN {
            return Err(ApiError::Validation(
                "Title must be between 1 and 255 characters".to_string(),
            ));
        }
    }

    let video = state
        .videos
        .update_metadata(id, &update)
        .await?
        .ok_or_else(ApiError::video_not_found)?;

    Ok(Json(video))
}

pub async fn delete_video(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let video = load_owned(&state, id, &user, Capability::DeleteAnyVideo).await?;

    let deleted = state
        .videos
        .delete(id)
        .await?
        .ok_or_else(ApiError::video_not_found)?;

    let urls = std::iter::once(deleted.video_url).chain(deleted.thumbnail_url);
    for url in urls {
        let Some(filename) = state.storage.filename_from_url(&url) else {
            continue;
        };
        if let Err(e) = state.storage.delete(&filename).await {
            warn!("Failed to delete stored file {}: {}", filename, e);
        }
    }

    if video.uploader_id != user.id {
        let audit = state.audit.clone();
        let entry = AuditEntry::new(
            Some(user.id),
            "delete_video",
            "video",
            id,
            json!({ "title": video.title, "uploader_id": video.uploader_id }),
        );
        spawn_best_effort("audit_delete_video", async move { audit.record(entry).await });
    }

    Ok(Json(json!({ "message": "Video deleted" })))
}

#[derive(Debug, Deserialize)]
pub struct RateRequest {
    pub rating: i32,
}

pub async fn rate_video(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RateRequest>,
) -> ApiResult<impl IntoResponse> {
    let is_like = match payload.rating {
        1 => true,
        -1 => false,
        _ => return Err(ApiError::Validation("rating must be 1 or -1".to_string())),
    };

    load_visible(&state, id, Some(&user)).await?;
    let outcome = state.engagement.rate(id, user.id, is_like).await?;

    Ok(Json(outcome))
}

/// Body shared by flags and removal requests
#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    pub reason: String,
    pub description: Option<String>,
}

impl ReportRequest {
    fn reason(&self) -> ApiResult<&str> {
        let reason = self.reason.trim();
        if reason.is_empty() || reason.chars().count() > 100 {
            return Err(ApiError::Validation(
                "reason must be between 1 and 100 characters".to_string(),
            ));
        }
        Ok(reason)
    }

    fn description(&self) -> Option<&str> {
        self.description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }
}

pub async fn flag_video(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReportRequest>,
) -> ApiResult<impl IntoResponse> {
    let reason = payload.reason()?;
    load_visible(&state, id, Some(&user)).await?;

    let outcome = state
        .moderation
        .flag(id, user.id, reason, payload.description())
        .await?;

    Ok((StatusCode::CREATED, Json(outcome)))
}

pub async fn request_removal(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReportRequest>,
) -> ApiResult<impl IntoResponse> {
    let reason = payload.reason()?;
    load_visible(&state, id, Some(&user)).await?;

    let request = state
        .removals
        .create(id, user.id, reason, payload.description())
        .await?;

    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn toggle_favorite(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    load_visible(&state, id, Some(&user)).await?;
    let favorited = state.engagement.toggle_favorite(user.id, id).await?;

    Ok(Json(json!({ "favorited": favorited })))
}

pub async fn record_history(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    load_visible(&state, id, Some(&user)).await?;
    state.engagement.record_history(user.id, id).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_history(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if !state.engagement.remove_history(user.id, id).await? {
        return Err(ApiError::NotFound("Video is not in your history".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn clear_history(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> ApiResult<impl IntoResponse> {
    let removed = state.engagement.clear_history(user.id).await?;
    Ok(Json(json!({ "removed": removed })))
}

pub async fn list_comments(
    State(state): State<AppState>,
    auth: Option<Extension<AuthUser>>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    load_visible(&state, id, viewer(&auth)).await?;
    Ok(Json(state.engagement.comments(id).await?))
}

pub async fn add_comment(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<NewComment>,
) -> ApiResult<impl IntoResponse> {
    let content = payload.validated()?;
    load_visible(&state, id, Some(&user)).await?;

    let comment = state.engagement.add_comment(id, user.id, content).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// Authors, the video's uploader and moderators may delete a comment
pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(comment_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let ownership = state
        .engagement
        .comment_ownership(comment_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Comment not found".to_string()))?;

    let allowed = ownership.author_id == user.id
        || ownership.uploader_id == user.id
        || user.role.has_capability(Capability::Moderate);
    if !allowed {
        return Err(ApiError::Forbidden(
            "You cannot delete this comment".to_string(),
        ));
    }

    state.engagement.delete_comment(comment_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
