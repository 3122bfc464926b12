//! Upload, processing and detail routes against a real PostgreSQL database
//!
//! Skipped unless `DATABASE_URL` is set.

mod support;

use api::{
    AppState, create_router,
    models::{AccessMode, VideoStatus},
    repositories::{ModerationRepository, VideoRepository},
};
use async_trait::async_trait;
use auth::{AuthService, JwtConfig, JwtService, RateLimiter, RateLimiterConfig, Role, User, UserRepository};
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
};
use common::config::{AppConfig, AppEnv};
use media::{
    LocalStorage, MediaProcessor, MediaResult, ProcessedMedia, ProcessingJob, StorageBackend,
};
use serde_json::{Value, json};
use std::{sync::Arc, time::Duration};
use support::{TestDb, TestResult};
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

const BOUNDARY: &str = "clipvault-test-boundary";

struct InstantProcessor;

#[async_trait]
impl MediaProcessor for InstantProcessor {
    async fn process(&self, job: &ProcessingJob) -> MediaResult<ProcessedMedia> {
        Ok(ProcessedMedia {
            thumbnail_url: format!("/uploads/thumbnails/{}.jpg", job.video_id),
            duration_seconds: 12,
        })
    }
}

struct TestApp {
    router: Router,
    jwt: JwtService,
    uploads: TempDir,
}

impl TestApp {
    fn new(db: &TestDb) -> TestResult<Self> {
        let uploads = TempDir::new()?;
        let jwt = JwtService::new(JwtConfig {
            secret: "integration-secret-that-is-long-enough".to_string(),
            expiry_seconds: 600,
        });
        let auth = AuthService::new(
            UserRepository::new(db.pool.clone()),
            jwt.clone(),
            RateLimiter::new(RateLimiterConfig::default()),
        );
        let storage: Arc<dyn StorageBackend> =
            Arc::new(LocalStorage::new(uploads.path(), "/uploads"));

        let config = AppConfig {
            server_addr: "127.0.0.1:0".to_string(),
            app_env: AppEnv::Test,
            client_url: "http://localhost:5173".to_string(),
            upload_dir: uploads.path().to_string_lossy().into_owned(),
            public_upload_prefix: "/uploads".to_string(),
            max_upload_bytes: 1024 * 1024,
            membership_duration_days: 30,
            membership_price_cents: 500,
            membership_provider: "paypal".to_string(),
            membership_checkout_url: "https://payments.mock/membership".to_string(),
        };

        let state = AppState::new(
            db.pool.clone(),
            config,
            auth,
            storage,
            Arc::new(InstantProcessor),
        );

        Ok(Self {
            router: create_router(state),
            jwt,
            uploads,
        })
    }

    fn stored_files(&self) -> TestResult<usize> {
        Ok(std::fs::read_dir(self.uploads.path())?.count())
    }

    async fn upload(&self, user: &User, filename: &str, content: &[u8]) -> TestResult<Response> {
        let request = Request::post("/api/v1/videos/upload")
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.jwt.generate_token(user)?),
            )
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body("Weekend clip", filename, content)))?;

        Ok(self.router.clone().oneshot(request).await?)
    }

    async fn get_video(&self, id: Uuid, viewer: Option<&User>) -> TestResult<Response> {
        let mut request = Request::get(format!("/api/v1/videos/{}", id));
        if let Some(user) = viewer {
            request = request.header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.jwt.generate_token(user)?),
            );
        }

        Ok(self.router.clone().oneshot(request.body(Body::empty())?).await?)
    }
}

fn multipart_body(title: &str, filename: &str, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\n{title}\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"video\"; filename=\"{filename}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n",
            b = BOUNDARY,
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

/// Smallest header the signature check accepts as MP4
fn mp4_bytes() -> Vec<u8> {
    let mut bytes = vec![0x00, 0x00, 0x00, 0x18];
    bytes.extend_from_slice(b"ftypisom");
    bytes.extend_from_slice(&[0x00, 0x00, 0x02, 0x00]);
    bytes.extend_from_slice(b"isomiso2");
    bytes.extend_from_slice(&[0u8; 64]);
    bytes
}

async fn json_body(response: Response) -> TestResult<Value> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

async fn wait_for_status(db: &TestDb, id: Uuid, expected: VideoStatus) -> TestResult<VideoStatus> {
    let videos = VideoRepository::new(db.pool.clone());
    let mut status = VideoStatus::Processing;
    for _ in 0..50 {
        status = videos.find_by_id(id).await?.ok_or("video missing")?.status;
        if status == expected {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    Ok(status)
}

#[tokio::test]
async fn test_garbage_upload_leaves_no_row_or_file() -> TestResult {
    let Some(db) = TestDb::create().await? else {
        return Ok(());
    };
    let app = TestApp::new(&db)?;
    let uploader = db.user("uploader", Role::User).await?;

    // Accepted extension, wrong content: rejected after it reached disk
    let response = app
        .upload(&uploader, "holiday.mp4", b"this is plainly not a video file")
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await?, json!({ "error": "Invalid video file" }));

    // Unknown extension and content: rejected before anything is written
    let response = app.upload(&uploader, "notes.txt", b"plain text").await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await?, json!({ "error": "Invalid video file" }));

    assert_eq!(db.count("SELECT COUNT(*) FROM videos").await?, 0);
    assert_eq!(app.stored_files()?, 0);

    db.drop().await
}

#[tokio::test]
async fn test_valid_upload_is_processed_into_the_queue() -> TestResult {
    let Some(db) = TestDb::create().await? else {
        return Ok(());
    };
    let app = TestApp::new(&db)?;
    let uploader = db.user("uploader", Role::User).await?;

    // No extension; the container decides it
    let response = app.upload(&uploader, "recording", &mp4_bytes()).await?;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let body = json_body(response).await?;
    assert_eq!(body["video"]["status"], "processing");
    assert_eq!(body["video"]["title"], "Weekend clip");
    let video_url = body["video"]["video_url"].as_str().ok_or("video_url missing")?;
    assert!(video_url.ends_with(".mp4"));

    let id: Uuid = body["video"]["id"].as_str().ok_or("id missing")?.parse()?;
    let status = wait_for_status(&db, id, VideoStatus::PendingApproval).await?;
    assert_eq!(status, VideoStatus::PendingApproval);

    let video = VideoRepository::new(db.pool.clone())
        .find_by_id(id)
        .await?
        .ok_or("video missing")?;
    assert_eq!(video.duration_seconds, 12);
    assert_eq!(app.stored_files()?, 1);

    db.drop().await
}

#[tokio::test]
async fn test_creator_video_requires_sign_in() -> TestResult {
    let Some(db) = TestDb::create().await? else {
        return Ok(());
    };
    let app = TestApp::new(&db)?;
    let creator = db.user("creator", Role::Creator).await?;
    let viewer = db.user("viewer", Role::User).await?;
    let moderator = db.user("moderator", Role::Moderator).await?;

    let video = db
        .pending_video(&creator, AccessMode::Public, None, false)
        .await?;

    // Unapproved videos stay hidden from other viewers
    let response = app.get_video(video.id, Some(&viewer)).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    ModerationRepository::new(db.pool.clone())
        .approve(video.id, moderator.id, &[])
        .await?;

    let response = app.get_video(video.id, None).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.get_video(video.id, Some(&viewer)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await?;
    assert_eq!(body["id"], json!(video.id));

    db.drop().await
}
