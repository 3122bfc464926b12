//! Fresh, migrated databases for integration tests
//!
//! Tests run only when `DATABASE_URL` points at a PostgreSQL server the
//! current role may create databases on. Every test gets its own database,
//! dropped again by [`TestDb::drop`].

#![allow(dead_code)]

use api::{
    MIGRATOR,
    models::{AccessMode, NewVideo, Video, VideoStatus},
    repositories::VideoRepository,
};
use auth::{NewUser, Role, User, UserRepository};
use common::database::run_migrations;
use sqlx::{
    PgPool,
    postgres::{PgConnectOptions, PgPoolOptions},
};
use std::error::Error;
use uuid::Uuid;

pub type TestResult<T = ()> = Result<T, Box<dyn Error>>;

pub struct TestDb {
    pub pool: PgPool,
    server: PgPool,
    name: String,
}

impl TestDb {
    /// Create and migrate a database, or `None` when no server is configured
    pub async fn create() -> TestResult<Option<Self>> {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL not set, skipping database test");
            return Ok(None);
        };

        let server = PgPoolOptions::new().max_connections(1).connect(&url).await?;
        let name = format!("clipvault_test_{}", Uuid::new_v4().simple());
        sqlx::query(&format!("CREATE DATABASE {}", name))
            .execute(&server)
            .await?;

        let options: PgConnectOptions = url.parse()?;
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_with(options.database(&name))
            .await?;
        run_migrations(&pool, &MIGRATOR).await?;

        Ok(Some(Self { pool, server, name }))
    }

    pub async fn drop(self) -> TestResult {
        self.pool.close().await;
        sqlx::query(&format!("DROP DATABASE IF EXISTS {} WITH (FORCE)", self.name))
            .execute(&self.server)
            .await?;
        Ok(())
    }

    pub async fn user(&self, username: &str, role: Role) -> TestResult<User> {
        let users = UserRepository::new(self.pool.clone());
        let user = users
            .create(&NewUser {
                username: username.to_string(),
                email: format!("{}@example.com", username.to_lowercase()),
                password: "correct horse battery".to_string(),
            })
            .await?;

        if role == Role::User {
            return Ok(user);
        }
        Ok(users.set_role(user.id, role).await?.ok_or("user vanished")?)
    }

    /// Insert a video and move it through processing to `pending_approval`
    pub async fn pending_video(
        &self,
        uploader: &User,
        access_mode: AccessMode,
        single_username: Option<&str>,
        is_private: bool,
    ) -> TestResult<Video> {
        let videos = VideoRepository::new(self.pool.clone());
        let video = videos
            .insert(&NewVideo {
                uploader_id: uploader.id,
                title: format!("{} clip", access_mode.as_str()),
                description: None,
                video_url: format!("/uploads/{}.mp4", Uuid::new_v4()),
                category_id: None,
                is_private,
                is_community: false,
                access_mode,
                single_username: single_username.map(str::to_string),
            })
            .await?;

        videos
            .transition(video.id, VideoStatus::PendingApproval, None)
            .await?;
        Ok(videos.find_by_id(video.id).await?.ok_or("video vanished")?)
    }

    pub async fn approved_video(
        &self,
        uploader: &User,
        access_mode: AccessMode,
        single_username: Option<&str>,
        is_private: bool,
    ) -> TestResult<Video> {
        let video = self
            .pending_video(uploader, access_mode, single_username, is_private)
            .await?;

        let videos = VideoRepository::new(self.pool.clone());
        videos.transition(video.id, VideoStatus::Approved, None).await?;
        Ok(videos.find_by_id(video.id).await?.ok_or("video vanished")?)
    }

    pub async fn count(&self, sql: &str) -> TestResult<i64> {
        Ok(sqlx::query_scalar(sql).fetch_one(&self.pool).await?)
    }
}
