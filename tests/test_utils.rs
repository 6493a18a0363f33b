#![allow(dead_code)]

use std::io::Cursor;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use actix_web::web;
use async_trait::async_trait;
use chrono::Utc;
use exif::experimental::Writer;
use exif::{Field, In, Rational, Tag, Value};
use image::{DynamicImage, ImageFormat};
use mockall::mock;
use photo_backend::{
    entities::{
        image::{ImageInsert, ImageRecord, ImageUpdate},
        user::{LoginUser, NewUser, User, UserInsert},
    },
    errors::AppError,
    inference::{Entity, InferenceClient, InferenceError, Prediction},
    repositories::{image::ImageRepository, user::UserRepository},
    settings::{AppConfig, AppEnvironment},
    storage::MediaStorage,
    AppState,
};
use tempfile::TempDir;
use uuid::Uuid;

pub const TEST_PASSWORD: &str = "secret123";
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Builds the full service the way `main` does, minus CORS and logging.
macro_rules! init_app {
    ($ctx:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data($ctx.state.clone())
                .app_data(photo_backend::routes::multipart_config($crate::test_utils::MAX_UPLOAD_BYTES))
                .wrap(photo_backend::middlewares::auth::AuthMiddleware)
                .wrap(actix_web::middleware::NormalizePath::trim())
                .configure(photo_backend::routes::configure_routes)
                .service(photo_backend::routes::static_files(&$ctx.config.storage_dir)),
        )
        .await
    };
}
pub(crate) use init_app;

pub fn test_config(storage_dir: PathBuf) -> AppConfig {
    AppConfig {
        env: AppEnvironment::Testing,
        name: "Photo-API Test".to_string(),
        port: 0,
        host: "127.0.0.1".to_string(),
        worker_count: 1,
        database_url: "postgres://unused".into(),
        cors_allowed_origins: vec!["*".to_string()],
        jwt_secret: "test_jwt_secret_that_is_long_enough_for_hs512_1234567890".into(),
        jwt_expiration_minutes: 30,
        refresh_token_secret: "test_refresh_secret_that_is_long_enough_1234567890".into(),
        refresh_token_exp_days: 1,
        storage_dir,
        max_upload_bytes: MAX_UPLOAD_BYTES,
        thumbnail_size: 300,
        object_score_threshold: 0.9,
        inference_url: None,
        inference_token: None,
        scene_model: "scene".into(),
        object_model: "objects".into(),
        ner_model: "ner".into(),
    }
}

pub struct TestContext {
    pub state: web::Data<AppState>,
    pub config: AppConfig,
    pub users: Arc<InMemoryUserRepo>,
    pub images: Arc<InMemoryImageRepo>,
    pub storage: MediaStorage,
    _dir: TempDir,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_inference(Arc::new(StubInference::default())).await
    }

    pub async fn with_inference(inference: Arc<dyn InferenceClient>) -> Self {
        let dir = tempfile::tempdir().expect("temp storage dir");
        let config = test_config(dir.path().to_path_buf());

        let storage = MediaStorage::new(dir.path());
        storage.ensure_dirs().await.expect("storage dirs");

        let users = Arc::new(InMemoryUserRepo::default());
        let images = Arc::new(InMemoryImageRepo::default());
        let state = web::Data::new(AppState::with_repositories(
            &config,
            users.clone(),
            images.clone(),
            inference,
        ));

        TestContext { state, config, users, images, storage, _dir: dir }
    }

    /// Registers `username` and returns an access token for it.
    pub async fn token_for(&self, username: &str) -> String {
        self.register(username).await;
        self.token_for_existing(username).await
    }

    pub async fn token_for_existing(&self, username: &str) -> String {
        self.state
            .auth_handler
            .login(LoginUser {
                username: username.to_string(),
                password: TEST_PASSWORD.to_string(),
            })
            .await
            .expect("login")
            .access_token
    }

    pub async fn register(&self, username: &str) -> Uuid {
        self.state
            .auth_handler
            .register(new_user(username))
            .await
            .expect("register")
            .id
    }

    pub fn original_exists(&self, name: &str) -> bool {
        self.storage.original_path(name).map(|p| p.exists()).unwrap_or(false)
    }

    pub fn thumbnail_exists(&self, name: &str) -> bool {
        self.storage.thumbnail_path(name).map(|p| p.exists()).unwrap_or(false)
    }
}

pub fn new_user(username: &str) -> NewUser {
    NewUser {
        username: username.to_string(),
        email: format!("{username}@example.com"),
        password: TEST_PASSWORD.to_string(),
    }
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {token}"))
}

// ───── Repositories ─────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryUserRepo {
    users: Mutex<Vec<User>>,
}

#[async_trait]
impl UserRepository for InMemoryUserRepo {
    async fn check_connection(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn create_user(&self, user: &UserInsert) -> Result<User, AppError> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.username == user.username) {
            return Err(AppError::Conflict("Username already registered".into()));
        }
        if users.iter().any(|u| u.email == user.email) {
            return Err(AppError::Conflict("Email already registered".into()));
        }

        let created = User {
            id: Uuid::new_v4(),
            username: user.username.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            created_at: user.created_at,
        };
        users.push(created.clone());
        Ok(created)
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        Ok(self.users.lock().unwrap().iter().find(|u| u.username == username).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self.users.lock().unwrap().iter().find(|u| u.email == email).cloned())
    }

    async fn get_user_by_id(&self, id: &Uuid) -> Result<Option<User>, AppError> {
        Ok(self.users.lock().unwrap().iter().find(|u| u.id == *id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryImageRepo {
    images: Mutex<Vec<ImageRecord>>,
}

impl InMemoryImageRepo {
    pub fn all(&self) -> Vec<ImageRecord> {
        self.images.lock().unwrap().clone()
    }

    fn newest_first(&self, owner: &Uuid) -> Vec<ImageRecord> {
        let mut owned: Vec<ImageRecord> = self
            .images
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|i| i.user_id == *owner)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.upload_time.cmp(&a.upload_time));
        owned
    }

    fn find_mut<R>(&self, id: &Uuid, owner: &Uuid, f: impl FnOnce(&mut ImageRecord) -> R) -> Result<R, AppError> {
        let mut images = self.images.lock().unwrap();
        images
            .iter_mut()
            .find(|i| i.id == *id && i.user_id == *owner)
            .map(f)
            .ok_or_else(|| AppError::NotFound("Image not found".into()))
    }
}

#[async_trait]
impl ImageRepository for InMemoryImageRepo {
    async fn check_connection(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn create_image(&self, image: &ImageInsert) -> Result<ImageRecord, AppError> {
        let record = ImageRecord {
            id: Uuid::new_v4(),
            user_id: image.user_id,
            filename: image.filename.clone(),
            thumbnail: image.thumbnail.clone(),
            upload_time: Utc::now(),
            capture_date: image.capture_date,
            location: Some(image.location.clone()),
            resolution: Some(image.resolution.clone()),
            ai_tags: image.ai_tags.clone(),
            description: image.description.clone(),
        };
        self.images.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn list_images(&self, owner: &Uuid, skip: i64, limit: i64) -> Result<Vec<ImageRecord>, AppError> {
        Ok(self
            .newest_first(owner)
            .into_iter()
            .skip(skip as usize)
            .take(limit as usize)
            .collect())
    }

    async fn get_image(&self, id: &Uuid, owner: &Uuid) -> Result<Option<ImageRecord>, AppError> {
        Ok(self
            .images
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.id == *id && i.user_id == *owner)
            .cloned())
    }

    async fn search_images(&self, owner: &Uuid, term: &str) -> Result<Vec<ImageRecord>, AppError> {
        let term = term.to_lowercase();
        let hit = |field: &Option<String>| {
            field.as_deref().map(|v| v.to_lowercase().contains(&term)).unwrap_or(false)
        };

        Ok(self
            .newest_first(owner)
            .into_iter()
            .filter(|i| {
                hit(&i.description)
                    || hit(&i.ai_tags)
                    || hit(&i.location)
                    || i.filename.to_lowercase().contains(&term)
            })
            .collect())
    }

    async fn update_metadata(&self, id: &Uuid, owner: &Uuid, update: &ImageUpdate) -> Result<ImageRecord, AppError> {
        self.find_mut(id, owner, |image| {
            if let Some(description) = &update.description {
                image.description = Some(description.clone());
            }
            if let Some(location) = &update.location {
                image.location = Some(location.clone());
            }
            if let Some(date) = update.capture_date {
                image.capture_date = Some(date);
            }
            image.clone()
        })
    }

    async fn update_content(&self, id: &Uuid, owner: &Uuid, resolution: &str) -> Result<ImageRecord, AppError> {
        self.find_mut(id, owner, |image| {
            image.resolution = Some(resolution.to_string());
            image.clone()
        })
    }

    async fn delete_image(&self, id: &Uuid, owner: &Uuid) -> Result<ImageRecord, AppError> {
        let mut images = self.images.lock().unwrap();
        let position = images
            .iter()
            .position(|i| i.id == *id && i.user_id == *owner)
            .ok_or_else(|| AppError::NotFound("Image not found".into()))?;
        Ok(images.remove(position))
    }
}

// ───── Inference ────────────────────────────────────────────────────

/// Canned answers for every pipeline; ready from the start.
pub struct StubInference {
    pub scene: Vec<Prediction>,
    pub objects: Vec<Prediction>,
    pub entities: Vec<Entity>,
    pub fail_vision: bool,
    pub fail_entities: bool,
    pub ready: AtomicBool,
}

impl Default for StubInference {
    fn default() -> Self {
        StubInference {
            scene: vec![Prediction::new("Seashore, coast", 0.7)],
            objects: vec![Prediction::new("Person", 0.98), Prediction::new("kite", 0.3)],
            entities: Vec::new(),
            fail_vision: false,
            fail_entities: false,
            ready: AtomicBool::new(true),
        }
    }
}

impl StubInference {
    pub fn with_entities(entities: Vec<Entity>) -> Self {
        StubInference { entities, ..Default::default() }
    }
}

#[async_trait]
impl InferenceClient for StubInference {
    async fn init(&self) -> Result<(), InferenceError> {
        self.ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn classify_scene(&self, _image: &[u8]) -> Result<Vec<Prediction>, InferenceError> {
        if self.fail_vision {
            return Err(InferenceError::Decode("scene model offline".into()));
        }
        Ok(self.scene.clone())
    }

    async fn detect_objects(&self, _image: &[u8]) -> Result<Vec<Prediction>, InferenceError> {
        if self.fail_vision {
            return Err(InferenceError::Decode("object model offline".into()));
        }
        Ok(self.objects.clone())
    }

    async fn extract_entities(&self, _text: &str) -> Result<Vec<Entity>, InferenceError> {
        if self.fail_entities {
            return Err(InferenceError::Decode("ner model offline".into()));
        }
        Ok(self.entities.clone())
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

mock! {
    pub Inference {}

    #[async_trait]
    impl InferenceClient for Inference {
        async fn init(&self) -> Result<(), InferenceError>;
        fn is_ready(&self) -> bool;
        async fn classify_scene(&self, image: &[u8]) -> Result<Vec<Prediction>, InferenceError>;
        async fn detect_objects(&self, image: &[u8]) -> Result<Vec<Prediction>, InferenceError>;
        async fn extract_entities(&self, text: &str) -> Result<Vec<Entity>, InferenceError>;
        fn name(&self) -> &'static str;
    }
}

// ───── Images and multipart bodies ──────────────────────────────────

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::new_rgb8(width, height)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

fn rationals(d: u32, m: u32, s: u32) -> Value {
    Value::Rational(vec![
        Rational { num: d, denom: 1 },
        Rational { num: m, denom: 1 },
        Rational { num: s, denom: 1 },
    ])
}

/// A JPEG taken at 40°26'46"N 79°58'56"W on 2023-07-14 18:30:05.
pub fn geotagged_jpeg(width: u32, height: u32) -> Vec<u8> {
    let fields = vec![
        Field { tag: Tag::DateTimeOriginal, ifd_num: In::PRIMARY, value: Value::Ascii(vec![b"2023:07:14 18:30:05".to_vec()]) },
        Field { tag: Tag::GPSLatitudeRef, ifd_num: In::PRIMARY, value: Value::Ascii(vec![b"N".to_vec()]) },
        Field { tag: Tag::GPSLatitude, ifd_num: In::PRIMARY, value: rationals(40, 26, 46) },
        Field { tag: Tag::GPSLongitudeRef, ifd_num: In::PRIMARY, value: Value::Ascii(vec![b"W".to_vec()]) },
        Field { tag: Tag::GPSLongitude, ifd_num: In::PRIMARY, value: rationals(79, 58, 56) },
    ];

    let mut writer = Writer::new();
    for field in &fields {
        writer.push_field(field);
    }
    let mut tiff = Cursor::new(Vec::new());
    writer.write(&mut tiff, false).unwrap();

    let mut plain = Cursor::new(Vec::new());
    DynamicImage::new_rgb8(width, height)
        .write_to(&mut plain, ImageFormat::Jpeg)
        .unwrap();
    let plain = plain.into_inner();

    let mut segment = b"Exif\0\0".to_vec();
    segment.extend_from_slice(&tiff.into_inner());

    let mut out = plain[..2].to_vec();
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&((segment.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(&segment);
    out.extend_from_slice(&plain[2..]);
    out
}

pub enum Part<'a> {
    File { name: &'a str, filename: &'a str, content_type: &'a str, bytes: Vec<u8> },
    Text { name: &'a str, value: &'a str },
}

const BOUNDARY: &str = "----photo-backend-test-boundary";

/// `(content-type header, body)` for a multipart/form-data request.
pub fn multipart(parts: Vec<Part<'_>>) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::File { name, filename, content_type, bytes } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                         Content-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(&bytes);
            }
            Part::Text { name, value } => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}").as_bytes(),
                );
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    (format!("multipart/form-data; boundary={BOUNDARY}"), body)
}

pub fn image_part<'a>(filename: &'a str, bytes: Vec<u8>) -> Part<'a> {
    let content_type = if filename.ends_with(".png") { "image/png" } else { "image/jpeg" };
    Part::File { name: "file", filename, content_type, bytes }
}
