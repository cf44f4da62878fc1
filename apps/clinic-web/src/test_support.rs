//! Infraestrutura dos testes de rota: banco em memória, colaboradores falsos e
//! helpers de requisição

use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::Duration;
use clinic_db::crypto::ResetCodeKey;
use clinic_db::models::Account;
use clinic_db::sessions;
use clinic_db::test_utils::test_pool;
use futures_util::future::BoxFuture;
use serde_json::Value;
use tower::ServiceExt;

use crate::auth::JwtKeys;
use crate::router::build_router;
use crate::services::{Email, MailError, Mailer, PhotoMetadata, PhotoStore, PhotoStoreError};
use crate::state::AppState;

const MULTIPART_BOUNDARY: &str = "clinic-test-boundary";

/// Guarda os metadados de cada foto recebida
#[derive(Default)]
pub(crate) struct RecordingPhotoStore {
    pub uploads: Mutex<Vec<PhotoMetadata>>,
}

impl RecordingPhotoStore {
    pub fn uploads(&self) -> Vec<PhotoMetadata> {
        self.uploads.lock().map(|u| u.clone()).unwrap_or_default()
    }
}

impl PhotoStore for RecordingPhotoStore {
    fn store(
        &self,
        _bytes: Vec<u8>,
        metadata: PhotoMetadata,
    ) -> BoxFuture<'_, Result<String, PhotoStoreError>> {
        Box::pin(async move {
            let url = format!("https://img.test/{}{}", metadata.folder, metadata.public_id);
            if let Ok(mut uploads) = self.uploads.lock() {
                uploads.push(metadata);
            }
            Ok(url)
        })
    }
}

pub(crate) struct FailingPhotoStore;

impl PhotoStore for FailingPhotoStore {
    fn store(
        &self,
        _bytes: Vec<u8>,
        _metadata: PhotoMetadata,
    ) -> BoxFuture<'_, Result<String, PhotoStoreError>> {
        Box::pin(async {
            Err(PhotoStoreError::Rejected {
                status: 400,
                message: "Invalid image file".to_string(),
            })
        })
    }
}

#[derive(Default)]
pub(crate) struct RecordingMailer {
    pub sent: Mutex<Vec<Email>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, email: Email) -> BoxFuture<'_, Result<(), MailError>> {
        Box::pin(async move {
            if let Ok(mut sent) = self.sent.lock() {
                sent.push(email);
            }
            Ok(())
        })
    }
}

pub(crate) struct FailingMailer;

impl Mailer for FailingMailer {
    fn send(&self, _email: Email) -> BoxFuture<'_, Result<(), MailError>> {
        Box::pin(async { Err(MailError::Rejected { status: 503 }) })
    }
}

/// Aplicação completa sobre um banco em memória
pub(crate) struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub photos: Arc<RecordingPhotoStore>,
    pub mail: Arc<RecordingMailer>,
}

impl TestApp {
    pub async fn new() -> anyhow::Result<Self> {
        Self::build(None, None).await
    }

    pub async fn with_failing_photo_store() -> anyhow::Result<Self> {
        Self::build(Some(Arc::new(FailingPhotoStore)), None).await
    }

    pub async fn with_failing_mailer() -> anyhow::Result<Self> {
        Self::build(None, Some(Arc::new(FailingMailer))).await
    }

    async fn build(
        photo_store: Option<Arc<dyn PhotoStore>>,
        mailer: Option<Arc<dyn Mailer>>,
    ) -> anyhow::Result<Self> {
        let photos = Arc::new(RecordingPhotoStore::default());
        let mail = Arc::new(RecordingMailer::default());

        let state = AppState {
            pool: test_pool().await?,
            jwt: JwtKeys::from_secret(b"chave-jwt-de-teste-com-32-bytes!!"),
            reset_key: ResetCodeKey::from_secret(b"segredo-de-teste-dos-codigos")?,
            photo_store: photo_store.unwrap_or_else(|| photos.clone() as Arc<dyn PhotoStore>),
            mailer: mailer.unwrap_or_else(|| mail.clone() as Arc<dyn Mailer>),
            session_ttl: Duration::hours(1),
            reset_code_ttl: Duration::minutes(15),
            max_upload_bytes: 1024 * 1024,
        };

        Ok(Self {
            router: build_router(state.clone()),
            state,
            photos,
            mail,
        })
    }

    /// Abre uma sessão para a conta e devolve o token correspondente
    pub async fn token_for(&self, account: &Account) -> anyhow::Result<String> {
        let session =
            sessions::create_session(&self.state.pool, account.user.id, self.state.session_ttl)
                .await?;
        Ok(self.state.jwt.issue(&session)?)
    }

    /// Envia a requisição e devolve o status e o corpo JSON (`Null` se vazio)
    pub async fn send(&self, request: Request<Body>) -> anyhow::Result<(StatusCode, Value)> {
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, body))
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> anyhow::Result<(StatusCode, Value)> {
        self.send(json_request(Method::GET, uri, token, None)?).await
    }

    pub async fn post_json(
        &self,
        uri: &str,
        token: Option<&str>,
        body: Value,
    ) -> anyhow::Result<(StatusCode, Value)> {
        self.send(json_request(Method::POST, uri, token, Some(body))?)
            .await
    }

    pub async fn put_json(
        &self,
        uri: &str,
        token: Option<&str>,
        body: Value,
    ) -> anyhow::Result<(StatusCode, Value)> {
        self.send(json_request(Method::PUT, uri, token, Some(body))?)
            .await
    }

    pub async fn delete(
        &self,
        uri: &str,
        token: Option<&str>,
    ) -> anyhow::Result<(StatusCode, Value)> {
        self.send(json_request(Method::DELETE, uri, token, None)?)
            .await
    }

    pub async fn count(&self, table: &str) -> anyhow::Result<i64> {
        Ok(sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&self.state.pool)
            .await?)
    }
}

pub(crate) fn json_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> anyhow::Result<Request<Body>> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body)?))?,
        None => builder.body(Body::empty())?,
    };
    Ok(request)
}

/// Arquivo enviado no campo `photo`: nome, content type e bytes
pub(crate) type PhotoPart<'a> = (&'a str, &'a str, &'a [u8]);

pub(crate) fn multipart_request(
    uri: &str,
    token: Option<&str>,
    fields: &[(&str, &str)],
    photo: Option<PhotoPart<'_>>,
) -> anyhow::Result<Request<Body>> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{MULTIPART_BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((filename, content_type, bytes)) = photo {
        body.extend_from_slice(
            format!(
                "--{MULTIPART_BOUNDARY}\r\nContent-Disposition: form-data; name=\"photo\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}--\r\n").as_bytes());

    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}"),
        );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    Ok(builder.body(Body::from(body))?)
}
