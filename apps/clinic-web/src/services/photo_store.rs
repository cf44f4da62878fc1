//! Envio de fotos de perfil para o serviço de hospedagem de imagens
//!
//! O serviço recebe um POST multipart com o arquivo e devolve um JSON com a
//! URL pública em `secure_url`.

use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::Deserialize;
use thiserror::Error;

use crate::config::PhotoStoreConfig;

/// Onde e com que nome a foto deve ser guardada
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoMetadata {
    /// Pasta de destino, ex.: `clinic/patients/`
    pub folder: String,
    pub public_id: String,
    pub filename: String,
    pub content_type: String,
}

#[derive(Debug, Error)]
pub enum PhotoStoreError {
    #[error("Photo uploads are not configured")]
    NotConfigured,
    #[error("Photo service unreachable: {0}")]
    Transport(String),
    #[error("Photo service rejected the upload ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("Unexpected photo service response: {0}")]
    MalformedResponse(String),
}

pub trait PhotoStore: Send + Sync {
    /// Guarda os bytes e devolve a URL pública
    fn store(
        &self,
        bytes: Vec<u8>,
        metadata: PhotoMetadata,
    ) -> BoxFuture<'_, Result<String, PhotoStoreError>>;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
}

pub struct HttpPhotoStore {
    client: reqwest::Client,
    config: PhotoStoreConfig,
}

impl HttpPhotoStore {
    pub fn new(config: PhotoStoreConfig) -> Result<Self, PhotoStoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PhotoStoreError::Transport(e.to_string()))?;
        Ok(Self { client, config })
    }

    async fn upload(&self, bytes: Vec<u8>, metadata: PhotoMetadata) -> Result<String, PhotoStoreError> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(metadata.filename.clone())
            .mime_str(&metadata.content_type)
            .map_err(|e| PhotoStoreError::Transport(e.to_string()))?;

        let mut form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("folder", metadata.folder.clone())
            .text("public_id", metadata.public_id.clone())
            .text("overwrite", "true");
        if let Some(preset) = &self.config.upload_preset {
            form = form.text("upload_preset", preset.clone());
        }

        let mut request = self.client.post(&self.config.endpoint).multipart(form);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PhotoStoreError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PhotoStoreError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| PhotoStoreError::MalformedResponse(e.to_string()))?;
        let url = body
            .secure_url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| PhotoStoreError::MalformedResponse("missing secure_url".to_string()))?;

        tracing::info!(folder = %metadata.folder, public_id = %metadata.public_id, "Foto armazenada");
        Ok(url)
    }
}

impl PhotoStore for HttpPhotoStore {
    fn store(
        &self,
        bytes: Vec<u8>,
        metadata: PhotoMetadata,
    ) -> BoxFuture<'_, Result<String, PhotoStoreError>> {
        Box::pin(self.upload(bytes, metadata))
    }
}

/// Usado quando nenhum serviço de fotos foi configurado
pub struct DisabledPhotoStore;

impl PhotoStore for DisabledPhotoStore {
    fn store(
        &self,
        _bytes: Vec<u8>,
        _metadata: PhotoMetadata,
    ) -> BoxFuture<'_, Result<String, PhotoStoreError>> {
        Box::pin(async { Err(PhotoStoreError::NotConfigured) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn metadata() -> PhotoMetadata {
        PhotoMetadata {
            folder: "clinic/patients/".to_string(),
            public_id: "joana_profile".to_string(),
            filename: "joana.png".to_string(),
            content_type: "image/png".to_string(),
        }
    }

    fn store_for(server: &MockServer) -> HttpPhotoStore {
        HttpPhotoStore::new(PhotoStoreConfig {
            endpoint: format!("{}/upload", server.uri()),
            api_key: Some("chave".to_string()),
            upload_preset: None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_returns_secure_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload"))
            .and(header("authorization", "Bearer chave"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "secure_url": "https://img.example/clinic/patients/joana_profile.png"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let url = store_for(&server)
            .store(vec![0x89, b'P', b'N', b'G'], metadata())
            .await
            .unwrap();
        assert_eq!(url, "https://img.example/clinic/patients/joana_profile.png");
    }

    #[tokio::test]
    async fn test_rejected_upload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("Invalid image file"))
            .mount(&server)
            .await;

        let err = store_for(&server)
            .store(b"nao-e-imagem".to_vec(), metadata())
            .await
            .unwrap_err();
        assert!(matches!(err, PhotoStoreError::Rejected { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_missing_url_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let err = store_for(&server)
            .store(vec![1, 2, 3], metadata())
            .await
            .unwrap_err();
        assert!(matches!(err, PhotoStoreError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_disabled_store() {
        let err = DisabledPhotoStore
            .store(vec![1], metadata())
            .await
            .unwrap_err();
        assert!(matches!(err, PhotoStoreError::NotConfigured));
    }
}
