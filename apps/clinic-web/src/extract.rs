//! Extratores com rejeições no formato de erro da API

use std::collections::HashMap;

use axum::body::HttpBody;
use axum::extract::multipart::Multipart;
use axum::extract::rejection::JsonRejection;
use axum::extract::FromRequest;
use axum::http::Request;
use axum::{BoxError, Json};
use serde::de::DeserializeOwned;

use crate::error::{ApiError, FieldErrors};

/// `Json<T>` cujo erro de desserialização vira erro de validação em `body`
#[derive(Debug, Clone)]
pub struct ApiJson<T>(pub T);

#[axum::async_trait]
impl<T, S, B> FromRequest<S, B> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
    B: HttpBody + Send + 'static,
    B::Data: Send,
    B::Error: Into<BoxError>,
{
    type Rejection = ApiError;

    async fn from_request(req: Request<B>, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(JsonRejection::JsonDataError(e)) => {
                Err(ApiError::Validation(FieldErrors::single("body", e.body_text())))
            }
            Err(rejection) => Err(ApiError::BadRequest(rejection.body_text())),
        }
    }
}

/// Foto recebida num formulário multipart
#[derive(Debug, Clone)]
pub struct UploadedPhoto {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Campos textuais e a foto opcional de um formulário multipart. Uma foto
/// recusada fica em `errors`, para ser somada aos erros dos demais campos.
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub fields: HashMap<String, String>,
    pub photo: Option<UploadedPhoto>,
    pub errors: FieldErrors,
}

const PHOTO_FIELD: &str = "photo";

/// Lê o formulário inteiro. Um campo `photo` vazio conta como ausente;
/// arquivos que não são imagem viram erro no campo `photo`.
pub async fn read_multipart(mut multipart: Multipart) -> Result<MultipartForm, ApiError> {
    let mut form = MultipartForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if name != PHOTO_FIELD {
            let value = field.text().await?;
            form.fields.insert(name, value);
            continue;
        }

        let filename = field
            .file_name()
            .filter(|f| !f.is_empty())
            .unwrap_or("photo")
            .to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field.bytes().await?;
        if bytes.is_empty() {
            continue;
        }
        if !content_type.starts_with("image/") {
            form.errors.add(
                PHOTO_FIELD,
                "Upload a valid image. The file you uploaded was either not an image or a corrupted image.",
            );
            continue;
        }

        form.photo = Some(UploadedPhoto {
            filename,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    Ok(form)
}
