//! Colaboradores externos: hospedagem de fotos e envio de emails

pub mod mailer;
pub mod photo_store;

pub use mailer::{Email, HttpMailer, LogMailer, MailError, Mailer};
pub use photo_store::{
    DisabledPhotoStore, HttpPhotoStore, PhotoMetadata, PhotoStore, PhotoStoreError,
};
