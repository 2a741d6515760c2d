//! Form decoding for the board pages.
//!
//! The pages treat the query string and the request body as one bag of
//! named fields, with body values overriding query values of the same
//! name. Multipart bodies additionally carry the upload file parts,
//! collected in arrival order.

use std::collections::HashMap;

use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use bytes::Bytes;
use mime::Mime;
use services::upload::UploadFile;
use url::form_urlencoded;

use crate::error::ApiError;

/// The multipart field name carrying upload files.
const FILE_FIELD: &str = "fileToUpload";

/// All fields of a page request, query and body merged.
#[derive(Debug, Default)]
pub struct PageForm {
    values: HashMap<String, String>,
    /// Uploaded file parts, in the order they arrived.
    pub files: Vec<UploadFile>,
}

impl PageForm {
    /// The value of a field, or `""` when the field is absent.
    pub fn value(&self, name: &str) -> &str {
        self.values.get(name).map(String::as_str).unwrap_or_default()
    }

    /// The `ID` field as a row id.
    pub fn id(&self) -> Option<u64> {
        self.u64_field("ID")
    }

    pub fn u64_field(&self, name: &str) -> Option<u64> {
        self.value(name).trim().parse().ok()
    }

    pub fn i64_field(&self, name: &str) -> Option<i64> {
        self.value(name).trim().parse().ok()
    }

    fn absorb(&mut self, raw: &[u8]) {
        for (name, value) in form_urlencoded::parse(raw) {
            self.values.insert(name.into_owned(), value.into_owned());
        }
    }

    fn set(&mut self, name: String, value: String) {
        self.values.insert(name, value);
    }
}

impl<S> FromRequest<S> for PageForm
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let mut form = PageForm::default();
        if let Some(query) = req.uri().query() {
            form.absorb(query.as_bytes());
        }

        match body_kind(&req) {
            BodyKind::Multipart => {
                let mut parts = Multipart::from_request(req, state)
                    .await
                    .map_err(|err| ApiError::BadRequest(err.to_string()))?;
                while let Some(field) = parts
                    .next_field()
                    .await
                    .map_err(|err| ApiError::BadRequest(err.to_string()))?
                {
                    let name = field.name().unwrap_or_default().to_string();
                    if name == FILE_FIELD {
                        let file_name = field.file_name().unwrap_or_default().to_string();
                        let body = field
                            .bytes()
                            .await
                            .map_err(|err| ApiError::BadRequest(err.to_string()))?;
                        // Browsers submit an empty part when no file was picked.
                        if !file_name.is_empty() {
                            form.files.push(UploadFile {
                                name: file_name,
                                body,
                            });
                        }
                    } else {
                        let value = field
                            .text()
                            .await
                            .map_err(|err| ApiError::BadRequest(err.to_string()))?;
                        form.set(name, value);
                    }
                }
            }
            BodyKind::UrlEncoded => {
                let body = Bytes::from_request(req, state)
                    .await
                    .map_err(|err| ApiError::BadRequest(err.to_string()))?;
                form.absorb(&body);
            }
            BodyKind::None => {}
        }
        Ok(form)
    }
}

enum BodyKind {
    Multipart,
    UrlEncoded,
    None,
}

fn body_kind(req: &Request) -> BodyKind {
    let mime = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<Mime>().ok());
    match mime {
        Some(m) if m.type_() == mime::MULTIPART && m.subtype() == mime::FORM_DATA => {
            BodyKind::Multipart
        }
        Some(m) if m.type_() == mime::APPLICATION && m.subtype() == mime::WWW_FORM_URLENCODED => {
            BodyKind::UrlEncoded
        }
        _ => BodyKind::None,
    }
}
