use std::str::FromStr;

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
    extract::read_upload_form,
    models::{NewUserDocument, UserDocument},
    routes::profiles::refresh_documents_verified,
    schema::user_documents,
    state::AppState,
    status::{DocumentStatus, DocumentType},
    storage::{object_key, NewObject, ObjectStorage, PRESIGN_TTL},
};

#[derive(Serialize)]
pub struct DocumentResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub document_type: String,
    pub document_type_display: String,
    pub original_name: String,
    pub content_type: Option<String>,
    pub status: String,
    pub uploaded_at: NaiveDateTime,
    pub verified_at: Option<NaiveDateTime>,
    pub rejection_reason: String,
    pub download_url: Option<String>,
}

impl DocumentResponse {
    pub(crate) async fn build(storage: &dyn ObjectStorage, document: UserDocument) -> Self {
        let download_url = match storage.download_url(&document.s3_key, PRESIGN_TTL).await {
            Ok(url) => Some(url),
            Err(err) => {
                warn!(document_id = %document.id, error = %err, "failed to presign document");
                None
            }
        };
        let document_type_display = DocumentType::from_str(&document.document_type)
            .map(|kind| kind.label().to_string())
            .unwrap_or_else(|_| document.document_type.clone());

        Self {
            id: document.id,
            user_id: document.user_id,
            document_type: document.document_type,
            document_type_display,
            original_name: document.original_name,
            content_type: document.content_type,
            status: document.status,
            uploaded_at: document.uploaded_at,
            verified_at: document.verified_at,
            rejection_reason: document.rejection_reason,
            download_url,
        }
    }
}

pub async fn list_my_documents(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<DocumentResponse>>> {
    let mut conn = state.db()?;
    let documents: Vec<UserDocument> = user_documents::table
        .filter(user_documents::user_id.eq(user.user_id))
        .order(user_documents::uploaded_at.desc())
        .load(&mut conn)?;
    drop(conn);

    let mut response = Vec::with_capacity(documents.len());
    for document in documents {
        response.push(DocumentResponse::build(state.storage.as_ref(), document).await);
    }
    Ok(Json(response))
}

/// Uploads or replaces the caller's document of the given type.
pub async fn upload_document(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<DocumentResponse>)> {
    let mut form = read_upload_form(multipart).await?;
    let document_type = form
        .text("document_type")
        .ok_or_else(|| AppError::bad_request("document_type is required"))
        .and_then(|value| {
            DocumentType::from_str(value)
                .map_err(|_| AppError::bad_request(format!("unknown document type: {value}")))
        })?;
    let file = form.require_file()?;

    let key = object_key(
        &format!("documents/{document_type}"),
        user.user_id,
        &file.original_name,
    );
    state
        .storage
        .store(NewObject::new(
            key.clone(),
            file.bytes,
            file.content_type.as_deref(),
            &file.original_name,
        ))
        .await?;

    let mut conn = state.db()?;
    let (document, replaced_key) = conn.transaction::<_, AppError, _>(|conn| {
        let existing: Option<UserDocument> = user_documents::table
            .filter(user_documents::user_id.eq(user.user_id))
            .filter(user_documents::document_type.eq(document_type.as_ref()))
            .for_update()
            .first(conn)
            .optional()?;

        let outcome = match existing {
            Some(previous) => {
                let document: UserDocument = diesel::update(user_documents::table.find(previous.id))
                    .set((
                        user_documents::s3_key.eq(&key),
                        user_documents::original_name.eq(&file.original_name),
                        user_documents::content_type.eq(&file.content_type),
                        user_documents::status.eq(DocumentStatus::Pending.as_ref()),
                        user_documents::uploaded_at.eq(Utc::now().naive_utc()),
                        user_documents::verified_at.eq(None::<NaiveDateTime>),
                        user_documents::verified_by.eq(None::<Uuid>),
                        user_documents::rejection_reason.eq(""),
                    ))
                    .get_result(conn)?;
                (document, Some(previous.s3_key))
            }
            None => {
                let new_document = NewUserDocument {
                    id: Uuid::new_v4(),
                    user_id: user.user_id,
                    document_type: document_type.to_string(),
                    s3_key: key.clone(),
                    original_name: file.original_name.clone(),
                    content_type: file.content_type.clone(),
                };
                let document: UserDocument = diesel::insert_into(user_documents::table)
                    .values(&new_document)
                    .get_result(conn)?;
                (document, None)
            }
        };

        refresh_documents_verified(conn, user.user_id)?;
        Ok(outcome)
    })?;
    drop(conn);

    if let Some(old_key) = replaced_key {
        if let Err(err) = state.storage.remove(&old_key).await {
            warn!(key = %old_key, error = %err, "failed to delete replaced document");
        }
    }

    info!(
        document_id = %document.id,
        user_id = %user.user_id,
        document_type = %document_type,
        "document uploaded for review"
    );

    Ok((
        StatusCode::CREATED,
        Json(DocumentResponse::build(state.storage.as_ref(), document).await),
    ))
}
