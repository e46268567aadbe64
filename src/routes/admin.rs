use std::str::FromStr;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use bigdecimal::BigDecimal;
use chrono::{Duration, Utc};
use diesel::{dsl::sum, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    activity,
    auth::AdminUser,
    error::{AppError, AppResult},
    escrow,
    extract::{ClientIp, ValidatedJson},
    models::{AdminActivity, BlogPost, NewBlogPost, Payment, Shipment, User, UserDocument},
    routes::{
        auth::revoke_refresh_tokens,
        documents::DocumentResponse,
        payments::{payment_status, PaymentResponse},
        profiles::refresh_documents_verified,
        shipments::{page_bounds, page_offset},
    },
    schema::{
        admin_activities, bids, blog_posts, payments, shipments, user_documents, user_profiles,
        users,
    },
    state::AppState,
    status::{
        AdminActionType, BidStatus, DocumentStatus, DocumentType, PaymentStatus, ShipmentStatus,
        UserType,
    },
    utils::text::slugify,
};

#[derive(Serialize)]
pub struct AdminStats {
    pub shipments: ShipmentCounts,
    pub bids: BidCounts,
    pub users: UserCounts,
    pub financial: FinancialTotals,
    pub payments_awaiting_transfer: i64,
}

#[derive(Serialize)]
pub struct ShipmentCounts {
    pub total: i64,
    pub active: i64,
    pub completed: i64,
    pub last_7_days: i64,
}

#[derive(Serialize)]
pub struct BidCounts {
    pub total: i64,
    pub pending: i64,
    pub accepted: i64,
}

#[derive(Serialize)]
pub struct UserCounts {
    pub total: i64,
    pub carriers: i64,
    pub verified_carriers: i64,
}

#[derive(Serialize)]
pub struct FinancialTotals {
    pub total_suggested: BigDecimal,
    pub total_final: BigDecimal,
}

pub async fn stats(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> AppResult<Json<AdminStats>> {
    let mut conn = state.db()?;

    let count_shipments = |conn: &mut PgConnection, status: ShipmentStatus| -> QueryResult<i64> {
        shipments::table
            .filter(shipments::status.eq(status.as_ref()))
            .count()
            .get_result(conn)
    };
    let count_bids = |conn: &mut PgConnection, status: BidStatus| -> QueryResult<i64> {
        bids::table
            .filter(bids::status.eq(status.as_ref()))
            .count()
            .get_result(conn)
    };

    let week_ago = Utc::now().naive_utc() - Duration::days(7);
    let shipments = ShipmentCounts {
        total: shipments::table.count().get_result(&mut conn)?,
        active: count_shipments(&mut conn, ShipmentStatus::Active)?,
        completed: count_shipments(&mut conn, ShipmentStatus::Completed)?,
        last_7_days: shipments::table
            .filter(shipments::created_at.ge(week_ago))
            .count()
            .get_result(&mut conn)?,
    };
    let bids = BidCounts {
        total: bids::table.count().get_result(&mut conn)?,
        pending: count_bids(&mut conn, BidStatus::Pending)?,
        accepted: count_bids(&mut conn, BidStatus::Accepted)?,
    };
    let users = UserCounts {
        total: users::table.count().get_result(&mut conn)?,
        carriers: user_profiles::table
            .filter(user_profiles::user_type.eq(UserType::Carrier.as_ref()))
            .count()
            .get_result(&mut conn)?,
        verified_carriers: user_profiles::table
            .filter(user_profiles::user_type.eq(UserType::Carrier.as_ref()))
            .filter(user_profiles::documents_verified.eq(true))
            .count()
            .get_result(&mut conn)?,
    };

    let total_suggested: Option<BigDecimal> = shipments::table
        .select(sum(shipments::suggested_price))
        .first(&mut conn)?;
    let total_final: Option<BigDecimal> = shipments::table
        .select(sum(shipments::final_price))
        .first(&mut conn)?;

    let payments_awaiting_transfer = payments::table
        .filter(payments::status.eq(PaymentStatus::Delivered.as_ref()))
        .filter(payments::shipper_confirmed_delivery.eq(true))
        .filter(payments::carrier_confirmed_delivery.eq(true))
        .filter(payments::admin_transferred.eq(false))
        .count()
        .get_result(&mut conn)?;

    Ok(Json(AdminStats {
        shipments,
        bids,
        users,
        financial: FinancialTotals {
            total_suggested: total_suggested.unwrap_or_default(),
            total_final: total_final.unwrap_or_default(),
        },
        payments_awaiting_transfer,
    }))
}

#[derive(Deserialize)]
pub struct DocumentListQuery {
    pub status: Option<DocumentStatus>,
    pub document_type: Option<DocumentType>,
}

#[derive(Serialize)]
pub struct AdminDocument {
    #[serde(flatten)]
    pub document: DocumentResponse,
    pub user_email: String,
    pub user_name: String,
}

pub async fn list_documents(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<DocumentListQuery>,
) -> AppResult<Json<Vec<AdminDocument>>> {
    let mut conn = state.db()?;
    let mut statement = user_documents::table.inner_join(users::table).into_boxed();
    if let Some(status) = query.status {
        statement = statement.filter(user_documents::status.eq(status.to_string()));
    }
    if let Some(document_type) = query.document_type {
        statement = statement.filter(user_documents::document_type.eq(document_type.to_string()));
    }
    let rows: Vec<(UserDocument, User)> = statement
        .order(user_documents::uploaded_at.desc())
        .load(&mut conn)?;
    drop(conn);

    let mut response = Vec::with_capacity(rows.len());
    for (document, owner) in rows {
        response.push(AdminDocument {
            document: DocumentResponse::build(state.storage.as_ref(), document).await,
            user_email: owner.email.clone(),
            user_name: owner.display_name(),
        });
    }
    Ok(Json(response))
}

#[derive(Deserialize, Validate)]
pub struct DocumentReviewRequest {
    #[validate(length(min = 1, message = "at least one document id is required"))]
    pub ids: Vec<Uuid>,
    #[serde(default)]
    pub reason: String,
}

#[derive(Serialize)]
pub struct BulkUpdateResult {
    pub updated: usize,
}

pub async fn approve_documents(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ClientIp(ip): ClientIp,
    ValidatedJson(payload): ValidatedJson<DocumentReviewRequest>,
) -> AppResult<Json<BulkUpdateResult>> {
    let mut conn = state.db()?;
    let updated = review_documents(
        &mut conn,
        admin.user_id,
        ip.as_deref(),
        &payload.ids,
        DocumentStatus::Approved,
        "",
    )?;
    Ok(Json(BulkUpdateResult { updated }))
}

pub async fn reject_documents(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ClientIp(ip): ClientIp,
    ValidatedJson(payload): ValidatedJson<DocumentReviewRequest>,
) -> AppResult<Json<BulkUpdateResult>> {
    let mut conn = state.db()?;
    let updated = review_documents(
        &mut conn,
        admin.user_id,
        ip.as_deref(),
        &payload.ids,
        DocumentStatus::Rejected,
        payload.reason.trim(),
    )?;
    Ok(Json(BulkUpdateResult { updated }))
}

/// Moves the pending documents among `ids` to `outcome`; others are skipped.
fn review_documents(
    conn: &mut PgConnection,
    admin_id: Uuid,
    ip: Option<&str>,
    ids: &[Uuid],
    outcome: DocumentStatus,
    reason: &str,
) -> AppResult<usize> {
    conn.transaction::<_, AppError, _>(|conn| {
        let pending: Vec<(UserDocument, User)> = user_documents::table
            .inner_join(users::table)
            .filter(user_documents::id.eq_any(ids))
            .filter(user_documents::status.eq(DocumentStatus::Pending.as_ref()))
            .for_update()
            .load(conn)?;

        let now = Utc::now().naive_utc();
        let (action, verb) = match outcome {
            DocumentStatus::Rejected => (AdminActionType::DocumentRejected, "reddedildi"),
            _ => (AdminActionType::DocumentApproved, "onaylandı"),
        };

        for (document, owner) in &pending {
            diesel::update(user_documents::table.find(document.id))
                .set((
                    user_documents::status.eq(outcome.as_ref()),
                    user_documents::verified_at.eq(now),
                    user_documents::verified_by.eq(admin_id),
                    user_documents::rejection_reason.eq(reason),
                ))
                .execute(conn)?;

            let label = DocumentType::from_str(&document.document_type)
                .map(DocumentType::label)
                .unwrap_or(document.document_type.as_str());
            activity::record(
                conn,
                admin_id,
                action,
                "document",
                document.id,
                format!("{} - {label} {verb}", owner.email),
                ip,
            )?;
            refresh_documents_verified(conn, owner.id)?;
            tracing::info!(
                document_id = %document.id,
                notify = %owner.email,
                status = %outcome,
                "document verification updated"
            );
        }
        Ok(pending.len())
    })
}

#[derive(Deserialize, Validate)]
pub struct TransferRequest {
    #[validate(length(min = 1, message = "at least one payment id is required"))]
    pub ids: Vec<Uuid>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Serialize)]
pub struct TransferOutcome {
    pub payment_id: Uuid,
    pub transferred: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Serialize)]
pub struct TransferReport {
    pub transferred: usize,
    pub results: Vec<TransferOutcome>,
}

/// Releases held funds to carriers; ineligible payments are reported, not failed.
pub async fn transfer_payments(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ClientIp(ip): ClientIp,
    ValidatedJson(payload): ValidatedJson<TransferRequest>,
) -> AppResult<Json<TransferReport>> {
    let mut conn = state.db()?;
    let notes = payload.notes.trim();
    let mut results = Vec::with_capacity(payload.ids.len());

    for payment_id in &payload.ids {
        let outcome = conn.transaction::<_, AppError, _>(|conn| {
            let Some(payment) = payments::table
                .find(*payment_id)
                .for_update()
                .first::<Payment>(conn)
                .optional()?
            else {
                return Ok(Err("payment not found".to_string()));
            };

            let Some(status) = payment_status(&payment) else {
                return Ok(Err(format!("unknown payment status {}", payment.status)));
            };
            if let Err(err) = escrow::check_transfer(
                status,
                payment.shipper_confirmed_delivery,
                payment.carrier_confirmed_delivery,
                payment.admin_transferred,
            ) {
                return Ok(Err(err.to_string()));
            }

            let now = Utc::now().naive_utc();
            let payment: Payment = diesel::update(payments::table.find(payment.id))
                .set((
                    payments::status.eq(PaymentStatus::Completed.as_ref()),
                    payments::admin_transferred.eq(true),
                    payments::admin_transferred_by.eq(admin.user_id),
                    payments::admin_transferred_at.eq(now),
                    payments::completed_at.eq(now),
                    (!notes.is_empty()).then(|| payments::admin_notes.eq(notes)),
                    payments::updated_at.eq(now),
                ))
                .get_result(conn)?;

            activity::record(
                conn,
                admin.user_id,
                AdminActionType::PaymentTransferred,
                "payment",
                payment.id,
                format!("{} TL taşıyıcıya aktarıldı", payment.carrier_amount),
                ip.as_deref(),
            )?;
            Ok(Ok(PaymentResponse::from(payment)))
        })?;

        match outcome {
            Ok(response) => {
                tracing::info!(
                    payment_id = %response.payment.id,
                    carrier_id = %response.payment.carrier_id,
                    carrier_amount = %response.payment.carrier_amount,
                    "funds released to carrier"
                );
                results.push(TransferOutcome {
                    payment_id: *payment_id,
                    transferred: true,
                    reason: None,
                });
            }
            Err(reason) => results.push(TransferOutcome {
                payment_id: *payment_id,
                transferred: false,
                reason: Some(reason),
            }),
        }
    }

    Ok(Json(TransferReport {
        transferred: results.iter().filter(|result| result.transferred).count(),
        results,
    }))
}

#[derive(Deserialize, Validate)]
pub struct ShipmentStatusRequest {
    #[validate(length(min = 1, message = "at least one shipment id is required"))]
    pub ids: Vec<Uuid>,
    pub status: ShipmentStatus,
}

pub async fn update_shipment_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ClientIp(ip): ClientIp,
    ValidatedJson(payload): ValidatedJson<ShipmentStatusRequest>,
) -> AppResult<Json<BulkUpdateResult>> {
    let mut conn = state.db()?;
    let status = payload.status;

    let updated = conn.transaction::<_, AppError, _>(|conn| {
        let now = Utc::now().naive_utc();
        let changed: Vec<Shipment> = diesel::update(shipments::table.filter(shipments::id.eq_any(&payload.ids)))
            .set((
                shipments::status.eq(status.as_ref()),
                (status == ShipmentStatus::Completed).then(|| shipments::completed_at.eq(now)),
                shipments::updated_at.eq(now),
            ))
            .get_results(conn)?;

        for shipment in &changed {
            activity::record(
                conn,
                admin.user_id,
                AdminActionType::ShipmentStatusChanged,
                "shipment",
                &shipment.tracking_number,
                format!("{} durumu {} olarak değiştirildi", shipment.tracking_number, status.label()),
                ip.as_deref(),
            )?;
        }
        Ok(changed.len())
    })?;

    Ok(Json(BulkUpdateResult { updated }))
}

#[derive(Serialize)]
pub struct UserStatusResponse {
    pub user_id: Uuid,
    pub email: String,
    pub is_active: bool,
}

pub async fn suspend_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ClientIp(ip): ClientIp,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<UserStatusResponse>> {
    if user_id == admin.user_id {
        return Err(AppError::bad_request("you cannot suspend your own account"));
    }
    let mut conn = state.db()?;
    let user = set_active(&mut conn, admin.user_id, ip.as_deref(), user_id, false)?;
    Ok(Json(user))
}

pub async fn activate_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ClientIp(ip): ClientIp,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<UserStatusResponse>> {
    let mut conn = state.db()?;
    let user = set_active(&mut conn, admin.user_id, ip.as_deref(), user_id, true)?;
    Ok(Json(user))
}

fn set_active(
    conn: &mut PgConnection,
    admin_id: Uuid,
    ip: Option<&str>,
    user_id: Uuid,
    active: bool,
) -> AppResult<UserStatusResponse> {
    conn.transaction::<_, AppError, _>(|conn| {
        let user: User = diesel::update(users::table.find(user_id))
            .set((users::is_active.eq(active), users::updated_at.eq(diesel::dsl::now)))
            .get_result(conn)?;

        let action = if active {
            AdminActionType::UserActivated
        } else {
            revoke_refresh_tokens(conn, user_id, None)?;
            AdminActionType::UserSuspended
        };

        activity::record(
            conn,
            admin_id,
            action,
            "user",
            user.id,
            format!(
                "{} {}",
                user.email,
                if active { "aktifleştirildi" } else { "askıya alındı" }
            ),
            ip,
        )?;

        Ok(UserStatusResponse {
            user_id: user.id,
            email: user.email,
            is_active: user.is_active,
        })
    })
}

#[derive(Deserialize)]
pub struct ActivityQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Serialize)]
pub struct ActivityPage {
    pub total_count: i64,
    pub page: i64,
    pub page_size: i64,
    pub results: Vec<AdminActivity>,
}

pub async fn list_activities(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<ActivityQuery>,
) -> AppResult<Json<ActivityPage>> {
    let (page, page_size) = page_bounds(query.page, query.page_size);
    let mut conn = state.db()?;
    let total_count = admin_activities::table.count().get_result(&mut conn)?;
    let results = admin_activities::table
        .order(admin_activities::created_at.desc())
        .limit(page_size)
        .offset(page_offset(page, page_size))
        .load(&mut conn)?;
    Ok(Json(ActivityPage {
        total_count,
        page,
        page_size,
        results,
    }))
}

#[derive(Deserialize, Validate)]
pub struct CreateBlogPostRequest {
    #[validate(length(min = 1, max = 200, message = "title is required"))]
    pub title: String,
    #[validate(length(max = 200))]
    pub slug: Option<String>,
    #[validate(length(min = 1, message = "content is required"))]
    pub content: String,
    #[serde(default)]
    #[validate(length(max = 160))]
    pub meta_description: String,
    #[serde(default)]
    #[validate(length(max = 200))]
    pub meta_keywords: String,
    #[serde(default)]
    pub is_published: bool,
}

#[derive(Deserialize, Validate)]
pub struct UpdateBlogPostRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub slug: Option<String>,
    #[validate(length(min = 1))]
    pub content: Option<String>,
    #[validate(length(max = 160))]
    pub meta_description: Option<String>,
    #[validate(length(max = 200))]
    pub meta_keywords: Option<String>,
    pub is_published: Option<bool>,
}

#[derive(AsChangeset)]
#[diesel(table_name = blog_posts)]
struct BlogPostChangeset {
    title: Option<String>,
    slug: Option<String>,
    content: Option<String>,
    meta_description: Option<String>,
    meta_keywords: Option<String>,
    is_published: Option<bool>,
}

pub async fn create_blog_post(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ValidatedJson(payload): ValidatedJson<CreateBlogPostRequest>,
) -> AppResult<(StatusCode, Json<BlogPost>)> {
    let slug = blog_slug(payload.slug.as_deref(), &payload.title)?;
    let mut conn = state.db()?;

    let post: BlogPost = diesel::insert_into(blog_posts::table)
        .values(&NewBlogPost {
            id: Uuid::new_v4(),
            title: payload.title.trim().to_string(),
            slug,
            content: payload.content,
            meta_description: payload.meta_description.trim().to_string(),
            meta_keywords: payload.meta_keywords.trim().to_string(),
            is_published: payload.is_published,
            published_at: payload.is_published.then(|| Utc::now().naive_utc()),
        })
        .get_result(&mut conn)?;

    tracing::info!(post_id = %post.id, slug = %post.slug, author = %admin.email, "blog post created");
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn update_blog_post(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(post_id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<UpdateBlogPostRequest>,
) -> AppResult<Json<BlogPost>> {
    let slug = match payload.slug.as_deref() {
        Some(raw) => Some(blog_slug(Some(raw), raw)?),
        None => None,
    };

    let mut conn = state.db()?;
    let existing: BlogPost = blog_posts::table.find(post_id).first(&mut conn)?;
    let first_publish = payload.is_published == Some(true) && existing.published_at.is_none();

    let changes = BlogPostChangeset {
        title: payload.title.map(|value| value.trim().to_string()),
        slug,
        content: payload.content,
        meta_description: payload.meta_description.map(|value| value.trim().to_string()),
        meta_keywords: payload.meta_keywords.map(|value| value.trim().to_string()),
        is_published: payload.is_published,
    };

    let post = diesel::update(blog_posts::table.find(post_id))
        .set((
            &changes,
            first_publish.then(|| blog_posts::published_at.eq(diesel::dsl::now)),
            blog_posts::updated_at.eq(diesel::dsl::now),
        ))
        .get_result(&mut conn)?;
    Ok(Json(post))
}

fn blog_slug(requested: Option<&str>, title: &str) -> AppResult<String> {
    let slug = slugify(requested.unwrap_or(title));
    if slug.is_empty() {
        return Err(AppError::bad_request("slug must contain letters or digits"));
    }
    Ok(slug)
}
