use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::schema::*;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub is_admin: bool,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Name shown to other users: full name, else the email's local part.
    pub fn display_name(&self) -> String {
        let full = self.full_name();
        if !full.is_empty() {
            return full;
        }
        self.email
            .split('@')
            .next()
            .filter(|local| !local.is_empty())
            .unwrap_or("Taşıyıcı")
            .to_string()
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub email: String,
    pub password_hash: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Serialize)]
#[diesel(table_name = user_profiles)]
#[diesel(belongs_to(User))]
pub struct UserProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_type: String,
    pub phone_number: String,
    pub iban: String,
    pub company_name: String,
    pub tax_id: String,
    pub billing_address: String,
    pub service_areas: String,
    pub working_hours: String,
    pub bio: String,
    pub rating_avg: BigDecimal,
    pub rating_count: i32,
    pub profile_completed: bool,
    pub documents_verified: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl UserProfile {
    pub fn is_carrier(&self) -> bool {
        self.user_type == crate::status::UserType::Carrier.as_ref()
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = user_profiles)]
pub struct NewUserProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_type: String,
    pub phone_number: String,
    pub documents_verified: bool,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = refresh_tokens)]
pub struct NewRefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub issued_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = user_documents)]
#[diesel(belongs_to(User))]
pub struct UserDocument {
    pub id: Uuid,
    pub user_id: Uuid,
    pub document_type: String,
    pub s3_key: String,
    pub original_name: String,
    pub content_type: Option<String>,
    pub status: String,
    pub uploaded_at: NaiveDateTime,
    pub verified_at: Option<NaiveDateTime>,
    pub verified_by: Option<Uuid>,
    pub rejection_reason: String,
    pub notes: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = user_documents)]
pub struct NewUserDocument {
    pub id: Uuid,
    pub user_id: Uuid,
    pub document_type: String,
    pub s3_key: String,
    pub original_name: String,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = admin_activities)]
pub struct AdminActivity {
    pub id: Uuid,
    pub admin_user_id: Uuid,
    pub action_type: String,
    pub target_type: String,
    pub target_id: String,
    pub description: String,
    pub ip_address: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = admin_activities)]
pub struct NewAdminActivity {
    pub id: Uuid,
    pub admin_user_id: Uuid,
    pub action_type: String,
    pub target_type: String,
    pub target_id: String,
    pub description: String,
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = vehicles)]
pub struct Vehicle {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub plate_number: String,
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub vehicle_type: String,
    pub max_weight_kg: i32,
    pub max_volume_m3: BigDecimal,
    pub has_cargo_insurance: bool,
    pub insurance_company: String,
    pub insurance_expiry: Option<NaiveDate>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = vehicles)]
pub struct NewVehicle {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub plate_number: String,
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub vehicle_type: String,
    pub max_weight_kg: i32,
    pub max_volume_m3: BigDecimal,
    pub has_cargo_insurance: bool,
    pub insurance_company: String,
    pub insurance_expiry: Option<NaiveDate>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = shipments)]
pub struct Shipment {
    pub id: Uuid,
    pub tracking_number: String,
    pub shipper_id: Uuid,
    pub shipper_email: String,
    pub shipper_phone: String,
    pub title: String,
    pub description: String,
    pub cargo_type: String,
    pub from_city: String,
    pub from_district: String,
    pub from_address: String,
    pub to_city: String,
    pub to_district: String,
    pub to_address: String,
    pub weight_kg: BigDecimal,
    pub length_cm: Option<BigDecimal>,
    pub width_cm: Option<BigDecimal>,
    pub height_cm: Option<BigDecimal>,
    pub loading_responsibility: String,
    pub unloading_responsibility: String,
    pub suggested_price: BigDecimal,
    pub final_price: Option<BigDecimal>,
    pub pickup_date: NaiveDate,
    pub delivery_date: Option<NaiveDate>,
    pub images: serde_json::Value,
    pub status: String,
    pub assigned_bid_id: Option<Uuid>,
    pub view_count: i32,
    pub bid_count: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = shipments)]
pub struct NewShipment {
    pub id: Uuid,
    pub tracking_number: String,
    pub shipper_id: Uuid,
    pub shipper_email: String,
    pub shipper_phone: String,
    pub title: String,
    pub description: String,
    pub cargo_type: String,
    pub from_city: String,
    pub from_district: String,
    pub from_address: String,
    pub to_city: String,
    pub to_district: String,
    pub to_address: String,
    pub weight_kg: BigDecimal,
    pub length_cm: Option<BigDecimal>,
    pub width_cm: Option<BigDecimal>,
    pub height_cm: Option<BigDecimal>,
    pub loading_responsibility: String,
    pub unloading_responsibility: String,
    pub suggested_price: BigDecimal,
    pub pickup_date: NaiveDate,
    pub delivery_date: Option<NaiveDate>,
    pub images: serde_json::Value,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Serialize)]
#[diesel(table_name = bids)]
#[diesel(belongs_to(Shipment))]
pub struct Bid {
    pub id: Uuid,
    pub shipment_id: Uuid,
    pub tracking_number: String,
    pub carrier_id: Uuid,
    pub carrier_email: String,
    pub carrier_name: String,
    pub carrier_phone: String,
    pub carrier_verified: bool,
    pub shipper_email: String,
    pub offered_price: BigDecimal,
    pub estimated_delivery_days: i32,
    pub message: String,
    pub shipper_comment: String,
    pub counter_offer_price: Option<BigDecimal>,
    pub counter_offer_message: String,
    pub counter_offered_at: Option<NaiveDateTime>,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub accepted_at: Option<NaiveDateTime>,
    pub rejected_at: Option<NaiveDateTime>,
}

impl Bid {
    /// Price the shipper agrees to when accepting this bid.
    pub fn agreed_price(&self) -> BigDecimal {
        self.counter_offer_price
            .clone()
            .unwrap_or_else(|| self.offered_price.clone())
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = bids)]
pub struct NewBid {
    pub id: Uuid,
    pub shipment_id: Uuid,
    pub tracking_number: String,
    pub carrier_id: Uuid,
    pub carrier_email: String,
    pub carrier_name: String,
    pub carrier_phone: String,
    pub carrier_verified: bool,
    pub shipper_email: String,
    pub offered_price: BigDecimal,
    pub estimated_delivery_days: i32,
    pub message: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Serialize)]
#[diesel(table_name = bid_comments)]
#[diesel(belongs_to(Bid))]
pub struct BidComment {
    pub id: Uuid,
    pub bid_id: Uuid,
    pub author_id: Uuid,
    pub author_email: String,
    pub author_name: String,
    pub is_shipper: bool,
    pub comment: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = bid_comments)]
pub struct NewBidComment {
    pub id: Uuid,
    pub bid_id: Uuid,
    pub author_id: Uuid,
    pub author_email: String,
    pub author_name: String,
    pub is_shipper: bool,
    pub comment: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = payments)]
pub struct Payment {
    pub id: Uuid,
    pub shipment_id: Uuid,
    pub bid_id: Uuid,
    pub shipper_id: Uuid,
    pub carrier_id: Uuid,
    pub amount: BigDecimal,
    pub platform_fee: BigDecimal,
    pub carrier_amount: BigDecimal,
    pub status: String,
    pub payment_method: String,
    pub transaction_id: Option<String>,
    pub payment_provider: Option<String>,
    pub shipper_confirmed_delivery: bool,
    pub carrier_confirmed_delivery: bool,
    pub shipper_confirmed_at: Option<NaiveDateTime>,
    pub carrier_confirmed_at: Option<NaiveDateTime>,
    pub admin_transferred: bool,
    pub admin_transferred_by: Option<Uuid>,
    pub admin_transferred_at: Option<NaiveDateTime>,
    pub admin_notes: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub paid_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = payments)]
pub struct NewPayment {
    pub id: Uuid,
    pub shipment_id: Uuid,
    pub bid_id: Uuid,
    pub shipper_id: Uuid,
    pub carrier_id: Uuid,
    pub amount: BigDecimal,
    pub platform_fee: BigDecimal,
    pub carrier_amount: BigDecimal,
}

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = shipment_tracking)]
pub struct TrackingEntry {
    pub id: Uuid,
    pub shipment_id: Uuid,
    pub status: String,
    pub status_display: String,
    pub location: String,
    pub note: String,
    pub updated_by: Option<Uuid>,
    pub is_automatic: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = shipment_tracking)]
pub struct NewTrackingEntry {
    pub id: Uuid,
    pub shipment_id: Uuid,
    pub status: String,
    pub status_display: String,
    pub location: String,
    pub note: String,
    pub updated_by: Option<Uuid>,
    pub is_automatic: bool,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = delivery_proofs)]
pub struct DeliveryProof {
    pub id: Uuid,
    pub shipment_id: Uuid,
    pub uploaded_by: Uuid,
    pub s3_key: String,
    pub original_name: String,
    pub content_type: Option<String>,
    pub note: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = delivery_proofs)]
pub struct NewDeliveryProof {
    pub id: Uuid,
    pub shipment_id: Uuid,
    pub uploaded_by: Uuid,
    pub s3_key: String,
    pub original_name: String,
    pub content_type: Option<String>,
    pub note: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = reviews)]
pub struct Review {
    pub id: Uuid,
    pub shipment_id: Uuid,
    pub bid_id: Uuid,
    pub reviewer_id: Uuid,
    pub reviewed_id: Uuid,
    pub rating: i16,
    pub communication_rating: i16,
    pub professionalism_rating: i16,
    pub punctuality_rating: i16,
    pub comment: String,
    pub is_shipper_review: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = reviews)]
pub struct NewReview {
    pub id: Uuid,
    pub shipment_id: Uuid,
    pub bid_id: Uuid,
    pub reviewer_id: Uuid,
    pub reviewed_id: Uuid,
    pub rating: i16,
    pub communication_rating: i16,
    pub professionalism_rating: i16,
    pub punctuality_rating: i16,
    pub comment: String,
    pub is_shipper_review: bool,
}

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = blog_posts)]
pub struct BlogPost {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub meta_description: String,
    pub meta_keywords: String,
    pub is_published: bool,
    pub view_count: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub published_at: Option<NaiveDateTime>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = blog_posts)]
pub struct NewBlogPost {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub meta_description: String,
    pub meta_keywords: String,
    pub is_published: bool,
    pub published_at: Option<NaiveDateTime>,
}
