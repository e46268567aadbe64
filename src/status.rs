//! Enumerations stored as `varchar` columns.
//!
//! Each enum round-trips through its snake_case string form via `strum`, and
//! through the same form on the wire via `serde`.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    Shipper,
    Carrier,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    Active,
    Assigned,
    InTransit,
    Delivered,
    Completed,
    Cancelled,
}

impl ShipmentStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Active => "Aktif",
            Self::Assigned => "Atandı",
            Self::InTransit => "Yolda",
            Self::Delivered => "Teslim Edildi",
            Self::Completed => "Tamamlandı",
            Self::Cancelled => "İptal",
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BidStatus {
    Pending,
    Accepted,
    Rejected,
    Withdrawn,
    CounterOffered,
}

impl BidStatus {
    /// Bids the shipper can still act on.
    pub fn is_open(self) -> bool {
        matches!(self, Self::Pending | Self::CounterOffered)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    InTransit,
    Delivered,
    Completed,
    Refunded,
    Disputed,
}

impl PaymentStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "Ödeme Bekliyor",
            Self::Paid => "Ödendi",
            Self::InTransit => "Taşınıyor",
            Self::Delivered => "Teslim Edildi",
            Self::Completed => "Tamamlandı",
            Self::Refunded => "İade Edildi",
            Self::Disputed => "İhtilaf",
        }
    }

    /// Money has been captured and the cargo is not yet released.
    pub fn is_funded(self) -> bool {
        matches!(self, Self::Paid | Self::InTransit | Self::Delivered)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    License,
    Registration,
    Src,
    Psychotech,
}

impl DocumentType {
    pub fn label(self) -> &'static str {
        match self {
            Self::License => "Ehliyet",
            Self::Registration => "Ruhsat",
            Self::Src => "SRC Belgesi",
            Self::Psychotech => "Psikoteknik Raporu",
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AdminActionType {
    DocumentApproved,
    DocumentRejected,
    ShipmentStatusChanged,
    PaymentTransferred,
    UserSuspended,
    UserActivated,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CargoType {
    EvdenEve,
    Isyeri,
    Parcali,
    Arac,
    BeyazEsya,
    Mobilya,
    Diger,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Responsibility {
    Shipper,
    Carrier,
    Both,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum VehicleType {
    Kamyonet,
    Kamyon,
    Tir,
    Cekici,
    Dorse,
}

/// Statuses a carrier may post to a shipment timeline.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TrackingStatus {
    Assigned,
    PickedUp,
    InTransit,
    Delivered,
    Completed,
}

impl TrackingStatus {
    /// Shipment status implied by a carrier update.
    pub fn shipment_status(self) -> ShipmentStatus {
        match self {
            Self::Assigned => ShipmentStatus::Assigned,
            Self::PickedUp | Self::InTransit => ShipmentStatus::InTransit,
            Self::Delivered => ShipmentStatus::Delivered,
            Self::Completed => ShipmentStatus::Completed,
        }
    }

    pub fn describe(self, from_city: &str, to_city: &str) -> String {
        match self {
            Self::Assigned => "Taşıyıcı atandı".to_string(),
            Self::PickedUp => format!("Yük {from_city} lokasyonundan toplandı"),
            Self::InTransit => "Yük yolda".to_string(),
            Self::Delivered => format!("Yük {to_city} adresine teslim edildi"),
            Self::Completed => "Teslimat onaylandı - İşlem tamamlandı".to_string(),
        }
    }
}
