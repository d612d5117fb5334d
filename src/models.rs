use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_superuser: bool,
}

pub fn full_name(first_name: &str, last_name: &str) -> String {
    format!("{} {}", first_name, last_name).trim().to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Address {
    pub id: i64,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct TimeSlot {
    pub id: i64,
    pub day: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

#[derive(Debug, Clone, FromRow)]
pub struct ClientProfile {
    pub id: i64,
    pub age: i32,
    pub gender: String,
    pub phone_number: String,
    pub address_id: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct LawyerProfile {
    pub id: i64,
    pub specialization: String,
    pub phone_number: String,
    pub bio: String,
    pub address_id: i64,
    pub language: String,
    pub approved: bool,
    pub image: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

pub const LAWYER_PROFILE_SELECT: &str = "SELECT lp.id, lp.specialization, lp.phone_number, lp.bio, \
     lp.address_id, lp.language, lp.approved, lp.image, u.first_name, u.last_name, u.email \
     FROM lawyer_profiles lp JOIN users u ON u.id = lp.user_id";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct LawyerImage {
    pub id: i64,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct LawyerDocument {
    pub id: i64,
    pub pdf_file: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Accepted,
    Refused,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Accepted => "accepted",
            AppointmentStatus::Refused => "refused",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown appointment status {0:?}")]
pub struct UnknownStatus(pub String);

impl FromStr for AppointmentStatus {
    type Err = UnknownStatus;

    // Older rows were written capitalised.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(AppointmentStatus::Pending),
            "accepted" => Ok(AppointmentStatus::Accepted),
            "refused" => Ok(AppointmentStatus::Refused),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for AppointmentStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl sqlx::Type<sqlx::Postgres> for AppointmentStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for AppointmentStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let raw = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(raw.parse()?)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for AppointmentStatus {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.as_str(), buf)
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct AppointmentRow {
    pub id: i64,
    pub day: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: AppointmentStatus,
    pub client_first_name: String,
    pub client_last_name: String,
    pub client_age: i32,
}

pub const APPOINTMENT_SELECT: &str = "SELECT a.id, a.day, a.start_time, a.end_time, a.status, \
     u.first_name AS client_first_name, u.last_name AS client_last_name, cp.age AS client_age \
     FROM appointments a \
     JOIN client_profiles cp ON cp.id = a.client_id \
     JOIN users u ON u.id = cp.user_id";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Appointment {
    pub id: i64,
    pub day: String,
    pub client_name: String,
    pub client_age: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: AppointmentStatus,
}

impl From<AppointmentRow> for Appointment {
    fn from(row: AppointmentRow) -> Self {
        Appointment {
            id: row.id,
            day: row.day,
            client_name: full_name(&row.client_first_name, &row.client_last_name),
            client_age: row.client_age.to_string(),
            start_time: row.start_time,
            end_time: row.end_time,
            status: row.status,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ReviewRow {
    pub id: i64,
    pub lawyer_id: i64,
    pub client_id: i64,
    pub rating: i32,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub client_first_name: String,
    pub client_last_name: String,
}

pub const REVIEW_SELECT: &str = "SELECT r.id, r.lawyer_id, r.client_id, r.rating, r.comment, r.created_at, \
     u.first_name AS client_first_name, u.last_name AS client_last_name \
     FROM reviews r \
     JOIN client_profiles cp ON cp.id = r.client_id \
     JOIN users u ON u.id = cp.user_id";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Review {
    pub id: i64,
    pub lawyer_id: i64,
    pub client_id: i64,
    pub client_name: String,
    pub rating: i32,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Review {
            id: row.id,
            lawyer_id: row.lawyer_id,
            client_id: row.client_id,
            client_name: full_name(&row.client_first_name, &row.client_last_name),
            rating: row.rating,
            comment: row.comment,
            created_at: row.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parsing_ignores_case() {
        assert_eq!("Accepted".parse::<AppointmentStatus>().unwrap(), AppointmentStatus::Accepted);
        assert_eq!("REFUSED".parse::<AppointmentStatus>().unwrap(), AppointmentStatus::Refused);
        assert_eq!("pending".parse::<AppointmentStatus>().unwrap(), AppointmentStatus::Pending);
        assert!("cancelled".parse::<AppointmentStatus>().is_err());
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&AppointmentStatus::Accepted).unwrap();
        assert_eq!(json, "\"accepted\"");
    }

    #[test]
    fn full_name_trims_missing_parts() {
        assert_eq!(full_name("Ada", "Lovelace"), "Ada Lovelace");
        assert_eq!(full_name("Ada", ""), "Ada");
        assert_eq!(full_name("", ""), "");
    }

    #[test]
    fn appointment_row_flattens_client() {
        let row = AppointmentRow {
            id: 3,
            day: "Monday".into(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            status: AppointmentStatus::Pending,
            client_first_name: "Sam".into(),
            client_last_name: "Hill".into(),
            client_age: 41,
        };
        let appointment = Appointment::from(row);
        assert_eq!(appointment.client_name, "Sam Hill");
        assert_eq!(appointment.client_age, "41");
        let value = serde_json::to_value(&appointment).unwrap();
        assert_eq!(value["start_time"], "09:00:00");
        assert_eq!(value["status"], "pending");
    }
}
