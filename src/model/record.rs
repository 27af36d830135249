//! Business records.
//!
//! Every record shares an envelope (id, timestamps, owner) and carries one
//! typed body. On the wire a record is a single flat JSON object: the
//! envelope keys sit next to `type` and the body fields.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use derive_more::Display;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use strum_macros::{AsRefStr, Display as StrumDisplay, EnumIter, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::utils::date_utils::{DayRange, optional_day};

/// Keys owned by the server. They are dropped from client payloads.
pub const SERVER_MANAGED_KEYS: [&str; 6] = ["id", "_id", "createdAt", "updatedAt", "createdBy", "__v"];

#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Hash,
    Serialize,
    Deserialize,
    StrumDisplay,
    EnumString,
    EnumIter,
    AsRefStr,
    ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RecordType {
    Order,
    Worker,
    Product,
    Roll,
    Investment,
    Household,
    MasterWorker,
    Production,
    Attendance,
}

#[derive(Debug, Display, PartialEq)]
pub enum RecordError {
    #[display(fmt = "Record payload must be a JSON object")]
    NotAnObject,
    #[display(fmt = "Record type is required")]
    MissingType,
    #[display(fmt = "Invalid record type: {}", _0)]
    UnknownType(String),
    #[display(fmt = "Invalid {} record: {}", kind, reason)]
    InvalidFields { kind: RecordType, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrderFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension_unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cutting_length: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cutting_width: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cutting_unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advance_paid: Option<Number>,
    #[serde(with = "optional_day", skip_serializing_if = "Option::is_none")]
    pub order_date: Option<NaiveDate>,
    #[serde(with = "optional_day", skip_serializing_if = "Option::is_none")]
    pub delivery_date: Option<NaiveDate>,
    #[serde(with = "optional_day", skip_serializing_if = "Option::is_none")]
    pub completed_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roll_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// One worker shift: what a worker produced on a given day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkerFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_work: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units_produced: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub production_unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hours_worked: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_length: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_width: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roll_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roll_usage_kg: Option<Number>,
    #[serde(with = "optional_day", skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_placeholder: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProductFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RollFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roll_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roll_weight: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_stock: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_stock: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gsm: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier: Option<String>,
    #[serde(with = "optional_day", skip_serializing_if = "Option::is_none")]
    pub purchase_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InvestmentFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport_cost: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier: Option<String>,
    #[serde(with = "optional_day", skip_serializing_if = "Option::is_none")]
    pub purchase_date: Option<NaiveDate>,
    #[serde(with = "optional_day", skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HouseholdFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<Number>,
    #[serde(with = "optional_day", skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MasterWorkerFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProductionFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units_produced: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units_produced_old: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub production_unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_material_cost: Option<Number>,
    #[serde(with = "optional_day", skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AttendanceFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hours_worked: Option<Number>,
    #[serde(with = "optional_day", skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// The typed part of a record. Serialized with the `type` tag inline, which
/// is also the representation kept in storage.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecordBody {
    Order(OrderFields),
    Worker(WorkerFields),
    Product(ProductFields),
    Roll(RollFields),
    Investment(InvestmentFields),
    Household(HouseholdFields),
    MasterWorker(MasterWorkerFields),
    Production(ProductionFields),
    Attendance(AttendanceFields),
}

fn decode_fields<T: DeserializeOwned>(
    kind: RecordType,
    fields: Map<String, Value>,
) -> Result<T, RecordError> {
    serde_json::from_value(Value::Object(fields)).map_err(|e| RecordError::InvalidFields {
        kind,
        reason: e.to_string(),
    })
}

impl RecordBody {
    /// Builds the variant selected by `kind` from its bare field map.
    pub fn from_fields(kind: RecordType, fields: Map<String, Value>) -> Result<Self, RecordError> {
        Ok(match kind {
            RecordType::Order => RecordBody::Order(decode_fields(kind, fields)?),
            RecordType::Worker => RecordBody::Worker(decode_fields(kind, fields)?),
            RecordType::Product => RecordBody::Product(decode_fields(kind, fields)?),
            RecordType::Roll => RecordBody::Roll(decode_fields(kind, fields)?),
            RecordType::Investment => RecordBody::Investment(decode_fields(kind, fields)?),
            RecordType::Household => RecordBody::Household(decode_fields(kind, fields)?),
            RecordType::MasterWorker => RecordBody::MasterWorker(decode_fields(kind, fields)?),
            RecordType::Production => RecordBody::Production(decode_fields(kind, fields)?),
            RecordType::Attendance => RecordBody::Attendance(decode_fields(kind, fields)?),
        })
    }

    /// Reads a body back from its stored (tagged) JSON form.
    pub fn from_tagged(value: Value) -> Result<Self, RecordError> {
        let mut fields = into_object(value)?;
        let kind = take_type(&mut fields)?.ok_or(RecordError::MissingType)?;
        Self::from_fields(kind, fields)
    }

    pub fn kind(&self) -> RecordType {
        match self {
            RecordBody::Order(_) => RecordType::Order,
            RecordBody::Worker(_) => RecordType::Worker,
            RecordBody::Product(_) => RecordType::Product,
            RecordBody::Roll(_) => RecordType::Roll,
            RecordBody::Investment(_) => RecordType::Investment,
            RecordBody::Household(_) => RecordType::Household,
            RecordBody::MasterWorker(_) => RecordType::MasterWorker,
            RecordBody::Production(_) => RecordType::Production,
            RecordBody::Attendance(_) => RecordType::Attendance,
        }
    }

    /// The `date` field, for the variants that have one.
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            RecordBody::Worker(f) => f.date,
            RecordBody::Investment(f) => f.date,
            RecordBody::Household(f) => f.date,
            RecordBody::Production(f) => f.date,
            RecordBody::Attendance(f) => f.date,
            _ => None,
        }
    }

    pub fn order_date(&self) -> Option<NaiveDate> {
        match self {
            RecordBody::Order(f) => f.order_date,
            _ => None,
        }
    }

    pub fn purchase_date(&self) -> Option<NaiveDate> {
        match self {
            RecordBody::Roll(f) => f.purchase_date,
            RecordBody::Investment(f) => f.purchase_date,
            _ => None,
        }
    }

    /// Field map without the `type` tag.
    pub fn to_fields(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(mut map)) => {
                map.remove("type");
                map
            }
            _ => Map::new(),
        }
    }

    pub fn to_tagged_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub id: Uuid,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "createdBy", skip_serializing_if = "Option::is_none")]
    pub created_by: Option<Uuid>,
    #[serde(flatten)]
    pub body: RecordBody,
}

impl Record {
    pub fn new(body: RecordBody, owner: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            created_by: Some(owner),
            body,
        }
    }

    pub fn kind(&self) -> RecordType {
        self.body.kind()
    }

    /// True when any of `date`, `order_date`, `purchase_date` or `createdAt`
    /// falls inside the range.
    pub fn falls_within(&self, range: &DayRange) -> bool {
        if range.is_unbounded() {
            return true;
        }
        [self.body.date(), self.body.order_date(), self.body.purchase_date()]
            .into_iter()
            .flatten()
            .any(|d| range.contains_day(d))
            || range.contains_instant(self.created_at)
    }
}

/// A validated-type client payload for a new record.
#[derive(Debug, Clone)]
pub struct RecordPayload {
    kind: RecordType,
    fields: Map<String, Value>,
}

impl RecordPayload {
    /// Reads the `type` tag and keeps the rest for later validation, so the
    /// caller can decide on the type before the fields are checked.
    pub fn from_json(value: Value) -> Result<Self, RecordError> {
        let mut fields = into_object(value)?;
        let kind = take_type(&mut fields)?.ok_or(RecordError::MissingType)?;
        Ok(Self { kind, fields })
    }

    pub fn kind(&self) -> RecordType {
        self.kind
    }

    pub fn into_body(self) -> Result<RecordBody, RecordError> {
        RecordBody::from_fields(self.kind, self.fields)
    }
}

/// A partial update. Present keys overwrite, `null` clears.
#[derive(Debug, Clone)]
pub struct RecordPatch {
    kind: Option<RecordType>,
    fields: Map<String, Value>,
}

impl RecordPatch {
    pub fn from_json(value: Value) -> Result<Self, RecordError> {
        let mut fields = into_object(value)?;
        let kind = take_type(&mut fields)?;
        Ok(Self { kind, fields })
    }

    pub fn kind(&self) -> Option<RecordType> {
        self.kind
    }

    pub fn apply(self, existing: &RecordBody) -> Result<RecordBody, RecordError> {
        let kind = self.kind.unwrap_or_else(|| existing.kind());
        let mut merged = existing.to_fields();
        for (key, value) in self.fields {
            merged.insert(key, value);
        }
        RecordBody::from_fields(kind, merged)
    }
}

fn into_object(value: Value) -> Result<Map<String, Value>, RecordError> {
    match value {
        Value::Object(mut map) => {
            for key in SERVER_MANAGED_KEYS {
                map.remove(key);
            }
            Ok(map)
        }
        _ => Err(RecordError::NotAnObject),
    }
}

fn take_type(fields: &mut Map<String, Value>) -> Result<Option<RecordType>, RecordError> {
    match fields.remove("type") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => RecordType::from_str(&s)
            .map(Some)
            .map_err(|_| RecordError::UnknownType(s)),
        Some(other) => Err(RecordError::UnknownType(other.to_string())),
    }
}
