//! Who may do what to which record.
//!
//! Admins are unrestricted. Users read everything but write only worker
//! records, and only the ones dated today.

use chrono::{Local, NaiveDate};
use derive_more::Display;

use crate::error::AppError;
use crate::model::record::{Record, RecordType};
use crate::model::role::Role;

#[derive(Debug)]
pub enum Action<'a> {
    Read,
    Create {
        kind: RecordType,
    },
    Update {
        existing: &'a Record,
        new_kind: Option<RecordType>,
    },
    Delete,
    Bulk,
}

#[derive(Debug, Display, PartialEq, Eq)]
pub enum Denial {
    #[display(fmt = "Admin access required")]
    AdminOnly,
    #[display(fmt = "Users can only create worker records")]
    WorkerRecordsOnly,
    #[display(fmt = "You can only edit today's production")]
    TodayOnly,
}

impl From<Denial> for AppError {
    fn from(denial: Denial) -> Self {
        AppError::Forbidden(denial.to_string())
    }
}

/// The server's local calendar day, the reference for "today's" records.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn authorize(role: Role, action: &Action<'_>, today: NaiveDate) -> Result<(), Denial> {
    match role {
        Role::Admin => Ok(()),
        Role::User => match action {
            Action::Read => Ok(()),
            Action::Create { kind } => {
                if *kind == RecordType::Worker {
                    Ok(())
                } else {
                    Err(Denial::WorkerRecordsOnly)
                }
            }
            Action::Update { existing, new_kind } => {
                let stays_worker = new_kind.is_none_or(|k| k == RecordType::Worker);
                if existing.kind() == RecordType::Worker
                    && stays_worker
                    && existing.body.date() == Some(today)
                {
                    Ok(())
                } else {
                    Err(Denial::TodayOnly)
                }
            }
            Action::Delete | Action::Bulk => Err(Denial::AdminOnly),
        },
    }
}
