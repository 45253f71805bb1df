// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use serde::{Serialize, Serializer};
use time::{Date, OffsetDateTime, macros::format_description};

use crate::{Account, AccountField, AccountId, FieldKind};

/// A single edited cell value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Flag(bool),
}

/// Editable copy of an account, also the request body for create and update.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct AccountDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<AccountId>,
    pub username: String,
    pub email: String,
    pub existing_user: bool,
    #[serde(serialize_with = "blank_as_null")]
    pub date_requested: String,
    #[serde(serialize_with = "blank_as_null")]
    pub date_au_created: String,
    #[serde(serialize_with = "blank_as_null")]
    pub date_training_assigned: String,
    #[serde(serialize_with = "blank_as_null")]
    pub date_account_created: String,
    #[serde(serialize_with = "blank_as_null")]
    pub date_account_activated: String,
    #[serde(serialize_with = "blank_as_null")]
    pub date_account_inactivated: String,
}

fn blank_as_null<S>(value: &str, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if value.trim().is_empty() {
        serializer.serialize_none()
    } else {
        serializer.serialize_some(value)
    }
}

impl From<&Account> for AccountDraft {
    fn from(account: &Account) -> Self {
        let date = |value: &Option<String>| value.clone().unwrap_or_default();
        Self {
            id: Some(account.id),
            username: account.username.clone(),
            email: account.email.clone(),
            existing_user: account.existing_user,
            date_requested: date(&account.date_requested),
            date_au_created: date(&account.date_au_created),
            date_training_assigned: date(&account.date_training_assigned),
            date_account_created: date(&account.date_account_created),
            date_account_activated: date(&account.date_account_activated),
            date_account_inactivated: date(&account.date_account_inactivated),
        }
    }
}

impl AccountDraft {
    /// Text content of a text field; `None` for `id` and the checkbox.
    pub fn text(&self, field: AccountField) -> Option<&str> {
        let value = match field {
            AccountField::Username => &self.username,
            AccountField::Email => &self.email,
            AccountField::DateRequested => &self.date_requested,
            AccountField::DateAuCreated => &self.date_au_created,
            AccountField::DateTrainingAssigned => &self.date_training_assigned,
            AccountField::DateAccountCreated => &self.date_account_created,
            AccountField::DateAccountActivated => &self.date_account_activated,
            AccountField::DateAccountInactivated => &self.date_account_inactivated,
            AccountField::Id | AccountField::ExistingUser => return None,
        };
        Some(value.as_str())
    }

    fn text_mut(&mut self, field: AccountField) -> Option<&mut String> {
        let value = match field {
            AccountField::Username => &mut self.username,
            AccountField::Email => &mut self.email,
            AccountField::DateRequested => &mut self.date_requested,
            AccountField::DateAuCreated => &mut self.date_au_created,
            AccountField::DateTrainingAssigned => &mut self.date_training_assigned,
            AccountField::DateAccountCreated => &mut self.date_account_created,
            AccountField::DateAccountActivated => &mut self.date_account_activated,
            AccountField::DateAccountInactivated => &mut self.date_account_inactivated,
            AccountField::Id | AccountField::ExistingUser => return None,
        };
        Some(value)
    }

    pub fn value(&self, field: AccountField) -> Option<FieldValue> {
        match field.kind() {
            FieldKind::Checkbox => Some(FieldValue::Flag(self.existing_user)),
            FieldKind::Text => self
                .text(field)
                .map(|text| FieldValue::Text(text.to_owned())),
        }
    }

    /// Cell text as the grid shows it.
    pub fn display(&self, field: AccountField) -> String {
        match field {
            AccountField::Id => self.id.map(|id| id.to_string()).unwrap_or_default(),
            AccountField::ExistingUser => {
                if self.existing_user {
                    "[x]".to_owned()
                } else {
                    "[ ]".to_owned()
                }
            }
            _ => self.text(field).unwrap_or_default().to_owned(),
        }
    }

    /// Returns a copy with one field replaced, applying the today macro to
    /// date fields.
    pub fn with_edit(&self, field: AccountField, value: FieldValue, today: Date) -> Result<Self> {
        if !field.is_editable() {
            bail!("{} is assigned by the server and cannot be edited", field.label());
        }
        let mut next = self.clone();
        match (field.kind(), value) {
            (FieldKind::Checkbox, FieldValue::Flag(flag)) => next.existing_user = flag,
            (FieldKind::Text, FieldValue::Text(raw)) => {
                let stored = expand_today_macro(field, &raw, today);
                match next.text_mut(field) {
                    Some(slot) => *slot = stored,
                    None => bail!("{} has no text value", field.label()),
                }
            }
            (FieldKind::Checkbox, FieldValue::Text(_)) => {
                bail!("{} is a checkbox -- toggle it instead of typing", field.label())
            }
            (FieldKind::Text, FieldValue::Flag(_)) => {
                bail!("{} is a text field and cannot be toggled", field.label())
            }
        }
        Ok(next)
    }

    pub fn validate_for_create(&self) -> Result<()> {
        for field in AccountField::EDITABLE {
            if field.is_required() && self.text(field).is_some_and(|text| text.trim().is_empty()) {
                bail!(
                    "{} is required -- enter a value and retry",
                    field.label().to_lowercase()
                );
            }
        }
        Ok(())
    }
}

/// `t` (any case) typed into a date field stands for today.
pub fn expand_today_macro(field: AccountField, raw: &str, today: Date) -> String {
    if field.is_date() && raw.eq_ignore_ascii_case("t") {
        format_us_date(today)
    } else {
        raw.to_owned()
    }
}

pub fn format_us_date(date: Date) -> String {
    date.format(format_description!("[month]/[day]/[year]"))
        .unwrap_or_else(|_| {
            format!(
                "{:02}/{:02}/{:04}",
                u8::from(date.month()),
                date.day(),
                date.year()
            )
        })
}

/// Local calendar date, or UTC when the local offset cannot be determined.
pub fn today_local() -> Date {
    OffsetDateTime::now_local()
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
        .date()
}

/// The add-account row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewAccountForm {
    draft: AccountDraft,
}

impl NewAccountForm {
    pub fn draft(&self) -> &AccountDraft {
        &self.draft
    }

    pub fn edit(&mut self, field: AccountField, value: FieldValue, today: Date) -> Result<()> {
        self.draft = self.draft.with_edit(field, value, today)?;
        Ok(())
    }

    pub fn is_pristine(&self) -> bool {
        self.draft == AccountDraft::default()
    }

    pub fn reset(&mut self) {
        self.draft = AccountDraft::default();
    }

    /// Draft ready to send, or the reason it cannot be sent yet.
    pub fn validated_draft(&self) -> Result<AccountDraft> {
        self.draft.validate_for_create()?;
        Ok(AccountDraft {
            id: None,
            ..self.draft.clone()
        })
    }
}
