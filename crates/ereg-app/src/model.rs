// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Deserializer, Serialize};

use crate::ids::AccountId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AccountField {
    Id,
    Username,
    Email,
    DateRequested,
    DateAuCreated,
    DateTrainingAssigned,
    DateAccountCreated,
    DateAccountActivated,
    DateAccountInactivated,
    ExistingUser,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    Text,
    Checkbox,
}

impl AccountField {
    /// Column order of the account grid.
    pub const ALL: [Self; 10] = [
        Self::Id,
        Self::Username,
        Self::Email,
        Self::DateRequested,
        Self::DateAuCreated,
        Self::DateTrainingAssigned,
        Self::DateAccountCreated,
        Self::DateAccountActivated,
        Self::DateAccountInactivated,
        Self::ExistingUser,
    ];

    pub const EDITABLE: [Self; 9] = [
        Self::Username,
        Self::Email,
        Self::DateRequested,
        Self::DateAuCreated,
        Self::DateTrainingAssigned,
        Self::DateAccountCreated,
        Self::DateAccountActivated,
        Self::DateAccountInactivated,
        Self::ExistingUser,
    ];

    pub const DATES: [Self; 6] = [
        Self::DateRequested,
        Self::DateAuCreated,
        Self::DateTrainingAssigned,
        Self::DateAccountCreated,
        Self::DateAccountActivated,
        Self::DateAccountInactivated,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Username => "username",
            Self::Email => "email",
            Self::DateRequested => "date_requested",
            Self::DateAuCreated => "date_au_created",
            Self::DateTrainingAssigned => "date_training_assigned",
            Self::DateAccountCreated => "date_account_created",
            Self::DateAccountActivated => "date_account_activated",
            Self::DateAccountInactivated => "date_account_inactivated",
            Self::ExistingUser => "existing_user",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Id => "ID",
            Self::Username => "User Name",
            Self::Email => "Email",
            Self::DateRequested => "Request",
            Self::DateAuCreated => "AU Create",
            Self::DateTrainingAssigned => "AU Train",
            Self::DateAccountCreated => "Create",
            Self::DateAccountActivated => "Active",
            Self::DateAccountInactivated => "Inactive",
            Self::ExistingUser => "Exist?",
        }
    }

    /// Lifecycle milestone fields are exactly the ones named `date_*`.
    pub fn is_date(self) -> bool {
        self.as_str().starts_with("date_")
    }

    pub const fn kind(self) -> FieldKind {
        match self {
            Self::ExistingUser => FieldKind::Checkbox,
            _ => FieldKind::Text,
        }
    }

    pub const fn is_blank_filterable(self) -> bool {
        matches!(
            self,
            Self::DateTrainingAssigned
                | Self::DateAccountCreated
                | Self::DateAccountActivated
                | Self::DateAccountInactivated
        )
    }

    pub const fn is_editable(self) -> bool {
        !matches!(self, Self::Id)
    }

    pub const fn is_required(self) -> bool {
        matches!(self, Self::Username | Self::Email)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    pub const fn toggled(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortConfig {
    pub key: AccountField,
    pub direction: SortDirection,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            key: AccountField::Id,
            direction: SortDirection::Asc,
        }
    }
}

impl SortConfig {
    /// Same key flips direction; a new key starts ascending.
    pub fn toggled_for(self, field: AccountField) -> Self {
        if self.key == field {
            Self {
                key: field,
                direction: self.direction.toggled(),
            }
        } else {
            Self {
                key: field,
                direction: SortDirection::Asc,
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FetchQuery {
    pub sort: SortConfig,
    pub blank_filter: Option<AccountField>,
}

impl FetchQuery {
    /// The `{key} {direction}` path segment the accounts service sorts on.
    pub fn sort_segment(&self) -> String {
        format!(
            "{} {}",
            self.sort.key.as_str(),
            self.sort.direction.as_str()
        )
    }

    pub fn filter_param(&self) -> &'static str {
        self.blank_filter.map(AccountField::as_str).unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    pub email: String,
    #[serde(default, deserialize_with = "null_as_false")]
    pub existing_user: bool,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub date_requested: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub date_au_created: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub date_training_assigned: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub date_account_created: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub date_account_activated: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub date_account_inactivated: Option<String>,
}

impl Account {
    pub fn new(id: AccountId, username: &str, email: &str) -> Self {
        Self {
            id,
            username: username.to_owned(),
            email: email.to_owned(),
            existing_user: false,
            date_requested: None,
            date_au_created: None,
            date_training_assigned: None,
            date_account_created: None,
            date_account_activated: None,
            date_account_inactivated: None,
        }
    }

    pub fn date(&self, field: AccountField) -> Option<&str> {
        let value = match field {
            AccountField::DateRequested => &self.date_requested,
            AccountField::DateAuCreated => &self.date_au_created,
            AccountField::DateTrainingAssigned => &self.date_training_assigned,
            AccountField::DateAccountCreated => &self.date_account_created,
            AccountField::DateAccountActivated => &self.date_account_activated,
            AccountField::DateAccountInactivated => &self.date_account_inactivated,
            AccountField::Id
            | AccountField::Username
            | AccountField::Email
            | AccountField::ExistingUser => return None,
        };
        value.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.date_account_activated.is_some() && self.date_account_inactivated.is_none()
    }

    pub fn is_awaiting_activation(&self) -> bool {
        self.date_account_created.is_some() && self.date_account_activated.is_none()
    }

    pub fn is_inactive(&self) -> bool {
        self.date_account_inactivated.is_some()
    }
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|text| !text.trim().is_empty()))
}

fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccountSummary {
    pub total: usize,
    pub awaiting_activation: usize,
    pub active: usize,
}

impl AccountSummary {
    pub fn from_accounts(accounts: &[Account]) -> Self {
        Self {
            total: accounts.len(),
            awaiting_activation: accounts
                .iter()
                .filter(|account| account.is_awaiting_activation())
                .count(),
            active: accounts.iter().filter(|account| account.is_active()).count(),
        }
    }
}
