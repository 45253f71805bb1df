// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{AccountField, AccountGrid, AccountId, DeleteFlow, NewAccountForm, SortConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    Nav,
    Edit,
    Form,
    ConfirmDelete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    pub mode: AppMode,
    pub grid: AccountGrid,
    pub new_account: NewAccountForm,
    pub delete: DeleteFlow,
    pub status_line: Option<String>,
    pub error_banner: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            mode: AppMode::Nav,
            grid: AccountGrid::default(),
            new_account: NewAccountForm::default(),
            delete: DeleteFlow::Idle,
            status_line: None,
            error_banner: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    EnterEditMode,
    ExitToNav,
    OpenNewForm,
    CancelForm,
    ToggleSort(AccountField),
    ToggleFilter(AccountField),
    RequestDelete(AccountId),
    CancelDelete,
    ConfirmDelete,
    Refresh,
    SetStatus(String),
    ClearStatus,
    ShowError(String),
    DismissError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    ModeChanged(AppMode),
    SortChanged(SortConfig),
    FilterChanged(Option<AccountField>),
    FetchRequested,
    DeletePending(AccountId),
    DeleteConfirmed(AccountId),
    DeleteCanceled,
    StatusUpdated(String),
    StatusCleared,
    ErrorShown(String),
    ErrorDismissed,
}

impl AppState {
    pub fn dispatch(&mut self, command: AppCommand) -> Vec<AppEvent> {
        match command {
            AppCommand::EnterEditMode => {
                if self.grid.drafts().is_empty() {
                    return vec![self.set_status("no rows to edit")];
                }
                self.mode = AppMode::Edit;
                vec![AppEvent::ModeChanged(self.mode)]
            }
            AppCommand::ExitToNav => {
                self.mode = AppMode::Nav;
                vec![AppEvent::ModeChanged(self.mode), self.set_status("nav")]
            }
            AppCommand::OpenNewForm => {
                self.mode = AppMode::Form;
                vec![AppEvent::ModeChanged(self.mode)]
            }
            AppCommand::CancelForm => {
                self.mode = AppMode::Nav;
                vec![AppEvent::ModeChanged(self.mode)]
            }
            AppCommand::ToggleSort(field) => {
                self.grid.toggle_sort(field);
                let sort = self.grid.sort();
                let label = format!("sort {} {}", field.label(), sort.direction.as_str());
                vec![
                    AppEvent::SortChanged(sort),
                    self.set_status(&label),
                    AppEvent::FetchRequested,
                ]
            }
            AppCommand::ToggleFilter(field) => match self.grid.toggle_blank_filter(field) {
                Ok(filter) => {
                    let label = match filter {
                        Some(active) => format!("blank {} only", active.label()),
                        None => "filter off".to_owned(),
                    };
                    vec![
                        AppEvent::FilterChanged(filter),
                        self.set_status(&label),
                        AppEvent::FetchRequested,
                    ]
                }
                Err(error) => vec![self.set_status(&error.to_string())],
            },
            AppCommand::RequestDelete(id) => {
                self.delete.select(id);
                self.mode = AppMode::ConfirmDelete;
                vec![AppEvent::DeletePending(id), AppEvent::ModeChanged(self.mode)]
            }
            AppCommand::CancelDelete => {
                self.delete.cancel();
                self.mode = AppMode::Nav;
                vec![AppEvent::DeleteCanceled, AppEvent::ModeChanged(self.mode)]
            }
            AppCommand::ConfirmDelete => {
                self.mode = AppMode::Nav;
                match self.delete.confirm() {
                    Some(id) => vec![
                        AppEvent::DeleteConfirmed(id),
                        AppEvent::ModeChanged(self.mode),
                    ],
                    None => vec![AppEvent::ModeChanged(self.mode)],
                }
            }
            AppCommand::Refresh => vec![AppEvent::FetchRequested],
            AppCommand::SetStatus(message) => vec![self.set_status(&message)],
            AppCommand::ClearStatus => {
                self.status_line = None;
                vec![AppEvent::StatusCleared]
            }
            AppCommand::ShowError(message) => {
                self.error_banner = Some(message.clone());
                vec![AppEvent::ErrorShown(message)]
            }
            AppCommand::DismissError => {
                if self.error_banner.take().is_some() {
                    vec![AppEvent::ErrorDismissed]
                } else {
                    Vec::new()
                }
            }
        }
    }

    fn set_status(&mut self, message: &str) -> AppEvent {
        self.status_line = Some(message.to_owned());
        AppEvent::StatusUpdated(message.to_owned())
    }
}
