// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow};
use ereg_app::{Account, AccountDraft, AccountId, FetchQuery, FetchTicket};
use ereg_client::AccountsApi;
use ereg_tui::InternalEvent;
use std::sync::mpsc::Sender;
use std::thread;
use tracing::debug;

/// Bridges an accounts service into the TUI. Fetches run off the UI
/// thread; mutations block so a second submit cannot race the first.
pub struct ServiceRuntime<A> {
    api: A,
}

impl<A> ServiceRuntime<A>
where
    A: AccountsApi + Clone + Send + 'static,
{
    pub fn new(api: A) -> Self {
        Self { api }
    }
}

impl<A> ereg_tui::AppRuntime for ServiceRuntime<A>
where
    A: AccountsApi + Clone + Send + 'static,
{
    fn fetch_accounts(&mut self, query: &FetchQuery) -> Result<Vec<Account>> {
        Ok(self.api.list_accounts(query)?)
    }

    fn create_account(&mut self, draft: &AccountDraft) -> Result<()> {
        Ok(self.api.create_account(draft)?)
    }

    fn update_account(&mut self, id: AccountId, draft: &AccountDraft) -> Result<()> {
        Ok(self.api.update_account(id, draft)?)
    }

    fn delete_account(&mut self, id: AccountId) -> Result<()> {
        Ok(self.api.delete_account(id)?)
    }

    fn spawn_fetch(&mut self, ticket: FetchTicket, tx: Sender<InternalEvent>) -> Result<()> {
        let api = self.api.clone();
        thread::Builder::new()
            .name(format!("ereg-fetch-{}", ticket.request_id))
            .spawn(move || {
                let result = api
                    .list_accounts(&ticket.query)
                    .map_err(|error| error.to_string());
                debug!(
                    request_id = ticket.request_id,
                    ok = result.is_ok(),
                    "fetch finished"
                );
                // The UI may have exited; nothing left to notify.
                let _ = tx.send(InternalEvent::Fetched {
                    request_id: ticket.request_id,
                    result,
                });
            })
            .map_err(|error| anyhow!("spawn fetch worker: {error}"))?;
        Ok(())
    }
}
