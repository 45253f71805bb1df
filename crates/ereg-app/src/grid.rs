// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use time::Date;

use crate::{
    Account, AccountDraft, AccountField, AccountId, AccountSummary, FetchQuery, FieldValue,
    SortConfig,
};

/// A list request in flight, tagged so late responses can be recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    pub request_id: u64,
    pub query: FetchQuery,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied { rows: usize },
    Stale,
    Failed(String),
}

/// Server rows plus one draft per row, kept index-aligned.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AccountGrid {
    accounts: Vec<Account>,
    drafts: Vec<AccountDraft>,
    sort: SortConfig,
    blank_filter: Option<AccountField>,
    last_issued: u64,
}

impl AccountGrid {
    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn drafts(&self) -> &[AccountDraft] {
        &self.drafts
    }

    pub fn sort(&self) -> SortConfig {
        self.sort
    }

    pub fn blank_filter(&self) -> Option<AccountField> {
        self.blank_filter
    }

    pub fn query(&self) -> FetchQuery {
        FetchQuery {
            sort: self.sort,
            blank_filter: self.blank_filter,
        }
    }

    pub fn last_issued(&self) -> u64 {
        self.last_issued
    }

    pub fn begin_fetch(&mut self) -> FetchTicket {
        self.last_issued += 1;
        FetchTicket {
            request_id: self.last_issued,
            query: self.query(),
        }
    }

    pub fn apply_fetch(
        &mut self,
        request_id: u64,
        result: Result<Vec<Account>, String>,
    ) -> FetchOutcome {
        if request_id < self.last_issued {
            return FetchOutcome::Stale;
        }
        match result {
            Ok(accounts) => {
                self.drafts = accounts.iter().map(AccountDraft::from).collect();
                self.accounts = accounts;
                FetchOutcome::Applied {
                    rows: self.accounts.len(),
                }
            }
            Err(message) => FetchOutcome::Failed(message),
        }
    }

    pub fn edit_row(
        &mut self,
        index: usize,
        field: AccountField,
        value: FieldValue,
        today: Date,
    ) -> Result<()> {
        let Some(current) = self.drafts.get(index) else {
            bail!(
                "row {} is out of range ({} rows loaded)",
                index + 1,
                self.drafts.len()
            );
        };
        let edited = current.with_edit(field, value, today)?;
        self.drafts = self
            .drafts
            .iter()
            .enumerate()
            .map(|(position, draft)| {
                if position == index {
                    edited.clone()
                } else {
                    draft.clone()
                }
            })
            .collect();
        Ok(())
    }

    pub fn is_row_dirty(&self, index: usize) -> bool {
        match (self.accounts.get(index), self.drafts.get(index)) {
            (Some(account), Some(draft)) => AccountDraft::from(account) != *draft,
            _ => false,
        }
    }

    pub fn is_cell_dirty(&self, index: usize, field: AccountField) -> bool {
        match (self.accounts.get(index), self.drafts.get(index)) {
            (Some(account), Some(draft)) => {
                AccountDraft::from(account).value(field) != draft.value(field)
            }
            _ => false,
        }
    }

    /// Returns whether the query changed, which a sort toggle always does.
    pub fn toggle_sort(&mut self, field: AccountField) -> bool {
        self.sort = self.sort.toggled_for(field);
        true
    }

    /// Returns the filter now in effect.
    pub fn toggle_blank_filter(&mut self, field: AccountField) -> Result<Option<AccountField>> {
        if !field.is_blank_filterable() {
            bail!("{} cannot be filtered on blanks", field.label());
        }
        self.blank_filter = if self.blank_filter == Some(field) {
            None
        } else {
            Some(field)
        };
        Ok(self.blank_filter)
    }

    pub fn summary(&self) -> AccountSummary {
        AccountSummary::from_accounts(&self.accounts)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeleteFlow {
    #[default]
    Idle,
    PendingConfirmation(AccountId),
}

impl DeleteFlow {
    pub fn select(&mut self, id: AccountId) {
        *self = Self::PendingConfirmation(id);
    }

    pub fn cancel(&mut self) {
        *self = Self::Idle;
    }

    pub fn confirm(&mut self) -> Option<AccountId> {
        let id = self.pending();
        *self = Self::Idle;
        id
    }

    pub fn pending(&self) -> Option<AccountId> {
        match self {
            Self::Idle => None,
            Self::PendingConfirmation(id) => Some(*id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AccountGrid, DeleteFlow, FetchOutcome};
    use crate::{Account, AccountField, AccountId, FieldValue, SortDirection};
    use anyhow::Result;
    use time::{Date, Month};

    fn day() -> Date {
        Date::from_calendar_date(2024, Month::June, 30).expect("valid date")
    }

    fn rows(ids: &[i64]) -> Vec<Account> {
        ids.iter()
            .map(|id| Account::new(AccountId::new(*id), &format!("user{id}"), "u@x.com"))
            .collect()
    }

    fn loaded(ids: &[i64]) -> AccountGrid {
        let mut grid = AccountGrid::default();
        let ticket = grid.begin_fetch();
        grid.apply_fetch(ticket.request_id, Ok(rows(ids)));
        grid
    }

    #[test]
    fn response_order_is_kept() {
        let mut grid = AccountGrid::default();
        grid.toggle_sort(AccountField::Id);
        let ticket = grid.begin_fetch();
        assert_eq!(ticket.query.sort.direction, SortDirection::Desc);

        let outcome = grid.apply_fetch(ticket.request_id, Ok(rows(&[2, 9, 5])));
        assert_eq!(outcome, FetchOutcome::Applied { rows: 3 });
        let ids: Vec<i64> = grid.accounts().iter().map(|a| a.id.get()).collect();
        assert_eq!(ids, vec![2, 9, 5]);
        assert_eq!(grid.drafts().len(), 3);
        assert_eq!(grid.drafts()[1].id, Some(AccountId::new(9)));
    }

    #[test]
    fn stale_response_is_discarded() {
        let mut grid = AccountGrid::default();
        let older = grid.begin_fetch();
        let newer = grid.begin_fetch();
        assert!(newer.request_id > older.request_id);

        grid.apply_fetch(newer.request_id, Ok(rows(&[1])));
        let outcome = grid.apply_fetch(older.request_id, Ok(rows(&[7, 8])));
        assert_eq!(outcome, FetchOutcome::Stale);
        assert_eq!(grid.accounts().len(), 1);
    }

    #[test]
    fn failed_fetch_keeps_rows_and_drafts() -> Result<()> {
        let mut grid = loaded(&[1, 2]);
        grid.edit_row(0, AccountField::Email, FieldValue::Text("new@x.com".to_owned()), day())?;
        let before = grid.clone();

        let ticket = grid.begin_fetch();
        let outcome = grid.apply_fetch(ticket.request_id, Err("connection refused".to_owned()));
        assert_eq!(outcome, FetchOutcome::Failed("connection refused".to_owned()));
        assert_eq!(grid.accounts(), before.accounts());
        assert_eq!(grid.drafts(), before.drafts());
        Ok(())
    }

    #[test]
    fn refetch_discards_unsaved_drafts() -> Result<()> {
        let mut grid = loaded(&[1]);
        grid.edit_row(0, AccountField::Username, FieldValue::Text("zed".to_owned()), day())?;
        assert!(grid.is_row_dirty(0));
        assert!(grid.is_cell_dirty(0, AccountField::Username));
        assert!(!grid.is_cell_dirty(0, AccountField::Email));

        let ticket = grid.begin_fetch();
        grid.apply_fetch(ticket.request_id, Ok(rows(&[1])));
        assert!(!grid.is_row_dirty(0));
        Ok(())
    }

    #[test]
    fn edit_touches_only_its_row() -> Result<()> {
        let mut grid = loaded(&[1, 2, 3]);
        let before = grid.drafts().to_vec();

        grid.edit_row(1, AccountField::DateRequested, FieldValue::Text("T".to_owned()), day())?;
        assert_eq!(grid.drafts()[1].date_requested, "06/30/2024");
        assert_eq!(grid.drafts()[0], before[0]);
        assert_eq!(grid.drafts()[2], before[2]);
        Ok(())
    }

    #[test]
    fn text_edit_touches_only_its_row() -> Result<()> {
        let mut grid = loaded(&[1, 2, 3]);
        let before = grid.drafts().to_vec();

        grid.edit_row(1, AccountField::Username, FieldValue::Text("renamed".to_owned()), day())?;
        assert_eq!(grid.drafts()[1].username, "renamed");
        assert_eq!(grid.drafts()[0], before[0]);
        assert_eq!(grid.drafts()[2], before[2]);
        assert!(!grid.is_row_dirty(0));
        assert!(grid.is_row_dirty(1));
        assert!(!grid.is_row_dirty(2));
        Ok(())
    }

    #[test]
    fn edit_out_of_range_leaves_state() {
        let mut grid = loaded(&[1]);
        let before = grid.clone();
        assert!(
            grid.edit_row(4, AccountField::Email, FieldValue::Text("x".to_owned()), day())
                .is_err()
        );
        assert!(
            grid.edit_row(0, AccountField::Id, FieldValue::Text("5".to_owned()), day())
                .is_err()
        );
        assert_eq!(grid, before);
    }

    #[test]
    fn filter_toggle_twice_is_unfiltered() -> Result<()> {
        let mut grid = AccountGrid::default();
        for field in AccountField::ALL
            .into_iter()
            .filter(|field| field.is_blank_filterable())
        {
            assert_eq!(grid.toggle_blank_filter(field)?, Some(field));
            assert_eq!(grid.query().filter_param(), field.as_str());
            assert_eq!(grid.toggle_blank_filter(field)?, None);
            assert_eq!(grid.query().filter_param(), "");
        }
        Ok(())
    }

    #[test]
    fn filter_switches_to_new_field() -> Result<()> {
        let mut grid = AccountGrid::default();
        grid.toggle_blank_filter(AccountField::DateAccountCreated)?;
        grid.toggle_blank_filter(AccountField::DateAccountActivated)?;
        assert_eq!(grid.blank_filter(), Some(AccountField::DateAccountActivated));
        Ok(())
    }

    #[test]
    fn filter_rejects_unfilterable_fields() {
        let mut grid = AccountGrid::default();
        assert!(grid.toggle_blank_filter(AccountField::DateRequested).is_err());
        assert!(grid.toggle_blank_filter(AccountField::Username).is_err());
        assert_eq!(grid.blank_filter(), None);
    }

    #[test]
    fn every_sort_pair_reaches_the_ticket() {
        for field in AccountField::ALL {
            for direction in [SortDirection::Asc, SortDirection::Desc] {
                let mut grid = AccountGrid::default();
                grid.toggle_sort(field);
                if grid.sort().direction != direction {
                    grid.toggle_sort(field);
                }
                let ticket = grid.begin_fetch();
                assert_eq!(ticket.query.sort.key, field);
                assert_eq!(ticket.query.sort.direction, direction);
            }
        }
    }

    #[test]
    fn delete_flow_transitions() {
        let mut flow = DeleteFlow::default();
        assert_eq!(flow.confirm(), None);

        flow.select(AccountId::new(3));
        flow.select(AccountId::new(7));
        assert_eq!(flow.pending(), Some(AccountId::new(7)));
        assert_eq!(flow.confirm(), Some(AccountId::new(7)));
        assert_eq!(flow, DeleteFlow::Idle);

        flow.select(AccountId::new(2));
        flow.cancel();
        assert_eq!(flow.confirm(), None);
    }
}
