// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use ereg_app::{
    Account, AccountDraft, AccountField, AccountId, FetchQuery, SortDirection, format_us_date,
};
use ereg_client::{AccountsApi, ClientError};
use std::cmp::Ordering;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use time::{Date, Duration, macros::date};

const FIRST_NAMES: [&str; 16] = [
    "Avery", "Jordan", "Taylor", "Riley", "Morgan", "Casey", "Alex", "Quinn", "Parker", "Drew",
    "Kai", "Elliot", "Robin", "Cameron", "Hayden", "Rowan",
];
const LAST_NAMES: [&str; 18] = [
    "Walker", "Martin", "Hill", "Evans", "Lopez", "Gray", "Ward", "Young", "Diaz", "Reed",
    "Campbell", "Turner", "Flores", "Bennett", "Price", "Morris", "Foster", "Brooks",
];
const EMAIL_DOMAINS: [&str; 3] = ["umm.edu", "umaryland.edu", "som.umaryland.edu"];

/// Dates are generated backwards from here so fixtures never drift.
const REFERENCE_DATE: Date = date!(2024 - 06 - 30);

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    fn bool(&mut self) -> bool {
        (self.next_u64() & 1) == 1
    }
}

/// How far along the provisioning pipeline a generated account is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Requested,
    AuCreated,
    TrainingAssigned,
    AccountCreated,
    Activated,
    Inactivated,
}

impl Stage {
    pub const ALL: [Self; 6] = [
        Self::Requested,
        Self::AuCreated,
        Self::TrainingAssigned,
        Self::AccountCreated,
        Self::Activated,
        Self::Inactivated,
    ];
}

#[derive(Debug, Clone)]
pub struct AccountFaker {
    rng: DeterministicRng,
}

impl AccountFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
        }
    }

    pub fn int_n(&mut self, n: usize) -> usize {
        self.rng.int_n(n)
    }

    pub fn account(&mut self, id: AccountId) -> Account {
        let stage = Stage::ALL[self.rng.int_n(Stage::ALL.len())];
        self.account_at(id, stage)
    }

    /// Every milestone up to `stage` is set, later ones are blank.
    pub fn account_at(&mut self, id: AccountId, stage: Stage) -> Account {
        let first = self.pick(&FIRST_NAMES);
        let last = self.pick(&LAST_NAMES);
        let username = format!(
            "{}{}{}",
            first.chars().next().unwrap_or('x').to_ascii_lowercase(),
            last.to_lowercase(),
            id.get()
        );
        let email = format!("{username}@{}", self.pick(&EMAIL_DOMAINS));

        let mut account = Account::new(id, &username, &email);
        account.existing_user = self.rng.bool();

        let mut day = shift(REFERENCE_DATE, -(self.int_range(30, 360) as i64));
        // Stages and date fields share lifecycle order.
        for (reached, field) in Stage::ALL.into_iter().zip(AccountField::DATES) {
            if reached > stage {
                break;
            }
            let value = Some(format_us_date(day));
            match field {
                AccountField::DateRequested => account.date_requested = value,
                AccountField::DateAuCreated => account.date_au_created = value,
                AccountField::DateTrainingAssigned => account.date_training_assigned = value,
                AccountField::DateAccountCreated => account.date_account_created = value,
                AccountField::DateAccountActivated => account.date_account_activated = value,
                _ => account.date_account_inactivated = value,
            }
            day = shift(day, self.int_range(1, 14) as i64);
        }
        account
    }

    /// Accounts with ids `1..=count`.
    pub fn accounts(&mut self, count: usize) -> Vec<Account> {
        (1..=count as i64)
            .map(|id| self.account(AccountId::new(id)))
            .collect()
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }

    fn int_range(&mut self, min: usize, max: usize) -> usize {
        if max <= min {
            return min;
        }
        min + self.rng.int_n(max - min + 1)
    }
}

fn shift(day: Date, days: i64) -> Date {
    day.checked_add(Duration::days(days)).unwrap_or(day)
}

/// A request observed by [`MemoryAccounts`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    List(FetchQuery),
    Create(AccountDraft),
    Update(AccountId, AccountDraft),
    Delete(AccountId),
}

#[derive(Debug, Default)]
struct MemoryState {
    accounts: Vec<Account>,
    next_id: i64,
    calls: Vec<ApiCall>,
    fail_next: Option<ClientError>,
}

/// In-process accounts service with the remote service's sort and
/// blank-date filter behavior. Clones share one store.
#[derive(Debug, Clone, Default)]
pub struct MemoryAccounts {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryAccounts {
    pub fn new(accounts: Vec<Account>) -> Self {
        let next_id = accounts.iter().map(|a| a.id.get()).max().unwrap_or(0) + 1;
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                accounts,
                next_id,
                ..MemoryState::default()
            })),
        }
    }

    pub fn seeded(seed: u64, count: usize) -> Self {
        Self::new(AccountFaker::new(seed).accounts(count))
    }

    /// Every request seen so far, oldest first.
    pub fn calls(&self) -> Vec<ApiCall> {
        self.lock().calls.clone()
    }

    pub fn snapshot(&self) -> Vec<Account> {
        self.lock().accounts.clone()
    }

    /// The next request of any kind fails with `error`.
    pub fn fail_next(&self, error: ClientError) {
        self.lock().fail_next = Some(error);
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: ApiCall) -> Result<MutexGuard<'_, MemoryState>, ClientError> {
        let mut state = self.lock();
        state.calls.push(call);
        match state.fail_next.take() {
            Some(error) => Err(error),
            None => Ok(state),
        }
    }
}

impl AccountsApi for MemoryAccounts {
    fn list_accounts(&self, query: &FetchQuery) -> Result<Vec<Account>, ClientError> {
        let state = self.record(ApiCall::List(*query))?;
        let mut rows: Vec<Account> = state
            .accounts
            .iter()
            .filter(|account| match query.blank_filter {
                Some(field) => account.date(field).is_none(),
                None => true,
            })
            .cloned()
            .collect();
        rows.sort_by(|left, right| {
            let ordering = compare_on(left, right, query.sort.key).then(left.id.cmp(&right.id));
            match query.sort.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        });
        Ok(rows)
    }

    fn create_account(&self, draft: &AccountDraft) -> Result<(), ClientError> {
        let mut state = self.record(ApiCall::Create(draft.clone()))?;
        let id = AccountId::new(state.next_id);
        state.next_id += 1;
        state.accounts.push(account_from_draft(id, draft));
        Ok(())
    }

    fn update_account(&self, id: AccountId, draft: &AccountDraft) -> Result<(), ClientError> {
        let mut state = self.record(ApiCall::Update(id, draft.clone()))?;
        let Some(slot) = state.accounts.iter_mut().find(|account| account.id == id) else {
            return Err(not_found(id));
        };
        *slot = account_from_draft(id, draft);
        Ok(())
    }

    fn delete_account(&self, id: AccountId) -> Result<(), ClientError> {
        let mut state = self.record(ApiCall::Delete(id))?;
        let before = state.accounts.len();
        state.accounts.retain(|account| account.id != id);
        if state.accounts.len() == before {
            return Err(not_found(id));
        }
        Ok(())
    }
}

fn not_found(id: AccountId) -> ClientError {
    ClientError::NotFound {
        message: format!("account {id} does not exist"),
    }
}

fn account_from_draft(id: AccountId, draft: &AccountDraft) -> Account {
    let date = |value: &str| (!value.trim().is_empty()).then(|| value.to_owned());
    Account {
        id,
        username: draft.username.clone(),
        email: draft.email.clone(),
        existing_user: draft.existing_user,
        date_requested: date(&draft.date_requested),
        date_au_created: date(&draft.date_au_created),
        date_training_assigned: date(&draft.date_training_assigned),
        date_account_created: date(&draft.date_account_created),
        date_account_activated: date(&draft.date_account_activated),
        date_account_inactivated: date(&draft.date_account_inactivated),
    }
}

fn compare_on(left: &Account, right: &Account, key: AccountField) -> Ordering {
    match key {
        AccountField::Id => left.id.cmp(&right.id),
        AccountField::Username => left.username.cmp(&right.username),
        AccountField::Email => left.email.cmp(&right.email),
        AccountField::ExistingUser => left.existing_user.cmp(&right.existing_user),
        date_field => {
            date_sort_key(left.date(date_field)).cmp(&date_sort_key(right.date(date_field)))
        }
    }
}

/// Blank sorts first; `mm/dd/yyyy` sorts chronologically; anything else
/// sorts after parseable dates by text.
fn date_sort_key(value: Option<&str>) -> (u8, (i32, u32, u32), String) {
    let Some(text) = value else {
        return (0, (0, 0, 0), String::new());
    };
    let parts: Vec<&str> = text.split('/').map(str::trim).collect();
    let parsed: Option<(i32, u32, u32)> = match parts.as_slice() {
        [month, day, year] => match (year.parse(), month.parse(), day.parse()) {
            (Ok(year), Ok(month), Ok(day)) => Some((year, month, day)),
            _ => None,
        },
        _ => None,
    };
    match parsed {
        Some(ymd) => (1, ymd, String::new()),
        None => (2, (0, 0, 0), text.to_owned()),
    }
}
