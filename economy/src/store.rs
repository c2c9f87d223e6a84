use pixelvault_types::{Account, EconomyError, UserId};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Result of a capped withdrawal: how much actually came out and what is
/// left behind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Withdrawal {
    pub withdrawn: u64,
    pub remaining: u64,
}

/// The atomic-update primitive every economy operation is built on.
///
/// `apply_if` runs the closure against a draft of the current row as one
/// indivisible step: returning `Ok` commits the draft and yields the
/// post-mutation row; returning `Err` discards every change and yields the
/// typed reason, evaluated against the row state actually seen at write
/// time. There is no window between "check" and "charge".
///
/// `apply_pair_if` extends the same contract to two rows, which are always
/// locked in lexicographic id order so that two concurrent operations
/// touching the same pair in opposite roles cannot deadlock.
pub trait Store {
    fn get(
        &self,
        id: &UserId,
    ) -> impl Future<Output = Result<Option<Account>, EconomyError>> + Send;

    /// Idempotent upsert: insert a fresh row with defaults, or refresh the
    /// display name of an existing one. Safe to call concurrently for the
    /// same id.
    fn ensure(
        &self,
        id: &UserId,
        display_name: &str,
    ) -> impl Future<Output = Result<Account, EconomyError>> + Send;

    fn apply_if<T, F>(
        &self,
        id: &UserId,
        op: F,
    ) -> impl Future<Output = Result<(Account, T), EconomyError>> + Send
    where
        T: Send,
        F: FnOnce(&mut Account) -> Result<T, EconomyError> + Send;

    fn apply_pair_if<T, F>(
        &self,
        a: &UserId,
        b: &UserId,
        op: F,
    ) -> impl Future<Output = Result<(Account, Account, T), EconomyError>> + Send
    where
        T: Send,
        F: FnOnce(&mut Account, &mut Account) -> Result<T, EconomyError> + Send;

    /// Debit `min(want, wallet)` so the balance can never go negative.
    fn withdraw_up_to(
        &self,
        id: &UserId,
        want: u64,
    ) -> impl Future<Output = Result<Withdrawal, EconomyError>> + Send;
}

/// In-memory store: a map of rows, each behind its own lock.
///
/// The outer lock is held only long enough to fetch or insert a row handle;
/// mutations hold only that row's mutex, so unrelated accounts proceed
/// independently.
#[derive(Default)]
pub struct MemoryStore {
    rows: RwLock<HashMap<UserId, Arc<Mutex<Account>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn row(&self, id: &UserId) -> Result<Arc<Mutex<Account>>, EconomyError> {
        self.rows
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or(EconomyError::NotFound)
    }

    /// Clone of every row, for reporting and invariant checks.
    pub async fn snapshot(&self) -> Vec<Account> {
        let handles: Vec<Arc<Mutex<Account>>> =
            self.rows.read().await.values().cloned().collect();
        let mut accounts = Vec::with_capacity(handles.len());
        for handle in handles {
            accounts.push(handle.lock().await.clone());
        }
        accounts
    }
}

impl Store for MemoryStore {
    async fn get(&self, id: &UserId) -> Result<Option<Account>, EconomyError> {
        let handle = {
            let rows = self.rows.read().await;
            rows.get(id).cloned()
        };
        match handle {
            Some(row) => Ok(Some(row.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn ensure(&self, id: &UserId, display_name: &str) -> Result<Account, EconomyError> {
        let name: String = display_name
            .chars()
            .take(pixelvault_types::account::MAX_NAME_LENGTH)
            .collect();
        let handle = {
            let mut rows = self.rows.write().await;
            rows.entry(id.clone())
                .or_insert_with(|| {
                    Arc::new(Mutex::new(Account::new(id.clone(), name.clone())))
                })
                .clone()
        };
        let mut account = handle.lock().await;
        if account.display_name != name {
            account.display_name = name;
        }
        Ok(account.clone())
    }

    async fn apply_if<T, F>(&self, id: &UserId, op: F) -> Result<(Account, T), EconomyError>
    where
        T: Send,
        F: FnOnce(&mut Account) -> Result<T, EconomyError> + Send,
    {
        let handle = self.row(id).await?;
        let mut account = handle.lock().await;
        let mut draft = account.clone();
        match op(&mut draft) {
            Ok(value) => {
                *account = draft.clone();
                Ok((draft, value))
            }
            Err(reason) => {
                debug!(user = %id, %reason, "guarded update not applied");
                Err(reason)
            }
        }
    }

    async fn apply_pair_if<T, F>(
        &self,
        a: &UserId,
        b: &UserId,
        op: F,
    ) -> Result<(Account, Account, T), EconomyError>
    where
        T: Send,
        F: FnOnce(&mut Account, &mut Account) -> Result<T, EconomyError> + Send,
    {
        if a == b {
            return Err(EconomyError::SelfTarget);
        }
        let (handle_a, handle_b) = {
            let rows = self.rows.read().await;
            (
                rows.get(a).cloned().ok_or(EconomyError::NotFound)?,
                rows.get(b).cloned().ok_or(EconomyError::NotFound)?,
            )
        };

        // Lock in lexicographic id order regardless of role.
        let (first, second, a_is_first) = if a < b {
            (handle_a, handle_b, true)
        } else {
            (handle_b, handle_a, false)
        };
        let mut first_row = first.lock().await;
        let mut second_row = second.lock().await;
        let (row_a, row_b) = if a_is_first {
            (&mut *first_row, &mut *second_row)
        } else {
            (&mut *second_row, &mut *first_row)
        };

        let mut draft_a = row_a.clone();
        let mut draft_b = row_b.clone();
        match op(&mut draft_a, &mut draft_b) {
            Ok(value) => {
                *row_a = draft_a.clone();
                *row_b = draft_b.clone();
                Ok((draft_a, draft_b, value))
            }
            Err(reason) => {
                debug!(a = %a, b = %b, %reason, "guarded pair update not applied");
                Err(reason)
            }
        }
    }

    async fn withdraw_up_to(&self, id: &UserId, want: u64) -> Result<Withdrawal, EconomyError> {
        let handle = self.row(id).await?;
        let mut account = handle.lock().await;
        let withdrawn = want.min(account.wallet);
        account.wallet -= withdrawn;
        Ok(Withdrawal {
            withdrawn,
            remaining: account.wallet,
        })
    }
}
