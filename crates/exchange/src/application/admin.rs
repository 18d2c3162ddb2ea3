//! Account and listing administration

use bourse_core::{
    Amount, ExchangeEvent, Instrument, OrderType, Role, SETTLEMENT_TICKER, User, UserId,
    validate_ticker,
};
use bourse_ports::{Clock, EventNotifier, InstrumentDirectory, Store, Transaction, UserDirectory};
use log::info;

use super::Exchange;
use crate::error::{ExchangeError, Result};

impl<C, S, U, I, N> Exchange<C, S, U, I, N>
where
    C: Clock,
    S: Store,
    U: UserDirectory,
    I: InstrumentDirectory,
    N: EventNotifier,
{
    /// Open an account with role USER and no balances
    pub async fn register_user(&self, name: &str) -> Result<User> {
        self.insert_user(name, Role::User).await
    }

    /// Bootstrap path for administrators
    pub async fn create_admin(&self, name: &str) -> Result<User> {
        self.insert_user(name, Role::Admin).await
    }

    /// Remove a user, cancelling their open orders and dropping their
    /// balances. Admins cannot be removed this way, including by themselves.
    pub async fn delete_user(&self, admin_id: UserId, user_id: UserId) -> Result<User> {
        self.require_admin(admin_id).await?;
        if admin_id == user_id {
            return Err(ExchangeError::PermissionDenied(
                "an admin cannot delete itself".to_string(),
            ));
        }

        let (user, events) = self
            .retry_once("user deletion", || self.remove_user(user_id))
            .await?;

        info!(
            "User {} ({}) deleted by {}, {} orders cancelled",
            user.id,
            user.name,
            admin_id,
            events.len()
        );
        self.engine.publish(events).await;
        Ok(user)
    }

    pub async fn create_instrument(
        &self,
        admin_id: UserId,
        ticker: &str,
        name: &str,
    ) -> Result<Instrument> {
        self.require_admin(admin_id).await?;
        validate_ticker(ticker).map_err(|e| ExchangeError::InvalidInput(e.to_string()))?;
        let name = non_blank(name, "instrument name")?;

        let mut tx = self.store.begin().await?;
        if tx.lock_instrument(ticker).await?.is_some() {
            return Err(ExchangeError::Conflict(format!(
                "instrument {ticker} already exists"
            )));
        }

        let instrument = Instrument::new_with_time(ticker, name, self.clock.now());
        tx.save_instrument(instrument.clone()).await?;
        tx.commit().await?;

        info!("Listed instrument {} ({})", instrument.ticker, instrument.name);
        Ok(instrument)
    }

    /// Delist an instrument. Refused while LIMIT orders on it are open.
    pub async fn delete_instrument(&self, admin_id: UserId, ticker: &str) -> Result<Instrument> {
        self.require_admin(admin_id).await?;

        let mut tx = self.store.begin().await?;
        let instrument = tx
            .lock_instrument(ticker)
            .await?
            .ok_or_else(|| ExchangeError::NotFound(format!("instrument {ticker}")))?;

        if self.orders.has_resting_orders(&mut tx, ticker).await? {
            return Err(ExchangeError::Conflict(format!(
                "instrument {ticker} still has open orders"
            )));
        }

        tx.delete_instrument(ticker).await?;
        tx.commit().await?;

        info!("Delisted instrument {}", ticker);
        Ok(instrument)
    }

    /// Suspend or resume trading. Resting orders are kept.
    pub async fn set_instrument_active(
        &self,
        admin_id: UserId,
        ticker: &str,
        active: bool,
    ) -> Result<Instrument> {
        self.require_admin(admin_id).await?;

        let mut tx = self.store.begin().await?;
        let mut instrument = tx
            .lock_instrument(ticker)
            .await?
            .ok_or_else(|| ExchangeError::NotFound(format!("instrument {ticker}")))?;
        instrument.is_active = active;
        tx.save_instrument(instrument.clone()).await?;
        tx.commit().await?;

        info!(
            "Instrument {} {}",
            ticker,
            if active { "resumed" } else { "suspended" }
        );
        Ok(instrument)
    }

    /// Active instruments, by ticker
    pub async fn list_instruments(&self) -> Result<Vec<Instrument>> {
        let mut tx = self.store.begin().await?;
        Ok(tx
            .instruments()
            .await?
            .into_iter()
            .filter(|i| i.is_active)
            .collect())
    }

    /// Credit a user's balance; returns the new amount
    pub async fn deposit(
        &self,
        admin_id: UserId,
        user_id: UserId,
        ticker: &str,
        amount: Amount,
    ) -> Result<Amount> {
        let delta = self.balance_change(admin_id, ticker, amount).await?;
        let updated = self
            .retry_once("deposit", || self.apply_adjustment(user_id, ticker, delta))
            .await?;
        info!("Deposited {} {} to {}", amount, ticker, user_id);
        Ok(updated)
    }

    /// Debit a user's balance; returns the new amount
    pub async fn withdraw(
        &self,
        admin_id: UserId,
        user_id: UserId,
        ticker: &str,
        amount: Amount,
    ) -> Result<Amount> {
        let delta = self.balance_change(admin_id, ticker, amount).await?;
        let updated = self
            .retry_once("withdrawal", || self.apply_adjustment(user_id, ticker, -delta))
            .await?;
        info!("Withdrew {} {} from {}", amount, ticker, user_id);
        Ok(updated)
    }

    async fn insert_user(&self, name: &str, role: Role) -> Result<User> {
        let name = non_blank(name, "user name")?;
        let user = User::new_with_time(name, role, self.clock.now());

        let mut tx = self.store.begin().await?;
        tx.insert_user(user.clone()).await?;
        tx.commit().await?;

        info!("Registered {} {} ({})", user.role, user.id, user.name);
        Ok(user)
    }

    async fn require_admin(&self, admin_id: UserId) -> Result<()> {
        match self.users.role(admin_id).await {
            Some(Role::Admin) => Ok(()),
            _ => Err(ExchangeError::PermissionDenied(format!(
                "user {admin_id} is not an admin"
            ))),
        }
    }

    /// Shared validation of deposits and withdrawals
    async fn balance_change(&self, admin_id: UserId, ticker: &str, amount: Amount) -> Result<i64> {
        self.require_admin(admin_id).await?;

        if amount == 0 {
            return Err(ExchangeError::InvalidInput(
                "amount must be greater than zero".to_string(),
            ));
        }
        if ticker != SETTLEMENT_TICKER {
            self.ensure_instrument(ticker).await?;
        }

        i64::try_from(amount)
            .map_err(|_| ExchangeError::InvalidInput(format!("amount {amount} is too large")))
    }

    async fn apply_adjustment(&self, user_id: UserId, ticker: &str, delta: i64) -> Result<Amount> {
        let mut tx = self.store.begin().await?;
        if tx.lock_user(user_id).await?.is_none() {
            return Err(ExchangeError::NotFound(format!("user {user_id}")));
        }
        let updated = self.ledger.adjust(&mut tx, user_id, ticker, delta).await?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn remove_user(&self, user_id: UserId) -> Result<(User, Vec<ExchangeEvent>)> {
        let mut tx = self.store.begin().await?;
        let user = tx
            .lock_user(user_id)
            .await?
            .ok_or_else(|| ExchangeError::NotFound(format!("user {user_id}")))?;
        if user.role == Role::Admin {
            return Err(ExchangeError::PermissionDenied(
                "admins cannot be deleted".to_string(),
            ));
        }

        let now = self.clock.now();
        let mut events = Vec::new();
        for listed in self.orders.list_by_user(&mut tx, user_id).await? {
            if listed.status.is_terminal() {
                continue;
            }

            // A concurrent match may have filled it since the listing
            let order = self.orders.lock(&mut tx, listed.id).await?;
            // A market order that already filled has nothing left to withdraw
            let cancellable = order.status.is_active()
                && (order.order_type() == OrderType::Limit || order.filled == 0);
            if cancellable {
                let cancelled = self.orders.cancel(&mut tx, order.id, now).await?;
                events.push(ExchangeEvent::OrderStatusChanged((&cancelled).into()));
            }
        }

        self.ledger.close_account(&mut tx, user_id).await?;
        tx.delete_user(user_id).await?;
        tx.commit().await?;

        Ok((user, events))
    }
}

fn non_blank<'a>(value: &'a str, what: &str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ExchangeError::InvalidInput(format!("{what} must not be empty")))
    } else {
        Ok(trimmed)
    }
}
