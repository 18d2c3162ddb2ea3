use std::collections::HashMap;

use bourse_core::{Role, User, UserId};
use bourse_ports::Clock;
use log::info;

use super::{ConfigError, ExchangeConfig};
use crate::application::SubmitOutcome;
use crate::infrastructure::InMemoryExchange;

/// Name of the admin account created when the file declares none
pub const DEFAULT_ADMIN: &str = "admin";

/// What bootstrapping created
#[derive(Debug)]
pub struct Bootstrap {
    /// Admin that performed the listings and deposits
    pub admin: User,
    /// Configured user names to their ids
    pub users: HashMap<String, UserId>,
    /// Seed orders in file order
    pub seed_outcomes: Vec<SubmitOutcome>,
}

/// Populate `exchange` from `config`: instruments, users and their
/// deposits, then seed orders through the normal submission path.
pub async fn bootstrap<C: Clock>(
    exchange: &InMemoryExchange<C>,
    config: &ExchangeConfig,
) -> Result<Bootstrap, ConfigError> {
    config.validate()?;

    let mut users = HashMap::new();
    let mut admin = None;
    for user in &config.users {
        let created = match user.role {
            Role::Admin => exchange.create_admin(&user.name).await?,
            Role::User => exchange.register_user(&user.name).await?,
        };
        if created.role == Role::Admin && admin.is_none() {
            admin = Some(created.clone());
        }
        users.insert(user.name.clone(), created.id);
    }

    let admin = match admin {
        Some(admin) => admin,
        None => exchange.create_admin(DEFAULT_ADMIN).await?,
    };

    for instrument in &config.instruments {
        exchange
            .create_instrument(admin.id, &instrument.ticker, &instrument.name)
            .await?;
        if !instrument.active {
            exchange
                .set_instrument_active(admin.id, &instrument.ticker, false)
                .await?;
        }
    }

    for user in &config.users {
        let user_id = lookup(&users, &user.name)?;
        for deposit in &user.deposits {
            exchange
                .deposit(admin.id, user_id, &deposit.ticker, deposit.amount)
                .await?;
        }
    }

    let mut seed_outcomes = Vec::with_capacity(config.seed_orders.len());
    for seed in &config.seed_orders {
        let user_id = lookup(&users, &seed.user)?;
        seed_outcomes.push(exchange.submit_order(user_id, seed.to_request()).await?);
    }

    info!(
        "Bootstrapped {}: {} instruments, {} users, {} seed orders",
        config.name,
        config.instruments.len(),
        users.len(),
        seed_outcomes.len()
    );

    Ok(Bootstrap {
        admin,
        users,
        seed_outcomes,
    })
}

fn lookup(users: &HashMap<String, UserId>, name: &str) -> Result<UserId, ConfigError> {
    users
        .get(name)
        .copied()
        .ok_or_else(|| ConfigError::Invalid(format!("unknown user {name}")))
}
