use std::env;

use anyhow::{bail, Context, Result};
use diesel::prelude::*;
use uuid::Uuid;

use nakliyenet::{
    auth::password::{hash_password, MIN_PASSWORD_LENGTH},
    config::AppConfig,
    db::{self, PgPooledConnection},
    models::{NewUser, User},
    routes::{
        auth::{create_account, normalize_email},
        shipments::refresh_bid_count,
    },
    schema::{bids, shipments, users},
    status::UserType,
};

const USAGE: &str = "Usage: maintenance <command>
  hash-password <password>
  create-admin <email> <password> [first name] [last name]
  recount-bids
  fix-carrier-names";

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt().with_target(false).compact().init();

    let args: Vec<String> = env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("hash-password") => {
            let password = args.get(1).context(USAGE)?;
            println!("{}", hash_password(password)?);
        }
        Some("create-admin") => {
            let (Some(email), Some(password)) = (args.get(1), args.get(2)) else {
                bail!(USAGE);
            };
            let first_name = args.get(3).cloned().unwrap_or_default();
            let last_name = args.get(4).cloned().unwrap_or_default();
            create_admin(email, password, first_name, last_name)?;
        }
        Some("recount-bids") => recount_bids()?,
        Some("fix-carrier-names") => fix_carrier_names()?,
        Some(cmd) => {
            eprintln!("Unknown command: {cmd}\n{USAGE}");
            std::process::exit(1);
        }
        None => {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    }

    Ok(())
}

fn connect() -> Result<PgPooledConnection> {
    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "maintenance",
        database_url = %config.redacted_database_url(),
        "loaded configuration"
    );
    let pool = db::init_pool_and_migrate(&config.database_url, 1)?;
    pool.get().context("failed to get database connection")
}

fn create_admin(email: &str, password: &str, first_name: String, last_name: String) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        bail!("password must be at least {MIN_PASSWORD_LENGTH} characters");
    }
    let email = normalize_email(email);
    let mut conn = connect()?;

    let existing: Option<User> = users::table
        .filter(users::email.eq(&email))
        .first(&mut conn)
        .optional()?;
    if let Some(user) = existing {
        diesel::update(users::table.find(user.id))
            .set((
                users::is_admin.eq(true),
                users::is_active.eq(true),
                users::password_hash.eq(Some(hash_password(password)?)),
                users::updated_at.eq(diesel::dsl::now),
            ))
            .execute(&mut conn)?;
        println!("Promoted {email} to admin.");
        return Ok(());
    }

    let user = create_account(
        &mut conn,
        NewUser {
            id: Uuid::new_v4(),
            email,
            password_hash: Some(hash_password(password)?),
            first_name,
            last_name,
            is_admin: true,
        },
        UserType::Shipper,
        String::new(),
    )
    .map_err(|err| anyhow::anyhow!("failed to create admin: {}", err.message()))?;
    println!("Created admin {} ({}).", user.email, user.id);
    Ok(())
}

fn recount_bids() -> Result<()> {
    let mut conn = connect()?;
    let ids: Vec<(Uuid, i32)> = shipments::table
        .select((shipments::id, shipments::bid_count))
        .load(&mut conn)
        .context("failed to load shipments")?;

    let mut changed = 0;
    for (id, stored) in &ids {
        let actual = refresh_bid_count(&mut conn, *id)?;
        if actual != *stored {
            changed += 1;
            println!("{id}: {stored} -> {actual}");
        }
    }
    println!("Recounted {} shipments, {changed} corrected.", ids.len());
    Ok(())
}

/// Rewrites bid carrier names that were stored before the carrier filled in their name.
fn fix_carrier_names() -> Result<()> {
    let mut conn = connect()?;
    let rows: Vec<(Uuid, String, User)> = bids::table
        .inner_join(users::table.on(users::id.eq(bids::carrier_id)))
        .select((bids::id, bids::carrier_name, users::all_columns))
        .load(&mut conn)
        .context("failed to load bids")?;

    let mut fixed = 0;
    for (bid_id, stored, carrier) in rows {
        let name = carrier.display_name();
        if stored == name {
            continue;
        }
        diesel::update(bids::table.find(bid_id))
            .set(bids::carrier_name.eq(&name))
            .execute(&mut conn)?;
        fixed += 1;
        println!("{bid_id}: '{stored}' -> '{name}'");
    }
    println!("Updated {fixed} bids.");
    Ok(())
}
