//! Offline administration of the library database.
//!
//! Roles can only be changed from here; no HTTP endpoint grants or revokes
//! the admin role.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use music_library_server::library::{
    LibraryStore, NewPrincipal, Principal, Role, SqliteLibraryStore,
};
use music_library_server::server::validation::{
    check_max_len, require_text, validate_email, validate_login, validate_password,
    PERSON_NAME_MAX_LEN,
};

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[command(name = "cli-admin", about = "Administer a music library database")]
struct CliArgs {
    /// Path to the SQLite library database file.
    #[clap(value_parser = parse_path)]
    pub db_path: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Registers a user.
    AddUser {
        login: String,
        password: String,
        first_name: String,
        last_name: String,
        email: String,

        /// Give the new user the admin role.
        #[clap(long)]
        admin: bool,
    },

    /// Grants the admin role to a user.
    GrantAdmin { login: String },

    /// Revokes the admin role from a user.
    RevokeAdmin { login: String },

    /// Lists every user with resource counts.
    ListUsers,
}

fn find_user(store: &SqliteLibraryStore, login: &str) -> Result<Principal> {
    let users = store.list_users()?;
    match users.into_iter().find(|user| user.principal.login == login) {
        Some(user) => Ok(user.principal),
        None => bail!("No user with login '{}'", login),
    }
}

fn set_role(store: &SqliteLibraryStore, login: &str, role: Role) -> Result<()> {
    let user = find_user(store, login)?;
    if !store.set_role(user.id, role)? {
        bail!("User '{}' disappeared while updating its role", login);
    }
    println!("{} is now {:?}", login, role);
    Ok(())
}

fn add_user(
    store: &SqliteLibraryStore,
    new_principal: NewPrincipal,
    admin: bool,
) -> Result<()> {
    let login = validate_login(Some(new_principal.login.as_str()))?;
    let password = validate_password(Some(new_principal.password.as_str()))?;
    let first_name = require_text(Some(new_principal.first_name.as_str()), "First name is required")?;
    let last_name = require_text(Some(new_principal.last_name.as_str()), "Last name is required")?;
    check_max_len(&first_name, PERSON_NAME_MAX_LEN, "First name is too long")?;
    check_max_len(&last_name, PERSON_NAME_MAX_LEN, "Last name is too long")?;
    let email = new_principal.email.trim().to_string();
    validate_email(&email)?;

    let principal = store
        .register(&NewPrincipal {
            login,
            password,
            first_name,
            last_name,
            email,
        })
        .context("Failed to register user")?;

    if admin && !store.set_role(principal.id, Role::Admin)? {
        bail!("User {} was created but could not be made admin", principal.login);
    }
    println!(
        "Created user {} with id {}{}",
        principal.login,
        principal.id,
        if admin { " (admin)" } else { "" }
    );
    Ok(())
}

fn list_users(store: &SqliteLibraryStore) -> Result<()> {
    let users = store.list_users()?;
    if users.is_empty() {
        println!("No users.");
        return Ok(());
    }
    println!(
        "{:>6}  {:<20} {:<8} {:>8} {:>8} {:>12}",
        "id", "login", "role", "artists", "tracks", "collections"
    );
    for user in users {
        println!(
            "{:>6}  {:<20} {:<8} {:>8} {:>8} {:>12}",
            user.principal.id,
            user.principal.login,
            if user.principal.is_admin() { "admin" } else { "standard" },
            user.artists_count,
            user.tracks_count,
            user.collections_count
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();
    let store = SqliteLibraryStore::new(&cli_args.db_path, 1)?;

    match cli_args.command {
        Command::AddUser {
            login,
            password,
            first_name,
            last_name,
            email,
            admin,
        } => add_user(
            &store,
            NewPrincipal {
                login,
                password,
                first_name,
                last_name,
                email,
            },
            admin,
        ),
        Command::GrantAdmin { login } => set_role(&store, &login, Role::Admin),
        Command::RevokeAdmin { login } => set_role(&store, &login, Role::Standard),
        Command::ListUsers => list_users(&store),
    }
}
