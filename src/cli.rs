//! Command-line entry points. Without a subcommand the binary serves HTTP;
//! the account commands let an operator manage logins against the same
//! database the server uses.

use std::str::FromStr;

use anyhow::{Result, anyhow, bail};
use clap::{Parser, Subcommand};

use crate::model::role::Role;
use crate::model::user::{User, UserProfile};
use crate::store::credentials::{CredentialStore, MIN_PASSWORD_LEN};

/// Billbook - billing and production tracking backend
#[derive(Debug, Parser)]
#[command(name = "billbook")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, PartialEq, Subcommand)]
pub enum Commands {
    /// Run the HTTP server (the default)
    Serve,

    /// Create a login
    #[command(alias = "add-user")]
    CreateUser {
        username: String,
        password: String,
        /// admin or user
        #[arg(long, default_value = "user", value_parser = parse_role)]
        role: Role,
        #[arg(long)]
        full_name: Option<String>,
    },

    /// Replace the password of an existing login
    ResetPassword { username: String, password: String },

    /// Print a stored login
    ShowUser { username: String },
}

fn parse_role(raw: &str) -> Result<Role, String> {
    Role::from_str(raw.trim().to_lowercase().as_str())
        .map_err(|_| format!("unknown role `{raw}`, expected `admin` or `user`"))
}

async fn existing(credentials: &CredentialStore, username: &str) -> Result<User> {
    credentials
        .find_by_username(username)
        .await
        .map_err(|e| anyhow!("{e}"))?
        .ok_or_else(|| anyhow!("no user named `{username}`"))
}

pub async fn cmd_create_user(
    credentials: &CredentialStore,
    username: &str,
    password: &str,
    role: Role,
    full_name: Option<String>,
) -> Result<User> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        bail!("Password must be at least {MIN_PASSWORD_LEN} characters");
    }
    credentials
        .create(username, password, role, full_name)
        .await
        .map_err(|e| anyhow!("{e}"))
}

pub async fn cmd_reset_password(
    credentials: &CredentialStore,
    username: &str,
    password: &str,
) -> Result<User> {
    let user = existing(credentials, username).await?;
    credentials
        .set_password(&user, password)
        .await
        .map_err(|e| anyhow!("{e}"))?;
    Ok(user)
}

pub async fn cmd_show_user(credentials: &CredentialStore, username: &str) -> Result<String> {
    let user = existing(credentials, username).await?;
    Ok(serde_json::to_string_pretty(&UserProfile::from(&user))?)
}

/// Runs an account command and returns what to print. `Serve` is handled by
/// the binary and yields an empty string here.
pub async fn run(command: Commands, credentials: &CredentialStore) -> Result<String> {
    match command {
        Commands::Serve => Ok(String::new()),
        Commands::CreateUser {
            username,
            password,
            role,
            full_name,
        } => {
            let user = cmd_create_user(credentials, &username, &password, role, full_name).await?;
            Ok(format!("Created {} `{}` ({})", user.role, user.username, user.id))
        }
        Commands::ResetPassword { username, password } => {
            let user = cmd_reset_password(credentials, &username, &password).await?;
            Ok(format!("Password updated for `{}`", user.username))
        }
        Commands::ShowUser { username } => cmd_show_user(credentials, &username).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryUserRepository;
    use std::sync::Arc;

    fn store() -> CredentialStore {
        CredentialStore::new(Arc::new(MemoryUserRepository::default()), 1)
    }

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("billbook").chain(args.iter().copied()))
    }

    #[test]
    fn no_subcommand_means_serve() {
        assert_eq!(parse(&[]).unwrap().command, None);
        assert_eq!(parse(&["serve"]).unwrap().command, Some(Commands::Serve));
    }

    #[test]
    fn create_user_defaults_to_the_user_role() {
        let cli = parse(&["create-user", "ravi", "worker1"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::CreateUser {
                username: "ravi".into(),
                password: "worker1".into(),
                role: Role::User,
                full_name: None,
            })
        );

        let cli = parse(&[
            "create-user",
            "meena",
            "secret9",
            "--role",
            "Admin",
            "--full-name",
            "Meena Shah",
        ])
        .unwrap();
        let Some(Commands::CreateUser { role, full_name, .. }) = cli.command else {
            panic!("expected create-user");
        };
        assert_eq!(role, Role::Admin);
        assert_eq!(full_name.as_deref(), Some("Meena Shah"));
    }

    #[test]
    fn rejects_unknown_roles_and_missing_arguments() {
        assert!(parse(&["create-user", "ravi", "worker1", "--role", "owner"]).is_err());
        assert!(parse(&["create-user", "ravi"]).is_err());
        assert!(parse(&["reset-password", "ravi"]).is_err());
    }

    #[actix_web::test]
    async fn created_users_can_log_in() {
        let creds = store();
        let command = parse(&["create-user", "Ravi", "worker1"]).unwrap().command.unwrap();
        let out = run(command, &creds).await.unwrap();
        assert!(out.starts_with("Created user `ravi`"));

        let user = creds.find_by_username("ravi").await.unwrap().unwrap();
        assert_eq!(user.role, Role::User);
        assert!(user.is_active);
        assert!(creds.verify_password(&user, "worker1"));
    }

    #[actix_web::test]
    async fn create_user_refuses_short_passwords_and_duplicates() {
        let creds = store();
        assert!(cmd_create_user(&creds, "ravi", "abc", Role::User, None).await.is_err());

        cmd_create_user(&creds, "ravi", "worker1", Role::User, None).await.unwrap();
        let err = cmd_create_user(&creds, "ravi", "worker2", Role::User, None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Username already exists");
    }

    #[actix_web::test]
    async fn reset_and_show() {
        let creds = store();
        cmd_create_user(&creds, "ravi", "worker1", Role::User, Some("Ravi Kumar".into()))
            .await
            .unwrap();

        cmd_reset_password(&creds, "ravi", "changed1").await.unwrap();
        let user = creds.find_by_username("ravi").await.unwrap().unwrap();
        assert!(creds.verify_password(&user, "changed1"));
        assert!(!creds.verify_password(&user, "worker1"));

        let shown: serde_json::Value =
            serde_json::from_str(&cmd_show_user(&creds, "ravi").await.unwrap()).unwrap();
        assert_eq!(shown["fullName"], "Ravi Kumar");
        assert!(shown.get("passwordHash").is_none());

        assert!(cmd_show_user(&creds, "nobody").await.is_err());
        assert!(cmd_reset_password(&creds, "nobody", "changed1").await.is_err());
    }
}
