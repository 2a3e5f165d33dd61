pub mod commands;

use clap::{Parser, Subcommand};

use crate::auth::Role;
use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "commerce-api")]
#[command(about = "Commerce API - authenticated order placement service")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP server (default)")]
    Serve,

    #[command(about = "Apply pending database migrations and exit")]
    Migrate,

    #[command(about = "Issue a session token with the configured signing key")]
    Token {
        #[arg(long, help = "Numeric user id")]
        user_id: i64,
        #[arg(long, help = "Subject email")]
        email: String,
        #[arg(long, help = "admin, seller or customer")]
        role: Role,
    },
}

pub async fn run(cli: Cli, config: AppConfig) -> anyhow::Result<()> {
    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => commands::serve::handle(config).await,
        Commands::Migrate => commands::migrate::handle(config).await,
        Commands::Token {
            user_id,
            email,
            role,
        } => commands::token::handle(config, user_id, &email, role),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_serve() {
        let cli = Cli::try_parse_from(["commerce-api"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn parses_token_command() {
        let cli = Cli::try_parse_from([
            "commerce-api",
            "token",
            "--user-id",
            "7",
            "--email",
            "ops@example.com",
            "--role",
            "admin",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::Token { user_id, email, role }) => {
                assert_eq!(user_id, 7);
                assert_eq!(email, "ops@example.com");
                assert_eq!(role, Role::Admin);
            }
            _ => panic!("expected token command"),
        }
    }

    #[test]
    fn rejects_unknown_role() {
        assert!(Cli::try_parse_from([
            "commerce-api",
            "token",
            "--user-id",
            "7",
            "--email",
            "ops@example.com",
            "--role",
            "Admin",
        ])
        .is_err());
    }
}
