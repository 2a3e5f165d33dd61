use anyhow::Context;

use crate::auth::{Role, TokenVerifier};
use crate::config::AppConfig;

/// Prints a token for the given identity to stdout.
pub fn handle(config: AppConfig, user_id: i64, email: &str, role: Role) -> anyhow::Result<()> {
    config.validate()?;
    let verifier = TokenVerifier::new(config.security.jwt_secret.as_bytes(), config.token_ttl()?)
        .context("signing key rejected")?;
    let token = verifier.issue(user_id, email, role)?;
    println!("{}", token);
    Ok(())
}
