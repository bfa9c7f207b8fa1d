use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use futures_util::future::join_all;
use serde_json::{Value, json};
use std::sync::Arc;
use tokenwarden::api::AuthOutcome;
use tokenwarden::application_impl::{KeyMaterial, SigningKey};
use tokenwarden::application_port::TokenLifecycle;
use tokenwarden::bootstrap::Services;
use tokenwarden::domain_model::{Credentials, OpaqueTokenValue, User};
use tokenwarden::logger::*;
use tokenwarden::settings::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logger = Logger::new_bootstrap();

    if let Command::Keygen { kid } = &cli.command {
        println!("{}", serde_json::to_string_pretty(&keygen(kid)?)?);
        return Ok(());
    }

    let project_settings = parse_settings(cli.settings.as_deref())?;
    debug!(?project_settings);
    logger.reload_from_config(&LogConfig::from(&project_settings.log))?;

    let services = Services::try_new(&project_settings).await?;
    let output = run(&services, cli.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    let shutdown_timeout = std::time::Duration::from_secs(30);
    match tokio::time::timeout(shutdown_timeout, services.shutdown()).await {
        Ok(_) => info!("shutdown complete"),
        Err(_) => error!("shutdown timed out"),
    }

    Ok(())
}

async fn run(services: &Services, command: Command) -> anyhow::Result<Value> {
    let guard = services.guard.clone();

    let output = match command {
        Command::Keygen { kid } => keygen(&kid)?,
        Command::Keys => serde_json::to_value(services.public_keys())?,
        Command::AddUser {
            id,
            username,
            password,
        } => {
            services
                .add_user(User::new(id.as_str(), username.as_str()), &password)
                .await?;
            json!({ "added": id, "username": username })
        }
        Command::Issue { username, password } => {
            let credentials = Credentials::new(username, password);
            let outcome = match guard.issue_with_credentials(&credentials).await {
                Ok(Some(set)) => AuthOutcome::issued(&set, services.clock.now()),
                Ok(None) => AuthOutcome::CredentialValidationFailed,
                Err(e) => e.into(),
            };
            present(&outcome)
        }
        Command::Refresh { token, concurrency } => {
            let token = OpaqueTokenValue(token);
            let tasks = (0..concurrency.max(1)).map(|_| {
                let guard = Arc::clone(&guard);
                let token = token.clone();
                tokio::spawn(async move { guard.refresh(&token).await })
            });

            let mut outputs = Vec::new();
            for joined in join_all(tasks).await {
                let outcome = match joined? {
                    Ok(set) => AuthOutcome::issued(&set, services.clock.now()),
                    Err(e) => e.into(),
                };
                outputs.push(present(&outcome));
            }
            if outputs.len() == 1 {
                outputs.remove(0)
            } else {
                Value::Array(outputs)
            }
        }
        Command::Revoke { token } => {
            let outcome = match guard.revoke(&OpaqueTokenValue(token)).await {
                Ok(()) => AuthOutcome::RevokeSucceeded,
                Err(e) => e.into(),
            };
            present(&outcome)
        }
        Command::Verify { token } => {
            let outcome = match guard.authenticate(&token).await {
                Ok(resolution) => AuthOutcome::from_resolution(resolution),
                Err(e) => e.into(),
            };
            present(&outcome)
        }
    };

    Ok(output)
}

fn present(outcome: &AuthOutcome) -> Value {
    json!({ "status": outcome.status_code(), "result": outcome })
}

/// A new Ed25519 pair, encoded the way `[[jwt.keys]]` expects it.
fn keygen(kid: &str) -> anyhow::Result<Value> {
    let key = SigningKey::generate_ed25519(kid)?;
    let KeyMaterial::Ed25519 {
        public,
        private: Some(private),
    } = &key.material
    else {
        anyhow::bail!("generated key {:?} is not an Ed25519 pair", kid);
    };
    Ok(json!({
        "id": kid,
        "public": URL_SAFE_NO_PAD.encode(public),
        "private": URL_SAFE_NO_PAD.encode(private),
    }))
}
