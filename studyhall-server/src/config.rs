use std::env;

use log::info;
use studyhall_collab::{AuthConfig, ProviderSettings};

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 9050;

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// The externally reachable base URL, used to build OAuth redirect URLs
    pub public_url: String,
    pub auth: AuthConfig,
}

impl Config {
    pub fn from_env() -> Self {
        let port = env::var("STUDYHALL_SERVER_PORT")
            .map(|x| x.parse::<u16>().expect("Port must be a number"))
            .unwrap_or(DEFAULT_PORT);

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let public_url = env::var("STUDYHALL_PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://localhost:{port}"));

        let auth = AuthConfig {
            discord: provider_settings(
                &public_url,
                "discord",
                "DISCORD_CLIENT_ID",
                "DISCORD_CLIENT_SECRET",
            ),
            google: provider_settings(
                &public_url,
                "google",
                "GOOGLE_CLIENT_ID",
                "GOOGLE_CLIENT_SECRET",
            ),
        };

        Self {
            port,
            database_url,
            public_url,
            auth,
        }
    }
}

fn provider_settings(
    public_url: &str,
    provider: &str,
    id_var: &str,
    secret_var: &str,
) -> Option<ProviderSettings> {
    let client_id = env::var(id_var).ok()?;
    let client_secret = env::var(secret_var).ok()?;

    info!("OAuth provider {provider} is configured");

    Some(ProviderSettings {
        client_id,
        client_secret,
        redirect_url: format!("{public_url}/v1/auth/callback/{provider}"),
    })
}
