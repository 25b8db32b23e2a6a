//! `mo-init` entry-point: loads settings and the desired-state document, then
//! reconciles OS2mo once.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::env;
use std::sync::Arc;

use color_eyre::eyre::{Context, Result, eyre};
use mockable::DefaultClock;
use mo_init::domain::Initialiser;
use mo_init::inbound::{InitialiserSettings, RunSettings, load_config};
use mo_init::outbound::graphql::HttpGraphqlSession;
use mo_init::outbound::keycloak::{KeycloakCredentials, KeycloakTokenSource};
use ortho_config::OrthoConfig;
use tokio::runtime::Builder;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

fn main() -> Result<()> {
    color_eyre::install()?;

    let settings = InitialiserSettings::load_from_iter(env::args_os())
        .map_err(|error| eyre!("failed to load settings: {error}"))?
        .resolve()
        .wrap_err("invalid settings")?;
    init_tracing(&settings.log_level);

    let config = load_config(&settings.config_file).wrap_err_with(|| {
        format!(
            "failed to load initialisation document {}",
            settings.config_file.display()
        )
    })?;

    let runtime = Builder::new_multi_thread()
        .enable_all()
        .build()
        .wrap_err("failed to build Tokio runtime")?;
    runtime.block_on(async move {
        let initialiser = build_initialiser(settings)?;
        initialiser
            .run(&config)
            .await
            .wrap_err("initialisation failed")
    })
}

fn init_tracing(log_level: &str) {
    let (filter, rejected) = match EnvFilter::try_new(log_level) {
        Ok(filter) => (filter, None),
        Err(error) => (EnvFilter::new("info"), Some(error)),
    };
    if let Err(error) = fmt().with_env_filter(filter).json().try_init() {
        warn!(error = %error, "tracing init failed");
    }
    if let Some(error) = rejected {
        warn!(log_level, error = %error, "invalid log level; falling back to info");
    }
}

fn build_initialiser(settings: RunSettings) -> Result<Initialiser<HttpGraphqlSession>> {
    info!(
        graphql_url = %settings.graphql_url,
        auth_server = %settings.auth_server,
        realm = %settings.auth_realm,
        client_id = %settings.client_id,
        "connecting to OS2mo"
    );
    let tokens = KeycloakTokenSource::new(
        KeycloakCredentials {
            auth_server: settings.auth_server,
            realm: settings.auth_realm,
            client_id: settings.client_id,
            client_secret: settings.client_secret,
        },
        settings.request_timeout,
        Arc::new(DefaultClock),
    )
    .wrap_err("failed to configure Keycloak token source")?;
    let session = HttpGraphqlSession::new(
        settings.graphql_url,
        settings.request_timeout,
        Arc::new(tokens),
    )
    .wrap_err("failed to build GraphQL client")?;
    Ok(Initialiser::new(Arc::new(session)))
}
