use std::net::SocketAddr;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};
use water_pos::{
    config::{self, Config},
    load_data, products, router,
    storage::persist_data,
    users, AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = Config::from_env();
    if let Some(parent) = config.data_path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut data = load_data(&config.data_path).await;
    let seeded = products::ensure_payment_methods(&mut data);
    if seeded > 0 {
        info!(seeded, "default payment methods added");
    }

    let admin_password = match &config.admin_password {
        Some(password) => password.clone(),
        None if data.users.is_empty() => {
            let generated = config::random_token()[..16].to_string();
            warn!(user = %config.admin_username, password = %generated, "APP_ADMIN_PASSWORD not set, generated one");
            generated
        }
        None => String::new(),
    };
    let now = chrono::Local::now().naive_local();
    let owner_created = users::ensure_owner(&mut data, &config.admin_username, &admin_password, config.bcrypt_cost, now)?;
    if owner_created {
        info!(user = %config.admin_username, "owner account created");
    }

    if seeded > 0 || owner_created {
        if let Err(err) = persist_data(&config.data_path, &data).await {
            warn!("could not save seeded data: {}", err.message);
        }
    }

    let state = AppState::new(&config, data);
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(data = %config.data_path.display(), "listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
