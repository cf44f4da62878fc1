use anyhow::{bail, Context, Result};
use clinic_db::{accounts, init_db_pool};
use clinic_web::built_info;
use clinic_web::telemetry::init_tracing;
use clinic_web::{build_router, AppConfig, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env().context("Configuração inválida")?;
    init_tracing(config.json_logs)?;

    tracing::info!(
        version = built_info::PKG_VERSION,
        built_at = built_info::BUILT_TIME_UTC,
        "Iniciando clinic-web"
    );

    let pool = init_db_pool(&config.db).await?;

    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        None => {}
        Some("promote-superuser") => {
            let Some(username) = args.next() else {
                bail!("Uso: clinic-web promote-superuser <username>");
            };
            let user = accounts::set_superuser(&pool, &username, true)
                .await
                .with_context(|| format!("Não foi possível promover {username}"))?;
            tracing::info!(user_id = %user.id, username = %user.username, "Superusuário promovido");
            return Ok(());
        }
        Some(other) => bail!("Comando desconhecido: {other}"),
    }

    let state = AppState::from_config(pool, &config)?;
    let app = build_router(state);

    tracing::info!(addr = %config.bind_addr, "Servidor HTTP escutando");
    axum::Server::bind(&config.bind_addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Falha no servidor HTTP")?;

    tracing::info!("Servidor encerrado");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Falha ao aguardar o sinal de encerramento");
    }
}
