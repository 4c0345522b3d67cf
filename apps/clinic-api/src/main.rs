use anyhow::{Context, Result};
use chrono::Duration;
use clap::Parser;
use common_db::init_db_pool;
use sqlx::SqlitePool;
use tower::limit::GlobalConcurrencyLimitLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use clinic_api::auth::ChavesJwt;
use clinic_api::config::{AppConfig, Cli, Comando};
use clinic_api::estado::Estado;
use clinic_api::{app, build_info, comandos, importacao};

fn iniciar_log(json: bool) {
    let filtro = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filtro).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filtro).init();
    }
}

async fn encerramento() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Falha ao aguardar sinal de encerramento: {}", e);
    }
    info!("Encerrando servidor");
}

async fn servir(config: &AppConfig, pool: SqlitePool) -> Result<()> {
    let jwt = ChavesJwt::do_segredo(config.jwt_secret.as_deref(), Duration::hours(config.token_ttl_horas));
    let estado = Estado::new(pool, jwt, config.config_metricas(), config.cookie_seguro);
    let app = app(estado).layer(GlobalConcurrencyLimitLayer::new(config.limite_concorrencia));

    info!("Servidor ouvindo em http://{}", config.bind);
    axum::Server::try_bind(&config.bind)
        .with_context(|| format!("Falha ao abrir {}", config.bind))?
        .serve(app.into_make_service())
        .with_graceful_shutdown(encerramento())
        .await
        .context("Falha no servidor HTTP")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    iniciar_log(cli.config.log_json);
    info!("clinic-api v{} ({})", build_info::PKG_VERSION, build_info::TARGET);

    let pool = init_db_pool(&cli.config.db_config())
        .await
        .context("Falha ao inicializar o banco de dados")?;

    match cli.comando.unwrap_or(Comando::Serve) {
        Comando::Serve => servir(&cli.config, pool).await,
        Comando::ImportarTerapeutas { arquivo_csv } => {
            let resumo = importacao::importar_terapeutas(&pool, &arquivo_csv).await?;
            println!("Importação concluída!");
            println!("Usuários criados: {}", resumo.criados);
            println!("Usuários atualizados: {}", resumo.atualizados);
            println!("Erros: {}", resumo.erros.len());
            for erro in &resumo.erros {
                println!("  {}", erro);
            }
            Ok(())
        }
        Comando::CriarSuperusuario { username, senha } => {
            let id = comandos::criar_superusuario(&pool, &username, &senha).await?;
            println!("Superusuário {} pronto (ID: {})", username, id);
            Ok(())
        }
        Comando::ConcederPermissao { grupo, codigos } => {
            comandos::conceder_permissao(&pool, &grupo, &codigos).await?;
            println!("{} permissões concedidas ao grupo {}", codigos.len(), grupo);
            Ok(())
        }
    }
}
