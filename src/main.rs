use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use snmp_collector::collector::{Collector, NamespacePattern};
use snmp_collector::config::{AgentConfig, AppConfig};
use snmp_collector::formatter::JsonFormatter;
use snmp_collector::pool::ConnectionPool;
use snmp_collector::routes::{AppState, create_router};
use snmp_collector::snmp::SnmpTransport;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("snmp_collector=info,tower_http=info")),
        )
        .init();

    let config_path = AppConfig::config_path();
    let config = AppConfig::load(&config_path)
        .with_context(|| format!("Не удалось загрузить конфигурацию {}", config_path.display()))?;
    config.debug_config();

    let catalog = Arc::new(config.load_catalog()?);
    let agents = config.agents()?;
    let patterns = config.patterns(&catalog)?;
    let listen = config.get_listen();

    if agents.is_empty() && listen.is_none() {
        anyhow::bail!("Не заданы ни агенты для опроса, ни адрес HTTP сервера");
    }
    info!(metrics = catalog.len(), agents = agents.len(), "каталог метрик загружен");

    let pool = Arc::new(ConnectionPool::new(
        Arc::new(SnmpTransport),
        config.pool_config(),
    ));
    let reaper = pool.start_reaper();
    let collector = Collector::new(Arc::clone(&pool), catalog);
    let shutdown = CancellationToken::new();

    let server = listen.map(|listen| {
        let state = AppState {
            collector: collector.clone(),
            default_timeout: config.get_timeout(),
        };
        tokio::spawn(serve(listen, state, shutdown.clone()))
    });

    let poller = (!agents.is_empty()).then(|| {
        tokio::spawn(poll(
            collector,
            agents,
            patterns,
            config.interval(),
            shutdown.clone(),
        ))
    });

    tokio::signal::ctrl_c()
        .await
        .context("Не удалось подписаться на Ctrl-C")?;
    info!("получен сигнал остановки");
    shutdown.cancel();

    if let Some(poller) = poller {
        if let Err(e) = poller.await {
            error!(error = %e, "задача опроса завершилась аварийно");
        }
    }
    if let Some(server) = server {
        match server.await {
            Ok(Err(e)) => error!(error = %format!("{:#}", e), "HTTP сервер завершился с ошибкой"),
            Err(e) => error!(error = %e, "задача HTTP сервера завершилась аварийно"),
            Ok(Ok(())) => {}
        }
    }

    reaper.stop().await;
    pool.close_all().await;
    Ok(())
}

/// Периодически опрашивает агентов и печатает результат в JSON
async fn poll(
    collector: Collector,
    agents: Vec<AgentConfig>,
    patterns: Vec<NamespacePattern>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let agents: Vec<Arc<AgentConfig>> = agents.into_iter().map(Arc::new).collect();
    let patterns = Arc::new(patterns);
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let mut tasks = Vec::with_capacity(agents.len());
        for agent in &agents {
            let collector = collector.clone();
            let agent = Arc::clone(agent);
            let patterns = Arc::clone(&patterns);
            tasks.push(tokio::spawn(async move {
                match collector.collect(&agent, &patterns).await {
                    Ok(values) => match JsonFormatter::to_json_string(&agent, &values) {
                        Ok(json) => println!("{}", json),
                        Err(e) => error!(agent = %agent.name, error = %e, "ошибка JSON сериализации"),
                    },
                    Err(e) => warn!(agent = %agent.name, error = %e, "опрос агента не удался"),
                }
            }));
        }

        for task in tasks {
            if let Err(e) = task.await {
                error!(error = %e, "задача опроса агента завершилась аварийно");
            }
        }
    }
}

async fn serve(listen: String, state: AppState, shutdown: CancellationToken) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(&listen)
        .await
        .with_context(|| format!("Не удалось открыть {}", listen))?;
    info!(listen = %listen, "HTTP сервер запущен");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("HTTP сервер завершился с ошибкой")
}
