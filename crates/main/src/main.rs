//! 主应用程序入口
//!
//! 加载配置，组装内存后端，启动过期清理任务和 Axum Web API 服务。

use config::AppConfig;
use infrastructure::MemoryBackend;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;

    // 初始化日志，RUST_LOG 优先
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let backend = MemoryBackend::from_config(&config);

    let shutdown = CancellationToken::new();
    let sweeper = if config.sweeper.enabled {
        Some(backend.sweeper.clone().spawn(shutdown.clone()))
    } else {
        tracing::info!("过期清理任务已禁用");
        None
    };

    let app = router(AppState::new(backend.chat_service.clone()));
    let bind_address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;

    tracing::info!("聊天服务器启动在 http://{}", bind_address);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown.cancel();
    if let Some(handle) = sweeper {
        if let Err(err) = handle.await {
            tracing::warn!(error = %err, "过期清理任务异常退出");
        }
    }
    tracing::info!("聊天服务器已停止");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "无法监听 Ctrl+C 信号");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "无法监听 SIGTERM 信号");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("收到关闭信号，开始优雅停机");
}
