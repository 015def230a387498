use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter
use std::sync::Arc;

use stockline_backend::{
    config::Config,
    database::{create_pool, run_migrations},
    external::{EmailNotifier, NotificationDispatcher},
    services::SchedulerService,
    tasks,
};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    // 加载配置
    let config = Config::from_toml().expect("Failed to load configuration file");

    // 创建数据库连接池
    let pool = create_pool(&config.database)
        .await
        .expect("Failed to create database connection pool");

    // 运行数据库迁移
    run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");

    // 外部通知服务
    let dispatcher: Arc<dyn NotificationDispatcher> =
        Arc::new(EmailNotifier::new(config.mailer.clone()));

    let scheduler_service =
        SchedulerService::new(pool.clone(), dispatcher, config.scheduler.clone());

    // 启动后台生命周期巡检
    tasks::spawn_all(scheduler_service, config.scheduler.sweep_interval_secs);

    log::info!(
        "Tier lifecycle worker started (sweep every {}s)",
        config.scheduler.sweep_interval_secs
    );

    tokio::signal::ctrl_c().await?;
    log::info!("Shutting down tier lifecycle worker");
    Ok(())
}
