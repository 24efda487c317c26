use anyhow::Result;
use manifest_exception_web::utils::logging;
use manifest_exception_web::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logging::init();

    // 加载配置
    let config = Config::load()?;
    logging::log_startup(&config);

    // 初始化并运行应用
    App::initialize(config).await?.run().await?;

    Ok(())
}
