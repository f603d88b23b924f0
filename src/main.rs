use assethub::app;
use assethub::config::Config;
use log::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;
    if config.service_url.is_none() {
        info!("no remote service configured; upload a master file or connect from the home screen");
    }

    // Phones on the same network open the audit screen through this address.
    if let Ok(ip) = local_ip_address::local_ip() {
        if let Some(port) = config.bind.rsplit(':').next() {
            info!("LAN address: http://{}:{}/audit", ip, port);
        }
    }

    if let Err(e) = app::run(config).await {
        error!("server stopped: {}", e);
        return Err(e.into());
    }

    Ok(())
}
