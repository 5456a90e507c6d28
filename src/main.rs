mod logging;

use lv2host_engine::{
    CycleDriver, HostConfig, bind_ports,
    hw::jack::{JackServer, JackSession, open_client},
    plugins::lv2::{Lv2Catalog, Lv2Plugin},
    release_ports,
};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let config = match HostConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };
    let level = config.log_level().unwrap_or(tracing::Level::INFO);
    if let Err(e) = logging::init(level) {
        eprintln!("{e}");
    }

    if let Err(e) = run(&config).await {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run(config: &HostConfig) -> Result<(), String> {
    let catalog = Lv2Catalog::new();
    let Some(uri) = std::env::args().nth(1) else {
        let plugins = catalog.list_plugins();
        println!("Found {} LV2 plugins", plugins.len());
        for plugin in plugins {
            println!("- {} [{}]", plugin.name, plugin.uri);
        }
        return Err("Usage: lv2host <plugin_uri>".to_string());
    };

    let plugin_info = catalog
        .find(&uri)
        .ok_or_else(|| format!("Failed to find plugin {uri}"))?;
    let client_name = config.client_name_or(&plugin_info.name).to_string();
    let client = open_client(&client_name, config.start_server)?;
    let sample_rate = client.sample_rate() as f64;

    let mut plugin = Lv2Plugin::instantiate(catalog, &uri, sample_rate)?;
    info!("Loaded {} ({uri}) at {sample_rate} Hz", plugin.name());

    let ports = bind_ports(
        &mut plugin,
        &mut JackServer::new(&client),
        &config.bind_options(),
    );
    plugin.activate();
    let session = JackSession::start(client, CycleDriver::new(plugin, ports))?;

    println!("Press enter or Ctrl-C to quit");
    wait_for_quit().await;

    let (client, driver) = session.stop()?;
    let (plugin, ports) = driver.into_parts();
    drop(plugin);
    release_ports(&mut JackServer::new(&client), ports);
    drop(client);
    info!("Closed JACK client '{client_name}'");
    Ok(())
}

async fn wait_for_quit() {
    let (tx, rx) = tokio::sync::oneshot::channel();
    // Blocking stdin reads would hold up runtime shutdown.
    std::thread::spawn(move || {
        let mut line = String::new();
        let _ = std::io::stdin().read_line(&mut line);
        let _ = tx.send(());
    });
    tokio::select! {
        _ = rx => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!("Failed to listen for Ctrl-C: {e}");
            }
        }
    }
}
