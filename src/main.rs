use clap::Parser;
use pingora::server::configuration::Opt;
use pingora::server::Server;
use std::path::PathBuf;
use suzume::config::Config;
use suzume::server::SuzumeService;

/// Suzume - On-demand image transformation server built with Cloudflare's Pingora
#[derive(Parser, Debug)]
#[command(name = "suzume")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Daemon mode
    #[arg(short = 'd', long)]
    daemon: bool,

    /// Test configuration and exit
    #[arg(long)]
    test: bool,

    /// Upgrade workers gracefully
    #[arg(long)]
    upgrade: bool,
}

fn main() {
    suzume::logging::init_subscriber().expect("Failed to initialize logging subsystem");

    let args = Args::parse();

    let config = Config::from_file(&args.config).unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::process::exit(1);
    });

    tracing::info!(
        config_file = %args.config.display(),
        server_address = %config.server.address,
        server_port = config.server.port,
        default_source = %config.sources.default,
        presets = config.presets.len(),
        "Configuration loaded successfully"
    );

    let opt = Opt {
        daemon: args.daemon,
        test: args.test,
        upgrade: args.upgrade,
        ..Default::default()
    };

    let mut server = Server::new(Some(opt)).expect("Failed to create Pingora server");
    server.bootstrap();

    let service = SuzumeService::new(config.clone()).unwrap_or_else(|e| {
        eprintln!("Failed to build service: {}", e);
        std::process::exit(1);
    });

    let mut proxy_service = pingora_proxy::http_proxy_service(&server.configuration, service);

    let listen_addr = format!("{}:{}", config.server.address, config.server.port);
    proxy_service.add_tcp(&listen_addr);

    tracing::info!(
        address = %listen_addr,
        "Starting Suzume image server"
    );

    server.add_service(proxy_service);

    // Blocks until shutdown
    server.run_forever();
}
