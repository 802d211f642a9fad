use log::{error, info};
use ruche::configuration::Config;
use ruche::controller::Controller;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .init();

    println!(
        "
██████╗ ██╗   ██╗ ██████╗██╗  ██╗███████╗
██╔══██╗██║   ██║██╔════╝██║  ██║██╔════╝
██████╔╝██║   ██║██║     ███████║█████╗
██╔══██╗██║   ██║██║     ██╔══██║██╔══╝
██║  ██║╚██████╔╝╚██████╗██║  ██║███████╗
╚═╝  ╚═╝ ╚═════╝  ╚═════╝╚═╝  ╚═╝╚══════╝
=========================================
 Ephemeral browser-session orchestrator
=========================================
"
    );

    info!("Loading configuration");
    let config = match Config::from_args() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let controller = match Controller::new(config).await {
        Ok(controller) => controller,
        Err(e) => {
            error!("Unable to initialize the controller: {}, exiting", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = controller.run().await {
        error!("Controller stopped with an error: {}", e);
        std::process::exit(1);
    }
}
