use detector::cli::ActionRunner;
use log::{error, info};

#[actix_web::main]
async fn main() {
    // Setup logger
    let env = env_logger::Env::default();
    env_logger::init_from_env(env);

    info!("Starting application");

    if let Err(e) = ActionRunner::run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}
