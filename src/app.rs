


/*

    castkeeper cli, talks to the coordination store configured in .env
    (or STORE_ENGINE=ram for a single process playground):

        castkeeper lock shortlist:42 --wait 2 --lease 30
        castkeeper status shortlist:42
        castkeeper unlock shortlist:42 --owner <token printed by lock>
        castkeeper limit email:alice@example.com:INVITATION --window 60
        castkeeper check email:alice@example.com:INVITATION
        castkeeper mail alice@example.com invitation --payload '{"project":"Dune"}'
        castkeeper --store ram demo

*/

use castkeeper::appstate::AppState;
use castkeeper::cli;
use castkeeper::config::{Env as ConfigEnv, EnvExt};
use castkeeper::consts::APP_NAME;
use castkeeper::error::CoordErrorResponse;
use clap::Parser;
use env_logger::Env;
use log::info;


#[tokio::main]
async fn main() -> Result<(), CoordErrorResponse>{

    /* -ˋˏ✄┈┈┈┈ logging
        >_
    */
    let args = cli::Cli::parse();
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    /* -ˋˏ✄┈┈┈┈ initializing appstate
        >_ config, coordination store, lock manager and rate limiter
    */
    let mut configs = ConfigEnv::default().get_vars()?;
    if let Some(store) = args.store{
        configs.vars.STORE_ENGINE = store;
    }
    let app_state = AppState::from_context(configs).await?;
    app_state.health().await?;

    info!("➔ 🚀 {} node {} ready on the {:?} store at {}",
        APP_NAME, app_state.coord.node_id, app_state.app_storage.mode(),
        chrono::Local::now().naive_local());

    cli::exec(args.command, &app_state).await

}
