use clap::Parser;
use hostlink_runtime::{BridgeContext, GuestModule, Result};
use tracing::info;

mod args;
mod logging;

use args::Args;

fn run(args: &Args) -> Result<i32> {
    let config = args.bridge_config()?;
    let module = GuestModule::from_file(&args.module)?;
    let context = BridgeContext::open(&config)?;

    info!(module = %args.module.display(), args = ?context.args(), "starting guest");
    let outcome = module.run(context)?;
    info!(?outcome, "guest finished");

    Ok(outcome.exit_code())
}

fn main() {
    let args = Args::parse();
    logging::init(&args.log_level, args.log_format);

    match run(&args) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
