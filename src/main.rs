use clap::Parser;
use wa_console::app::{self, Cli};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    if let Err(e) = app::run(cli) {
        log::error!("{}", e);
        eprintln!("wa-console: {}", e);
        std::process::exit(1);
    }
}
