use clap::Parser;
use habit_app::app::{run, AppConfig, Cli};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let config = AppConfig::from_env().unwrap_or_default();
    let cli = Cli::parse();
    let mut stdout = std::io::stdout().lock();
    if let Err(err) = run(config, cli, &mut stdout) {
        eprintln!("habit: {err:#}");
        std::process::exit(1);
    }
}
