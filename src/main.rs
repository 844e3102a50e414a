use clap::{CommandFactory, Parser};
use color_eyre::config::HookBuilder;
use databus_preloader::config::Config;
use databus_preloader::error::Error;
use databus_preloader::orchestrator;

fn main() -> std::process::ExitCode {
    HookBuilder::default().display_env_section(false).install().expect("color-eyre installs once");
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse().finish();

    match orchestrator::run(&config) {
        Ok(summary_path) => {
            println!("{}", summary_path.display());
            std::process::ExitCode::SUCCESS
        }
        Err(err @ Error::Io { .. }) if is_missing_input(&err, &config) => {
            eprintln!("error: {err}");
            eprintln!();
            let _ = Config::command().print_help();
            std::process::ExitCode::from(1)
        }
        Err(err) => {
            eprintln!("error: {err}");
            std::process::ExitCode::from(2)
        }
    }
}

fn is_missing_input(err: &Error, config: &Config) -> bool {
    matches!(err, Error::Io { path, source } if path == &config.input_path && source.kind() == std::io::ErrorKind::NotFound)
}
