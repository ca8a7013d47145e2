use my_unicorn::paths::PathResolver;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let paths = match PathResolver::discover() {
        Ok(paths) => paths,
        Err(err) => {
            eprintln!("error: {err}");
            return std::process::ExitCode::from(my_unicorn::ExitCode::GenericFailure as u8);
        }
    };

    let global = my_unicorn::config::ConfigStore::new(&paths).load_global().unwrap_or_else(|_| {
        my_unicorn::config::GlobalConfig::defaults(&paths)
    });

    let _log_guard = match my_unicorn::logging::init(&paths.log_file(), &global.log_level, &global.console_log_level) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("warning: failed to initialize file logging: {err}");
            None
        }
    };

    let exit_code = my_unicorn::cli::run().await;
    std::process::ExitCode::from(exit_code as u8)
}
