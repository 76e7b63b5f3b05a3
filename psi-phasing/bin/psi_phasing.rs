use clap::Command;
use log::info;
use psi_phasing::session::SessionEvaluator;
use psi_phasing::{dispatch, options, Error, RunConfig, StandardLevels};
use std::env;
use std::process;

fn exit_on_error(schema: &Command, err: Error) -> ! {
    match &err {
        Error::Usage(e) if err.is_help_request() => {
            let _ = e.print();
        }
        Error::Usage(e) => {
            let _ = e.print();
            eprintln!();
            eprintln!("{}", options::usage(schema));
        }
        _ => eprintln!("Error: {}", err),
    }
    process::exit(err.exit_code())
}

fn log_config(config: &RunConfig) {
    info!("role:       {}", config.role());
    info!("addr:       {}:{}", config.address(), config.port());
    info!("elements:   {}", config.num_elements());
    info!("bitlen:     {}", config.bitlen());
    info!("epsilon:    {}", config.cuckoo_epsilon());
    info!("secparam:   {}", config.security_bits());
    info!("sharing:    {}", config.sharing());
    info!("threads:    {}", config.num_threads());
}

fn main() {
    // if log-level `RUST_LOG` not already set, then set to info
    match env::var("RUST_LOG") {
        Ok(val) => println!("loglvl: {}", val),
        Err(_) => env::set_var("RUST_LOG", "info"),
    };

    pretty_env_logger::init_timed();

    let schema = options::schema();
    let config = match options::resolve(&schema, env::args_os()) {
        Ok(config) => config,
        Err(e) => exit_on_error(&schema, e),
    };
    log_config(&config);

    let mut evaluator = SessionEvaluator::new();
    match dispatch(config, &StandardLevels, &mut evaluator) {
        Ok(summary) => {
            println!("{}", summary);
            println!("PSI circuit successfully executed");
        }
        Err(e) => exit_on_error(&schema, e),
    }
}
