use aildasm::config::{DecoderConfig, CONFIG_ENV_VAR};
use aildasm::disassembler::Disassembler;
use log::{debug, warn};
use std::env;
use std::path::Path;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        let program = args.first().map_or("aildasm", |s| s.as_str());
        eprintln!("Usage: {} <script-file>", program);
        eprintln!();
        eprintln!("Decodes an AIL scenario script and prints the trace to stdout.");
        eprintln!(
            "Set {} to a TOML file to supply lookup tables or the mmap threshold.",
            CONFIG_ENV_VAR
        );
        std::process::exit(1);
    }

    let config = match DecoderConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            warn!("{}; using defaults", e);
            DecoderConfig::default()
        }
    };
    debug!("Configuration: {:?}", config);

    // Failures are reported on stdout; the exit status stays 0
    let path = Path::new(&args[1]);
    match Disassembler::new(config).disassemble_file(path) {
        Ok(report) => print!("{}", report),
        Err(e) => println!("Error decoding '{}': {}", path.display(), e),
    }
}
