//! Configuration validation utility
//!
//! Usage: cargo run --bin validate-config config/local.toml

use std::env;
use std::process;

use menu_config::ConfigLoader;

#[tokio::main]
async fn main() {
	let args: Vec<String> = env::args().collect();

	if args.len() != 2 {
		eprintln!("Usage: {} <config-file>", args[0]);
		process::exit(1);
	}

	let config_path = &args[1];

	println!("Validating configuration file: {}", config_path);

	match ConfigLoader::new().with_file(config_path).load().await {
		Ok(config) => {
			println!("✅ Configuration is valid!");
			println!("Service name: {}", config.service.name);
			println!("Catalog cache: {}", config.cache.file_path().display());
			match config.cache.refresh_interval() {
				Ok(interval) => println!("Refresh interval: {:?}", interval),
				Err(e) => println!("Refresh interval: {} (default will be used)", e),
			}
			println!("Catalog source: {}", config.source.source_type);
			println!("Storage backend: {}", config.storage.storage_type);
			println!("API address: {}", config.api.bind_address());
		}
		Err(e) => {
			eprintln!("❌ Configuration validation failed:");
			eprintln!("{}", e);
			process::exit(1);
		}
	}
}
