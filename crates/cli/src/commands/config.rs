use clap::Subcommand;
use std::path::Path;
use waypoint_core::config::AppConfig;

use super::utils::{load_config, print_error, print_info, print_success, CliError, CliResult};

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Validate the configuration file
    Validate,

    /// Show the effective configuration (file plus environment overrides)
    Show {
        /// Print the configuration as TOML instead of a summary
        #[arg(long)]
        toml: bool,
    },
}

pub fn handle_config_command(command: ConfigCommands, file: &str) -> CliResult<()> {
    match command {
        ConfigCommands::Validate => validate_config(file),
        ConfigCommands::Show { toml } => show_config(file, toml),
    }
}

fn validate_config(file: &str) -> CliResult<()> {
    if !Path::new(file).exists() {
        print_error(&format!("Configuration file not found: {file}"));
        return Err(CliError::Config(format!("File not found: {file}")));
    }

    print_info(&format!("Loading configuration from {file}..."));
    let config = load_config(file)?;
    print_success("Configuration is valid!");

    println!("Configuration Summary:");
    println!("  Environment: {}", config.environment);
    println!("  Server: {}:{}", config.server.bind_address, config.server.bind_port);
    println!("  Services: {}", config.services.len());
    println!("  Dual-source pairs: {}", config.dual_sources.len());
    println!("  Prober: {}", if config.prober.enabled { "enabled" } else { "disabled" });

    Ok(())
}

fn show_config(file: &str, as_toml: bool) -> CliResult<()> {
    let config = AppConfig::from_file(file).map_err(|e| CliError::Config(e.to_string()))?;

    if as_toml {
        let rendered = toml::to_string_pretty(&config)
            .map_err(|e| CliError::General(format!("Failed to render TOML: {e}")))?;
        println!("{rendered}");
        return Ok(());
    }

    println!("Configuration from {file}:");
    print!("{}", render_summary(&config));

    if let Err(e) = config.validate() {
        print_error(&format!("Configuration is invalid: {e}"));
    }

    Ok(())
}

fn render_summary(config: &AppConfig) -> String {
    let mut out = String::new();

    out.push_str("\n[Server]\n");
    out.push_str(&format!(
        "  Bind: {}:{}\n  Max Concurrent Requests: {}\n",
        config.server.bind_address, config.server.bind_port, config.server.max_concurrent_requests
    ));

    out.push_str("\n[Executor]\n");
    out.push_str(&format!(
        "  Attempt Timeout: {}ms\n  Retry Delay: {}ms\n",
        config.executor.attempt_timeout_ms, config.executor.retry_delay_ms
    ));

    out.push_str("\n[Health]\n");
    out.push_str(&format!(
        "  Max Failures: {}\n  Cooldown: {}s\n  Latency Weight: {}\n  Rotation Width: {}\n",
        config.health.max_failures,
        config.health.cooldown_seconds,
        config.health.latency_weight,
        config.health.rotation_width
    ));

    out.push_str("\n[Prober]\n");
    out.push_str(&format!(
        "  Enabled: {}\n  Interval: {}s\n  Timeout: {}ms\n",
        config.prober.enabled, config.prober.interval_seconds, config.prober.timeout_ms
    ));

    out.push_str("\n[Cache]\n");
    out.push_str(&format!(
        "  Fresh Window: {}s\n  Max Entries: {}\n",
        config.cache.fresh_window_seconds, config.cache.max_entries
    ));

    out.push_str(&format!("\n[Services] ({})\n", config.services.len()));
    for service in &config.services {
        let liveness = service.liveness_path.as_deref().unwrap_or("/");
        out.push_str(&format!("  {} (liveness {liveness})\n", service.name));
        for endpoint in &service.endpoints {
            out.push_str(&format!("    {endpoint}\n"));
        }
    }

    if !config.dual_sources.is_empty() {
        out.push_str(&format!("\n[Dual Sources] ({})\n", config.dual_sources.len()));
        for pair in &config.dual_sources {
            out.push_str(&format!("  {}: {} -> {}\n", pair.name, pair.primary, pair.fallback));
        }
    }

    out
}
