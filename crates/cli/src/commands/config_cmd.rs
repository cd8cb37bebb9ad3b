//! `forgeloop config` — Configuration management commands.

use forgeloop_config::AppConfig;

const REDACTED: &str = "[REDACTED]";

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   Config parsed successfully");

            let warnings = warnings(&config);
            if warnings.is_empty() {
                println!("   All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   warning: {w}");
                }
            }

            println!();
            println!("   Provider:   {}", config.default_provider);
            println!("   Model:      {}", config.default_model);
            println!("   Encoding:   {:?}", config.agent.action_encoding);
            println!("   Iterations: {}", config.agent.max_iterations);
            println!(
                "   Context:    {} tokens, keep {:.0}% verbatim",
                config.context.max_context_tokens,
                config.context.keep_recent_ratio * 100.0
            );
        }
        Err(e) => {
            println!("   Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&redacted(&config))?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", AppConfig::config_path().display());
    Ok(())
}

/// Problems that do not stop the config from loading but will bite later.
fn warnings(config: &AppConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if !config.has_api_key() && config.providers.values().all(|p| p.api_key.is_none()) {
        warnings.push(
            "No API key set (set FORGELOOP_API_KEY, OPENROUTER_API_KEY or OPENAI_API_KEY)".into(),
        );
    }

    if !config.providers.is_empty() && !config.providers.contains_key(&config.default_provider) {
        warnings.push(format!(
            "Default provider '{}' has no [providers.{}] section; built-in defaults apply",
            config.default_provider, config.default_provider
        ));
    }

    if config.tools.shell_allowlist.is_empty() {
        warnings.push("Shell allowlist is empty: the shell tool may run any command".into());
    }

    warnings
}

/// A copy of the config that is safe to print.
fn redacted(config: &AppConfig) -> AppConfig {
    let mut config = config.clone();
    if config.api_key.is_some() {
        config.api_key = Some(REDACTED.into());
    }
    for provider in config.providers.values_mut() {
        if provider.api_key.is_some() {
            provider.api_key = Some(REDACTED.into());
        }
    }
    config
}
