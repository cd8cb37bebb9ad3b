//! `forgeloop tools` — List built-in tools and their parameters.

use forgeloop_config::AppConfig;
use forgeloop_core::tool::{Tool, ToolRegistry};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let registry = forgeloop_tools::default_registry(&config.tools);
    print!("{}", describe(&registry));

    if config.tools.shell_allowlist.is_empty() {
        println!("  shell allowlist: (any command)");
    } else {
        println!(
            "  shell allowlist: {}",
            config.tools.shell_allowlist.join(", ")
        );
    }
    Ok(())
}

fn describe(registry: &ToolRegistry) -> String {
    let mut out = format!("{} tools available\n\n", registry.len());
    for tool in registry.iter() {
        out.push_str(&describe_tool(tool.as_ref()));
        out.push('\n');
    }
    out
}

fn describe_tool(tool: &dyn Tool) -> String {
    let mut out = format!("  {}\n    {}\n", tool.name(), tool.description());
    for spec in tool.parameters().iter() {
        let requirement = if spec.required { "required" } else { "optional" };
        out.push_str(&format!("    - {} ({}, {requirement})", spec.name, spec.ty));
        if let Some(default) = &spec.default {
            out.push_str(&format!(" [default: {default}]"));
        }
        if !spec.description.is_empty() {
            out.push_str(&format!(" {}", spec.description));
        }
        out.push('\n');
    }
    out
}
