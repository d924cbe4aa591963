//! `timeshift template`: render the built-in configuration templates.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Subcommand;
use serde_json::{Map, Value, json};

use crate::app::AppContext;
use crate::application::services::templates::{TemplateEngine, validate_config_file};
use crate::domain::plugin::parse_params;
use crate::domain::template::ConfigFormat;
use crate::infra::assets::EmbeddedTemplates;
use crate::infra::fs::HostFs;

/// Template subcommands.
#[derive(Subcommand)]
pub enum TemplateCommand {
    /// List available templates
    List,
    /// Render a template to stdout or a file
    Render {
        name: String,
        /// Template variable as key=value (repeatable)
        #[arg(long = "var", short, value_name = "KEY=VALUE")]
        vars: Vec<String>,
        /// Write to this file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Skip range checks on variables
        #[arg(long)]
        no_validate: bool,
    },
    /// Render several templates into one directory with a manifest
    Set {
        /// Name of the set (subdirectory of --output-dir)
        name: String,
        /// Templates to include
        #[arg(required = true)]
        templates: Vec<String>,
        /// Parent directory for the set
        #[arg(long, default_value = "configs")]
        output_dir: PathBuf,
        /// Template variable as key=value (repeatable)
        #[arg(long = "var", short, value_name = "KEY=VALUE")]
        vars: Vec<String>,
    },
    /// Check the syntax of a rendered config file
    Validate {
        file: PathBuf,
        /// json, yaml, env, ini or toml (default: from the extension)
        #[arg(long)]
        format: Option<ConfigFormat>,
    },
}

fn parse_vars(vars: &[String]) -> Result<Map<String, Value>> {
    parse_params(vars).map_err(|bad| anyhow::anyhow!("Invalid variable '{bad}': expected KEY=VALUE"))
}

/// Run a template subcommand.
///
/// # Errors
///
/// Returns an error for unknown templates, undefined or out-of-range
/// variables, write failures, or a malformed file under `validate`.
pub fn run(app: &AppContext, cmd: TemplateCommand) -> Result<ExitCode> {
    let engine = TemplateEngine::with_builtins(&EmbeddedTemplates)?;

    match cmd {
        TemplateCommand::List => app.renderer().render_templates(&engine.list_templates())?,
        TemplateCommand::Render {
            name,
            vars,
            output,
            no_validate,
        } => {
            let vars = parse_vars(&vars)?;
            match output {
                Some(path) => {
                    engine.render_to_file(&HostFs, &name, &vars, &path, !no_validate)?;
                    if app.is_json() {
                        app.renderer()
                            .render_value(&json!({ "template": name, "path": path }))?;
                    } else {
                        app.output
                            .success(&format!("Rendered {name} to {}", path.display()));
                    }
                }
                None => print!("{}", engine.render_template(&name, &vars, !no_validate)?),
            }
        }
        TemplateCommand::Set {
            name,
            templates,
            output_dir,
            vars,
        } => {
            let vars = parse_vars(&vars)?;
            let set = engine.create_config_set(&HostFs, &name, &templates, &vars, &output_dir)?;
            if app.is_json() {
                app.renderer().render_value(&serde_json::to_value(&set)?)?;
            } else {
                for file in &set.files {
                    app.output.success(&file.display().to_string());
                }
                for skipped in &set.skipped {
                    app.output.warn(&format!("Unknown template '{skipped}' skipped"));
                }
                app.output
                    .info(&format!("Manifest: {}", set.manifest.display()));
            }
        }
        TemplateCommand::Validate { file, format } => {
            if let Err(e) = validate_config_file(&HostFs, &file, format) {
                if app.is_json() {
                    app.renderer()
                        .render_value(&json!({ "valid": false, "error": format!("{e:#}") }))?;
                } else {
                    app.output.error(&format!("{e:#}"));
                }
                return Ok(ExitCode::FAILURE);
            }
            if app.is_json() {
                app.renderer().render_value(&json!({ "valid": true }))?;
            } else {
                app.output.success(&format!("{} is valid", file.display()));
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
