//! `pipegraph` command-line front end

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use pipegraph_compiler::{CompileError, CompilerConfig, NetworkInterfaceScope, PipelineCompiler, RoleKind};
use pipegraph_model::PipelineDocument;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    let file = || {
        Arg::new("file")
            .required(true)
            .value_parser(value_parser!(PathBuf))
            .help("Pipeline document (.yaml, .yml, .json or .toml)")
    };

    Command::new("pipegraph")
        .version(pipegraph_compiler::VERSION)
        .about("Compile pipeline documents into resource graphs")
        .subcommand_required(true)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Log compiler decisions to stderr"),
        )
        .arg(
            Arg::new("unscoped-network-interface")
                .long("unscoped-network-interface")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Grant ec2:CreateNetworkInterfacePermission without the subnet condition"),
        )
        .subcommand(
            Command::new("validate")
                .about("Check a document and list every violation")
                .arg(file()),
        )
        .subcommand(
            Command::new("compile")
                .about("Print the resource graph")
                .arg(file())
                .arg(
                    Arg::new("format")
                        .long("format")
                        .default_value("json")
                        .value_parser(["json", "yaml"])
                        .help("Output format"),
                )
                .arg(
                    Arg::new("apply-order")
                        .long("apply-order")
                        .action(ArgAction::SetTrue)
                        .help("Print node ids in dependency order instead"),
                ),
        )
        .subcommand(
            Command::new("policy")
                .about("Print one role's permission policy")
                .arg(file())
                .arg(
                    Arg::new("role")
                        .long("role")
                        .required(true)
                        .value_parser(["pipeline", "build", "deploy"])
                        .help("Role whose policy to print"),
                ),
        )
        .subcommand(
            Command::new("features")
                .about("Print the resolved feature table")
                .arg(file()),
        )
        .subcommand(Command::new("schema").about("Print the document JSON schema"))
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn compiler(matches: &ArgMatches) -> PipelineCompiler {
    let scope = if matches.get_flag("unscoped-network-interface") {
        NetworkInterfaceScope::Unscoped
    } else {
        NetworkInterfaceScope::SubnetScoped
    };
    PipelineCompiler::new(CompilerConfig::new().with_network_interface_scope(scope))
}

fn load(args: &ArgMatches) -> Result<PipelineDocument> {
    let path = args
        .get_one::<PathBuf>("file")
        .context("missing document path")?;
    tracing::debug!(path = %path.display(), "loading document");
    PipelineDocument::load(path).with_context(|| format!("loading {}", path.display()))
}

/// Print validation failures and map them to exit code 1
fn report(result: Result<ExitCode, CompileError>) -> Result<ExitCode> {
    match result {
        Ok(code) => Ok(code),
        Err(CompileError::Validation(errors)) => {
            println!("{errors}");
            Ok(ExitCode::FAILURE)
        }
        Err(err) => Err(err.into()),
    }
}

fn run() -> Result<ExitCode> {
    let matches = cli().get_matches();
    let verbose = matches.get_flag("verbose");
    init_tracing(verbose);
    let compiler = compiler(&matches);

    match matches.subcommand() {
        Some(("validate", args)) => {
            let doc = load(args)?;
            match compiler.validate(&doc) {
                Ok(spec) => {
                    println!("ok: {}", spec.name);
                    Ok(ExitCode::SUCCESS)
                }
                Err(errors) => report(Err(errors.into())),
            }
        }
        Some(("compile", args)) => {
            let doc = load(args)?;
            report(compiler.compile_document(&doc).map(|compilation| {
                let graph = &compilation.graph;
                if args.get_flag("apply-order") {
                    return match graph.apply_order() {
                        Ok(order) => {
                            order.iter().for_each(|id| println!("{id}"));
                            ExitCode::SUCCESS
                        }
                        Err(e) => {
                            eprintln!("error: {e}");
                            ExitCode::from(2)
                        }
                    };
                }
                let rendered = match args.get_one::<String>("format").map(String::as_str) {
                    Some("yaml") => serde_yaml::to_string(graph).map_err(|e| e.to_string()),
                    _ => serde_json::to_string_pretty(graph).map_err(|e| e.to_string()),
                };
                match rendered {
                    Ok(text) => {
                        println!("{text}");
                        ExitCode::SUCCESS
                    }
                    Err(e) => {
                        eprintln!("error: {e}");
                        ExitCode::from(2)
                    }
                }
            }))
        }
        Some(("policy", args)) => {
            let doc = load(args)?;
            let role = args
                .get_one::<String>("role")
                .and_then(|r| RoleKind::parse(r))
                .context("unknown role")?;
            let compilation = match compiler.compile_document(&doc) {
                Ok(compilation) => compilation,
                Err(err) => return report(Err(err)),
            };
            let Some(policy) = compilation.policies.get(&role) else {
                bail!("role {role} is not part of pipeline {}", compilation.spec.name);
            };
            println!("{}", serde_json::to_string_pretty(policy)?);
            Ok(ExitCode::SUCCESS)
        }
        Some(("features", args)) => {
            let doc = load(args)?;
            let spec = match compiler.validate(&doc) {
                Ok(spec) => spec,
                Err(errors) => return report(Err(errors.into())),
            };
            for (name, enabled) in pipegraph_compiler::resolve(&spec).entries() {
                println!("{name:<36}{enabled}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Some(("schema", _)) => {
            println!("{}", serde_json::to_string_pretty(&PipelineDocument::json_schema())?);
            Ok(ExitCode::SUCCESS)
        }
        _ => Ok(ExitCode::from(2)),
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn global_flags_after_subcommand() {
        let matches = cli()
            .try_get_matches_from(["pipegraph", "features", "p.yaml", "--unscoped-network-interface"])
            .unwrap();
        assert!(matches.get_flag("unscoped-network-interface"));
    }

    #[test]
    fn policy_requires_known_role() {
        let result = cli().try_get_matches_from(["pipegraph", "policy", "p.yaml", "--role", "admin"]);
        assert!(result.is_err());
    }
}
