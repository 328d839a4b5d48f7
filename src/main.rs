use anyhow::{Context, Result};
use clap::Parser;
use refresh_bench::catalog::filter;
use refresh_bench::cli::{Command, RootArgs, WorkspaceCommand};
use refresh_bench::output;
use refresh_bench::workbench::{AutoConfirm, Prompter, TerminalPrompter};
use refresh_bench::{apps, Outcome, Session, Settings};
use serde_json::json;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::prelude::*;

const LOG_ENV: &str = "RBENCH_LOG";

fn main() -> ExitCode {
    let args = RootArgs::parse();
    init_tracing(args.verbose);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("start async runtime")
    {
        Ok(runtime) => runtime,
        Err(err) => return report_fault(&err),
    };
    match runtime.block_on(run(args)) {
        Ok(code) => code,
        Err(err) => report_fault(&err),
    }
}

/// Last-resort guard: print the whole error chain (and backtrace when enabled).
fn report_fault(err: &anyhow::Error) -> ExitCode {
    eprintln!("error: {err:?}");
    ExitCode::FAILURE
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| tracing_subscriber::EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .without_time(),
        )
        .init();
}

async fn run(args: RootArgs) -> Result<ExitCode> {
    let settings = Settings::load(args.config.as_deref())?;
    let prompter: Arc<dyn Prompter> = if args.yes {
        Arc::new(AutoConfirm)
    } else {
        Arc::new(TerminalPrompter)
    };
    let mut session = Session::open(&settings, args.backend, prompter)?;
    let json = args.json;

    match args.command {
        Command::Status => {
            let status = session.status().await;
            if json {
                println!("{}", output::to_json(&status)?);
            } else {
                print!("{}", output::render_status(&status));
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Modes(modes_args) => {
            session.refresh_catalog().await;
            let class = match modes_args.class {
                Some(choice) => choice.class(),
                None => Some(session.default_class()),
            };
            let catalog = session.catalog();
            let modes = catalog.is_loaded().then(|| match class {
                Some(class) => filter(catalog.modes(), class),
                None => catalog.modes().to_vec(),
            });
            if json {
                let value = json!({
                    "loaded": catalog.is_loaded(),
                    "class": class,
                    "global_mode": session.config().global(),
                    "modes": modes,
                });
                println!("{}", output::to_json(&value)?);
            } else {
                print!(
                    "{}",
                    output::render_modes(modes.as_deref(), class, session.config())
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::SetGlobal(set) => {
            session.refresh_catalog().await;
            let outcome = session.set_global(set.mode_id).await;
            finish(&outcome, json)
        }
        Command::Apps(apps_args) => {
            session.refresh_catalog().await;
            let entries = session.apps(!apps_args.no_labels).await;
            let term = apps_args.search.unwrap_or_default();
            let matched = apps::search(&entries, &term, session.catalog().modes());
            if json {
                println!("{}", output::to_json(&matched)?);
            } else {
                print!(
                    "{}",
                    output::render_apps(&matched, session.catalog().modes())
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::SetApp(set) => {
            session.refresh_catalog().await;
            let outcome = session.set_app(&set.package, set.mode_id).await;
            finish(&outcome, json)
        }
        Command::Logs(logs_args) => {
            if logs_args.clear {
                let outcome = session.clear_log().await;
                return finish(&outcome, json);
            }
            let log = session.read_log().await;
            if json {
                println!("{}", output::to_json(&json!({ "log": log }))?);
            } else {
                match log {
                    Some(log) => println!("{log}"),
                    None => println!("no log entries (or the log could not be read)"),
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Flash(flash) => {
            let outcome = session.workbench().flash(flash.rate.as_deref()).await;
            after_flash(&session, &outcome, json).await;
            finish(&outcome, json)
        }
        Command::Restore => {
            let outcome = session.workbench().restore().await;
            after_flash(&session, &outcome, json).await;
            finish(&outcome, json)
        }
        Command::Workspace(workspace) => run_workspace(&mut session, workspace, json).await,
        Command::Uninstall => {
            let outcome = session.workbench().uninstall().await;
            finish(&outcome, json)
        }
        Command::Adfr(adfr) => {
            let outcome = session.workbench().toggle_adfr(adfr.mode).await;
            finish(&outcome, json)
        }
    }
}

async fn run_workspace(
    session: &mut Session,
    command: WorkspaceCommand,
    json: bool,
) -> Result<ExitCode> {
    let bench = session.workbench();
    let outcome = match command {
        WorkspaceCommand::Scan => bench.scan().await,
        WorkspaceCommand::Reextract => bench.reextract().await,
        WorkspaceCommand::Auto => bench.auto_process().await,
        WorkspaceCommand::Add(add) => {
            if add.base.is_none() {
                bench.scan().await;
            }
            bench.add(add.base.as_deref(), &add.fps).await
        }
        WorkspaceCommand::Modify(modify) => {
            bench.scan().await;
            bench.modify(&modify.node, &modify.fps).await
        }
        WorkspaceCommand::Remove(remove) => bench.remove(&remove.node).await,
        WorkspaceCommand::Apply => bench.apply().await,
    };

    if json {
        let value = json!({
            "outcome": outcome,
            "nodes": bench.nodes(),
            "base_node": bench.base_node(),
        });
        println!("{}", output::to_json(&value)?);
    } else {
        if !bench.nodes().is_empty() {
            print!("{}", output::render_nodes(bench.nodes(), bench.base_node()));
        }
        print!("{}", output::render_outcome(&outcome));
    }
    Ok(exit_code(&outcome))
}

/// Flash and restore change the partition; show the refreshed status.
async fn after_flash(session: &Session, outcome: &Outcome, json: bool) {
    if matches!(outcome, Outcome::Declined) || json {
        return;
    }
    let status = session.status().await;
    eprint!("{}", output::render_status(&status));
}

fn finish(outcome: &Outcome, json: bool) -> Result<ExitCode> {
    if json {
        println!("{}", output::to_json(outcome)?);
    } else {
        print!("{}", output::render_outcome(outcome));
    }
    Ok(exit_code(outcome))
}

fn exit_code(outcome: &Outcome) -> ExitCode {
    if outcome.is_error() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
