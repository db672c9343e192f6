//! Beedapp CLI - drive a wallet session from the terminal
//!
//!   beedapp repl            → Interactive session against an in-memory DevChain
//!   beedapp check-config    → Validate BEEDAPP_* configuration, output JSON
//!   beedapp selectors       → Contract function selectors, output JSON
//!
//! Dev chain:
//!   BEEDAPP_DEV_ACCOUNTS=0xabc...,0xdef...   wallet accounts (first is bound)
//!   BEEDAPP_DEV_AUTHORIZED=1                 origin already authorized (auto-connect)
//!
//! Output format:
//!   --json     Output raw JSON (default for non-tty)
//!   --pretty   Pretty-print JSON (default for tty)

use anyhow::{anyhow, Context};
use beedapp::contract::interface;
use beedapp::logging::init_logging;
use beedapp::provider::Eip1193;
use beedapp::{Account, DappConfig, DevChain, ProviderEvent, SessionController, SessionError};
use futures::channel::mpsc;
use serde_json::{json, Value};
use std::env;
use std::io::{self, IsTerminal, Write};
use std::rc::Rc;
use tracing::debug;

const DEFAULT_DEV_ACCOUNT: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";

fn main() {
    init_logging();

    let args: Vec<String> = env::args().collect();
    let opts = ParsedArgs::parse(&args[1..]);

    if opts.help {
        print_usage();
        return;
    }

    if opts.version {
        println!("beedapp {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let result = match opts.command.as_deref() {
        Some("repl") => run_async(cmd_repl(&opts)),
        Some("check-config") | Some("config") => cmd_check_config(),
        Some("selectors") => Ok(cmd_selectors()),
        Some(cmd) => Err(anyhow!("Unknown command: {}", cmd)),
        None => {
            print_usage();
            return;
        }
    };

    match result {
        Ok(output) => println!("{}", format_json(&opts, &output)),
        Err(e) => {
            eprintln!("{}", format_json(&opts, &json!({"error": format!("{:#}", e)})));
            std::process::exit(1);
        }
    }
}

#[derive(Default)]
struct ParsedArgs {
    command: Option<String>,
    dev_accounts: Vec<String>,
    dev_authorized: bool,
    // Output options
    json: bool,
    pretty: bool,
    help: bool,
    version: bool,
}

impl ParsedArgs {
    fn parse(args: &[String]) -> Self {
        // Load .env file if present
        if let Ok(contents) = std::fs::read_to_string(".env") {
            for line in contents.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                if let Some((key, value)) = line.split_once('=') {
                    let value = value.trim().trim_matches('"');
                    if !value.is_empty() && env::var(key.trim()).is_err() {
                        env::set_var(key.trim(), value);
                    }
                }
            }
        }

        let mut opts = ParsedArgs::default();
        let mut positional = Vec::new();
        let mut i = 0;

        while i < args.len() {
            let arg = &args[i];
            match arg.as_str() {
                "--help" | "-h" => opts.help = true,
                "--version" | "-V" => opts.version = true,
                "--json" => opts.json = true,
                "--pretty" => opts.pretty = true,
                "--account" | "-a" => {
                    if i + 1 < args.len() {
                        opts.dev_accounts.push(args[i + 1].clone());
                        i += 1;
                    }
                }
                "--authorized" => opts.dev_authorized = true,
                _ if !arg.starts_with('-') => positional.push(arg.clone()),
                _ => {} // Ignore unknown flags
            }
            i += 1;
        }

        // First positional is command
        if !positional.is_empty() {
            opts.command = Some(positional.remove(0));
        }

        // Apply environment variables (lower priority than CLI args)
        if opts.dev_accounts.is_empty() {
            if let Ok(accounts) = env::var("BEEDAPP_DEV_ACCOUNTS") {
                opts.dev_accounts = accounts
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
            }
        }
        if !opts.dev_authorized {
            opts.dev_authorized = env::var("BEEDAPP_DEV_AUTHORIZED").map(|v| v == "1").unwrap_or(false);
        }

        opts
    }
}

fn print_usage() {
    println!(
        r#"beedapp - Wallet session core

USAGE:
    beedapp <command> [options]

COMMANDS:
    repl                    Interactive session against an in-memory dev chain
    check-config            Validate configuration from the environment
    selectors               Print contract function selectors

DEV CHAIN OPTIONS:
    --account, -a <addr>    Wallet account (can repeat, env: BEEDAPP_DEV_ACCOUNTS)
    --authorized            Origin already authorized (env: BEEDAPP_DEV_AUTHORIZED=1)

CONFIGURATION (env):
    BEEDAPP_CONTRACT               Contract address
    BEEDAPP_GAS_LIMIT              Deposit gas-limit hint (default: 300000)
    BEEDAPP_CONFIRM_TIMEOUT_SECS   Confirmation wait bound (default: 120)
    BEEDAPP_POLL_MS                Receipt poll interval (default: 1000)
    BEEDAPP_LOG_JSON=1             JSON log lines on stderr

OUTPUT OPTIONS:
    --json                  Raw JSON output
    --pretty                Pretty-print JSON
    --version, -V           Print version

EXAMPLES:
    # Auto-connect, deposit, withdraw
    BEEDAPP_DEV_AUTHORIZED=1 beedapp repl
    beedapp> deposit 1000
    beedapp> withdraw 400

    # Pipe-friendly
    beedapp selectors --json | jq '."deposit()"'
"#
    );
}

fn format_json(opts: &ParsedArgs, value: &Value) -> String {
    let pretty = !opts.json && (opts.pretty || io::stdout().is_terminal());
    let formatted = if pretty { serde_json::to_string_pretty(value) } else { serde_json::to_string(value) };
    formatted.unwrap_or_else(|_| value.to_string())
}

fn run_async(fut: impl std::future::Future<Output = anyhow::Result<Value>>) -> anyhow::Result<Value> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("tokio runtime")?;
    rt.block_on(fut)
}

fn cmd_check_config() -> anyhow::Result<Value> {
    let config = DappConfig::from_env().context("invalid configuration")?;
    Ok(json!({
        "contract_address": config.contract_address.to_checksum(None),
        "gas_limit": config.gas_limit,
        "confirmation_timeout_secs": config.confirmation_timeout.as_secs(),
        "poll_interval_ms": config.poll_interval.as_millis() as u64,
    }))
}

fn cmd_selectors() -> Value {
    let selectors: serde_json::Map<String, Value> = interface::ALL
        .iter()
        .map(|sig| (sig.to_string(), json!(format!("0x{}", hex::encode(interface::selector(sig))))))
        .collect();
    Value::Object(selectors)
}

fn parse_accounts(raw: &[String]) -> anyhow::Result<Vec<Account>> {
    raw.iter()
        .map(|s| s.parse::<Account>().map_err(|e| anyhow!("bad account {}: {}", s, e)))
        .collect()
}

fn outcome<T>(session: &SessionController, result: Result<T, SessionError>) -> Value {
    match result {
        Ok(_) => session.snapshot().to_json(),
        Err(e) => json!({
            "error": {"kind": e.kind(), "message": e.to_string()},
            "session": session.snapshot().to_json(),
        }),
    }
}

/// Route whatever the dev chain announced since the last command.
async fn drain_events(session: &SessionController, events: &mut mpsc::UnboundedReceiver<ProviderEvent>) {
    while let Ok(Some(event)) = events.try_next() {
        debug!(?event, "provider event");
        session.handle_provider_event(event).await;
    }
}

async fn cmd_repl(opts: &ParsedArgs) -> anyhow::Result<Value> {
    let config = DappConfig::from_env().context("invalid configuration")?;
    let raw_accounts = if opts.dev_accounts.is_empty() {
        vec![DEFAULT_DEV_ACCOUNT.to_string()]
    } else {
        opts.dev_accounts.clone()
    };
    let mut chain = DevChain::new(config.contract_address).with_accounts(parse_accounts(&raw_accounts)?);
    if opts.dev_authorized {
        chain = chain.authorized();
    }
    let mut events = chain.subscribe().ok_or_else(|| anyhow!("dev chain has no event stream"))?;
    let session = SessionController::new(config, Some(Rc::new(chain.clone())));

    println!("Beedapp REPL - type 'help' or 'quit'\n");
    session.start().await;
    println!("{}", format_json(opts, &session.snapshot().to_json()));

    loop {
        print!("beedapp> ");
        io::stdout().flush().ok();

        let mut input = String::new();
        match io::stdin().read_line(&mut input) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        let parts: Vec<&str> = input.split_whitespace().collect();

        let output = match parts[0] {
            "quit" | "exit" | "q" => break,
            "help" | "?" => {
                println!("Commands:");
                println!("  connect            - Request wallet accounts");
                println!("  deposit <amount>   - Deposit (smallest unit)");
                println!("  withdraw <amount>  - Withdraw (smallest unit)");
                println!("  balance            - Re-read contract balance");
                println!("  state              - Show session snapshot");
                println!("  switch <addr>...   - Wallet switches accounts");
                println!("  disconnect         - Wallet disconnects");
                println!("  reject on|off      - Wallet rejects prompts");
                println!("  quit               - Exit");
                continue;
            }
            "connect" => outcome(&session, session.on_connect_requested().await),
            "deposit" | "withdraw" => match parts.get(1) {
                Some(amount) if parts[0] == "deposit" => outcome(&session, session.on_deposit_requested(amount).await),
                Some(amount) => outcome(&session, session.on_withdraw_requested(amount).await),
                None => {
                    println!("Usage: {} <amount>", parts[0]);
                    continue;
                }
            },
            "balance" => outcome(&session, session.refresh_balance().await),
            "state" => session.snapshot().to_json(),
            "switch" => {
                let raw: Vec<String> = parts[1..].iter().map(|s| s.to_string()).collect();
                match parse_accounts(&raw) {
                    Ok(accounts) => {
                        chain.switch_accounts(accounts);
                        drain_events(&session, &mut events).await;
                        session.snapshot().to_json()
                    }
                    Err(e) => {
                        println!("Error: {}", e);
                        continue;
                    }
                }
            }
            "disconnect" => {
                chain.disconnect();
                drain_events(&session, &mut events).await;
                session.snapshot().to_json()
            }
            "reject" => {
                let on = match parts.get(1).copied() {
                    Some("on") => true,
                    Some("off") => false,
                    _ => {
                        println!("Usage: reject on|off");
                        continue;
                    }
                };
                chain.reject_requests(on);
                chain.reject_transactions(on);
                json!({"reject": on})
            }
            cmd => {
                println!("Unknown: {}. Type 'help'.", cmd);
                continue;
            }
        };
        drain_events(&session, &mut events).await;
        println!("{}", format_json(opts, &output));
    }

    println!("Goodbye!");
    Ok(json!({
        "status": "exited",
        "session": session.snapshot().to_json(),
        "contract_balance": chain.contract_balance().to_string(),
    }))
}
