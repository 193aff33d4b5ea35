//! # Tally Console
//!
//! Plays the counting game from a terminal. Each stdin line is
//! `<user> <message>`; `!top [n]` prints the leaderboard and
//! `!eval <expr>` evaluates without counting.

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use tally::console::{parse_line, ConsoleHost, ConsoleLine};
use tally::{init_tracing, Tally, TallyResult};
use tally_expr::TaggedResult;
use tally_game::{
    ChannelId, CountStore, CountingConfig, JournalCountStore, MemoryCountStore, MessageId,
};

type Stdout = std::io::Stdout;

fn main() {
    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         TALLY CONSOLE                                            ║");
    println!("║         ONE MESSAGE PER LINE: <user> <text>                      ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        usage();
        return;
    }
    let option = |name: &str| -> Option<PathBuf> {
        args.iter()
            .position(|a| a == name)
            .and_then(|i| args.get(i + 1))
            .map(PathBuf::from)
    };
    let config_path = option("--config");
    let journal_path = option("--journal");

    init_tracing("info");

    let config = match config_path {
        Some(path) => match CountingConfig::from_toml_file(&path) {
            Ok(config) => config,
            Err(e) => {
                println!("Error: {e}");
                usage();
                return;
            }
        },
        None => CountingConfig::default(),
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            println!("Error: could not start the runtime: {e}");
            return;
        }
    };

    let host = Arc::new(ConsoleHost::new(std::io::stdout()));
    let result = match journal_path {
        Some(path) => match JournalCountStore::open(&path) {
            Ok(store) => {
                let recovery = store.recovery();
                println!(
                    "Journal: {} ({} batches replayed, {} torn bytes dropped)",
                    path.display(),
                    recovery.committed_batches,
                    recovery.torn_bytes
                );
                runtime.block_on(run(&Tally::new(config, Arc::new(store), host)))
            }
            Err(e) => {
                println!("Error: could not open journal: {e}");
                return;
            }
        },
        None => {
            println!("Store: in memory (use --journal <path> to keep counts)");
            runtime.block_on(run(&Tally::new(
                config,
                Arc::new(MemoryCountStore::new()),
                host,
            )))
        }
    };

    if let Err(e) = result {
        println!("Error: {e}");
        std::process::exit(1);
    }
}

fn usage() {
    println!("Usage: tally_console [--config <counting.toml>] [--journal <file>]");
    println!();
    println!("Input:");
    println!("  <user> <text>   post <text> as <user> (a number or <@mention>)");
    println!("  !top [n]        show the leaderboard");
    println!("  !eval <expr>    evaluate without counting");
}

async fn run<S>(tally: &Tally<S, ConsoleHost<Stdout>>) -> TallyResult<()>
where
    S: CountStore + 'static,
{
    let channel = tally.config().channel().unwrap_or(ChannelId::new(0));
    println!("Counting in channel {channel}. Ctrl-D to quit.");
    println!();

    let stdin = std::io::stdin();
    let mut next_message = 1u64;
    for line in stdin.lock().lines() {
        let Ok(line) = line else {
            break;
        };
        match parse_line(&line) {
            Some(ConsoleLine::Blank) => {}
            Some(ConsoleLine::Message { user, text }) => {
                let message = MessageId::new(next_message);
                next_message += 1;
                let outcome = tally.process_count(channel, user, message, text).await?;
                tracing::debug!(message = message.get(), outcome = outcome.kind(), "posted");
            }
            Some(ConsoleLine::Evaluate(text)) => match tally.evaluate(text).await {
                TaggedResult::Success(value) => println!("  = {value}"),
                other => println!("  {}", other.tag()),
            },
            Some(ConsoleLine::Leaderboard(limit)) => {
                let top = tally.leaderboard(limit).await?;
                println!("┌─ LEADERBOARD ─────────────────────────────────────────────────┐");
                for (rank, (user, stats)) in top.iter().enumerate() {
                    println!(
                        "│ {:>3}. <@{user}>  {} counts, {} fails, best {}",
                        rank + 1,
                        stats.successes,
                        stats.fails,
                        stats.highest_user_count
                    );
                }
                println!("└───────────────────────────────────────────────────────────────┘");
            }
            None => println!("  ? expected `<user> <text>`"),
        }
        // Replies go through the host; keep the prompt order stable.
        let _ = std::io::stdout().flush();
    }
    Ok(())
}
