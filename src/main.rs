//! Interactive shell for the `blockfs` filesystem image.

use blockfs::command;
use blockfs::config;
use blockfs::config::Action;
use blockfs::fs::Filesystem;
use std::env;
use std::io;
use std::io::BufRead;
use std::io::Write;
use std::process::exit;

/// Writes an error to stderr, then exits with status 1.
fn error(msg: impl std::fmt::Display) -> ! {
    eprintln!("blockfs: error: {msg}");
    exit(1);
}

fn main() {
    let config = config::parse_args(env::args_os().skip(1)).unwrap_or_else(|e| error(e));

    let level = if config.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut fs = match config.action {
        Action::Create { path, size_mb } => {
            log::info!("creating filesystem at {} ({size_mb} MiB)", path.display());
            Filesystem::create(&path, size_mb).unwrap_or_else(|e| error(e))
        }
        Action::Open { path } => {
            log::info!("mounting filesystem at {}", path.display());
            Filesystem::open(&path).unwrap_or_else(|e| error(e))
        }
    };

    println!("Interactive shell - type 'help' for commands, 'quit' to exit");
    run_shell(&mut fs);
    fs.close();
    println!("Filesystem closed. Goodbye!");
}

fn run_shell(fs: &mut Filesystem) {
    let stdin = io::stdin();
    loop {
        print!("> ");
        let _ = io::stdout().flush();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" || line == "exit" {
            break;
        }

        let mut parts = line.splitn(3, ' ');
        let Some(cmd) = parts.next() else { continue };
        let args: Vec<String> = parts.map(str::to_string).collect();

        let result = command::execute_command(fs, cmd, &args);
        match serde_json::to_string_pretty(&result) {
            Ok(text) => println!("{text}"),
            Err(e) => eprintln!("blockfs: failed to render result: {e}"),
        }
    }
}
