/// Interactive query shell.
///
/// Reads one command per line, prints the outcome or the error, and saves
/// the catalog when `exit` is entered (in any case) or stdin closes.
///
///   cargo run --example shell -- ./data

use machdb::{Config, Interpreter};
use std::io::{self, BufRead, Write};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut config = Config::default();
    if let Some(path) = std::env::args().nth(1) {
        config = config.with_storage_path(path);
    }
    let mut session = Interpreter::open(config)?;
    println!("machdb shell, storage at {}", session.catalog().config().storage_path.display());

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("{}> ", prompt(&session));
        io::stdout().flush()?;

        let Some(line) = lines.next() else { break };
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("exit") {
            break;
        }
        match session.run(line) {
            Ok(outcome) => println!("{}", outcome),
            Err(e) => println!("error: {}", e),
        }
    }

    let report = session.save()?;
    println!("saved {} document(s)", report.documents_written);
    Ok(())
}

fn prompt(session: &Interpreter) -> String {
    match (session.session().database(), session.session().collection()) {
        (Some(db), Some(collection)) => format!("{}/{}", db, collection),
        (Some(db), None) => db.to_string(),
        _ => "machdb".to_string(),
    }
}
