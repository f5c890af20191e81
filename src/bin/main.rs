//! Thin CLI wrapper around `srcfetch`'s `fetch` smoke-test subcommand. Not
//! the command-line front-end proper — just enough scaffolding to exercise
//! the library the way the teacher's own `src/bin/main.rs` drives `elba`.

use clap::App;
use slog::{o, Drain};

use srcfetch::cli::fetch;

fn main() {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let log = slog::Logger::root(drain, o!());

    let matches = App::new("srcfetch")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand(fetch::subcommand())
        .get_matches();

    let result = match matches.subcommand() {
        ("fetch", Some(sub)) => fetch::run(sub, &log),
        _ => {
            eprintln!("usage: srcfetch fetch <url> [--digest HEX] [--dest DIR]");
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        slog::error!(log, "fetch failed"; "error" => e.to_string());
        std::process::exit(1);
    }
}
