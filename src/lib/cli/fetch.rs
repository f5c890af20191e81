//! `srcfetch fetch <url> [--digest HEX] [--dest DIR]`: downloads a URL
//! through the library's own `UrlFetcher`, the way `cli::new::new` drove
//! `util::write` end-to-end for the teacher's scaffold command.

use std::path::PathBuf;

use clap::{App, Arg, ArgMatches, SubCommand};
use slog::{info, Logger};

use crate::config::MapConfig;
use crate::fetch::{Fetcher, UrlFetcher};
use crate::stage::Stage;
use crate::util::crypto::Digest_;
use crate::util::errors::Res;

pub fn subcommand<'a, 'b>() -> App<'a, 'b> {
    SubCommand::with_name("fetch")
        .about("download a URL into a scratch stage, verifying its digest if given")
        .arg(Arg::with_name("url").required(true).index(1))
        .arg(Arg::with_name("digest").long("digest").takes_value(true))
        .arg(
            Arg::with_name("dest")
                .long("dest")
                .takes_value(true)
                .help("scratch directory (defaults to a temp dir)"),
        )
        .arg(Arg::with_name("insecure").long("insecure").help("skip TLS verification"))
}

pub fn run(matches: &ArgMatches, log: &Logger) -> Res<()> {
    let url = crate::util::url::parse(matches.value_of("url").unwrap())?;
    let digest = matches.value_of("digest").and_then(|h| Digest_::new(h.to_string()));

    let stage_dir = match matches.value_of("dest") {
        Some(d) => PathBuf::from(d),
        None => std::env::temp_dir().join(format!("srcfetch-{}", std::process::id())),
    };

    let cfg = MapConfig {
        verify_ssl: !matches.is_present("insecure"),
        ..Default::default()
    };

    let stage = Stage::new(stage_dir, None)?;
    let fetcher = Fetcher::Url(UrlFetcher::new(url, digest));
    fetcher.bind();

    fetcher.fetch(&stage, &cfg, log)?;
    fetcher.check(&stage, &cfg, log)?;
    fetcher.expand(&stage, log)?;

    info!(log, "fetch complete"; "source_path" => stage.source_path().display().to_string());
    Ok(())
}
