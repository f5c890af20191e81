//! The HTML link-spider: breadth-first crawl of a package's `list_url` to
//! discover other available versions, and the content-type-sniffing
//! utilities it shares with the URL fetcher.
//!
//! Grounded on `util/web.py`'s `_spider`/`spider`/`NonDaemonPool`. The
//! Python original forks an OS process pool specifically to dodge the GIL
//! and to isolate worker crashes; Rust has neither problem, so the "pool of
//! non-daemon workers that permits nested submission" (spec §9) becomes a
//! plain `std::thread::scope` per BFS level — each worker can itself queue
//! more work (links discovered one level deeper) before the scope is
//! allowed to close, which is the property the original's `allow_spawn`
//! flag on `NonDaemonPool` exists to provide.

use std::collections::HashSet;
use std::sync::Mutex;

use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::blocking::Client;
use scraper::{Html, Selector};
use slog::{debug, o, warn, Logger};
use url::Url;

use crate::config::Config;
use crate::fetch::transport;
use crate::package::Version;
use crate::util::errors::{ErrorKind, Res};

pub struct Spider {
    client: Client,
    logger: Logger,
}

/// The result of one `spider()` call (spec §4.4 scenario 6): every HTML
/// page actually fetched, keyed by URL to its body, plus every distinct
/// `href` discovered underneath `root` — including archive-suffixed leaves,
/// which are recorded but never recursed into.
#[derive(Debug, Clone, Default)]
pub struct SpiderResult {
    pub pages: IndexMap<Url, String>,
    pub links: Vec<Url>,
}

impl Spider {
    pub fn new(cfg: &dyn Config, plog: &Logger) -> Res<Spider> {
        Ok(Spider {
            client: transport::client(cfg.verify_ssl())?,
            logger: plog.new(o!("component" => "spider")),
        })
    }

    /// Breadth-first crawl starting at `root`, descending at most
    /// `max_depth` hops and following only links whose absolute form stays
    /// under `root` (spec §4.4). `raise_on_error`: a failed fetch of `root`
    /// itself is fatal (`NoNetworkConnection`) only when set; a failed
    /// fetch of any other, deeper page is always logged and ignored.
    pub fn spider(&self, root: &Url, max_depth: usize, raise_on_error: bool) -> Res<SpiderResult> {
        let prefix = root.as_str().to_string();
        let pages: Mutex<IndexMap<Url, String>> = Mutex::new(IndexMap::new());
        let links: Mutex<Vec<Url>> = Mutex::new(Vec::new());
        let visited: Mutex<HashSet<Url>> = Mutex::new(HashSet::new());
        visited.lock().unwrap().insert(root.clone());

        let root_page = match self.fetch_page(root) {
            Ok(page) => page,
            Err(e) => {
                if raise_on_error {
                    return Err(ErrorKind::NoNetworkConnection(e.to_string()).into());
                }
                warn!(self.logger, "root fetch failed"; "url" => root.as_str(), "error" => e.to_string());
                return Ok(SpiderResult::default());
            }
        };

        // `frontier` holds exactly the not-yet-fetched, non-archive links
        // discovered at the previous level; it's rebuilt fresh each level
        // from that level's own fetches, never recomputed from the whole
        // `visited` set (which would re-enqueue every link ever seen).
        let mut frontier: Vec<Url> = match &root_page {
            Some(body) => {
                pages.lock().unwrap().insert(root.clone(), body.clone());
                extract_links(root, body)
                    .into_iter()
                    .filter_map(|link| record_link(&prefix, link, &visited, &links))
                    .collect()
            }
            None => Vec::new(),
        };

        for level in 0..max_depth {
            if frontier.is_empty() {
                break;
            }
            debug!(self.logger, "crawling level"; "level" => level + 1, "count" => frontier.len());

            let next_frontier: Mutex<Vec<Url>> = Mutex::new(Vec::new());

            // One thread per page at this level; each thread may push newly
            // discovered links before the scope joins, the "nested
            // submission" property a plain `parallel().join()` pass
            // wouldn't give us if workers were barred from enqueuing more
            // work than they were handed (spec §9's non-daemon pool).
            std::thread::scope(|s| {
                for url in &frontier {
                    let pages = &pages;
                    let links = &links;
                    let visited = &visited;
                    let prefix = &prefix;
                    let next_frontier = &next_frontier;
                    s.spawn(move || match self.fetch_page(url) {
                        Ok(Some(body)) => {
                            pages.lock().unwrap().insert(url.clone(), body.clone());
                            let mut next = next_frontier.lock().unwrap();
                            for link in extract_links(url, &body) {
                                if let Some(child) = record_link(prefix, link, visited, links) {
                                    next.push(child);
                                }
                            }
                        }
                        Ok(None) => {}
                        Err(e) => {
                            debug!(self.logger, "child fetch failed, ignoring"; "url" => url.as_str(), "error" => e.to_string());
                        }
                    });
                }
            });

            frontier = next_frontier.into_inner().unwrap();
        }

        Ok(SpiderResult {
            pages: pages.into_inner().unwrap(),
            links: links.into_inner().unwrap(),
        })
    }

    /// HEAD `url` first to check its `Content-Type`; only `GET` it if that
    /// looks like HTML (spec §4.4: "HEAD first ... only then GET"). Returns
    /// `None` for a non-HTML resource rather than an error — this is the
    /// normal case for an archive link, not a failure.
    fn fetch_page(&self, url: &Url) -> Res<Option<String>> {
        let head = self
            .client
            .head(url.clone())
            .send()
            .map_err(|e| transport::classify_send_error(url.as_str(), &e))?;
        if let Some(kind) = transport::classify_status(url.as_str(), head.status()) {
            return Err(kind.into());
        }
        let head_ct = transport::content_type(&head).unwrap_or_default();
        if !head_ct.is_empty() && !transport::is_html(&head_ct) {
            return Ok(None);
        }

        let resp = self
            .client
            .get(url.clone())
            .send()
            .map_err(|e| transport::classify_send_error(url.as_str(), &e))?;
        if let Some(kind) = transport::classify_status(url.as_str(), resp.status()) {
            return Err(kind.into());
        }
        let ct = transport::content_type(&resp).unwrap_or_default();
        if !transport::is_html(&ct) {
            return Ok(None);
        }
        Ok(Some(resp.text().unwrap_or_default()))
    }
}

/// Every `<a href>` in `body`, resolved to an absolute URL against `base`.
fn extract_links(base: &Url, body: &str) -> Vec<Url> {
    let doc = Html::parse_document(body);
    let selector = Selector::parse("a[href]").unwrap();
    doc.select(&selector)
        .filter_map(|el| el.value().attr("href"))
        .filter_map(|href| crate::util::url::join(base, href).ok())
        .collect()
}

/// Registers a newly discovered link in `links`/`visited` if it's under
/// `prefix` and hasn't been seen yet (spec §4.4: "following only links
/// whose absolute form remains a prefix of root_url"; links outside
/// `prefix` are dropped entirely). Returns the link back to the caller as
/// a frontier candidate only when it's new *and* not archive-suffixed —
/// an archive link is recorded but never recursed into ("collected as
/// leaves").
fn record_link(prefix: &str, link: Url, visited: &Mutex<HashSet<Url>>, links: &Mutex<Vec<Url>>) -> Option<Url> {
    if !link.as_str().starts_with(prefix) {
        return None;
    }
    let is_new = visited.lock().unwrap().insert(link.clone());
    if !is_new {
        return None;
    }
    links.lock().unwrap().push(link.clone());
    if crate::util::archive::extension(std::path::Path::new(link.path())).is_some() {
        None
    } else {
        Some(link)
    }
}

/// Canonicalizes a handful of HTTP response header names to their standard
/// mixed-case spelling, the way `web.py`'s `standardize_header_names` does
/// for servers that emit all-lowercase or all-uppercase headers. Kept as a
/// small closed table rather than a general title-case algorithm, since
/// only these headers are ever inspected downstream.
pub fn standardize_header_names(name: &str) -> String {
    match name.to_ascii_lowercase().as_str() {
        "content-type" => "Content-Type".to_string(),
        "content-length" => "Content-Length".to_string(),
        "accept-ranges" => "Accept-Ranges".to_string(),
        "date" => "Date".to_string(),
        "last-modified" => "Last-Modified".to_string(),
        "server" => "Server".to_string(),
        other => other.to_string(),
    }
}

/// Scans a set of crawled URLs for ones that look like archives of the same
/// project, matching a version out of each one via `wildcard_version`'s
/// templating rule, and returns the discovered `{version -> url}` map
/// (`web.py`'s `find_versions_of_archive`).
pub fn find_versions_of_archive(urls: &[Url], archive_url: &Url) -> std::collections::HashMap<Version, Url> {
    let mut found = std::collections::HashMap::new();
    let pattern = match wildcard_version_regex(archive_url) {
        Some(p) => p,
        None => return found,
    };

    for url in urls {
        let candidate = url.as_str();
        // The download-redirect suffix spack anchors against: a trailing
        // `/download` some hosts (e.g. sourceforge) append.
        let trimmed = candidate.trim_end_matches("/download");
        if let Some(caps) = pattern.captures(trimmed) {
            if let Some(v) = caps.name("version") {
                found.insert(Version::new(v.as_str()), url.clone());
            }
        }
    }

    found
}

/// Builds a regex out of `archive_url`'s basename by replacing the
/// recognisable version substring with a capture group, mirroring
/// `web.py`'s `wildcard_version`: it looks for the longest run of
/// `[\d.]+` in the basename and treats that as "the version".
fn wildcard_version_regex(archive_url: &Url) -> Option<Regex> {
    lazy_static! {
        // The digit-run pattern is the same for every URL; only the
        // prefix/suffix built around the matched span varies per archive.
        static ref VERSION_RE: Regex = Regex::new(r"[0-9]+(?:[0-9.]*[0-9])?").unwrap();
    }

    let basename = crate::util::url::basename(archive_url);
    let m = VERSION_RE
        .find_iter(&basename)
        .max_by_key(|m| m.as_str().len())?;

    let prefix = regex::escape(&basename[..m.start()]);
    let suffix = regex::escape(&basename[m.end()..]);
    let full = format!(r".*/{}(?P<version>[0-9][0-9.]*[0-9]?){}(?:/download)?$", prefix, suffix);
    Regex::new(&full).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standardizes_known_headers() {
        assert_eq!(standardize_header_names("CONTENT-TYPE"), "Content-Type");
        assert_eq!(standardize_header_names("x-custom"), "x-custom");
    }

    #[test]
    fn finds_version_in_matching_url() {
        let archive = Url::parse("https://example.com/dist/foo-1.0.0.tar.gz").unwrap();
        let candidates = vec![
            Url::parse("https://example.com/dist/foo-1.0.0.tar.gz").unwrap(),
            Url::parse("https://example.com/dist/foo-2.3.1.tar.gz").unwrap(),
            Url::parse("https://example.com/dist/unrelated.zip").unwrap(),
        ];
        let found = find_versions_of_archive(&candidates, &archive);
        assert_eq!(found.len(), 2);
        assert!(found.contains_key(&Version::new("1.0.0")));
        assert!(found.contains_key(&Version::new("2.3.1")));
    }
}
