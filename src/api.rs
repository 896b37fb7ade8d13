/*!
 * HTTP listing endpoint
 *
 * Serves the paginated directory listing of a [`PagedSource`] as JSON:
 *
 * - `path` (default `.`), `limit` (default 50), `offset` (default 0)
 * - `selected` (repeatable) adds `selectedFilesData` with the file contents
 * - `fullTree=true` returns `directoryStructure` instead of a page, pruned
 *   by the repeatable `ignore` patterns
 */

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tiny_http::{Header, Method, Request, Response, Server};
use tracing::{debug, info, warn};
use url::form_urlencoded;

use crate::error::{CodextError, Result};
use crate::patterns::IgnoreSet;
use crate::source::{Page, PagedSource, SelectedFileData, DEFAULT_PAGE_SIZE};
use crate::types::{EntryNode, PathKey};

/// Parsed query of a listing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilesQuery {
    pub path: String,
    pub limit: usize,
    pub offset: usize,
    pub selected: Vec<String>,
    pub full_tree: bool,
    pub ignore: Vec<String>,
}

impl Default for FilesQuery {
    fn default() -> Self {
        Self {
            path: ".".to_string(),
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
            selected: Vec::new(),
            full_tree: false,
            ignore: Vec::new(),
        }
    }
}

impl FilesQuery {
    /// Parse a raw query string (without the leading `?`)
    pub fn parse(query: &str) -> Result<Self> {
        let mut parsed = FilesQuery::default();

        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "path" if !value.is_empty() => parsed.path = value.into_owned(),
                "limit" => parsed.limit = parse_number("limit", &value)?,
                "offset" => parsed.offset = parse_number("offset", &value)?,
                "selected" => parsed.selected.push(value.into_owned()),
                "fullTree" => parsed.full_tree = value == "true",
                "ignore" => {
                    let trimmed = value.trim();
                    if !trimmed.is_empty() {
                        parsed.ignore.push(trimmed.to_string());
                    }
                }
                _ => {}
            }
        }

        Ok(parsed)
    }
}

fn parse_number(name: &str, value: &str) -> Result<usize> {
    value
        .parse()
        .map_err(|_| CodextError::Config(format!("{} must be a non-negative integer, got {:?}", name, value)))
}

/// JSON body of a listing response. Which fields are present depends on the
/// request mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilesResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entries: Option<Vec<EntryNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_more: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_files_data: Option<Vec<SelectedFileData>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory_structure: Option<String>,
}

/// JSON body of a failed request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Answer one listing query
pub fn respond(source: &PagedSource, query: &FilesQuery) -> Result<FilesResponse> {
    let path = PathKey::parse(&query.path)?;

    if query.full_tree {
        let ignore = IgnoreSet::new(&query.ignore)?;
        return Ok(FilesResponse {
            directory_structure: Some(source.full_tree_text(&path, &ignore)?),
            ..Default::default()
        });
    }

    let page = Page {
        offset: query.offset,
        limit: query.limit,
    };
    let listing = source.list_page(&path, page)?;

    let selected_files_data = if query.selected.is_empty() {
        None
    } else {
        Some(source.read_selected(&query.selected))
    };

    Ok(FilesResponse {
        entries: Some(listing.entries),
        has_more: Some(listing.has_more),
        selected_files_data,
        directory_structure: None,
    })
}

/// HTTP status for an error raised while answering a query
fn status_for(err: &CodextError) -> u16 {
    match err {
        CodextError::InvalidPath(_) | CodextError::Config(_) | CodextError::Regex(_) => 400,
        CodextError::Listing { .. } | CodextError::Read { .. } => 404,
        _ => 500,
    }
}

/// Blocking HTTP server exposing a [`PagedSource`]
pub struct ListingServer {
    server: Server,
    source: PagedSource,
}

impl ListingServer {
    /// Bind to `addr` (`"127.0.0.1:0"` picks a free port)
    pub fn bind(addr: &str, source: PagedSource) -> Result<Self> {
        let server = Server::http(addr)
            .map_err(|e| CodextError::Access(format!("cannot bind {}: {}", addr, e)))?;
        Ok(Self { server, source })
    }

    /// Address the server is listening on
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.server_addr().to_ip()
    }

    /// Serve at most one request, waiting up to `timeout` for it.
    ///
    /// Returns whether a request was handled.
    pub fn poll(&self, timeout: Duration) -> io::Result<bool> {
        match self.server.recv_timeout(timeout)? {
            Some(request) => {
                self.handle(request)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Serve requests until the listener fails
    pub fn run(&self) -> io::Result<()> {
        if let Some(addr) = self.local_addr() {
            info!(
                "Serving {} on http://{}",
                self.source.root_path().display(),
                addr
            );
        }
        loop {
            let request = self.server.recv()?;
            self.handle(request)?;
        }
    }

    fn handle(&self, request: Request) -> io::Result<()> {
        if request.method() != &Method::Get {
            return request.respond(json_response(
                405,
                &ErrorBody {
                    error: "only GET is supported".to_string(),
                },
            ));
        }

        let query = request
            .url()
            .split_once('?')
            .map(|(_, q)| q.to_string())
            .unwrap_or_default();
        debug!("GET ?{}", query);

        let response = match FilesQuery::parse(&query).and_then(|q| respond(&self.source, &q)) {
            Ok(body) => json_response(200, &body),
            Err(err) => {
                warn!("Request failed: {}", err);
                json_response(
                    status_for(&err),
                    &ErrorBody {
                        error: err.to_string(),
                    },
                )
            }
        };

        request.respond(response)
    }
}

fn json_response<T: Serialize>(status: u16, body: &T) -> Response<io::Cursor<Vec<u8>>> {
    let payload = serde_json::to_vec(body).unwrap_or_else(|_| b"{}".to_vec());
    let mut response = Response::from_data(payload).with_status_code(status);
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        response.add_header(header);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_parse_defaults() {
        let query = FilesQuery::parse("").unwrap();
        assert_eq!(query, FilesQuery::default());
        assert_eq!(query.path, ".");
        assert_eq!(query.limit, 50);
    }

    #[test]
    fn test_parse_repeated_params() {
        let query = FilesQuery::parse(
            "path=src&limit=10&offset=20&selected=a.rs&selected=b%20c.rs&fullTree=true&ignore=node_modules&ignore=+&ignore=.*",
        )
        .unwrap();
        assert_eq!(query.path, "src");
        assert_eq!(query.limit, 10);
        assert_eq!(query.offset, 20);
        assert_eq!(query.selected, vec!["a.rs", "b c.rs"]);
        assert!(query.full_tree);
        assert_eq!(query.ignore, vec!["node_modules", ".*"]);
    }

    #[test]
    fn test_parse_rejects_bad_numbers() {
        assert!(FilesQuery::parse("limit=-1").is_err());
        assert!(FilesQuery::parse("offset=abc").is_err());
    }

    #[test]
    fn test_respond_shapes() -> Result<()> {
        let temp = tempdir()?;
        fs::create_dir(temp.path().join("src"))?;
        File::create(temp.path().join("src").join("lib.rs"))?.write_all(b"pub fn f() {}")?;
        let source = PagedSource::new(temp.path());

        let page = respond(&source, &FilesQuery::parse("path=src")?)?;
        let json = serde_json::to_string(&page)?;
        assert_eq!(
            json,
            r#"{"entries":[{"name":"lib.rs","path":"src/lib.rs","type":"file"}],"hasMore":false}"#
        );

        let with_files = respond(&source, &FilesQuery::parse("selected=src/lib.rs&selected=nope")?)?;
        let files = with_files.selected_files_data.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].content, "pub fn f() {}");
        assert!(with_files.entries.is_some());

        let tree = respond(&source, &FilesQuery::parse("fullTree=true")?)?;
        assert_eq!(tree.directory_structure.as_deref(), Some("src/\n  lib.rs\n"));
        assert!(tree.entries.is_none());
        Ok(())
    }

    #[test]
    fn test_respond_with_huge_limit_reaches_end() -> Result<()> {
        let temp = tempdir()?;
        File::create(temp.path().join("a.txt"))?;
        File::create(temp.path().join("b.txt"))?;
        let source = PagedSource::new(temp.path());

        let query = FilesQuery::parse(&format!("limit={}&offset=1", usize::MAX))?;
        let page = respond(&source, &query)?;
        let json = serde_json::to_value(&page)?;
        assert_eq!(json["hasMore"], false);
        assert_eq!(json["entries"][0]["name"], "b.txt");
        Ok(())
    }

    #[test]
    fn test_respond_rejects_escaping_path() {
        let temp = tempdir().unwrap();
        let source = PagedSource::new(temp.path());
        let err = respond(&source, &FilesQuery::parse("path=../etc").unwrap()).unwrap_err();
        assert_eq!(status_for(&err), 400);
    }
}
