//! Client for a remote listing endpoint

use std::time::Duration;

use reqwest::blocking::Client;
use tracing::debug;
use url::Url;

use super::{DirectorySource, Listing, Page, DEFAULT_PAGE_SIZE};
use crate::api::{ErrorBody, FilesResponse};
use crate::error::{CodextError, Result};
use crate::patterns::IgnoreSet;
use crate::types::{DirectoryListing, PathKey};

type Reply = std::result::Result<FilesResponse, String>;

/// Source backed by an HTTP listing endpoint (see [`crate::api`])
#[derive(Debug, Clone)]
pub struct HttpSource {
    endpoint: Url,
    client: Client,
    page_size: usize,
}

impl HttpSource {
    pub fn new(endpoint: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| CodextError::Config(format!("invalid endpoint {}: {}", endpoint, e)))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            endpoint,
            client,
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Build the request URL for the given query pairs
    pub fn request_url(&self, pairs: &[(&str, String)]) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query.clear();
            for (key, value) in pairs {
                query.append_pair(key, value);
            }
        }
        url
    }

    /// Perform one GET. The outer error is a transport failure; the inner
    /// one carries the server's error message.
    fn fetch(&self, pairs: &[(&str, String)]) -> Result<Reply> {
        let url = self.request_url(pairs);
        debug!("GET {}", url);

        let response = self.client.get(url).send()?;
        let status = response.status();
        if status.is_success() {
            return Ok(Ok(response.json::<FilesResponse>()?));
        }

        let message = response
            .json::<ErrorBody>()
            .map(|body| body.error)
            .unwrap_or_else(|_| status.to_string());
        Ok(Err(message))
    }

    /// Ask the server for the indented text tree below `path`
    pub fn full_tree_text(&self, path: &PathKey, ignore: &IgnoreSet) -> Result<String> {
        let mut pairs = vec![("path", path.to_string()), ("fullTree", "true".to_string())];
        pairs.extend(ignore.patterns().map(|p| ("ignore", p.to_string())));

        match self.fetch(&pairs)? {
            Ok(body) => body
                .directory_structure
                .ok_or_else(|| CodextError::Unexpected("response lacks directoryStructure".into())),
            Err(message) => Err(CodextError::listing(path, message)),
        }
    }
}

impl DirectorySource for HttpSource {
    type Handle = PathKey;

    fn open_root(&self) -> Result<PathKey> {
        let root = PathKey::root();
        match self.fetch(&[("path", root.to_string()), ("limit", "1".to_string())]) {
            Ok(Ok(_)) => Ok(root),
            Ok(Err(message)) => Err(CodextError::Access(message)),
            Err(e) => Err(CodextError::Access(e.to_string())),
        }
    }

    fn list(
        &self,
        _dir: &PathKey,
        path: &PathKey,
        page: Option<Page>,
    ) -> Result<Listing<PathKey>> {
        let page = page.unwrap_or(Page::first(self.page_size));
        let pairs = [
            ("path", path.to_string()),
            ("limit", page.limit.to_string()),
            ("offset", page.offset.to_string()),
        ];

        let body = self
            .fetch(&pairs)?
            .map_err(|message| CodextError::listing(path, message))?;

        let listing = DirectoryListing {
            entries: body.entries.unwrap_or_default(),
            has_more: body.has_more.unwrap_or(false),
        };
        let subdirs = listing
            .entries
            .iter()
            .filter(|e| e.is_dir())
            .map(|e| (e.path.clone(), e.path.clone()))
            .collect();

        Ok(Listing { listing, subdirs })
    }

    fn read_file(&self, dir: &PathKey, path: &PathKey) -> Result<String> {
        let pairs = [
            ("path", dir.to_string()),
            ("limit", "1".to_string()),
            ("selected", path.to_string()),
        ];

        let body = self
            .fetch(&pairs)?
            .map_err(|message| CodextError::read(path, message))?;

        body.selected_files_data
            .unwrap_or_default()
            .into_iter()
            .find(|file| file.path == path.as_str())
            .map(|file| file.content)
            .ok_or_else(|| CodextError::read(path, "not returned by server"))
    }

    fn page_size(&self) -> usize {
        self.page_size
    }
}
