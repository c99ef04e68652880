//! Fixed set of sources and databases, and URL → owner resolution.
//!
//! Built once at startup and read-only afterwards; share it by reference or `Arc`.
//! Resolution is prefix based on trailing-slash-normalized URLs. When several base URLs
//! are prefixes of the same URL the longest one wins; equal lengths go to whichever was
//! registered first.

use super::databases::{BakaUpdates, NovelUpdates};
use super::sources::{BoxNovel, FanMtl, LightNovelsTranslations, MtlNovel};
use super::{Catalog, Database, Descriptor, LanguageCode, NetworkClient, Source};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Canonical form used for prefix matching: trimmed, query and fragment dropped, with
/// exactly one trailing `/`.
pub(crate) fn normalize_url(url: &str) -> String {
    let url = url.trim();
    let path = url.find(|c| c == '?' || c == '#').map_or(url, |end| &url[..end]);
    format!("{}/", path.trim_end_matches('/'))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Base,
    Catalog,
}

/// A source plus the capabilities it was registered with.
#[derive(Clone)]
pub struct RegisteredSource {
    source: Arc<dyn Source>,
    catalog: Option<Arc<dyn Catalog>>,
}

impl RegisteredSource {
    pub fn descriptor(&self) -> &Descriptor {
        self.source.descriptor()
    }

    pub fn source(&self) -> &Arc<dyn Source> {
        &self.source
    }

    /// Present only for sources registered with the Catalog capability.
    pub fn catalog(&self) -> Option<&Arc<dyn Catalog>> {
        self.catalog.as_ref()
    }

    pub fn capabilities(&self) -> Vec<Capability> {
        let mut caps = vec![Capability::Base];
        if self.catalog.is_some() {
            caps.push(Capability::Catalog);
        }
        caps
    }

    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::Base => true,
            Capability::Catalog => self.catalog.is_some(),
        }
    }
}

impl fmt::Debug for RegisteredSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredSource")
            .field("descriptor", self.descriptor())
            .field("capabilities", &self.capabilities())
            .finish()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Duplicate source id '{id}'")]
    DuplicateId { id: String },

    #[error("Invalid base URL for '{id}': {base_url}: {reason}")]
    InvalidBaseUrl {
        id: String,
        base_url: String,
        reason: String,
    },
}

/// Collects sources and databases in registration order.
#[derive(Default)]
pub struct RegistryBuilder {
    sources: Vec<RegisteredSource>,
    databases: Vec<Arc<dyn Database>>,
}

impl RegistryBuilder {
    /// Register a source with only the Base capability.
    pub fn source<S: Source + 'static>(mut self, source: S) -> Self {
        self.sources.push(RegisteredSource {
            source: Arc::new(source),
            catalog: None,
        });
        self
    }

    /// Register a source with the Base and Catalog capabilities.
    pub fn catalog<C: Catalog + 'static>(mut self, catalog: C) -> Self {
        let catalog = Arc::new(catalog);
        self.sources.push(RegisteredSource {
            source: catalog.clone(),
            catalog: Some(catalog),
        });
        self
    }

    pub fn database<D: Database + 'static>(mut self, database: D) -> Self {
        self.databases.push(Arc::new(database));
        self
    }

    pub fn build(self) -> Result<Registry, RegistryError> {
        let descriptors = self
            .sources
            .iter()
            .map(|s| s.descriptor())
            .chain(self.databases.iter().map(|d| d.descriptor()));
        let mut ids = HashSet::new();
        for d in descriptors {
            if !ids.insert(d.id.as_str()) {
                return Err(RegistryError::DuplicateId { id: d.id.clone() });
            }
            if let Err(e) = url::Url::parse(&d.base_url) {
                return Err(RegistryError::InvalidBaseUrl {
                    id: d.id.clone(),
                    base_url: d.base_url.clone(),
                    reason: e.to_string(),
                });
            }
        }
        debug!(
            sources = self.sources.len(),
            databases = self.databases.len(),
            "registry built"
        );
        Ok(Registry {
            sources: self.sources,
            databases: self.databases,
        })
    }
}

/// Immutable set of sources and databases.
pub struct Registry {
    sources: Vec<RegisteredSource>,
    databases: Vec<Arc<dyn Database>>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Registry with every built-in source and database, all sharing `client`.
    pub fn with_default_sources(client: Arc<dyn NetworkClient>) -> Result<Self, RegistryError> {
        Self::builder()
            .catalog(LightNovelsTranslations::new(client.clone()))
            .catalog(BoxNovel::new(client.clone()))
            .catalog(MtlNovel::new(client.clone()))
            .catalog(FanMtl::new(client.clone()))
            .database(NovelUpdates::new(client.clone()))
            .database(BakaUpdates::new(client))
            .build()
    }

    /// All sources in registration order.
    pub fn sources(&self) -> &[RegisteredSource] {
        &self.sources
    }

    pub fn catalogs(&self) -> impl Iterator<Item = &RegisteredSource> {
        self.sources.iter().filter(|s| s.has(Capability::Catalog))
    }

    pub fn databases(&self) -> &[Arc<dyn Database>] {
        &self.databases
    }

    pub fn get(&self, id: &str) -> Option<&RegisteredSource> {
        self.sources.iter().find(|s| s.descriptor().id == id)
    }

    pub fn get_catalog(&self, id: &str) -> Option<&Arc<dyn Catalog>> {
        self.get(id).and_then(|s| s.catalog())
    }

    pub fn get_database(&self, id: &str) -> Option<&Arc<dyn Database>> {
        self.databases.iter().find(|d| d.descriptor().id == id)
    }

    /// Languages offered by at least one catalog source.
    pub fn catalog_languages(&self) -> BTreeSet<LanguageCode> {
        self.catalogs().map(|s| s.descriptor().language).collect()
    }

    /// Source owning `url`, or `None` for an unsupported URL.
    pub fn resolve_source(&self, url: &str) -> Option<&RegisteredSource> {
        longest_prefix(self.sources.iter(), |s| s.descriptor(), url)
    }

    /// Like [Registry::resolve_source] restricted to catalog sources.
    pub fn resolve_catalog(&self, url: &str) -> Option<&RegisteredSource> {
        longest_prefix(self.catalogs(), |s| s.descriptor(), url)
    }

    pub fn resolve_database(&self, url: &str) -> Option<&Arc<dyn Database>> {
        longest_prefix(self.databases.iter(), |d| d.descriptor(), url)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("sources", &self.sources)
            .field(
                "databases",
                &self
                    .databases
                    .iter()
                    .map(|d| d.descriptor().id.as_str())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

fn longest_prefix<'a, T: 'a>(
    items: impl Iterator<Item = &'a T>,
    descriptor: impl Fn(&T) -> &Descriptor,
    url: &str,
) -> Option<&'a T> {
    let url = normalize_url(url);
    let mut best: Option<(&'a T, usize)> = None;
    for item in items {
        let base = &descriptor(item).base_url;
        if url.starts_with(base.as_str()) && best.map_or(true, |(_, len)| base.len() > len) {
            best = Some((item, base.len()));
        }
    }
    best.map(|(item, _)| item)
}
