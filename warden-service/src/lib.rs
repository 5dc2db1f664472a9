//! `RegistryService`: the facade the HTTP/RPC layer calls into —
//! listing/fetching/publishing/deleting servers and skills, plus registry
//! CRUD, per spec §6. Thin wrapper over the free functions in this crate's
//! modules, generic over the store rather than `dyn`.

mod name;
mod opts;
mod registries;
mod routing;
mod servers;
mod skills;

use std::collections::HashMap;
use std::sync::Arc;

use warden_core::config::EngineConfig;
use warden_core::error::Result;
use warden_core::model::EntryView;
use warden_core::store::Store;
use warden_validate::{ServerCandidate, SkillCandidate};

pub use opts::{
    CreateRegistryOpts, DeleteVersionOpts, GetVersionOpts, ListOpts, ListResult, ListVersionsOpts,
    RegistryInfo, UpdateRegistryOpts,
};
pub use routing::{prefixed_name, resolve_registry_for_name, split_prefixed_name};

/// `limit`'s default when a caller omits it (spec §4.5).
pub const DEFAULT_LIMIT: usize = 50;
/// `limit`'s hard cap regardless of what a caller requests (spec §4.5).
pub const MAX_LIMIT: usize = 500;

/// The engine's single entry point: every operation in spec §6 lives here as
/// a method, generic over the store backend in use.
pub struct RegistryService<S: Store> {
    store: Arc<S>,
    config: Arc<EngineConfig>,
}

impl<S: Store> RegistryService<S> {
    pub fn new(store: Arc<S>, config: Arc<EngineConfig>) -> Self {
        Self { store, config }
    }

    /// Runs `fut` under a span named `op`, recording the error (if any) on
    /// the span before returning it. Every public method on this type goes
    /// through here so a caller wiring a real `Tracer` sees one span per
    /// engine operation without duplicating the bookkeeping at each call site.
    async fn traced<T>(&self, op: &str, attrs: HashMap<String, String>, fut: impl std::future::Future<Output = Result<T>>) -> Result<T> {
        let span = self.config.tracer.start_span(op, &attrs);
        let result = fut.await;
        if let Err(err) = &result {
            span.record_error(err);
        }
        result
    }

    fn attrs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    pub async fn check_readiness(&self) -> Result<()> {
        self.traced("check_readiness", HashMap::new(), registries::check_readiness(self.store.as_ref())).await
    }

    pub async fn list_servers(&self, opts: ListOpts) -> Result<ListResult> {
        self.traced("list_servers", HashMap::new(), servers::list_servers(self.store.as_ref(), opts)).await
    }

    pub async fn get_server_version(&self, opts: GetVersionOpts) -> Result<EntryView> {
        let attrs = Self::attrs(&[("name", &opts.name)]);
        self.traced("get_server_version", attrs, servers::get_server_version(self.store.as_ref(), opts)).await
    }

    pub async fn list_server_versions(&self, opts: ListVersionsOpts) -> Result<Vec<EntryView>> {
        let attrs = Self::attrs(&[("name", &opts.name)]);
        self.traced("list_server_versions", attrs, servers::list_server_versions(self.store.as_ref(), opts)).await
    }

    pub async fn publish_server_version(&self, registry_name: &str, candidate: ServerCandidate) -> Result<EntryView> {
        let attrs = Self::attrs(&[("registry", registry_name), ("name", &candidate.name)]);
        self.traced(
            "publish_server_version",
            attrs,
            servers::publish_server_version(self.store.as_ref(), registry_name, candidate, self.config.max_meta_size),
        )
        .await
    }

    pub async fn delete_server_version(&self, opts: DeleteVersionOpts) -> Result<()> {
        let attrs = Self::attrs(&[("registry", &opts.registry_name), ("name", &opts.name), ("version", &opts.version)]);
        self.traced("delete_server_version", attrs, servers::delete_server_version(self.store.as_ref(), opts)).await
    }

    pub async fn list_skills(&self, opts: ListOpts) -> Result<ListResult> {
        self.traced("list_skills", HashMap::new(), skills::list_skills(self.store.as_ref(), opts)).await
    }

    pub async fn get_skill_version(&self, opts: GetVersionOpts) -> Result<EntryView> {
        let attrs = Self::attrs(&[("name", &opts.name)]);
        self.traced("get_skill_version", attrs, skills::get_skill_version(self.store.as_ref(), opts)).await
    }

    pub async fn list_skill_versions(&self, opts: ListVersionsOpts) -> Result<Vec<EntryView>> {
        let attrs = Self::attrs(&[("name", &opts.name)]);
        self.traced("list_skill_versions", attrs, skills::list_skill_versions(self.store.as_ref(), opts)).await
    }

    pub async fn publish_skill(&self, registry_name: &str, candidate: SkillCandidate) -> Result<EntryView> {
        let attrs = Self::attrs(&[("registry", registry_name), ("name", &candidate.name)]);
        self.traced("publish_skill", attrs, skills::publish_skill(self.store.as_ref(), registry_name, candidate)).await
    }

    pub async fn delete_skill_version(&self, opts: DeleteVersionOpts) -> Result<()> {
        let attrs = Self::attrs(&[("registry", &opts.registry_name), ("name", &opts.name), ("version", &opts.version)]);
        self.traced("delete_skill_version", attrs, skills::delete_skill_version(self.store.as_ref(), opts)).await
    }

    pub async fn list_registries(&self) -> Result<Vec<RegistryInfo>> {
        self.traced("list_registries", HashMap::new(), registries::list_registries(self.store.as_ref())).await
    }

    pub async fn get_registry_by_name(&self, name: &str) -> Result<RegistryInfo> {
        let attrs = Self::attrs(&[("name", name)]);
        self.traced("get_registry_by_name", attrs, registries::get_registry_by_name(self.store.as_ref(), name)).await
    }

    pub async fn create_registry(&self, opts: CreateRegistryOpts) -> Result<RegistryInfo> {
        let attrs = Self::attrs(&[("name", &opts.name)]);
        self.traced("create_registry", attrs, registries::create_registry(self.store.as_ref(), opts)).await
    }

    pub async fn update_registry(&self, name: &str, opts: UpdateRegistryOpts) -> Result<RegistryInfo> {
        let attrs = Self::attrs(&[("name", name)]);
        self.traced("update_registry", attrs, registries::update_registry(self.store.as_ref(), name, opts)).await
    }

    pub async fn delete_registry(&self, name: &str) -> Result<()> {
        let attrs = Self::attrs(&[("name", name)]);
        self.traced("delete_registry", attrs, registries::delete_registry(self.store.as_ref(), name)).await
    }

    pub async fn process_inline_registry_data(&self, registry_name: &str, data: Vec<u8>, format: String) -> Result<()> {
        let attrs = Self::attrs(&[("registry", registry_name)]);
        self.traced(
            "process_inline_registry_data",
            attrs,
            registries::process_inline_registry_data(self.store.as_ref(), registry_name, Some(data), Some(format)),
        )
        .await
    }
}
