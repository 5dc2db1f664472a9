mod filter;
mod inline_fetcher;
mod payload;
mod writer;

pub use filter::{CompiledFilter, FilterConfig, NameFilter, TagFilter};
pub use inline_fetcher::InlineFetcher;
pub use payload::{IconCandidate, PackageCandidate, RemoteCandidate, ServerCandidate, SkillCandidate, SyncPayload, Validator};
pub use writer::{recompute_latest, registry_source_unchanged, store};
