//! Update check orchestration.
//!
//! One call to [`UpdateChecker::check`] runs the whole planning procedure:
//! load and verify the top manifest, bail out fast when the index identity
//! is unchanged, otherwise fetch the index, retrieve changed descriptors
//! concurrently, resolve flavor choices, and diff the desired file set
//! against the persisted record into an [`UpdatePlan`]. The persisted state
//! passed in is never mutated; the produced plan carries a replacement tree
//! for the caller to commit.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use ed25519_dalek::VerifyingKey;
use tokio::task;
use tracing::{debug, info};

use crate::error::{Result, UpdateError};
use crate::flavor::{FlavorChoice, FlavorGroup, FlavorSelector, Resolver};
use crate::hash::HashFunction;
use crate::manifest::loader::{self, resolve_relative};
use crate::manifest::{Document, Section};
use crate::metafile::{self, MetafileRequest, Side};
use crate::plan::{CheckOutcome, DownloadSource, FileState, PlanBuilder, UpdatePlan};
use crate::state::PersistedState;
use crate::transport::Transport;
use crate::version::Version;

/// Native pack-format tag.
const PACK_FORMAT: &str = "packsync";

/// Highest packwiz pack-format version understood.
const PACKWIZ_COMPAT: &str = "1.1.0";

/// Top manifests are tiny.
const MANIFEST_LIMIT: usize = 4 * loader::K;

/// Index documents list every file; still bounded.
const INDEX_LIMIT: usize = 64 * loader::K;

/// Progress and confirmation callbacks consumed during a check.
///
/// Both default to no-ops so headless embedders only implement what they
/// surface.
pub trait Callbacks: Send + Sync {
    /// Reports a coarse progress checkpoint.
    fn progress(&self, _title: &str, _subtitle: &str) {}

    /// Asks whether an available update should be installed. Declining is
    /// not an error: the check returns with versions but no plan.
    fn confirm_update(&self, _from: &Version, _to: &Version) -> bool {
        true
    }
}

/// Callbacks that report nothing and accept every update.
#[derive(Debug, Default)]
pub struct SilentCallbacks;

impl Callbacks for SilentCallbacks {}

/// Tuning for one checker instance.
#[derive(Debug, Clone)]
pub struct CheckConfig {
    /// Local deployment environment, for descriptor `side` filtering.
    pub env: Side,

    /// Re-offer every flavor group even when a prior decision exists.
    pub force_reselect: bool,

    /// When set, the top manifest must carry a valid detached signature.
    pub public_key: Option<VerifyingKey>,

    /// Concurrent descriptor-fetch cap.
    pub concurrency: usize,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            env: Side::Client,
            force_reselect: false,
            public_key: None,
            concurrency: metafile::DEFAULT_CONCURRENCY,
        }
    }
}

/// Computes update plans against a remote manifest.
pub struct UpdateChecker {
    transport: Arc<dyn Transport>,
    selector: Arc<dyn FlavorSelector>,
    callbacks: Arc<dyn Callbacks>,
    config: CheckConfig,
}

impl UpdateChecker {
    pub fn new(transport: Arc<dyn Transport>, selector: Arc<dyn FlavorSelector>) -> Self {
        Self {
            transport,
            selector,
            callbacks: Arc::new(SilentCallbacks),
            config: CheckConfig::default(),
        }
    }

    /// Sets the progress/confirmation callbacks (builder pattern).
    pub fn with_callbacks(mut self, callbacks: Arc<dyn Callbacks>) -> Self {
        self.callbacks = callbacks;
        self
    }

    /// Sets the check configuration (builder pattern).
    pub fn with_config(mut self, config: CheckConfig) -> Self {
        self.config = config;
        self
    }

    /// Runs one update check against the manifest at `manifest_url`.
    ///
    /// `state` is the persisted record of the last successful check; it is
    /// read, never written. On the fast path (index identity unchanged, no
    /// forced reselect) no file enumeration happens at all.
    pub async fn check(
        &self,
        manifest_url: &str,
        state: &PersistedState,
    ) -> Result<CheckOutcome> {
        let manifest = self.load_manifest(manifest_url).await?;
        let root = manifest.root();
        check_pack_format(root.str("pack-format")?)?;

        let index_meta = root.table("index")?;
        let index_func = HashFunction::parse(index_meta.str("hash-format")?)?;
        let index_hex = index_func.normalize(index_meta.str("hash")?)?;
        let index_identity = index_func.doublet(&index_hex);

        let from = state
            .current_version
            .clone()
            .unwrap_or_else(Version::bootstrap);
        let changed = state.pack.last_index_identity.as_deref() != Some(index_identity.as_str());
        if !changed && !self.config.force_reselect {
            info!(identity = %index_identity, "index unchanged, nothing to do");
            return Ok(CheckOutcome::up_to_date(from));
        }

        let to = from.next(root.str("version")?);
        let bootstrapping = state.is_bootstrapping();
        info!(
            ours = state.pack.last_index_identity.as_deref().unwrap_or("(none)"),
            theirs = %index_identity,
            "update available"
        );

        if !bootstrapping && changed && !self.callbacks.confirm_update(&from, &to) {
            info!("update declined by user choice");
            return Ok(CheckOutcome {
                from,
                to,
                plan: None,
            });
        }

        let title = if bootstrapping {
            "Bootstrapping"
        } else {
            "Updating"
        };
        self.callbacks.progress(title, "Calculating update");

        let mut next_state = state.clone();
        next_state.pack.last_index_identity = Some(index_identity);

        let index_url = resolve_relative(manifest_url, index_meta.str("file")?);
        let index = self.load_index(&index_url, index_func, &index_hex).await?;
        let index_root = index.root();
        let files_func = HashFunction::parse(index_root.str("hash-format")?)?;

        let resolver = Resolver::new(
            state.selected_flavors.clone(),
            self.config.force_reselect,
        );

        let mut pending = Vec::new();
        if let Some(groups) = root.opt_table("flavor_groups")? {
            for (group_id, decl) in groups.subtables() {
                if let Some(group) = declared_group(group_id, &decl, &resolver)? {
                    pending.push(group);
                }
            }
        }

        // Per-component gating declared by the manifest; synthetic toggle
        // groups add their own entries as descriptors come in.
        let mut gating: BTreeMap<String, Vec<String>> = BTreeMap::new();
        if let Some(components) = root.opt_table("metafile")? {
            for (component, decl) in components.subtables() {
                if let Some(flavors) = decl.str_or_array("flavors")? {
                    gating.insert(component.to_string(), flavors);
                }
            }
        }

        let mut builder = PlanBuilder::new(&state.pack.last_state)?;
        let mut requests = Vec::new();
        let mut skipped_components = BTreeSet::new();
        for entry in index_root.tables("files")? {
            let path = entry.str("file")?.replace('\\', "/");
            let hex = files_func.normalize(entry.str("hash")?)?;
            if entry.bool_or("metafile", false)? {
                let doublet = files_func.doublet(&hex);
                if !self.config.force_reselect
                    && state.pack.metafile_state.get(&path) == Some(&doublet)
                {
                    debug!(path = %path, "descriptor unchanged, skipping fetch");
                    skipped_components.insert(metafile::component_name(&path));
                    if let Some(target) = state.pack.metafile_files.get(&path) {
                        builder.retain(target);
                    }
                    continue;
                }
                requests.push(MetafileRequest { path, hex });
            } else {
                let desired = FileState::present(files_func, hex);
                let url = resolve_relative(manifest_url, &path);
                builder.visit(path, desired, || {
                    Ok(DownloadSource {
                        url,
                        hostile: false,
                    })
                })?;
            }
        }

        self.callbacks.progress(title, "Retrieving metafiles");
        let mut metafiles = metafile::fetch_all(
            Arc::clone(&self.transport),
            manifest_url,
            files_func,
            requests,
            self.config.concurrency,
        )
        .await?;
        // Plan content must not depend on fetch completion order.
        metafiles.sort_by(|a, b| a.path.cmp(&b.path));

        // Synthetic groups rebuild from scratch: only components seen this
        // run survive, either skipped-unchanged with their persisted group
        // or re-synthesized below.
        let mut synthetic: BTreeMap<String, FlavorGroup> = state
            .pack
            .synthetic_flavor_groups
            .iter()
            .filter(|(component, _)| skipped_components.contains(component.as_str()))
            .map(|(component, group)| (component.clone(), group.clone()))
            .collect();

        let mut eligible = Vec::new();
        for mf in metafiles {
            next_state
                .pack
                .metafile_state
                .insert(mf.path.clone(), mf.doublet.clone());
            if !metafile::side_eligible(mf.side()?, self.config.env) {
                info!(
                    path = %mf.path,
                    env = self.config.env.name(),
                    "skipping descriptor not eligible for this environment"
                );
                continue;
            }
            let target = mf.target()?;
            synthetic.remove(&mf.name);
            if let Some(option) = mf.option_info()? {
                if option.optional && !gating.contains_key(&mf.name) {
                    let group = resolver.toggle_group(
                        &mf.name,
                        mf.display_name()?,
                        &option.description,
                        option.default_on,
                    );
                    gating.insert(mf.name.clone(), vec![format!("{}_on", mf.name)]);
                    synthetic.insert(mf.name.clone(), group);
                }
            }
            eligible.push((mf, target));
        }

        for group in synthetic.values() {
            if !resolver.is_resolved(group) {
                pending.push(group.clone());
            }
        }
        next_state.pack.synthetic_flavor_groups = synthetic;

        // The one indefinite-wait point: every fetch that could affect
        // group membership has settled by now.
        let base: BTreeSet<String> = if self.config.force_reselect {
            BTreeSet::new()
        } else {
            state.selected_flavors.clone()
        };
        let selection = if pending.is_empty() {
            base
        } else {
            self.callbacks.progress(title, "Waiting for flavor selection");
            let selector = Arc::clone(&self.selector);
            task::spawn_blocking(move || selector.select(&pending, &base))
                .await
                .map_err(|e| UpdateError::Selection(format!("selection task failed: {e}")))??
        };
        next_state.selected_flavors = selection.clone();

        for (mf, target) in eligible {
            if let Some(gate) = gating.get(&mf.name) {
                if !gate.iter().any(|id| selection.contains(id)) {
                    info!(path = %target, "skipping component not matching selected flavors");
                    continue;
                }
            }
            next_state
                .pack
                .metafile_files
                .insert(mf.path.clone(), target.clone());
            let download = mf.document.root().table("download")?;
            let func = HashFunction::parse(download.str("hash-format")?)?;
            let hex = func.normalize(download.str("hash")?)?;
            let desired = FileState::present(func, hex);
            builder.visit(target, desired, || {
                metafile::resolve_source(&mf, manifest_url)
            })?;
        }

        let diff = builder.finish();
        next_state.pack.last_state = diff.last_state;
        next_state.current_version = Some(to.clone());

        Ok(CheckOutcome {
            from,
            to,
            plan: Some(UpdatePlan {
                bootstrapping,
                files: diff.files,
                expected_state: diff.expected_state,
                new_state: next_state,
            }),
        })
    }

    async fn load_manifest(&self, url: &str) -> Result<Document> {
        let transport = Arc::clone(&self.transport);
        let target = url.to_string();
        let key = self.config.public_key.clone();
        let context = url.to_string();
        task::spawn_blocking(move || {
            loader::load_signed_document(transport.as_ref(), &target, MANIFEST_LIMIT, key.as_ref())
        })
        .await
        .map_err(|e| UpdateError::Transport {
            url: context,
            detail: format!("manifest fetch task failed: {e}"),
        })?
    }

    async fn load_index(
        &self,
        url: &str,
        func: HashFunction,
        expected_hex: &str,
    ) -> Result<Document> {
        let transport = Arc::clone(&self.transport);
        let target = url.to_string();
        let expected = expected_hex.to_string();
        let context = url.to_string();
        task::spawn_blocking(move || {
            loader::load_verified_document(transport.as_ref(), &target, INDEX_LIMIT, func, &expected)
        })
        .await
        .map_err(|e| UpdateError::Transport {
            url: context,
            detail: format!("index fetch task failed: {e}"),
        })?
    }
}

/// Accepts the native tag or a packwiz tag up to the highest understood
/// format version.
fn check_pack_format(tag: &str) -> Result<()> {
    if tag == PACK_FORMAT {
        return Ok(());
    }
    if let Some(version) = tag.strip_prefix("packwiz:") {
        let ours = semver::Version::parse(PACKWIZ_COMPAT).expect("compat version parses");
        if let Ok(theirs) = semver::Version::parse(version) {
            if theirs <= ours {
                return Ok(());
            }
        }
    }
    Err(UpdateError::UnsupportedFormat(format!("pack format `{tag}`")))
}

/// Builds a declared group from its manifest table, or `None` when the
/// group already has a standing decision.
fn declared_group(
    id: &str,
    decl: &Section<'_>,
    resolver: &Resolver,
) -> Result<Option<FlavorGroup>> {
    let mut group = FlavorGroup {
        id: id.to_string(),
        name: decl.opt_str("name")?.unwrap_or(id).to_string(),
        description: decl
            .opt_str("description")?
            .unwrap_or("No description")
            .to_string(),
        choices: Vec::new(),
        default_choice: None,
    };
    for value in decl.values("choices")? {
        let choice = match value {
            toml::Value::String(choice_id) => FlavorChoice {
                id: choice_id.clone(),
                name: choice_id.clone(),
                description: String::new(),
                is_default: false,
            },
            toml::Value::Table(table) => {
                let section = decl.element(table);
                let choice_id = section.str("id")?;
                FlavorChoice {
                    id: choice_id.to_string(),
                    name: section.opt_str("name")?.unwrap_or(choice_id).to_string(),
                    description: section.opt_str("description")?.unwrap_or("").to_string(),
                    is_default: false,
                }
            }
            _ => {
                return Err(UpdateError::Malformed(format!(
                    "flavor group `{id}` has a choice that is neither a string nor a table"
                )))
            }
        };
        group.choices.push(choice);
    }
    if resolver.is_resolved(&group) {
        return Ok(None);
    }
    let declared_default = decl.opt_str("default")?;
    resolver.apply_defaults(&mut group, declared_default);
    Ok(Some(group))
}
