//! Indirect file descriptors ("metafiles").
//!
//! A metafile is a small remote document describing one downloadable
//! artifact: its integrity hash, where to get it, and optional environment
//! and variant gating. The index pins each metafile's own digest, so an
//! unchanged metafile can be skipped without refetching.

mod pipeline;
mod source;

pub(crate) use pipeline::{fetch_all, MetafileRequest, DEFAULT_CONCURRENCY};
pub(crate) use source::resolve_source;

use crate::error::Result;
use crate::manifest::Document;

/// Deployment environment files can be restricted to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Side {
    #[default]
    Client,
    Server,
}

impl Side {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Server => "server",
        }
    }
}

/// Whether a declared `side` tag admits the local environment. An absent
/// tag and `"both"` always do; anything else must match exactly.
pub(crate) fn side_eligible(declared: Option<&str>, env: Side) -> bool {
    match declared {
        None => true,
        Some(side) => side == "both" || side == env.name(),
    }
}

/// Suffix descriptors carry; stripped when deriving component names.
const METAFILE_SUFFIX: &str = ".pw.toml";

/// A fetched, verified and parsed descriptor.
#[derive(Debug, Clone)]
pub struct Metafile {
    /// Component name, derived from the descriptor's file name.
    pub name: String,

    /// Descriptor path within the pack, forward-slash normalized.
    pub path: String,

    /// Identity doublet the index pinned for this descriptor.
    pub doublet: String,

    /// The parsed descriptor document.
    pub document: Document,
}

impl Metafile {
    pub(crate) fn new(path: String, doublet: String, document: Document) -> Self {
        let name = component_name(&path);
        Self {
            name,
            path,
            doublet,
            document,
        }
    }

    /// The declared environment restriction, if any.
    pub fn side(&self) -> Result<Option<&str>> {
        self.document.root().opt_str("side")
    }

    /// Resolves the target path: the declared filename, relative to the
    /// descriptor's own directory.
    pub fn target(&self) -> Result<String> {
        let filename = self.document.root().str("filename")?.replace('\\', "/");
        Ok(match self.path.rfind('/') {
            Some(idx) => format!("{}/{}", &self.path[..idx], filename),
            None => filename,
        })
    }

    /// Human-readable name for prompts; falls back to the component name.
    pub fn display_name(&self) -> Result<&str> {
        Ok(self
            .document
            .root()
            .opt_str("name")?
            .unwrap_or(self.name.as_str()))
    }

    /// The descriptor's `[option]` block, if it declares one.
    pub fn option_info(&self) -> Result<Option<OptionInfo>> {
        let Some(option) = self.document.root().opt_table("option")? else {
            return Ok(None);
        };
        Ok(Some(OptionInfo {
            optional: option.bool_or("optional", false)?,
            default_on: option.bool_or("default", false)?,
            description: option
                .opt_str("description")?
                .unwrap_or("No description")
                .to_string(),
        }))
    }
}

/// Optional-component declaration carried by a descriptor.
#[derive(Debug, Clone)]
pub struct OptionInfo {
    pub optional: bool,
    pub default_on: bool,
    pub description: String,
}

/// Component name: descriptor basename minus the metafile suffix.
pub(crate) fn component_name(path: &str) -> String {
    let basename = match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    };
    basename
        .strip_suffix(METAFILE_SUFFIX)
        .unwrap_or(basename)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metafile(path: &str, body: &str) -> Metafile {
        Metafile::new(
            path.to_string(),
            "sha256:aa".to_string(),
            Document::parse(path, body.as_bytes()).unwrap(),
        )
    }

    #[test]
    fn test_component_name_strips_suffix() {
        assert_eq!(component_name("mods/sodium.pw.toml"), "sodium");
        assert_eq!(component_name("sodium.pw.toml"), "sodium");
        assert_eq!(component_name("mods/readme.toml"), "readme.toml");
    }

    #[test]
    fn test_target_joins_descriptor_directory() {
        let mf = metafile("mods/sodium.pw.toml", "filename = \"sodium-5.jar\"");
        assert_eq!(mf.target().unwrap(), "mods/sodium-5.jar");
    }

    #[test]
    fn test_target_at_pack_root() {
        let mf = metafile("icon.pw.toml", "filename = \"icon.png\"");
        assert_eq!(mf.target().unwrap(), "icon.png");
    }

    #[test]
    fn test_target_normalizes_backslashes() {
        let mf = metafile("mods/sodium.pw.toml", "filename = \"sub\\\\sodium.jar\"");
        assert_eq!(mf.target().unwrap(), "mods/sub/sodium.jar");
    }

    #[test]
    fn test_side_eligibility() {
        assert!(side_eligible(None, Side::Client));
        assert!(side_eligible(Some("both"), Side::Server));
        assert!(side_eligible(Some("client"), Side::Client));
        assert!(!side_eligible(Some("client"), Side::Server));
        assert!(!side_eligible(Some("weird"), Side::Client));
    }

    #[test]
    fn test_option_info_absent() {
        let mf = metafile("mods/a.pw.toml", "filename = \"a.jar\"");
        assert!(mf.option_info().unwrap().is_none());
    }

    #[test]
    fn test_option_info_parsed() {
        let mf = metafile(
            "mods/a.pw.toml",
            "filename = \"a.jar\"\n[option]\noptional = true\ndefault = true\ndescription = \"Extra\"",
        );
        let info = mf.option_info().unwrap().unwrap();
        assert!(info.optional);
        assert!(info.default_on);
        assert_eq!(info.description, "Extra");
    }

    #[test]
    fn test_display_name_falls_back_to_component() {
        let named = metafile("mods/a.pw.toml", "name = \"Alpha\"\nfilename = \"a.jar\"");
        assert_eq!(named.display_name().unwrap(), "Alpha");
        let bare = metafile("mods/a.pw.toml", "filename = \"a.jar\"");
        assert_eq!(bare.display_name().unwrap(), "a");
    }
}
