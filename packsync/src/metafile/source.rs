//! Download-source resolution for descriptor-derived files.

use super::Metafile;
use crate::error::{Result, UpdateError};
use crate::manifest::loader::check_scheme;
use crate::plan::DownloadSource;

/// Download mode marking a CurseForge-hosted artifact.
const CURSEFORGE_MODE: &str = "metadata:curseforge";

/// CDN all CurseForge artifacts resolve against.
const FORGECDN_FILES_BASE: &str = "https://mediafilez.forgecdn.net/files";

/// Resolves where a descriptor's file downloads from: a direct URL when one
/// is declared (and passes the scheme guard), otherwise a recognized
/// vendor-specific derivation mode.
pub(crate) fn resolve_source(metafile: &Metafile, base_url: &str) -> Result<DownloadSource> {
    let root = metafile.document.root();
    let download = root.table("download")?;

    if let Some(url) = download.opt_str("url")? {
        if let Some(url) = check_scheme(base_url, url) {
            return Ok(DownloadSource {
                url,
                hostile: false,
            });
        }
    }

    match download.opt_str("mode")? {
        Some(mode) if mode == CURSEFORGE_MODE => {
            let meta = root.table("update")?.table("curseforge")?;
            let file_id = meta.int("file-id")?;
            let filename = root.str("filename")?;
            Ok(DownloadSource {
                url: forgecdn_url(file_id, filename),
                hostile: true,
            })
        }
        Some(mode) => Err(UpdateError::UnsupportedFormat(format!(
            "download mode `{mode}` for {}",
            metafile.path
        ))),
        None => Err(UpdateError::Malformed(format!(
            "{}: `download` declares neither a url nor a mode",
            metafile.path
        ))),
    }
}

/// Derives the CDN URL for a numeric artifact id. The decimal id splits
/// into a high half and a low half, with leading zeros stripped from the
/// low segment.
fn forgecdn_url(file_id: i64, filename: &str) -> String {
    let id = file_id.to_string();
    let split = (id.len() + 1) / 2;
    let (high, low) = id.split_at(split);
    let low = low.trim_start_matches('0');
    let filename = filename.replace('+', "%2B");
    format!("{FORGECDN_FILES_BASE}/{high}/{low}/{filename}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Document;

    fn metafile(body: &str) -> Metafile {
        Metafile::new(
            "mods/a.pw.toml".to_string(),
            "sha256:aa".to_string(),
            Document::parse("mods/a.pw.toml", body.as_bytes()).unwrap(),
        )
    }

    const BASE: &str = "https://example.com/pack/pack.toml";

    #[test]
    fn test_direct_url() {
        let mf = metafile(
            "filename = \"a.jar\"\n[download]\nurl = \"https://cdn.example.com/a.jar\"",
        );
        let source = resolve_source(&mf, BASE).unwrap();
        assert_eq!(source.url, "https://cdn.example.com/a.jar");
        assert!(!source.hostile);
    }

    #[test]
    fn test_bad_scheme_url_without_mode_fails() {
        let mf = metafile("filename = \"a.jar\"\n[download]\nurl = \"ftp://cdn/a.jar\"");
        assert!(resolve_source(&mf, BASE).is_err());
    }

    #[test]
    fn test_curseforge_mode_derives_cdn_url() {
        let mf = metafile(
            "filename = \"a.jar\"\n[download]\nmode = \"metadata:curseforge\"\n[update.curseforge]\nfile-id = 3040523",
        );
        let source = resolve_source(&mf, BASE).unwrap();
        assert_eq!(
            source.url,
            "https://mediafilez.forgecdn.net/files/3040/523/a.jar"
        );
        assert!(source.hostile);
    }

    #[test]
    fn test_curseforge_low_segment_strips_leading_zeros() {
        let mf = metafile(
            "filename = \"a.jar\"\n[download]\nmode = \"metadata:curseforge\"\n[update.curseforge]\nfile-id = 3040023",
        );
        let source = resolve_source(&mf, BASE).unwrap();
        assert_eq!(
            source.url,
            "https://mediafilez.forgecdn.net/files/3040/23/a.jar"
        );
    }

    #[test]
    fn test_curseforge_escapes_plus_in_filename() {
        let mf = metafile(
            "filename = \"a+b.jar\"\n[download]\nmode = \"metadata:curseforge\"\n[update.curseforge]\nfile-id = 12",
        );
        let source = resolve_source(&mf, BASE).unwrap();
        assert!(source.url.ends_with("/a%2Bb.jar"));
    }

    #[test]
    fn test_odd_length_id_splits_high_heavy() {
        assert_eq!(
            forgecdn_url(12345, "f.jar"),
            "https://mediafilez.forgecdn.net/files/123/45/f.jar"
        );
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        let mf = metafile("filename = \"a.jar\"\n[download]\nmode = \"metadata:modrinth\"");
        let err = resolve_source(&mf, BASE).unwrap_err();
        assert!(matches!(err, UpdateError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_missing_url_and_mode_is_malformed() {
        let mf = metafile("filename = \"a.jar\"\n[download]\nhash = \"aa\"");
        let err = resolve_source(&mf, BASE).unwrap_err();
        assert!(matches!(err, UpdateError::Malformed(_)));
    }
}
