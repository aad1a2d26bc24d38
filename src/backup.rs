use anyhow::{Result, anyhow};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tracing::info;
use walkdir::WalkDir;

/// Archive the store directory.
///
///   series backup create                 -> series_backup_<time>.zip
///   series backup create my_backup       -> my_backup.tar.gz
///   series backup create my_backup.zip
pub fn backup_create(root: &Path, optional_path: Option<String>) -> Result<PathBuf> {
    if !root.exists() {
        return Err(anyhow!(
            "Series store does not exist at {}, add a series first.",
            root.display()
        ));
    }

    let timestamp = OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)?
        .replace(':', "-");
    let path = PathBuf::from(backup_path(optional_path.as_deref(), &timestamp));

    if path.extension().is_some_and(|e| e == "zip") {
        backup_zip(&path, root)?;
    } else {
        backup_tar_gz(&path, root)?;
    }

    info!(path = %path.display(), "backup written");
    Ok(path)
}

fn backup_path(optional_path: Option<&str>, timestamp: &str) -> String {
    match optional_path.map(str::trim) {
        None => format!("series_backup_{timestamp}.zip"),
        Some("") => format!("series_backup_{timestamp}.tar.gz"),
        Some(p)
            if p.ends_with(".tar.gz")
                || p.ends_with(".tgz")
                || p.ends_with(".gz")
                || p.ends_with(".zip") =>
        {
            p.to_string()
        }
        Some(p) => format!("{p}.tar.gz"),
    }
}

fn backup_tar_gz(path: &Path, root: &Path) -> Result<()> {
    use flate2::Compression;
    use flate2::write::GzEncoder;

    let encoder = GzEncoder::new(File::create(path)?, Compression::default());
    let mut archive = tar::Builder::new(encoder);
    for (file, name) in store_files(root)? {
        archive.append_path_with_name(&file, Path::new("series-store").join(name))?;
    }
    archive.into_inner()?.finish()?;
    Ok(())
}

fn backup_zip(path: &Path, root: &Path) -> Result<()> {
    use zip::CompressionMethod;
    use zip::ZipWriter;
    use zip::write::FileOptions;

    let mut archive = ZipWriter::new(File::create(path)?);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    for (file, name) in store_files(root)? {
        archive.start_file(name, options)?;
        io::copy(&mut File::open(&file)?, &mut archive)?;
    }
    archive.finish()?;
    Ok(())
}

/// Files under the store with their archive names; half-written `.tmp` tables are skipped.
fn store_files(root: &Path) -> Result<Vec<(PathBuf, String)>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().is_some_and(|e| e == "tmp") {
            continue;
        }
        let name = path.strip_prefix(root)?.to_string_lossy().replace('\\', "/");
        files.push((path.to_path_buf(), name));
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::Scratch;

    #[test]
    fn picks_archive_name() {
        let ts = "2026-10-19T10-00-00Z";
        assert_eq!(backup_path(None, ts), format!("series_backup_{ts}.zip"));
        assert_eq!(backup_path(Some(" "), ts), format!("series_backup_{ts}.tar.gz"));
        assert_eq!(backup_path(Some("mine"), ts), "mine.tar.gz");
        assert_eq!(backup_path(Some("mine.zip"), ts), "mine.zip");
        assert_eq!(backup_path(Some("mine.tgz"), ts), "mine.tgz");
    }

    #[test]
    fn writes_both_formats() {
        let store = Scratch::new("backup-store");
        std::fs::write(store.0.join("series.json"), "[]").unwrap();
        let out = Scratch::new("backup-out");

        for name in ["b.tar.gz", "b.zip"] {
            let target = out.0.join(name);
            let written =
                backup_create(&store.0, Some(target.to_string_lossy().into_owned())).unwrap();
            assert_eq!(written, target);
            assert!(std::fs::metadata(&written).unwrap().len() > 0);
        }
    }

    #[test]
    fn leftover_temp_tables_are_not_archived() {
        let store = Scratch::new("backup-files");
        std::fs::write(store.0.join("series.json"), "[]").unwrap();
        std::fs::write(store.0.join("series.json.tmp"), "[").unwrap();

        let names: Vec<String> = store_files(&store.0)
            .unwrap()
            .into_iter()
            .map(|(_, name)| name)
            .collect();
        assert_eq!(names, ["series.json"]);
    }

    #[test]
    fn missing_store_is_an_error() {
        let out = Scratch::new("backup-missing");
        assert!(backup_create(&out.0.join("nope"), None).is_err());
    }
}
