use std::{fs::File, io, path::Path};

use anyhow::Context as _;
use tracing::debug;
use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

/// Zips every regular file directly inside `dir` into `archive_path`, each
/// stored at the root of the archive. Entries are added in name order.
pub fn zip_dir(dir: &Path, archive_path: &Path) -> anyhow::Result<()> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            entries.push(entry.path());
        }
    }
    entries.sort();

    let file = File::create(archive_path)
        .with_context(|| format!("failed to create {}", archive_path.display()))?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for path in entries {
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        debug!("adding {} to {}", name, archive_path.display());
        zip.start_file(name, options)?;
        io::copy(&mut File::open(&path)?, &mut zip)?;
    }
    zip.finish()?;
    Ok(())
}

#[cfg(test)]
mod test {
    use std::io::Read as _;

    use super::*;

    #[test]
    fn zips_files_at_archive_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("B01-Daily-2024-01-02.csv"), "b").unwrap();
        std::fs::write(dir.path().join("A01-Daily-2024-01-02.csv"), "a,1\n").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let out = tempfile::tempdir().unwrap();
        let archive_path = out.path().join("report.zip");
        zip_dir(dir.path(), &archive_path).unwrap();

        let mut archive = zip::ZipArchive::new(File::open(&archive_path).unwrap()).unwrap();
        let names: Vec<String> =
            (0..archive.len()).map(|i| archive.by_index(i).unwrap().name().to_owned()).collect();
        assert_eq!(names, vec!["A01-Daily-2024-01-02.csv", "B01-Daily-2024-01-02.csv"]);

        let mut content = String::new();
        archive.by_name("A01-Daily-2024-01-02.csv").unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "a,1\n");
    }

    #[test]
    fn empty_dir_gives_empty_archive() {
        let dir = tempfile::tempdir().unwrap();
        let archive_path = dir.path().join("empty.zip");
        let src = tempfile::tempdir().unwrap();
        zip_dir(src.path(), &archive_path).unwrap();
        let archive = zip::ZipArchive::new(File::open(&archive_path).unwrap()).unwrap();
        assert_eq!(archive.len(), 0);
    }
}
