#![forbid(unsafe_code)]

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};
use walkdir::WalkDir;

use crate::pak::codec::{compress, decompress, Codec};
use crate::pak::entry::FileType;
use crate::pak::error::{PakError, PakResult};
use crate::pak::hash::hash;
use crate::pak::key::EntryKey;
use crate::pak::parser::{Extractors, PathSet};
use crate::pak::path::{should_include, split_absolute, VfsPath};
use crate::pak::read::decode;
use crate::pak::resolve::{ResolveOptions, ResolveReport, Resolver};
use crate::pak::vfs::VirtualFilesystem;

const ARCHIVE_EXTENSIONS: &[&str] = &["scs", "zip"];
const UNRESOLVED_DIR: &str = "_unresolved";

/// Archives opened from disk, resolved together.
#[derive(Debug)]
pub struct Resolved {
    pub paths: Vec<PathBuf>,
    pub archives: Vec<VirtualFilesystem>,
    pub report: ResolveReport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub archive: PathBuf,
    pub key: String,
    pub file_type: FileType,
    pub size: usize,
    pub codec: &'static str,
    pub encrypted: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub written: usize,
    pub skipped: usize,
}

/// Read and decode one archive file.
pub fn open(path: &Path) -> PakResult<VirtualFilesystem> {
    let bytes: Arc<[u8]> = fs::read(path)?.into();
    decode(bytes).map_err(|source| PakError::Archive {
        path: path.display().to_string(),
        source,
    })
}

/// `input` itself when it is a file, otherwise every archive below it in
/// file-name order.
pub fn collect_archives(input: &Path) -> PakResult<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }

    let mut out = Vec::new();
    for ent in WalkDir::new(input).follow_links(false).sort_by_file_name() {
        let ent = ent.map_err(|e| {
            let msg = e.to_string();
            let io = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, msg));
            PakError::Io(io)
        })?;

        if !ent.file_type().is_file() {
            continue;
        }
        let is_archive = ent
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| ARCHIVE_EXTENSIONS.iter().any(|a| a.eq_ignore_ascii_case(e)));
        if is_archive {
            out.push(ent.into_path());
        }
    }
    Ok(out)
}

/// Known paths, one per line. `#` starts a comment.
pub fn load_dictionary(path: &Path) -> PakResult<BTreeSet<VfsPath>> {
    let text = fs::read_to_string(path)?;
    Ok(text
        .lines()
        .map(|l| l.split('#').next().unwrap_or_default().trim())
        .filter(|l| !l.is_empty())
        .map(|l| VfsPath::new(split_absolute(l).1))
        .collect())
}

pub fn resolve_inputs(inputs: &[PathBuf], options: ResolveOptions) -> PakResult<Resolved> {
    let mut paths = Vec::new();
    for input in inputs {
        paths.extend(collect_archives(input)?);
    }
    if paths.is_empty() {
        return Err(PakError::Invalid("no archives found".into()));
    }

    let mut archives = Vec::with_capacity(paths.len());
    for path in &paths {
        let vfs = open(path)?;
        info!(archive = %path.display(), entries = vfs.len(), salt = vfs.salt(), "opened");
        archives.push(vfs);
    }

    let report = Resolver::new(options).resolve_all(&mut archives);
    Ok(Resolved {
        paths,
        archives,
        report,
    })
}

/// Entries of every archive. Unresolved entries only show up without filters.
pub fn entries(resolved: &Resolved, filter: &[String]) -> Vec<EntryInfo> {
    let mut out = Vec::new();
    for (archive, vfs) in resolved.paths.iter().zip(&resolved.archives) {
        for (key, entry) in vfs.iter() {
            let keep = match key {
                EntryKey::Path(p) => should_include(p, filter),
                EntryKey::Hash(_) => filter.is_empty(),
            };
            if !keep {
                continue;
            }
            out.push(EntryInfo {
                archive: archive.clone(),
                key: key.to_string(),
                file_type: entry.file_type(),
                size: entry.size(),
                codec: entry.compress_attr.map(|a| a.codec.name()).unwrap_or("none"),
                encrypted: entry.is_encrypted,
            });
        }
    }
    out
}

pub fn list(resolved: &Resolved, filter: &[String], verbose: bool) -> PakResult<()> {
    for e in entries(resolved, filter) {
        if verbose {
            println!(
                "{}  type={} size={} codec={}{}  ({})",
                e.key,
                e.file_type,
                e.size,
                e.codec,
                if e.encrypted { " encrypted" } else { "" },
                e.archive.display()
            );
        } else {
            println!("{}", e.key);
        }
    }
    let r = &resolved.report;
    println!(
        "{} resolved, {} unresolved, {} parse failures, {} passes",
        r.resolved, r.unresolved, r.parse_failures, r.passes
    );
    Ok(())
}

fn on_disk(output: &Path, path: &VfsPath) -> PathBuf {
    path.components().fold(output.to_path_buf(), |acc, c| acc.join(c))
}

/// Write resolved files under `output`. With `unresolved`, hash-keyed entries
/// are dumped as `_unresolved/<hash>`.
pub fn extract(resolved: &Resolved, output: &Path, filter: &[String], unresolved: bool) -> PakResult<ExtractSummary> {
    fs::create_dir_all(output)?;
    let mut summary = ExtractSummary::default();

    for vfs in &resolved.archives {
        for (key, entry) in vfs.iter() {
            let out_path = match key {
                EntryKey::Path(p) => {
                    if !should_include(p, filter) {
                        continue;
                    }
                    if entry.is_directory() {
                        fs::create_dir_all(on_disk(output, p))?;
                        continue;
                    }
                    on_disk(output, p)
                }
                EntryKey::Hash(h) => {
                    if !unresolved {
                        continue;
                    }
                    output.join(UNRESOLVED_DIR).join(h.to_string())
                }
            };

            let content = match entry.decoded() {
                Ok(c) => c,
                Err(e) => {
                    warn!(entry = %key, error = %e, "skipping entry");
                    summary.skipped += 1;
                    continue;
                }
            };
            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&out_path, &content)?;
            summary.written += 1;
        }
    }

    info!(written = summary.written, skipped = summary.skipped, "extract finished");
    Ok(summary)
}

/// Salted hash of each string, leading `/` ignored.
pub fn hash_strings(strings: &[String], salt: u16) -> Vec<(String, u64)> {
    strings
        .iter()
        .map(|s| {
            let path = VfsPath::new(split_absolute(s).1);
            (s.clone(), hash(path.as_str().as_bytes(), salt))
        })
        .collect()
}

/// Run an extractor over loose files. The type comes from the file name
/// unless `file_type` forces one.
pub fn parse_files(files: &[PathBuf], file_type: Option<FileType>) -> PakResult<Vec<(PathBuf, PathSet)>> {
    let extractors = Extractors::default();
    let mut out = Vec::with_capacity(files.len());
    for file in files {
        let ty = match file_type {
            Some(t) => t,
            None => {
                let name = file.file_name().and_then(|n| n.to_str()).unwrap_or_default();
                FileType::from_path(&VfsPath::new(name))
            }
        };
        let extract = extractors
            .get(ty)
            .ok_or_else(|| PakError::Invalid(format!("{}: no extractor for type {ty}", file.display())))?;
        let buf = fs::read(file)?;
        out.push((file.clone(), extract(&buf, None)?));
    }
    Ok(out)
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Compress each file to `<file>.compressed`. Returns the written paths.
pub fn compress_files(files: &[PathBuf], codec: Codec) -> PakResult<Vec<PathBuf>> {
    let mut out = Vec::with_capacity(files.len());
    for file in files {
        let packed = compress(&fs::read(file)?, codec)?;
        let target = with_suffix(file, ".compressed");
        fs::write(&target, &packed)?;
        info!(file = %file.display(), codec = %codec, bytes = packed.len(), "compressed");
        out.push(target);
    }
    Ok(out)
}

/// Decompress each file to `<file>.decompressed`. Returns the written paths.
pub fn decompress_files(files: &[PathBuf], codec: Codec) -> PakResult<Vec<PathBuf>> {
    let mut out = Vec::with_capacity(files.len());
    for file in files {
        let raw = decompress(&fs::read(file)?, codec, None)?;
        let target = with_suffix(file, ".decompressed");
        fs::write(&target, &raw)?;
        info!(file = %file.display(), codec = %codec, bytes = raw.len(), "decompressed");
        out.push(target);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pak::error::ExtractError;
    use crate::pak::fixture::{HashfsBuilder, ZipBuilder};
    use tempfile::tempdir;

    fn sample_archive() -> Vec<u8> {
        HashfsBuilder::new(0)
            .dir("", &["*def", "secret.bin"])
            .dir("def", &["city.sii", "*empty"])
            .compressed_file("def/city.sii", b"city_data : city.berlin {\n\tname: \"Berlin\"\n}\n")
            .dir("def/empty", &[])
            .encrypted_file("secret.bin", b"\x00\x01")
            .file("orphan.dat", b"who am i")
            .build()
    }

    #[test]
    fn collect_archives_walks_directories() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("dlc")).unwrap();
        fs::write(dir.path().join("base.scs"), sample_archive()).unwrap();
        fs::write(dir.path().join("dlc").join("extra.ZIP"), ZipBuilder::new().build()).unwrap();
        fs::write(dir.path().join("notes.txt"), b"no").unwrap();

        let found = collect_archives(dir.path()).unwrap();
        let names: Vec<String> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["base.scs", "extra.ZIP"]);

        let single = dir.path().join("notes.txt");
        assert_eq!(collect_archives(&single).unwrap(), vec![single]);
    }

    #[test]
    fn dictionary_file_feeds_seeds() {
        let dir = tempdir().unwrap();
        let dict = dir.path().join("paths.txt");
        fs::write(&dict, "# known\n/orphan.dat\n\nmap/europe.mbd  # trailing\n").unwrap();

        let seeds = load_dictionary(&dict).unwrap();
        assert_eq!(
            seeds.into_iter().collect::<Vec<_>>(),
            vec![VfsPath::new("map/europe.mbd"), VfsPath::new("orphan.dat")]
        );
    }

    #[test]
    fn resolve_and_extract_to_disk() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("base.scs");
        fs::write(&archive, sample_archive()).unwrap();

        let resolved = resolve_inputs(&[archive], ResolveOptions::default()).unwrap();
        assert_eq!(resolved.report.unresolved, 1);

        let out = dir.path().join("out");
        let summary = extract(&resolved, &out, &[], true).unwrap();
        assert_eq!(summary, ExtractSummary { written: 2, skipped: 1 });

        assert_eq!(
            fs::read(out.join("def").join("city.sii")).unwrap(),
            b"city_data : city.berlin {\n\tname: \"Berlin\"\n}\n"
        );
        assert!(!out.join("def").join("empty").exists());
        assert!(!out.join("secret.bin").exists());

        let orphan = format!("{:016x}", hash(b"orphan.dat", 0));
        assert_eq!(fs::read(out.join(UNRESOLVED_DIR).join(orphan)).unwrap(), b"who am i");
    }

    #[test]
    fn seeds_resolve_unlisted_entries() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("base.scs");
        fs::write(&archive, sample_archive()).unwrap();

        let options = ResolveOptions {
            seeds: BTreeSet::from([VfsPath::new("orphan.dat")]),
            ..ResolveOptions::default()
        };
        let resolved = resolve_inputs(&[archive], options).unwrap();
        assert_eq!(resolved.report.unresolved, 0);

        let listed: Vec<String> = entries(&resolved, &["def".to_string()])
            .into_iter()
            .map(|e| e.key)
            .collect();
        assert_eq!(listed, vec!["/def", "/def/city.sii"]);
    }

    #[test]
    fn broken_archive_names_the_file() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("bad.scs");
        fs::write(&archive, b"SCS#\x02\x00").unwrap();
        let err = open(&archive).unwrap_err();
        assert!(matches!(err, PakError::Archive { .. }));
        assert!(err.to_string().contains("bad.scs"));

        let empty = tempdir().unwrap();
        assert!(matches!(
            resolve_inputs(&[empty.path().to_path_buf()], ResolveOptions::default()),
            Err(PakError::Invalid(_))
        ));
    }

    #[test]
    fn hashes_ignore_the_leading_slash() {
        let got = hash_strings(&["/def".to_string(), "def".to_string(), String::new()], 0);
        assert_eq!(got[0].1, got[1].1);
        assert_eq!(got[2].1, crate::pak::hash::ROOT_HASH);
    }

    #[test]
    fn parse_files_picks_type_from_name() {
        let dir = tempdir().unwrap();
        let mat = dir.path().join("paint.mat");
        fs::write(&mat, "material : \"eut2.dif\" {\n\ttexture : \"paint.tobj\"\n}\n").unwrap();
        let bin = dir.path().join("blob.bin");
        fs::write(&bin, b"*x\n").unwrap();

        let parsed = parse_files(&[mat.clone()], None).unwrap();
        let found: Vec<String> = parsed[0].1.iter().map(|p| p.to_string()).collect();
        assert_eq!(found, vec!["paint.tobj"]);

        assert!(matches!(parse_files(&[bin.clone()], None), Err(PakError::Invalid(_))));
        let forced = parse_files(&[bin], Some(FileType::Directory)).unwrap();
        assert_eq!(forced[0].1.len(), 1);

        fs::write(&mat, b"not a model").unwrap();
        assert!(matches!(
            parse_files(&[mat], Some(FileType::Pmd)),
            Err(PakError::Extract(ExtractError::Truncated { .. }))
        ));
    }

    #[test]
    fn compress_then_decompress_files() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("city.sii");
        let text = b"city_data : city.berlin {\n\tname: \"Berlin\"\n}\n".repeat(8);
        fs::write(&file, &text).unwrap();

        for codec in [Codec::Zlib, Codec::Gzip, Codec::Raw] {
            let packed = compress_files(&[file.clone()], codec).unwrap();
            assert_eq!(packed, vec![dir.path().join("city.sii.compressed")]);
            assert!(fs::metadata(&packed[0]).unwrap().len() < text.len() as u64);

            let unpacked = decompress_files(&packed, codec).unwrap();
            assert_eq!(unpacked, vec![dir.path().join("city.sii.compressed.decompressed")]);
            assert_eq!(fs::read(&unpacked[0]).unwrap(), text);
        }
    }

    #[test]
    fn decompressing_with_the_wrong_codec_fails() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.bin");
        fs::write(&file, b"plain text, not a gzip stream").unwrap();
        assert!(matches!(
            decompress_files(&[file], Codec::Gzip),
            Err(PakError::Codec(_))
        ));
    }
}
