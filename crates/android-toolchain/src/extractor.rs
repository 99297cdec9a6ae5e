//! Archive Extraction
//!
//! Unpacks zip and tar.gz archives with leading-segment stripping and include
//! filters, and pulls single files out of zip archives.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};
use flate2::read::GzDecoder;
use glob::Pattern;
use tracing::{info, debug, warn};

use sdkdeps_core::{ArchiveKind, ExtractFilter};

/// Archive error types
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("Invalid include pattern {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("Path traversal detected in archive: {0}")]
    PathTraversal(String),
    #[error("No entry named {name} in {}", .archive.display())]
    MissingEntry { archive: PathBuf, name: String },
}

/// How entries are selected and renamed while unpacking
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    pub strip_levels: usize,
    pub include: Vec<Pattern>,
    pub include_empty_dirs: bool,
}

impl ExtractOptions {
    pub fn from_filter(filter: &ExtractFilter, strip_levels: usize) -> Result<Self, ArchiveError> {
        let include = filter
            .include
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|e| ArchiveError::InvalidPattern {
                    pattern: p.clone(),
                    reason: e.msg.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            strip_levels,
            include,
            include_empty_dirs: filter.include_empty_dirs,
        })
    }

    fn matches(&self, original: &str) -> bool {
        if self.include.is_empty() {
            return true;
        }
        let normalized = normalized_segments(original).join("/");
        self.include.iter().any(|p| p.matches(&normalized))
    }

    /// Destination of an entry relative to the target directory, `None` if it is skipped
    fn plan(&self, original: &str, is_dir: bool) -> Result<Option<PathBuf>, ArchiveError> {
        if is_dir && !self.include_empty_dirs {
            return Ok(None);
        }
        if !self.matches(original) {
            return Ok(None);
        }
        let Some(stripped) = strip_leading_components(original, self.strip_levels) else {
            return Ok(None);
        };
        if stripped.split('/').any(|s| s == "..") {
            return Err(ArchiveError::PathTraversal(original.to_string()));
        }
        Ok(Some(stripped.split('/').collect()))
    }
}

/// Counts of what an extraction wrote
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractReport {
    pub files: usize,
    pub dirs: usize,
}

fn normalized_segments(path: &str) -> Vec<&str> {
    path.split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect()
}

/// Fail if an existing symlink on the way to `relative` resolves outside `root`.
///
/// `root` must be canonical.
fn check_inside(root: &Path, relative: &Path) -> Result<(), ArchiveError> {
    let mut current = root.to_path_buf();
    for component in relative.components() {
        current.push(component);
        let Ok(meta) = std::fs::symlink_metadata(&current) else {
            break;
        };
        if meta.file_type().is_symlink() {
            let inside = current
                .canonicalize()
                .map(|resolved| resolved.starts_with(root))
                .unwrap_or(false);
            if !inside {
                return Err(ArchiveError::PathTraversal(relative.to_string_lossy().into_owned()));
            }
        }
    }
    Ok(())
}

/// Whether a symlink at `relative` pointing to `link` stays below the extraction root
fn link_stays_inside(relative: &Path, link: &Path) -> bool {
    let mut depth = relative.components().count() as isize - 1;
    for component in link.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    true
}

/// Drop the first `levels` segments of an archive path.
///
/// Empty and `.` segments are ignored, so `./a//b/` has the two segments `a`
/// and `b`. Returns `None` when nothing is left.
pub fn strip_leading_components(path: &str, levels: usize) -> Option<String> {
    let segments = normalized_segments(path);
    if segments.len() <= levels {
        return None;
    }
    Some(segments[levels..].join("/"))
}

/// Archive extractor
pub struct Extractor;

impl Extractor {
    /// Extract `archive` into `dest`
    pub fn extract(
        archive: &Path,
        kind: ArchiveKind,
        dest: &Path,
        options: &ExtractOptions,
    ) -> Result<ExtractReport, ArchiveError> {
        info!("Extracting {:?} to {:?}", archive, dest);
        std::fs::create_dir_all(dest)?;
        let root = dest.canonicalize()?;

        let report = match kind {
            ArchiveKind::Zip => Self::extract_zip(archive, &root, options)?,
            ArchiveKind::TarGz => Self::extract_tar_gz(archive, &root, options)?,
        };

        debug!("Extracted {} files, {} directories", report.files, report.dirs);
        Ok(report)
    }

    fn extract_zip(archive: &Path, dest: &Path, options: &ExtractOptions) -> Result<ExtractReport, ArchiveError> {
        let file = File::open(archive)?;
        let mut zip = zip::ZipArchive::new(BufReader::new(file))?;
        let mut report = ExtractReport::default();

        for i in 0..zip.len() {
            let mut entry = zip.by_index(i)?;
            let is_dir = entry.is_dir();

            let Some(relative) = options.plan(entry.name(), is_dir)? else {
                continue;
            };
            check_inside(dest, &relative)?;
            let outpath = dest.join(relative);

            if is_dir {
                std::fs::create_dir_all(&outpath)?;
                report.dirs += 1;
            } else {
                if let Some(parent) = outpath.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let mut outfile = File::create(&outpath)?;
                std::io::copy(&mut entry, &mut outfile)?;
                report.files += 1;
            }

            // Set permissions on Unix
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Some(mode) = entry.unix_mode() {
                    if let Err(e) = std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode)) {
                        warn!("Could not set mode {:o} on {:?}: {}", mode, outpath, e);
                    }
                }
            }
        }

        Ok(report)
    }

    fn extract_tar_gz(archive: &Path, dest: &Path, options: &ExtractOptions) -> Result<ExtractReport, ArchiveError> {
        let file = File::open(archive)?;
        let gz = GzDecoder::new(BufReader::new(file));
        Self::extract_tar_reader(gz, dest, options)
    }

    fn extract_tar_reader<R: Read>(reader: R, dest: &Path, options: &ExtractOptions) -> Result<ExtractReport, ArchiveError> {
        let mut tar = tar::Archive::new(reader);
        let mut report = ExtractReport::default();

        for entry in tar.entries()? {
            let mut entry = entry?;
            let entry_type = entry.header().entry_type();
            let is_dir = entry_type.is_dir();

            if !is_dir && !entry_type.is_file() && !entry_type.is_symlink() {
                continue;
            }

            let original = entry.path()?.to_string_lossy().into_owned();
            let Some(relative) = options.plan(&original, is_dir)? else {
                continue;
            };
            check_inside(dest, &relative)?;

            if entry_type.is_symlink() {
                let escapes = match entry.link_name()? {
                    Some(link) => !link_stays_inside(&relative, &link),
                    None => true,
                };
                if escapes {
                    return Err(ArchiveError::PathTraversal(original));
                }
            }
            let outpath = dest.join(relative);

            if is_dir {
                std::fs::create_dir_all(&outpath)?;
                report.dirs += 1;
            } else {
                if let Some(parent) = outpath.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                entry.unpack(&outpath)?;
                report.files += 1;
            }
        }

        Ok(report)
    }

    /// Copy the first zip entry whose file name is `name` to `target`
    pub fn extract_single(archive: &Path, name: &str, target: &Path) -> Result<(), ArchiveError> {
        let file = File::open(archive)?;
        let mut zip = zip::ZipArchive::new(BufReader::new(file))?;

        let mut index = None;
        for i in 0..zip.len() {
            let entry = zip.by_index(i)?;
            if !entry.is_dir() && normalized_segments(entry.name()).last() == Some(&name) {
                index = Some(i);
                break;
            }
        }

        let Some(index) = index else {
            return Err(ArchiveError::MissingEntry {
                archive: archive.to_path_buf(),
                name: name.to_string(),
            });
        };

        let mut entry = zip.by_index(index)?;
        debug!("Copying {} from {:?} to {:?}", entry.name(), archive, target);

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut partial = target.as_os_str().to_owned();
        partial.push(".part");
        let partial = PathBuf::from(partial);
        let copied = File::create(&partial).and_then(|mut outfile| std::io::copy(&mut entry, &mut outfile));
        if let Err(e) = copied {
            let _ = std::fs::remove_file(&partial);
            return Err(e.into());
        }
        std::fs::rename(&partial, target)?;
        Ok(())
    }
}
