use std::env;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use regex::Regex;
use tokio::fs;

use crate::ncm::{self, Music};
use crate::tag::{self, CoverMime};

static FILE_NAME_REGEX: OnceLock<Regex> = OnceLock::new();

/// Decode every *.ncm file in `ncm_dir` into `output_dir`, one task per
/// file. A failing file is reported and skipped; the batch always runs to
/// completion.
///
/// # Examples
///
/// ```
/// dump_dir("D:\\ncm", "D:\\music").await?;
/// ```
pub async fn dump_dir<P: AsRef<Path>>(ncm_dir: P, output_dir: P) -> Result<()> {
    create_dir(output_dir.as_ref()).await?;
    let files = collect_ncm_files(ncm_dir.as_ref()).await?;
    info!("found {} ncm files", files.len());
    let bar = Arc::new(
        ProgressBar::new(files.len() as u64)
            .with_style(ProgressStyle::with_template(
                "[{elapsed_precise}] {prefix:.bold} {wide_bar:.cyan/blue} {pos}/{len} {msg}",
            )?)
            .with_prefix("decoded"),
    );
    let mut tasks = Vec::with_capacity(files.len());
    for file in files {
        tasks.push(tokio::spawn(dump_file(
            file,
            PathBuf::from(output_dir.as_ref()),
            bar.clone(),
        )));
    }
    let mut failed = 0usize;
    for task in tasks {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                failed += 1;
                error!("{e:#}");
            }
            Err(e) => {
                failed += 1;
                error!("decode task panicked: {e}");
            }
        }
    }
    bar.finish_with_message("all done");
    if failed > 0 {
        warn!("{failed} files could not be decoded");
    }
    Ok(())
}

async fn collect_ncm_files(ncm_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(ncm_dir)
        .await
        .with_context(|| format!("reading input directory [{}]", ncm_dir.display()))?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "ncm") {
            files.push(path);
        }
    }
    Ok(files)
}

async fn dump_file(ncm_path: PathBuf, output_dir: PathBuf, bar: Arc<ProgressBar>) -> Result<()> {
    let result = dump_one(&ncm_path, &output_dir).await;
    bar.inc(1);
    result.with_context(|| format!("failed on [{}]", ncm_path.display()))
}

async fn dump_one(ncm_path: &Path, output_dir: &Path) -> Result<()> {
    let data = fs::read(ncm_path).await.context("reading container")?;
    let decoded = ncm::decode(&data)?;

    let out_path = output_dir.join(output_name(ncm_path, &decoded.metadata));
    if out_path.exists() {
        info!("output already exists, skipped: {:?}", out_path);
        return Ok(());
    }
    fs::write(&out_path, &decoded.audio)
        .await
        .with_context(|| format!("writing [{}]", out_path.display()))?;

    if decoded.cover.is_empty() {
        return Ok(());
    }
    match CoverMime::detect(&decoded.cover) {
        Ok(mime) => {
            if let Err(e) = tag::embed_cover(&out_path, &decoded.metadata.format, mime, decoded.cover)
            {
                // The audio itself is already written and playable.
                warn!("cover not embedded into {:?}: {e:#}", out_path);
            }
        }
        Err(_) => warn!("unrecognized cover image in {:?}, dropped", ncm_path),
    }
    Ok(())
}

/// `artist-title.format` when the metadata carries a title, otherwise the
/// input file's stem, with characters illegal in file names stripped.
fn output_name(ncm_path: &Path, metadata: &Music) -> String {
    let base = if metadata.music_name.is_empty() {
        ncm_path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("output")
            .to_string()
    } else {
        match metadata.artist.first() {
            Some((artist, _)) => format!("{}-{}", artist, metadata.music_name),
            None => metadata.music_name.clone(),
        }
    };
    legalized_file_name(&format!("{}.{}", base, metadata.format))
}

fn legalized_file_name(name: &str) -> String {
    FILE_NAME_REGEX
        .get_or_init(|| Regex::new(r#"[\\/:*?"<>|]"#).expect("static pattern"))
        .replace_all(name, "")
        .to_string()
}

async fn create_dir(dir: &Path) -> Result<()> {
    let path = if dir.is_relative() {
        env::current_dir()?.join(dir)
    } else {
        dir.to_path_buf()
    };
    if !path.exists() {
        fs::create_dir_all(dir).await?;
    }
    info!("decoded files will be saved to: {:?}", path);
    Ok(())
}
