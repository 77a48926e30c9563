use rand::{Rng, distr::Alphanumeric};
use scribbler_common::form::ValidImage;
use std::{
    io::{self, ErrorKind},
    path::PathBuf,
};
use tokio::{fs, io::AsyncWriteExt};
use tracing::debug;

pub const POST_IMAGE_DIR: &str = "posts";
const SUFFIX_LEN: usize = 7;
const MAX_NAME_ATTEMPTS: usize = 100;

/// Uploaded files below a root directory. Stored paths are relative to it and
/// always use `/` as separator.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct MediaStorage {
    root: PathBuf,
}

impl MediaStorage {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Writes the image below `posts/`. An existing file is never replaced;
    /// the name gets a random suffix instead.
    pub async fn save_post_image(&self, image: &ValidImage) -> io::Result<String> {
        let dir = self.root.join(POST_IMAGE_DIR);
        fs::create_dir_all(&dir).await?;

        let mut file_name = image.file_name.clone();
        for _ in 0..MAX_NAME_ATTEMPTS {
            let open = fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(dir.join(&file_name))
                .await;

            match open {
                Ok(mut file) => {
                    file.write_all(&image.bytes).await?;
                    file.flush().await?;

                    debug!(file_name, kind = image.kind.content_type(), "Stored post image");
                    return Ok(format!("{POST_IMAGE_DIR}/{file_name}"));
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    file_name = with_random_suffix(&image.file_name);
                }
                Err(err) => return Err(err),
            }
        }

        Err(io::Error::new(
            ErrorKind::AlreadyExists,
            format!("no free file name for {}", image.file_name),
        ))
    }

    /// Deletes a file by the path [`Self::save_post_image`] returned.
    pub async fn remove(&self, path: &str) -> io::Result<()> {
        fs::remove_file(self.root.join(path)).await?;
        debug!(path, "Removed media file");
        Ok(())
    }
}

/// `photo.png` becomes `photo_Xa81bQz.png`.
fn with_random_suffix(file_name: &str) -> String {
    let suffix: String = rand::rng()
        .sample_iter(Alphanumeric)
        .take(SUFFIX_LEN)
        .map(char::from)
        .collect();

    match file_name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => format!("{stem}_{suffix}.{extension}"),
        _ => format!("{file_name}_{suffix}"),
    }
}
