use anyhow::{Result, bail};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};
use uuid::Uuid;

/// Subdirectory of the media root holding profile pictures.
pub const AVATAR_DIR: &str = "avatars";

/// On-disk storage for uploaded avatars.
///
/// Each avatar is a flat file `{root}/avatars/{uuid}.{ext}`; the database keeps
/// the path relative to the media root, which is also the URL under `/media/`.
pub struct AvatarStore {
    root: PathBuf,
}

impl AvatarStore {
    pub async fn new(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(root.join(AVATAR_DIR)).await?;
        info!("Media directory: {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write an image and return its media-relative path.
    pub async fn save(&self, extension: &str, data: &[u8]) -> Result<String> {
        let relative = format!("{}/{}.{}", AVATAR_DIR, Uuid::new_v4(), extension);
        fs::write(self.root.join(&relative), data).await?;
        info!("Stored avatar {} ({} bytes)", relative, data.len());
        Ok(relative)
    }

    /// Remove a stored avatar. Missing files are not an error.
    pub async fn delete(&self, relative: &str) -> Result<()> {
        let inside = relative.starts_with(&format!("{}/", AVATAR_DIR))
            && !relative.split('/').any(|part| part == ".." || part.is_empty());
        if !inside {
            bail!("Refusing to delete '{}' outside the avatar directory", relative);
        }

        match fs::remove_file(self.root.join(relative)).await {
            Ok(()) => {
                info!("Deleted avatar {}", relative);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Avatar {} already gone", relative);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Sniff the image format from its leading bytes.
pub fn image_extension(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("png")
    } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("jpg")
    } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        Some("gif")
    } else if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
        Some("webp")
    } else {
        None
    }
}
