//! Working-copy files edited between CLI invocations.

use anyhow::{Context, Result};
use catalog_reconcile::{ImageContent, WorkingCopy};
use std::fs;
use std::path::Path;

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create parent directory '{}'", parent.display()))?;
    }
    Ok(())
}

pub fn read_working(path: &Path) -> Result<WorkingCopy> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read working copy '{}'", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Invalid working copy in '{}'", path.display()))
}

pub fn write_working(path: &Path, working: &WorkingCopy) -> Result<()> {
    ensure_parent_dir(path)?;
    let content = serde_json::to_string_pretty(working)?;
    fs::write(path, content)
        .with_context(|| format!("Failed to write working copy to '{}'", path.display()))
}

/// Reads every pending upload's bytes from its source file.
///
/// Upload bytes are not stored in the working file, so they have to be
/// loaded before validation can check their size.
pub async fn load_uploads(working: &mut WorkingCopy) -> Result<usize> {
    let mut loaded = 0;

    if let Some(upload) = working.product.image.as_mut() {
        upload
            .load_data()
            .await
            .with_context(|| format!("Failed to read product image '{}'", upload.file_name))?;
        loaded += 1;
    }

    for color in working.colors.iter_mut() {
        for image in color.item_mut().images.iter_mut() {
            if let ImageContent::Upload(upload) = &mut image.item_mut().content {
                upload
                    .load_data()
                    .await
                    .with_context(|| format!("Failed to read color image '{}'", upload.file_name))?;
                loaded += 1;
            }
        }
    }

    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_reconcile::{ColorImage, ColorVariant, Entry, ProductFields, RemoteId, Upload};
    use tempfile::tempdir;

    #[test]
    fn test_working_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("tote.json");

        let mut working = WorkingCopy::new(ProductFields::new("Tote", "10.00", Some(RemoteId(1))));
        working.colors.push(Entry::persisted(RemoteId(5), ColorVariant::new("Red", "#FF0000", 2)));
        write_working(&path, &working).unwrap();

        assert_eq!(read_working(&path).unwrap(), working);
    }

    #[test]
    fn test_read_working_reports_bad_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{not json").unwrap();

        let err = read_working(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid working copy"));
    }

    #[tokio::test]
    async fn test_load_uploads_reads_sources() {
        let dir = tempdir().unwrap();
        let image_path = dir.path().join("red.png");
        fs::write(&image_path, [1u8, 2, 3]).unwrap();

        let mut upload = Upload::new("red.png", "image/png", Vec::new());
        upload.source = Some(image_path);
        let mut working = WorkingCopy::new(ProductFields::new("Tote", "10.00", Some(RemoteId(1))));
        working.add_color(ColorVariant::new("Red", "#FF0000", 2).with_image(Entry::pending(ColorImage::upload(upload))));

        assert_eq!(load_uploads(&mut working).await.unwrap(), 1);
        match &working.colors[0].item().images[0].item().content {
            ImageContent::Upload(upload) => assert_eq!(upload.data, vec![1, 2, 3]),
            other => panic!("expected upload, got {:?}", other),
        }
    }
}
