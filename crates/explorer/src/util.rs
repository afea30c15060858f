use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

/// Writes `data` to a `.tmp` sibling, flushes it to disk, then renames over `path`.
/// 先寫入 `.tmp` 暫存檔並同步至磁碟，再以 rename 取代目標檔案。
pub fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("tmp");
    let mut file = File::create(&tmp_path)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);
    fs::rename(&tmp_path, path)
}
