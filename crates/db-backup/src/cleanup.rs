use std::{fs, io::ErrorKind, path::Path};

use tracing::{debug, error, info};

use crate::context::{Context, Stage};

/// Delete a cycle's dump and archive when `delete_after_upload` is set.
///
/// Each file is attempted on its own, a failure to delete one does not stop the other. Failures
/// are logged, never returned. Returns the number of files deleted.
pub fn cleanup(
    context: &mut Context,
    dump_path: &Path,
    archive_path: &Path,
    delete_after_upload: bool,
) -> usize {
    context.stage = Stage::CleaningUp;

    if !delete_after_upload {
        debug!("{context}Keeping {dump_path:?} and {archive_path:?}");
        return 0;
    }

    let removed = [dump_path, archive_path]
        .into_iter()
        .filter(|path| remove_file(context, path))
        .count();

    info!("{context}Deleted {removed} file(s)");

    removed
}

/// Delete a file, logging any failure. A file that does not exist counts as not deleted.
pub fn remove_file(context: &Context, path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!("{context}Deleted {path:?}");
            true
        }
        Err(error) if error.kind() == ErrorKind::NotFound => {
            debug!("{context}{path:?} is already gone");
            false
        }
        Err(error) => {
            error!("{context}Could not delete {path:?}: {error}");
            false
        }
    }
}
