use std::{fs, path::Path};

use rusqlite::{Connection, OpenFlags};

/// Opens (creating if needed) the SQLite file at `path` in WAL mode.
pub fn init_connection(path: &Path) -> Result<Connection, String> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| format!("fail to create cache directory {}. {}", parent.display(), e))?;
    }

    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
    );
    match conn {
        Ok(conn) => match conn.query_row("PRAGMA journal_mode=WAL;", [], |_row| Ok(())) {
            Ok(_) => Ok(conn),
            Err(e) => Err(format!("fail to execute PRAGMA journal_mode=WAL. {}", e)),
        },
        Err(e) => Err(format!("fail to open sqlite file {}. {}", path.display(), e)),
    }
}
