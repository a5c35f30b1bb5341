//! Status command for showing the store location and its contents.

use std::io::Write;
use std::path::Path;

use anyhow::Result;

use sl_db::Database;

pub fn run<W: Write>(writer: &mut W, db: &Database, database_path: &Path) -> Result<()> {
    let counts = db.record_counts()?;

    writeln!(writer, "Shiftline status")?;
    writeln!(writer, "Database: {}", database_path.display())?;

    if counts.works + counts.changes + counts.breaks == 0 {
        writeln!(writer, "No records stored.")?;
        return Ok(());
    }

    writeln!(writer, "Works: {}", counts.works)?;
    writeln!(writer, "Changes: {}", counts.changes)?;
    writeln!(writer, "Breaks: {}", counts.breaks)?;
    Ok(())
}
