//! CLI command implementations

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use tandem_core::db::Database;
use tandem_core::extract::Extractor;
use tandem_core::models::ExtractedEmail;
use tandem_core::Config;

fn open_db(path: &Path) -> Result<Database> {
    let path_str = path
        .to_str()
        .context("Database path is not valid UTF-8")?;
    Ok(Database::new(path_str)?)
}

/// Initialize the database (runs migrations and seeds default categories)
pub fn cmd_init(db_path: &Path) -> Result<()> {
    let db = open_db(db_path)?;
    info!("Database initialized at {}", db.path());
    println!("Database ready: {}", db.path());
    Ok(())
}

/// Start the API server
pub async fn cmd_serve(db_path: &Path, host: &str, port: u16) -> Result<()> {
    let config = Config::from_env()?;
    let db = open_db(db_path)?;
    tandem_server::serve(db, config, host, port).await
}

/// Show database status
pub fn cmd_status(db_path: &Path) -> Result<()> {
    if !db_path.exists() {
        println!("No database at {} (run `tandem init`)", db_path.display());
        return Ok(());
    }

    let db = open_db(db_path)?;
    let conn = db.conn()?;

    let count = |table: &str| -> Result<i64> {
        Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
            row.get(0)
        })?)
    };

    println!("Database: {}", db.path());
    println!("  Profiles:    {}", count("profiles")?);
    println!("  Expenses:    {}", count("expenses")?);
    println!("  Categories:  {}", count("categories")?);
    println!("  Invites:     {}", count("partner_invites")?);

    Ok(())
}

/// List expense categories (shared defaults plus any custom ones)
pub fn cmd_categories(db_path: &Path) -> Result<()> {
    let db = open_db(db_path)?;
    let conn = db.conn()?;

    let mut stmt = conn.prepare(
        "SELECT name, color, user_id IS NULL FROM categories ORDER BY user_id IS NULL DESC, name",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, bool>(2)?,
        ))
    })?;

    for row in rows {
        let (name, color, shared) = row?;
        let scope = if shared { "shared" } else { "custom" };
        println!("{:<20} {}  ({})", name, color, scope);
    }

    Ok(())
}

/// Run the extractor over a local file: subject on the first line, body after.
/// Prints the extracted draft as JSON, for tuning the patterns against real
/// emails without a Gmail round trip.
pub fn cmd_extract(file: &Path) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let (subject, body) = match text.split_once('\n') {
        Some((first, rest)) => (first.trim().to_string(), rest.to_string()),
        None => (text.trim().to_string(), String::new()),
    };

    let email = ExtractedEmail {
        id: "local".to_string(),
        subject,
        body,
        ..Default::default()
    };

    match Extractor::new().extract(&email) {
        Some(draft) => println!("{}", serde_json::to_string_pretty(&draft)?),
        None => println!("No amount found; this email would be skipped"),
    }

    Ok(())
}
