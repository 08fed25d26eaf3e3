use anyhow::{Context, Result};
use colored::Colorize;
use regex::Regex;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;
use validator::Validate;

use fleet_gateway_core::{Position, Route};

const MIGRATIONS_DIR: &str = "migrations";
const SCHEMA_MIGRATIONS_TABLE: &str = "schema_migrations";

#[derive(Debug, Clone)]
struct Migration {
    version: String,
    name: String,
    sql: String,
}

pub async fn migrate(database_url: &str, dry_run: bool) -> Result<()> {
    println!("{}", "Running catalog migrations...".cyan().bold());

    let pool = create_pool(database_url).await?;
    ensure_migrations_table(&pool).await?;

    let migrations = load_migrations()?;
    let applied = get_applied_versions(&pool).await?;

    let pending: Vec<_> = migrations
        .iter()
        .filter(|m| !applied.contains(&m.version))
        .collect();

    if pending.is_empty() {
        println!("{}", "No pending migrations.".green());
        return Ok(());
    }

    println!(
        "\n{} {} migration(s) to apply:\n",
        "Found".cyan(),
        pending.len()
    );

    for migration in &pending {
        println!("  {} {}", "→".cyan(), migration.name.white());
    }

    if dry_run {
        println!("\n{}", "DRY RUN - No changes applied".yellow().bold());
        return Ok(());
    }

    println!();

    for migration in pending {
        apply_migration(&pool, migration).await?;
    }

    println!(
        "\n{}",
        "All migrations applied successfully!".green().bold()
    );

    Ok(())
}

pub async fn seed(database_url: &str, file: Option<&Path>, dry_run: bool) -> Result<()> {
    println!("{}", "Seeding route catalog...".cyan().bold());

    let routes = match file {
        Some(path) => load_routes_from_file(path)?,
        None => demo_routes(),
    };

    for route in &routes {
        route
            .validate()
            .with_context(|| format!("Route '{}' failed validation", route.route_id))?;
    }

    println!(
        "\n{} {} route(s) to insert:\n",
        "Found".cyan(),
        routes.len()
    );

    for route in &routes {
        println!(
            "  {} {} ({})",
            "→".cyan(),
            route.route_id.white(),
            route.title
        );
    }

    if dry_run {
        println!("\n{}", "DRY RUN - No changes applied".yellow().bold());
        return Ok(());
    }

    println!();

    let pool = create_pool(database_url).await?;

    for route in &routes {
        upsert_route(&pool, route).await?;
    }

    println!("\n{}", "Catalog seeded successfully!".green().bold());

    Ok(())
}

pub async fn list(database_url: &str) -> Result<()> {
    let pool = create_pool(database_url).await?;

    let rows = sqlx::query(
        r#"
        SELECT route_id, title, start_lat, start_lng, end_lat, end_lng
        FROM routes
        ORDER BY route_id
        "#,
    )
    .fetch_all(&pool)
    .await
    .context("Failed to fetch routes")?;

    println!("{}\n", "Route Catalog".cyan().bold());
    println!(
        "{:<20} {:<30} {:<22} {}",
        "Route ID".bold(),
        "Title".bold(),
        "Start".bold(),
        "End".bold()
    );
    println!("{}", "─".repeat(92).dimmed());

    for row in &rows {
        let route_id: String = row.get("route_id");
        let title: String = row.get("title");
        let start = format_position(row.get("start_lat"), row.get("start_lng"));
        let end = format_position(row.get("end_lat"), row.get("end_lng"));

        println!("{:<20} {:<30} {:<22} {}", route_id, title, start, end);
    }

    println!();
    println!(
        "{} {} route(s) in the catalog",
        "Summary:".cyan().bold(),
        rows.len()
    );

    Ok(())
}

async fn create_pool(database_url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await
        .context("Failed to connect to database")
}

async fn ensure_migrations_table(pool: &PgPool) -> Result<()> {
    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            version VARCHAR(255) PRIMARY KEY,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
        SCHEMA_MIGRATIONS_TABLE
    ))
    .execute(pool)
    .await
    .context("Failed to create schema_migrations table")?;

    Ok(())
}

fn load_migrations() -> Result<Vec<Migration>> {
    let migrations_dir = Path::new(MIGRATIONS_DIR);

    if !migrations_dir.exists() {
        return Ok(Vec::new());
    }

    let version_regex = Regex::new(r"^(\d+)_(.+)\.sql$")?;
    let mut migrations = Vec::new();

    for entry in fs::read_dir(migrations_dir).context("Failed to read migrations directory")? {
        let entry = entry?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .context("Invalid filename")?;

        if let Some(captures) = version_regex.captures(filename) {
            let version = captures
                .get(1)
                .context("Migration filename is missing its version")?
                .as_str()
                .to_string();
            let name = captures
                .get(2)
                .context("Migration filename is missing its name")?
                .as_str()
                .to_string();

            let sql = fs::read_to_string(&path).context("Failed to read migration file")?;

            migrations.push(Migration { version, name, sql });
        }
    }

    migrations.sort_by(|a, b| {
        a.version
            .parse::<u32>()
            .unwrap_or(0)
            .cmp(&b.version.parse::<u32>().unwrap_or(0))
    });

    Ok(migrations)
}

async fn get_applied_versions(pool: &PgPool) -> Result<HashSet<String>> {
    let rows = sqlx::query(&format!(
        "SELECT version FROM {} ORDER BY version",
        SCHEMA_MIGRATIONS_TABLE
    ))
    .fetch_all(pool)
    .await
    .context("Failed to fetch applied migrations")?;

    Ok(rows.into_iter().map(|row| row.get("version")).collect())
}

async fn apply_migration(pool: &PgPool, migration: &Migration) -> Result<()> {
    print!("Applying {} ... ", migration.name.white());

    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    sqlx::query(&migration.sql)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to execute migration {}", migration.version))?;

    sqlx::query(&format!(
        "INSERT INTO {} (version) VALUES ($1)",
        SCHEMA_MIGRATIONS_TABLE
    ))
    .bind(&migration.version)
    .execute(&mut *tx)
    .await
    .context("Failed to record migration")?;

    tx.commit().await.context("Failed to commit transaction")?;

    println!("{}", "DONE".green());

    Ok(())
}

async fn upsert_route(pool: &PgPool, route: &Route) -> Result<()> {
    print!("Inserting {} ... ", route.route_id.white());

    sqlx::query(
        r#"
        INSERT INTO routes (route_id, title, start_lat, start_lng, end_lat, end_lng)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (route_id) DO UPDATE SET
            title = EXCLUDED.title,
            start_lat = EXCLUDED.start_lat,
            start_lng = EXCLUDED.start_lng,
            end_lat = EXCLUDED.end_lat,
            end_lng = EXCLUDED.end_lng
        "#,
    )
    .bind(&route.route_id)
    .bind(&route.title)
    .bind(route.start_position.lat)
    .bind(route.start_position.lng)
    .bind(route.end_position.lat)
    .bind(route.end_position.lng)
    .execute(pool)
    .await
    .with_context(|| format!("Failed to insert route {}", route.route_id))?;

    println!("{}", "DONE".green());

    Ok(())
}

fn load_routes_from_file(path: &Path) -> Result<Vec<Route>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read route file {}", path.display()))?;

    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse route file {}", path.display()))
}

/// The routes the relay serves when no database is configured
fn demo_routes() -> Vec<Route> {
    vec![
        Route::new(
            "airport-express",
            "Airport Express",
            Position::new(44.8184, 20.4581),
            Position::new(44.8210, 20.2922),
        ),
        Route::new(
            "harbor-loop",
            "Harbor Loop",
            Position::new(44.8231, 20.4532),
            Position::new(44.8366, 20.4201),
        ),
        Route::new(
            "campus-shuttle",
            "Campus Shuttle",
            Position::new(44.8048, 20.4781),
            Position::new(44.8125, 20.4612),
        ),
    ]
}

fn format_position(lat: f64, lng: f64) -> String {
    format!("{:.4}, {:.4}", lat, lng)
}
