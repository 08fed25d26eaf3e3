/// Route catalog lookups
///
/// Read-only view of the known routes. Activation deliberately does not
/// consult the catalog: dispatch tooling may hand out route ids before they
/// are persisted here.
use anyhow::{Context, Result};
use parking_lot::RwLock;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::collections::HashMap;

use fleet_gateway_core::{Position, Route};

/// Route catalog trait for lookup operations
#[async_trait::async_trait]
pub trait RouteCatalog: Send + Sync {
    /// All known routes, ordered by id
    async fn list_routes(&self) -> Result<Vec<Route>>;

    /// Look up a single route
    async fn get_route(&self, route_id: &str) -> Result<Option<Route>>;
}

/// PostgreSQL implementation of RouteCatalog
pub struct PostgresRouteCatalog {
    pool: PgPool,
}

impl PostgresRouteCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn route_from_row(row: &PgRow) -> Result<Route> {
        let route_id: String = row.try_get("route_id")?;
        let title: String = row.try_get("title")?;
        let start_lat: f64 = row.try_get("start_lat")?;
        let start_lng: f64 = row.try_get("start_lng")?;
        let end_lat: f64 = row.try_get("end_lat")?;
        let end_lng: f64 = row.try_get("end_lng")?;

        Ok(Route::new(
            route_id,
            title,
            Position::new(start_lat, start_lng),
            Position::new(end_lat, end_lng),
        ))
    }
}

#[async_trait::async_trait]
impl RouteCatalog for PostgresRouteCatalog {
    async fn list_routes(&self) -> Result<Vec<Route>> {
        let rows = sqlx::query(
            r#"
            SELECT route_id, title, start_lat, start_lng, end_lat, end_lng
            FROM routes
            ORDER BY route_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list routes")?;

        rows.iter().map(Self::route_from_row).collect()
    }

    async fn get_route(&self, route_id: &str) -> Result<Option<Route>> {
        let row = sqlx::query(
            r#"
            SELECT route_id, title, start_lat, start_lng, end_lat, end_lng
            FROM routes
            WHERE route_id = $1
            "#,
        )
        .bind(route_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load route")?;

        row.as_ref().map(Self::route_from_row).transpose()
    }
}

/// In-memory catalog for tests and broker-only deployments
pub struct InMemoryRouteCatalog {
    routes: RwLock<HashMap<String, Route>>,
}

impl InMemoryRouteCatalog {
    pub fn new() -> Self {
        Self {
            routes: RwLock::new(HashMap::new()),
        }
    }

    /// Catalog preloaded with the built-in demo routes
    pub fn with_demo_routes() -> Self {
        let catalog = Self::new();

        catalog.insert(Route::new(
            "airport-express",
            "Airport Express",
            Position::new(44.8184, 20.4581),
            Position::new(44.8210, 20.2922),
        ));
        catalog.insert(Route::new(
            "harbor-loop",
            "Harbor Loop",
            Position::new(44.8231, 20.4532),
            Position::new(44.8366, 20.4201),
        ));
        catalog.insert(Route::new(
            "campus-shuttle",
            "Campus Shuttle",
            Position::new(44.8048, 20.4781),
            Position::new(44.8125, 20.4612),
        ));

        catalog
    }

    /// Insert or replace a route
    pub fn insert(&self, route: Route) {
        self.routes.write().insert(route.route_id.clone(), route);
    }
}

impl Default for InMemoryRouteCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RouteCatalog for InMemoryRouteCatalog {
    async fn list_routes(&self) -> Result<Vec<Route>> {
        let mut routes: Vec<Route> = self.routes.read().values().cloned().collect();
        routes.sort_by(|a, b| a.route_id.cmp(&b.route_id));
        Ok(routes)
    }

    async fn get_route(&self, route_id: &str) -> Result<Option<Route>> {
        Ok(self.routes.read().get(route_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_catalog_lookup() {
        let catalog = InMemoryRouteCatalog::new();
        catalog.insert(Route::new(
            "line-42",
            "Line 42",
            Position::new(44.8, 20.4),
            Position::new(44.9, 20.5),
        ));

        let route = catalog.get_route("line-42").await.unwrap();
        assert_eq!(route.unwrap().title, "Line 42");

        let missing = catalog.get_route("line-99").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_list_routes_is_ordered_by_id() {
        let catalog = InMemoryRouteCatalog::new();
        catalog.insert(Route::new(
            "b-line",
            "B Line",
            Position::new(44.8, 20.4),
            Position::new(44.9, 20.5),
        ));
        catalog.insert(Route::new(
            "a-line",
            "A Line",
            Position::new(44.8, 20.4),
            Position::new(44.9, 20.5),
        ));

        let routes = catalog.list_routes().await.unwrap();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].route_id, "a-line");
        assert_eq!(routes[1].route_id, "b-line");
    }

    #[tokio::test]
    async fn test_demo_catalog_is_populated() {
        let catalog = InMemoryRouteCatalog::with_demo_routes();

        let routes = catalog.list_routes().await.unwrap();
        assert_eq!(routes.len(), 3);

        let route = catalog.get_route("airport-express").await.unwrap();
        assert!(route.is_some());
    }

    #[tokio::test]
    async fn test_insert_replaces_existing_route() {
        let catalog = InMemoryRouteCatalog::new();
        catalog.insert(Route::new(
            "line-42",
            "Old Title",
            Position::new(44.8, 20.4),
            Position::new(44.9, 20.5),
        ));
        catalog.insert(Route::new(
            "line-42",
            "New Title",
            Position::new(44.8, 20.4),
            Position::new(44.9, 20.5),
        ));

        let routes = catalog.list_routes().await.unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].title, "New Title");
    }
}
