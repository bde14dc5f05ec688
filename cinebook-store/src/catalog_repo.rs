use async_trait::async_trait;
use uuid::Uuid;
use sqlx::PgPool;
use chrono::{DateTime, Utc};
use cinebook_catalog::{Movie, Show};
use cinebook_core::repository::{CatalogStore, StoreResult};
use crate::database::store_error;

pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct MovieRow {
    id: Uuid,
    title: String,
}

#[derive(sqlx::FromRow)]
struct ShowRow {
    show_id: i32,
    show_timing: DateTime<Utc>,
    unit_price: i64,
    capacity: i32,
    available_seats: i32,
}

impl From<ShowRow> for Show {
    fn from(row: ShowRow) -> Self {
        Show {
            id: row.show_id,
            show_timing: row.show_timing,
            unit_price: row.unit_price,
            capacity: row.capacity,
            available_seats: row.available_seats,
        }
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn get_movie(&self, movie_id: Uuid) -> StoreResult<Option<Movie>> {
        let movie = sqlx::query_as::<_, MovieRow>("SELECT id, title FROM movies WHERE id = $1")
            .bind(movie_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

        let Some(movie) = movie else {
            return Ok(None);
        };

        let shows = sqlx::query_as::<_, ShowRow>(
            r#"
            SELECT show_id, show_timing, unit_price, capacity, available_seats
            FROM shows WHERE movie_id = $1 ORDER BY show_id
            "#,
        )
        .bind(movie_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(Some(Movie {
            id: movie.id,
            title: movie.title,
            shows: shows.into_iter().map(Show::from).collect(),
        }))
    }

    async fn get_show(&self, movie_id: Uuid, show_id: i32) -> StoreResult<Option<Show>> {
        let row = sqlx::query_as::<_, ShowRow>(
            r#"
            SELECT show_id, show_timing, unit_price, capacity, available_seats
            FROM shows WHERE movie_id = $1 AND show_id = $2
            "#,
        )
        .bind(movie_id)
        .bind(show_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(row.map(Show::from))
    }

    async fn compare_and_set_seats(
        &self,
        movie_id: Uuid,
        show_id: i32,
        expected: i32,
        new: i32,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE shows SET available_seats = $4
            WHERE movie_id = $1 AND show_id = $2
              AND available_seats = $3
              AND $4 >= 0 AND $4 <= capacity
            "#,
        )
        .bind(movie_id)
        .bind(show_id)
        .bind(expected)
        .bind(new)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn release_seats(&self, movie_id: Uuid, show_id: i32, seats: i32) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE shows SET available_seats = available_seats + $3
            WHERE movie_id = $1 AND show_id = $2
              AND available_seats + $3 <= capacity
            "#,
        )
        .bind(movie_id)
        .bind(show_id)
        .bind(seats)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(result.rows_affected() == 1)
    }
}
