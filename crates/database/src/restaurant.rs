//! Restaurant operations.

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::Restaurant;
use crate::validation::validate_id;

/// Create a new restaurant.
pub async fn create_restaurant(pool: &SqlitePool, restaurant: &Restaurant) -> Result<()> {
    validate_id("restaurant_id", &restaurant.id)?;

    sqlx::query(
        r#"
        INSERT INTO restaurants (id, name, phone, address, cnpj, logo_url)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&restaurant.id)
    .bind(&restaurant.name)
    .bind(&restaurant.phone)
    .bind(&restaurant.address)
    .bind(&restaurant.cnpj)
    .bind(&restaurant.logo_url)
    .execute(pool)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return DatabaseError::AlreadyExists {
                    entity: "Restaurant",
                    id: restaurant.id.clone(),
                };
            }
        }
        DatabaseError::Sqlx(e)
    })?;

    Ok(())
}

/// Get a restaurant by ID.
pub async fn get_restaurant(pool: &SqlitePool, id: &str) -> Result<Restaurant> {
    sqlx::query_as::<_, Restaurant>(
        r#"
        SELECT id, name, phone, address, cnpj, logo_url
        FROM restaurants
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Restaurant",
        id: id.to_string(),
    })
}

/// Check whether a restaurant exists.
pub async fn restaurant_exists(pool: &SqlitePool, id: &str) -> Result<bool> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM restaurants WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row.is_some())
}

/// Fail with `NotFound` unless the restaurant exists.
pub async fn ensure_restaurant(pool: &SqlitePool, id: &str) -> Result<()> {
    if restaurant_exists(pool, id).await? {
        Ok(())
    } else {
        Err(DatabaseError::NotFound {
            entity: "Restaurant",
            id: id.to_string(),
        })
    }
}
