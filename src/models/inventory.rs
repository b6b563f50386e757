use crate::errors::AppError;
use crate::extract::non_empty;
use crate::models::{local_now, required};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool, Type};
use strum_macros::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize, EnumString, Display)]
#[sqlx(type_name = "adjustment_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AdjustmentType {
    Restock,
    Usage,
    Loss,
    Correction,
}

impl AdjustmentType {
    /// Stock after the adjustment; removals never go below zero.
    pub fn apply(self, current: i64, quantity: i64) -> i64 {
        match self {
            AdjustmentType::Restock => current.saturating_add(quantity),
            AdjustmentType::Usage | AdjustmentType::Loss => (current - quantity).max(0),
            AdjustmentType::Correction => quantity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize, Display)]
#[sqlx(type_name = "alert_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AlertType {
    OutOfStock,
    LowStock,
}

/// The alert an item at `stock` warrants, if any.
pub fn stock_alert(item_name: &str, unit_type: &str, stock: i64, threshold: i64) -> Option<(AlertType, String)> {
    if stock > threshold {
        None
    } else if stock <= 0 {
        Some((AlertType::OutOfStock, format!("{item_name} is out of stock")))
    } else {
        Some((
            AlertType::LowStock,
            format!("{item_name} is running low ({stock} {unit_type} remaining)"),
        ))
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct InventoryItem {
    pub id: i64,
    pub item_name: String,
    pub category: String,
    pub current_stock: i64,
    pub minimum_threshold: i64,
    pub unit_type: String,
    pub cost_per_unit: Option<f64>,
    pub supplier: Option<String>,
    pub notes: Option<String>,
    pub is_active: bool,
    pub last_restocked: Option<NaiveDate>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Adjustment {
    pub id: i64,
    pub inventory_item_id: i64,
    pub adjustment_type: AdjustmentType,
    pub quantity: i64,
    pub previous_stock: i64,
    pub new_stock: i64,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Alert {
    pub id: i64,
    pub inventory_item_id: i64,
    pub item_name: String,
    pub alert_type: AlertType,
    pub alert_message: String,
    pub is_resolved: bool,
    pub resolved_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Default, Deserialize)]
pub struct ItemInput {
    pub item_name: Option<String>,
    pub category: Option<String>,
    pub current_stock: Option<i64>,
    pub minimum_threshold: Option<i64>,
    pub unit_type: Option<String>,
    pub cost_per_unit: Option<f64>,
    pub supplier: Option<String>,
    pub notes: Option<String>,
}

struct ValidItem {
    item_name: String,
    category: String,
    current_stock: i64,
    minimum_threshold: i64,
    unit_type: String,
}

impl ItemInput {
    fn validate(&self) -> Result<ValidItem, AppError> {
        let item = ValidItem {
            item_name: required("item_name", &self.item_name)?,
            category: required("category", &self.category)?,
            current_stock: self.current_stock.unwrap_or(0),
            minimum_threshold: self.minimum_threshold.unwrap_or(0),
            unit_type: required("unit_type", &self.unit_type)?,
        };
        if item.current_stock < 0 {
            return Err(AppError::invalid_field(
                "current_stock",
                item.current_stock,
                "current_stock must not be negative",
            ));
        }
        if item.minimum_threshold < 0 {
            return Err(AppError::invalid_field(
                "minimum_threshold",
                item.minimum_threshold,
                "minimum_threshold must not be negative",
            ));
        }
        if let Some(cost) = self.cost_per_unit.filter(|cost| *cost < 0.0) {
            return Err(AppError::invalid_field("cost_per_unit", cost, "cost_per_unit must not be negative"));
        }
        Ok(item)
    }
}

#[derive(Debug, Deserialize)]
pub struct AdjustInput {
    pub adjustment_type: String,
    pub quantity: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AlertUpdate {
    pub is_resolved: bool,
}

impl InventoryItem {
    /// Active items: out of stock first, then low stock, then by name.
    pub async fn find_active(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, InventoryItem>(
            r#"
            SELECT * FROM inventory
            WHERE is_active = 1
            ORDER BY
                CASE
                    WHEN current_stock = 0 THEN 1
                    WHEN current_stock <= minimum_threshold THEN 2
                    ELSE 3
                END,
                item_name ASC
            "#,
        )
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, InventoryItem>("SELECT * FROM inventory WHERE id = ?1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn create(pool: &SqlitePool, data: &ItemInput, today: NaiveDate) -> Result<Self, AppError> {
        let valid = data.validate()?;
        let now = local_now();
        let mut tx = pool.begin().await?;

        let item = sqlx::query_as::<_, InventoryItem>(
            r#"
            INSERT INTO inventory (item_name, category, current_stock, minimum_threshold, unit_type,
                                   cost_per_unit, supplier, notes, last_restocked, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
            RETURNING *
            "#,
        )
        .bind(&valid.item_name)
        .bind(&valid.category)
        .bind(valid.current_stock)
        .bind(valid.minimum_threshold)
        .bind(&valid.unit_type)
        .bind(data.cost_per_unit)
        .bind(non_empty(&data.supplier))
        .bind(non_empty(&data.notes))
        .bind((valid.current_stock > 0).then_some(today))
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        if let Some((alert_type, message)) =
            stock_alert(&item.item_name, &item.unit_type, item.current_stock, item.minimum_threshold)
        {
            open_alert(&mut tx, item.id, alert_type, &message, now).await?;
        }

        tx.commit().await?;
        Ok(item)
    }

    pub async fn update(pool: &SqlitePool, id: i64, data: &ItemInput) -> Result<Self, AppError> {
        let valid = data.validate()?;
        sqlx::query_as::<_, InventoryItem>(
            r#"
            UPDATE inventory
            SET item_name = ?1, category = ?2, current_stock = ?3, minimum_threshold = ?4, unit_type = ?5,
                cost_per_unit = ?6, supplier = ?7, notes = ?8, updated_at = ?9
            WHERE id = ?10
            RETURNING *
            "#,
        )
        .bind(&valid.item_name)
        .bind(&valid.category)
        .bind(valid.current_stock)
        .bind(valid.minimum_threshold)
        .bind(&valid.unit_type)
        .bind(data.cost_per_unit)
        .bind(non_empty(&data.supplier))
        .bind(non_empty(&data.notes))
        .bind(local_now())
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Item not found"))
    }

    pub async fn deactivate(pool: &SqlitePool, id: i64) -> Result<Self, AppError> {
        sqlx::query_as::<_, InventoryItem>(
            "UPDATE inventory SET is_active = 0, updated_at = ?1 WHERE id = ?2 RETURNING *",
        )
        .bind(local_now())
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Item not found"))
    }

    /// Applies a stock adjustment, logs it, and opens or resolves the
    /// item's low-stock alert to match the new level.
    pub async fn adjust(pool: &SqlitePool, id: i64, data: &AdjustInput, today: NaiveDate) -> Result<Self, AppError> {
        let kind: AdjustmentType = data.adjustment_type.trim().parse().map_err(|_| {
            AppError::invalid_field(
                "adjustment_type",
                data.adjustment_type.as_str(),
                "adjustment_type must be one of: restock, usage, loss, correction",
            )
        })?;
        if data.quantity < 0 {
            return Err(AppError::invalid_field("quantity", data.quantity, "quantity must not be negative"));
        }

        let mut tx = pool.begin().await?;
        let current = sqlx::query_as::<_, InventoryItem>("SELECT * FROM inventory WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found("Item not found"))?;

        let new_stock = kind.apply(current.current_stock, data.quantity);
        let now = local_now();
        let last_restocked = if kind == AdjustmentType::Restock {
            Some(today)
        } else {
            current.last_restocked
        };

        let item = sqlx::query_as::<_, InventoryItem>(
            "UPDATE inventory SET current_stock = ?1, last_restocked = ?2, updated_at = ?3 \
             WHERE id = ?4 RETURNING *",
        )
        .bind(new_stock)
        .bind(last_restocked)
        .bind(now)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO inventory_adjustments (inventory_item_id, adjustment_type, quantity, previous_stock, new_stock,
                                               notes, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(id)
        .bind(kind)
        .bind(data.quantity)
        .bind(current.current_stock)
        .bind(new_stock)
        .bind(non_empty(&data.notes))
        .bind(now)
        .execute(&mut *tx)
        .await?;

        match stock_alert(&item.item_name, &item.unit_type, new_stock, item.minimum_threshold) {
            Some((alert_type, message)) => {
                let open: i64 = sqlx::query_scalar(
                    "SELECT COUNT(*) FROM inventory_alerts WHERE inventory_item_id = ?1 AND is_resolved = 0",
                )
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
                if open == 0 {
                    open_alert(&mut tx, id, alert_type, &message, now).await?;
                }
            }
            None => {
                sqlx::query(
                    "UPDATE inventory_alerts SET is_resolved = 1, resolved_at = ?1 \
                     WHERE inventory_item_id = ?2 AND is_resolved = 0",
                )
                .bind(now)
                .bind(id)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(item)
    }

    pub async fn adjustments(pool: &SqlitePool, id: i64) -> Result<Vec<Adjustment>, sqlx::Error> {
        sqlx::query_as::<_, Adjustment>(
            "SELECT * FROM inventory_adjustments WHERE inventory_item_id = ?1 ORDER BY created_at DESC, id DESC",
        )
        .bind(id)
        .fetch_all(pool)
        .await
    }
}

async fn open_alert(
    conn: &mut SqliteConnection,
    item_id: i64,
    alert_type: AlertType,
    message: &str,
    now: NaiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO inventory_alerts (inventory_item_id, alert_type, alert_message, created_at) VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(item_id)
    .bind(alert_type)
    .bind(message)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(())
}

const ALERT_SELECT: &str = r#"
    SELECT a.id, a.inventory_item_id, i.item_name, a.alert_type, a.alert_message,
           a.is_resolved, a.resolved_at, a.created_at
    FROM inventory_alerts a
    JOIN inventory i ON i.id = a.inventory_item_id
"#;

impl Alert {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!("{ALERT_SELECT} ORDER BY a.created_at DESC, a.id DESC");
        sqlx::query_as::<_, Alert>(&sql).fetch_all(pool).await
    }

    pub async fn set_resolved(pool: &SqlitePool, id: i64, resolved: bool) -> Result<Self, AppError> {
        let updated = sqlx::query(
            "UPDATE inventory_alerts \
             SET is_resolved = ?1, resolved_at = CASE WHEN ?1 THEN ?2 ELSE NULL END \
             WHERE id = ?3",
        )
        .bind(resolved)
        .bind(local_now())
        .bind(id)
        .execute(pool)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(AppError::not_found("Alert not found"));
        }

        let sql = format!("{ALERT_SELECT} WHERE a.id = ?1");
        Ok(sqlx::query_as::<_, Alert>(&sql).bind(id).fetch_one(pool).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, 10).unwrap()
    }

    fn item(name: &str, stock: i64, threshold: i64) -> ItemInput {
        ItemInput {
            item_name: Some(name.to_string()),
            category: Some("Hygiene".to_string()),
            current_stock: Some(stock),
            minimum_threshold: Some(threshold),
            unit_type: Some("kits".to_string()),
            ..ItemInput::default()
        }
    }

    fn adjust(kind: &str, quantity: i64) -> AdjustInput {
        AdjustInput {
            adjustment_type: kind.to_string(),
            quantity,
            notes: None,
        }
    }

    #[test]
    fn adjustments_floor_at_zero() {
        assert_eq!(AdjustmentType::Restock.apply(3, 4), 7);
        assert_eq!(AdjustmentType::Usage.apply(3, 4), 0);
        assert_eq!(AdjustmentType::Loss.apply(10, 4), 6);
        assert_eq!(AdjustmentType::Correction.apply(10, 2), 2);
    }

    #[test]
    fn alert_messages() {
        assert_eq!(stock_alert("Socks", "pairs", 5, 4), None);
        assert_eq!(
            stock_alert("Socks", "pairs", 0, 4),
            Some((AlertType::OutOfStock, "Socks is out of stock".to_string()))
        );
        assert_eq!(
            stock_alert("Socks", "pairs", 1, 4),
            Some((AlertType::LowStock, "Socks is running low (1 pairs remaining)".to_string()))
        );
    }

    #[tokio::test]
    async fn create_opens_alert_and_restock_resolves_it() {
        let pool = test_pool().await;
        let created = InventoryItem::create(&pool, &item("Hygiene kit", 2, 5), today()).await.unwrap();
        assert_eq!(created.last_restocked, Some(today()));

        let alerts = Alert::find_all(&pool).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::LowStock);
        assert_eq!(alerts[0].item_name, "Hygiene kit");

        // still low; the open alert is not duplicated
        InventoryItem::adjust(&pool, created.id, &adjust("usage", 5), today()).await.unwrap();
        assert_eq!(Alert::find_all(&pool).await.unwrap().len(), 1);

        let restocked = InventoryItem::adjust(&pool, created.id, &adjust("restock", 20), today())
            .await
            .unwrap();
        assert_eq!(restocked.current_stock, 20);
        let alerts = Alert::find_all(&pool).await.unwrap();
        assert!(alerts.iter().all(|alert| alert.is_resolved));

        let history = InventoryItem::adjustments(&pool, created.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].adjustment_type, AdjustmentType::Restock);
        assert_eq!((history[1].previous_stock, history[1].new_stock), (2, 0));
    }

    #[tokio::test]
    async fn listing_puts_shortages_first() {
        let pool = test_pool().await;
        InventoryItem::create(&pool, &item("Blankets", 30, 5), today()).await.unwrap();
        InventoryItem::create(&pool, &item("Water", 0, 5), today()).await.unwrap();
        let socks = InventoryItem::create(&pool, &item("Socks", 3, 5), today()).await.unwrap();
        let retired = InventoryItem::create(&pool, &item("Maps", 10, 1), today()).await.unwrap();
        InventoryItem::deactivate(&pool, retired.id).await.unwrap();

        let names: Vec<String> = InventoryItem::find_active(&pool)
            .await
            .unwrap()
            .into_iter()
            .map(|item| item.item_name)
            .collect();
        assert_eq!(names, vec!["Water", "Socks", "Blankets"]);

        let bad = InventoryItem::adjust(&pool, socks.id, &adjust("donation", 1), today()).await;
        assert_eq!(bad.unwrap_err().code, "VALIDATION_ERROR");
        let missing = InventoryItem::adjust(&pool, 999, &adjust("usage", 1), today()).await;
        assert_eq!(missing.unwrap_err().code, "NOT_FOUND");
    }

    #[tokio::test]
    async fn alerts_can_be_resolved_manually() {
        let pool = test_pool().await;
        InventoryItem::create(&pool, &item("Water", 0, 5), today()).await.unwrap();
        let alert = &Alert::find_all(&pool).await.unwrap()[0];

        let resolved = Alert::set_resolved(&pool, alert.id, true).await.unwrap();
        assert!(resolved.is_resolved);
        assert!(resolved.resolved_at.is_some());

        let reopened = Alert::set_resolved(&pool, alert.id, false).await.unwrap();
        assert!(reopened.resolved_at.is_none());
        assert_eq!(Alert::set_resolved(&pool, 404, true).await.unwrap_err().code, "NOT_FOUND");
    }

    #[test]
    fn negative_stock_is_rejected() {
        assert!(item("Socks", -1, 0).validate().is_err());
        assert!(item("Socks", 1, -1).validate().is_err());
        assert!(ItemInput::default().validate().is_err());
    }
}
