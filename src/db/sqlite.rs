//! Embedded SQLite order table

use super::{
    check_transition, DbError, DbResult, Order, OrderFilter, OrderId, OrderStatus, SCHEMA,
};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SELECT_COLUMNS: &str = "SELECT id, created_at, created_display, chat_id, username, name, phone,
        email, business, purpose, features, has_domain, extra, wants_support, status,
        status_text, updated_at FROM orders";

pub struct SqliteOrders {
    conn: Mutex<Connection>,
}

/// Raw column values before timestamp and status parsing
struct OrderRow {
    id: String,
    created_at: String,
    created_display: String,
    chat_id: String,
    username: Option<String>,
    name: String,
    phone: String,
    email: String,
    business: String,
    purpose: String,
    features: String,
    has_domain: bool,
    extra: String,
    wants_support: bool,
    status: String,
    status_text: String,
    updated_at: String,
}

impl OrderRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            created_at: row.get(1)?,
            created_display: row.get(2)?,
            chat_id: row.get(3)?,
            username: row.get(4)?,
            name: row.get(5)?,
            phone: row.get(6)?,
            email: row.get(7)?,
            business: row.get(8)?,
            purpose: row.get(9)?,
            features: row.get(10)?,
            has_domain: row.get(11)?,
            extra: row.get(12)?,
            wants_support: row.get(13)?,
            status: row.get(14)?,
            status_text: row.get(15)?,
            updated_at: row.get(16)?,
        })
    }

    fn into_order(self) -> DbResult<Order> {
        let id = OrderId::parse(&self.id)
            .ok_or_else(|| DbError::Corrupt(format!("bad order id {:?}", self.id)))?;
        let status = OrderStatus::parse(&self.status)
            .ok_or_else(|| DbError::Corrupt(format!("bad status {:?} for {id}", self.status)))?;
        Ok(Order {
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
            id,
            created_display: self.created_display,
            chat_id: self.chat_id,
            username: self.username,
            name: self.name,
            phone: self.phone,
            email: self.email,
            business: self.business,
            purpose: self.purpose,
            features: self.features,
            has_domain: self.has_domain,
            extra: self.extra,
            wants_support: self.wants_support,
            status,
            status_text: self.status_text,
        })
    }
}

impl SqliteOrders {
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        if let Some(parent) = path.as_ref().parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> DbResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> DbResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    pub fn append(&self, order: &Order) -> DbResult<()> {
        let conn = self.lock()?;
        let result = conn.execute(
            "INSERT INTO orders (id, created_at, created_display, chat_id, username, name, phone,
                email, business, purpose, features, has_domain, extra, wants_support, status,
                status_text, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                order.id.as_str(),
                format_datetime(order.created_at),
                order.created_display,
                order.chat_id,
                order.username,
                order.name,
                order.phone,
                order.email,
                order.business,
                order.purpose,
                order.features,
                order.has_domain,
                order.extra,
                order.wants_support,
                order.status.as_str(),
                order.status_text,
                format_datetime(order.updated_at),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(DbError::DuplicateOrder(order.id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn get(&self, id: &OrderId) -> DbResult<Option<Order>> {
        let conn = self.lock()?;
        Self::get_with(&conn, id)
    }

    fn get_with(conn: &Connection, id: &OrderId) -> DbResult<Option<Order>> {
        let row = conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                params![id.as_str()],
                OrderRow::from_row,
            )
            .optional()?;
        row.map(OrderRow::into_order).transpose()
    }

    pub fn list(&self, filter: &OrderFilter) -> DbResult<Vec<Order>> {
        let conn = self.lock()?;
        Self::list_with(&conn, filter)
    }

    fn list_with(conn: &Connection, filter: &OrderFilter) -> DbResult<Vec<Order>> {
        let (clause, values) = where_clause(filter);
        let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS}{clause} ORDER BY created_at, id"))?;
        let rows = stmt.query_map(params_from_iter(values), OrderRow::from_row)?;

        let mut orders = Vec::new();
        for row in rows {
            orders.push(row?.into_order()?);
        }
        Ok(orders)
    }

    pub fn update_status(
        &self,
        id: &OrderId,
        status: OrderStatus,
        status_text: &str,
    ) -> DbResult<Order> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let mut order = Self::get_with(&tx, id)?.ok_or_else(|| DbError::OrderNotFound(id.clone()))?;
        check_transition(&order, status)?;

        order.status = status;
        status_text.clone_into(&mut order.status_text);
        order.updated_at = Utc::now();

        tx.execute(
            "UPDATE orders SET status = ?1, status_text = ?2, updated_at = ?3 WHERE id = ?4",
            params![
                status.as_str(),
                order.status_text,
                format_datetime(order.updated_at),
                id.as_str()
            ],
        )?;
        tx.commit()?;
        Ok(order)
    }

    pub fn delete_matching(&self, filter: &OrderFilter) -> DbResult<usize> {
        let conn = self.lock()?;
        let (clause, values) = where_clause(filter);
        let removed = conn.execute(
            &format!("DELETE FROM orders{clause}"),
            params_from_iter(values),
        )?;

        if removed > 0 {
            tracing::info!(removed, "Deleted orders");
        }
        Ok(removed)
    }
}

/// `WHERE` clause selecting the rows `filter` matches, with its bound values
fn where_clause(filter: &OrderFilter) -> (String, Vec<Value>) {
    let mut conditions = Vec::new();
    let mut values = Vec::new();

    if let Some(statuses) = &filter.statuses {
        if statuses.is_empty() {
            conditions.push("0".to_string());
        } else {
            let marks = vec!["?"; statuses.len()].join(", ");
            conditions.push(format!("status IN ({marks})"));
            values.extend(statuses.iter().map(|s| Value::Text(s.as_str().to_string())));
        }
    }
    // Timestamps share one fixed-width UTC format, so text order is time order
    if let Some(cutoff) = filter.created_before {
        conditions.push("created_at < ?".to_string());
        values.push(Value::Text(format_datetime(cutoff)));
    }
    if let Some(chat_id) = &filter.chat_id {
        conditions.push("chat_id = ?".to_string());
        values.push(Value::Text(chat_id.clone()));
    }

    if conditions.is_empty() {
        (String::new(), values)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), values)
    }
}

fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_datetime(s: &str) -> DbResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::Corrupt(format!("bad timestamp {s:?}: {e}")))
}
