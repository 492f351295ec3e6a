use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;
use std::time::Duration;
use tally_core::{
    CategorySummary, Money, NormalizedTransaction, OwnerId, SpendingSummary, StoredTransaction,
    TransactionUpdate,
};
use thiserror::Error;

pub type DbPool = Pool<Sqlite>;

pub const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Amount does not fit in storage: {0}")]
    AmountOutOfRange(Money),
}

pub async fn create_db(path: &Path) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// A private database that lives as long as the pool. Used by tests and demos.
pub async fn create_db_in_memory() -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .in_memory(true)
        .foreign_keys(true);

    // Every connection to :memory: is a separate database, so pin exactly one.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id TEXT NOT NULL,
            date TEXT NOT NULL,
            description TEXT NOT NULL,
            category TEXT,
            debit_cents INTEGER,
            credit_cents INTEGER,
            amount_cents INTEGER NOT NULL,
            balance_cents INTEGER NOT NULL,
            transaction_hash TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE (owner_id, transaction_hash)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

fn cents(m: Money) -> Result<i64, StorageError> {
    m.to_cents().ok_or(StorageError::AmountOutOfRange(m))
}

fn opt_cents(m: Option<Money>) -> Result<Option<i64>, StorageError> {
    m.map(cents).transpose()
}

/// Write a normalized batch in one database transaction. Rows whose
/// `(owner_id, transaction_hash)` already exists are skipped. Returns the
/// number of rows actually inserted. Any other failure rolls back the batch.
pub async fn upsert_transactions(
    pool: &DbPool,
    rows: &[NormalizedTransaction],
) -> Result<u64, StorageError> {
    let mut tx = pool.begin().await?;
    let mut inserted = 0u64;

    for row in rows {
        let result = sqlx::query(
            r#"
            INSERT INTO transactions
                (owner_id, date, description, debit_cents, credit_cents, amount_cents, balance_cents, transaction_hash)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (owner_id, transaction_hash) DO NOTHING
            "#,
        )
        .bind(row.owner_id.as_str())
        .bind(&row.date)
        .bind(&row.description)
        .bind(opt_cents(row.debit)?)
        .bind(opt_cents(row.credit)?)
        .bind(cents(row.amount)?)
        .bind(cents(row.balance)?)
        .bind(&row.transaction_hash)
        .execute(&mut *tx)
        .await?;

        inserted += result.rows_affected();
    }

    tx.commit().await?;

    tracing::debug!(
        submitted = rows.len(),
        inserted,
        "transaction batch written"
    );

    Ok(inserted)
}

type TransactionRow = (
    i64,
    String,
    String,
    String,
    Option<String>,
    Option<i64>,
    Option<i64>,
    i64,
    i64,
    String,
    String,
);

fn row_to_transaction(r: TransactionRow) -> StoredTransaction {
    StoredTransaction {
        id: r.0,
        owner_id: OwnerId(r.1),
        date: r.2,
        description: r.3,
        category: r.4,
        debit: r.5.map(Money::from_cents),
        credit: r.6.map(Money::from_cents),
        amount: Money::from_cents(r.7),
        balance: Money::from_cents(r.8),
        transaction_hash: r.9,
        created_at: r.10,
    }
}

pub async fn get_transactions(
    pool: &DbPool,
    owner: &OwnerId,
) -> Result<Vec<StoredTransaction>, StorageError> {
    let rows = sqlx::query_as::<_, TransactionRow>(
        "SELECT id, owner_id, date, description, category, debit_cents, credit_cents, amount_cents, balance_cents, transaction_hash, created_at FROM transactions WHERE owner_id = ? ORDER BY id"
    )
    .bind(owner.as_str())
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(row_to_transaction).collect())
}

pub async fn get_transaction_by_id(
    pool: &DbPool,
    owner: &OwnerId,
    id: i64,
) -> Result<Option<StoredTransaction>, StorageError> {
    let row = sqlx::query_as::<_, TransactionRow>(
        "SELECT id, owner_id, date, description, category, debit_cents, credit_cents, amount_cents, balance_cents, transaction_hash, created_at FROM transactions WHERE id = ? AND owner_id = ?"
    )
    .bind(id)
    .bind(owner.as_str())
    .fetch_optional(pool)
    .await?;

    Ok(row.map(row_to_transaction))
}

/// Replace the editable fields of one row. `false` if the owner has no such row.
pub async fn update_transaction(
    pool: &DbPool,
    owner: &OwnerId,
    id: i64,
    update: &TransactionUpdate,
) -> Result<bool, StorageError> {
    let result = sqlx::query(
        r#"
        UPDATE transactions
        SET date = ?, description = ?, category = ?, debit_cents = ?, credit_cents = ?,
            amount_cents = ?, balance_cents = ?
        WHERE id = ? AND owner_id = ?
        "#,
    )
    .bind(&update.date)
    .bind(&update.description)
    .bind(&update.category)
    .bind(opt_cents(update.debit)?)
    .bind(opt_cents(update.credit)?)
    .bind(cents(update.amount)?)
    .bind(cents(update.balance)?)
    .bind(id)
    .bind(owner.as_str())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn delete_transaction(
    pool: &DbPool,
    owner: &OwnerId,
    id: i64,
) -> Result<bool, StorageError> {
    let result = sqlx::query("DELETE FROM transactions WHERE id = ? AND owner_id = ?")
        .bind(id)
        .bind(owner.as_str())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn get_spending_summary(
    pool: &DbPool,
    owner: &OwnerId,
) -> Result<SpendingSummary, StorageError> {
    let rows = sqlx::query(
        r#"
        SELECT COALESCE(category, ?) AS category_name,
            COALESCE(SUM(CASE WHEN amount_cents < 0 THEN -amount_cents ELSE 0 END), 0) AS spent_cents,
            COALESCE(SUM(CASE WHEN amount_cents > 0 THEN amount_cents ELSE 0 END), 0) AS received_cents,
            COUNT(*) AS tx_count
        FROM transactions
        WHERE owner_id = ?
        GROUP BY category_name
        ORDER BY spent_cents DESC, category_name
        "#,
    )
    .bind(UNCATEGORIZED)
    .bind(owner.as_str())
    .fetch_all(pool)
    .await?;

    let category_summary: Vec<CategorySummary> = rows
        .into_iter()
        .map(|r| CategorySummary {
            category: r.get("category_name"),
            spent: Money::from_cents(r.get("spent_cents")),
            received: Money::from_cents(r.get("received_cents")),
            count: r.get("tx_count"),
        })
        .collect();

    let total_spent = category_summary
        .iter()
        .map(|c| c.spent)
        .fold(Money::zero(), |a, b| a + b);
    let total_received = category_summary
        .iter()
        .map(|c| c.received)
        .fold(Money::zero(), |a, b| a + b);
    let transaction_count = category_summary.iter().map(|c| c.count).sum();

    Ok(SpendingSummary {
        total_spent,
        total_received,
        net_cash_flow: total_received - total_spent,
        transaction_count,
        category_summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::{RawAmount, RawTransaction};
    use tally_import::normalize_batch;

    fn owner(id: &str) -> OwnerId {
        OwnerId::new(id)
    }

    fn raw(description: &str, debit: Option<&str>, credit: Option<&str>, balance: &str) -> RawTransaction {
        RawTransaction {
            date: "2024-01-15".to_string(),
            description: description.to_string(),
            debit: debit.map(RawAmount::from),
            credit: credit.map(RawAmount::from),
            balance: Some(RawAmount::from(balance)),
        }
    }

    fn statement() -> Vec<RawTransaction> {
        vec![
            raw("SALARY", None, Some("2,000.00"), "$2,950.00 CR"),
            raw("COFFEE", Some("4.50"), None, "$2,945.50"),
            raw("COFFEE", Some("4.50"), None, "$2,945.50"),
            raw("RENT", Some("1,200.00"), None, "$1,745.50"),
        ]
    }

    async fn import(pool: &DbPool, owner: &OwnerId, records: &[RawTransaction]) -> u64 {
        let rows = normalize_batch(owner, records).unwrap();
        upsert_transactions(pool, &rows).await.unwrap()
    }

    #[tokio::test]
    async fn create_db_on_disk_is_reopenable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tally.db");
        let alice = owner("alice");

        {
            let pool = create_db(&path).await.unwrap();
            assert_eq!(import(&pool, &alice, &statement()).await, 4);
            pool.close().await;
        }

        let pool = create_db(&path).await.unwrap();
        assert_eq!(get_transactions(&pool, &alice).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn identical_rows_in_one_batch_both_persist() {
        let pool = create_db_in_memory().await.unwrap();
        let alice = owner("alice");
        import(&pool, &alice, &statement()).await;

        let coffees: Vec<_> = get_transactions(&pool, &alice)
            .await
            .unwrap()
            .into_iter()
            .filter(|t| t.description == "COFFEE")
            .collect();
        assert_eq!(coffees.len(), 2);
        assert!(coffees[0].transaction_hash.ends_with("-1"));
        assert!(coffees[1].transaction_hash.ends_with("-2"));
    }

    #[tokio::test]
    async fn resubmitting_a_batch_inserts_nothing() {
        let pool = create_db_in_memory().await.unwrap();
        let alice = owner("alice");
        assert_eq!(import(&pool, &alice, &statement()).await, 4);
        assert_eq!(import(&pool, &alice, &statement()).await, 0);
        assert_eq!(get_transactions(&pool, &alice).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn overlapping_batch_inserts_only_new_rows() {
        let pool = create_db_in_memory().await.unwrap();
        let alice = owner("alice");
        import(&pool, &alice, &statement()).await;

        let mut extended = statement();
        extended.push(raw("GROCERIES", Some("80.25"), None, "$1,665.25"));
        assert_eq!(import(&pool, &alice, &extended).await, 1);
    }

    #[tokio::test]
    async fn owners_do_not_share_keys() {
        let pool = create_db_in_memory().await.unwrap();
        assert_eq!(import(&pool, &owner("alice"), &statement()).await, 4);
        assert_eq!(import(&pool, &owner("bob"), &statement()).await, 4);
        assert_eq!(get_transactions(&pool, &owner("bob")).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn stored_amounts_round_trip() {
        let pool = create_db_in_memory().await.unwrap();
        let alice = owner("alice");
        import(&pool, &alice, &[raw("ATM", Some("50.00"), None, "$950.00")]).await;

        let stored = &get_transactions(&pool, &alice).await.unwrap()[0];
        assert_eq!(stored.amount, Money::from_cents(-5000));
        assert_eq!(stored.balance, Money::from_cents(95000));
        assert_eq!(stored.debit, Some(Money::from_cents(5000)));
        assert_eq!(stored.credit, None);
        assert_eq!(stored.category, None);
    }

    #[tokio::test]
    async fn update_is_scoped_to_owner() {
        let pool = create_db_in_memory().await.unwrap();
        let alice = owner("alice");
        import(&pool, &alice, &[raw("ATM", Some("50.00"), None, "$950.00")]).await;
        let id = get_transactions(&pool, &alice).await.unwrap()[0].id;

        let update = TransactionUpdate {
            date: "2024-01-16".to_string(),
            description: "ATM WITHDRAWAL".to_string(),
            category: Some("Cash".to_string()),
            debit: Some(Money::from_cents(6000)),
            credit: None,
            amount: Money::from_cents(-6000),
            balance: Money::from_cents(94000),
        };

        assert!(!update_transaction(&pool, &owner("mallory"), id, &update).await.unwrap());
        assert!(update_transaction(&pool, &alice, id, &update).await.unwrap());

        let stored = get_transaction_by_id(&pool, &alice, id).await.unwrap().unwrap();
        assert_eq!(stored.description, "ATM WITHDRAWAL");
        assert_eq!(stored.category.as_deref(), Some("Cash"));
        assert_eq!(stored.amount, Money::from_cents(-6000));
    }

    #[tokio::test]
    async fn update_keeps_idempotency_key() {
        let pool = create_db_in_memory().await.unwrap();
        let alice = owner("alice");
        let records = [raw("ATM", Some("50.00"), None, "$950.00")];
        import(&pool, &alice, &records).await;
        let before = get_transactions(&pool, &alice).await.unwrap()[0].clone();

        let update = TransactionUpdate {
            date: before.date.clone(),
            description: "Renamed".to_string(),
            category: None,
            debit: before.debit,
            credit: before.credit,
            amount: before.amount,
            balance: before.balance,
        };
        update_transaction(&pool, &alice, before.id, &update).await.unwrap();

        let after = get_transaction_by_id(&pool, &alice, before.id).await.unwrap().unwrap();
        assert_eq!(after.transaction_hash, before.transaction_hash);
        // Re-importing the original line still hits the existing key.
        assert_eq!(import(&pool, &alice, &records).await, 0);
    }

    #[tokio::test]
    async fn delete_is_scoped_to_owner() {
        let pool = create_db_in_memory().await.unwrap();
        let alice = owner("alice");
        import(&pool, &alice, &statement()).await;
        let id = get_transactions(&pool, &alice).await.unwrap()[0].id;

        assert!(!delete_transaction(&pool, &owner("mallory"), id).await.unwrap());
        assert!(delete_transaction(&pool, &alice, id).await.unwrap());
        assert!(!delete_transaction(&pool, &alice, id).await.unwrap());
        assert_eq!(get_transactions(&pool, &alice).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn summary_groups_by_category() {
        let pool = create_db_in_memory().await.unwrap();
        let alice = owner("alice");
        import(&pool, &alice, &statement()).await;

        let rent = get_transactions(&pool, &alice)
            .await
            .unwrap()
            .into_iter()
            .find(|t| t.description == "RENT")
            .unwrap();
        let update = TransactionUpdate {
            date: rent.date.clone(),
            description: rent.description.clone(),
            category: Some("Housing".to_string()),
            debit: rent.debit,
            credit: rent.credit,
            amount: rent.amount,
            balance: rent.balance,
        };
        update_transaction(&pool, &alice, rent.id, &update).await.unwrap();

        let summary = get_spending_summary(&pool, &alice).await.unwrap();
        assert_eq!(summary.transaction_count, 4);
        assert_eq!(summary.total_spent, Money::from_cents(120900));
        assert_eq!(summary.total_received, Money::from_cents(200000));
        assert_eq!(summary.net_cash_flow, Money::from_cents(79100));

        assert_eq!(summary.category_summary[0].category, "Housing");
        assert_eq!(summary.category_summary[0].spent, Money::from_cents(120000));
        let other = &summary.category_summary[1];
        assert_eq!(other.category, UNCATEGORIZED);
        assert_eq!(other.count, 3);
        assert_eq!(other.spent, Money::from_cents(900));
        assert_eq!(other.received, Money::from_cents(200000));
    }

    #[tokio::test]
    async fn summary_for_empty_owner_is_zero() {
        let pool = create_db_in_memory().await.unwrap();
        let summary = get_spending_summary(&pool, &owner("nobody")).await.unwrap();
        assert_eq!(summary.transaction_count, 0);
        assert!(summary.total_spent.is_zero());
        assert!(summary.category_summary.is_empty());
    }

    #[tokio::test]
    async fn out_of_range_amount_rolls_back_batch() {
        let pool = create_db_in_memory().await.unwrap();
        let alice = owner("alice");
        let mut rows = normalize_batch(&alice, &statement()).unwrap();
        rows[2].balance = Money::from_decimal("79228162514264337593543950".parse().unwrap());

        let err = upsert_transactions(&pool, &rows).await.unwrap_err();
        assert!(matches!(err, StorageError::AmountOutOfRange(_)));
        assert!(get_transactions(&pool, &alice).await.unwrap().is_empty());
    }
}
