#[cfg(test)]
mod tests {
    use crate::{
        TEST_MYSQL_URL_DEST, TEST_MYSQL_URL_SOURCE, mysql_pool, reset_mysql_schema,
        utils::{GENERATION, options, shadow},
    };
    use connectors::{
        adapter::StoreRegistry,
        sql::base::adapter::SqlAdapter,
    };
    use engine_core::state::sled_store::SledStateStore;
    use engine_runtime::{report::Outcome, runner::BatchRunner, step::Synchronizer};
    use model::execution::options::ChunkSize;
    use mysql_async::prelude::Queryable;
    use std::{collections::BTreeMap, sync::Arc};
    use tokio_util::sync::CancellationToken;
    use tracing_test::traced_test;

    const ORDERS_TABLE_DDL: &str = r#"CREATE TABLE orders (
  id INT NOT NULL AUTO_INCREMENT,
  placed_at DATETIME NOT NULL,
  total DECIMAL(10,2) NOT NULL,
  PRIMARY KEY (id),
  CONSTRAINT orders_total_chk CHECK (total >= 0)
) ENGINE=InnoDB"#;

    async fn seed(rows: usize) {
        reset_mysql_schema(TEST_MYSQL_URL_SOURCE).await;
        reset_mysql_schema(TEST_MYSQL_URL_DEST).await;

        for url in [TEST_MYSQL_URL_SOURCE, TEST_MYSQL_URL_DEST] {
            let mut conn = mysql_pool(url).get_conn().await.expect("mysql connection");
            conn.query_drop(ORDERS_TABLE_DDL).await.expect("create orders");
        }

        let mut conn = mysql_pool(TEST_MYSQL_URL_SOURCE)
            .get_conn()
            .await
            .expect("mysql connection");
        conn.query_drop("SET SESSION sql_mode = 'ALLOW_INVALID_DATES'")
            .await
            .expect("sql mode");
        for i in 0..rows {
            let placed_at = if i == 0 {
                "0000-00-00 00:00:00".to_string()
            } else {
                format!("2024-01-{:02} 10:00:00", i % 28 + 1)
            };
            conn.exec_drop(
                "INSERT INTO orders (placed_at, total) VALUES (?, ?)",
                (placed_at, format!("{}.50", i)),
            )
            .await
            .expect("insert order");
        }
    }

    async fn registry() -> StoreRegistry {
        let urls = BTreeMap::from([
            ("legacy".to_string(), TEST_MYSQL_URL_SOURCE.to_string()),
            ("fresh".to_string(), TEST_MYSQL_URL_DEST.to_string()),
        ]);
        StoreRegistry::connect_all(&urls).await.expect("connect stores")
    }

    // Scenario: orders with a zero date copied between two MySQL databases in chunks of 40.
    // Expected Outcome:
    // - Every row, zero date included, reaches the live table.
    // - The previous live table survives as a backup.
    #[traced_test]
    #[tokio::test]
    #[ignore = "requires the MySQL test databases"]
    async fn tc01() {
        seed(100).await;
        let options = options(&[("orders", ChunkSize::Rows(40))]);
        let registry = registry().await;
        let destination = registry.get("fresh").expect("destination");

        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SledStateStore::open(dir.path()).unwrap());
        let runner = BatchRunner::new(Synchronizer::new(registry), store, CancellationToken::new());

        let report = runner.run("mysql-orders", options).await.unwrap();

        assert_eq!(report.outcome(), Outcome::Synchronized);
        assert_eq!(destination.row_count("orders").await.unwrap(), 100);
        assert!(!destination.table_exists(&shadow("orders")).await.unwrap());

        let mut conn = mysql_pool(TEST_MYSQL_URL_DEST).get_conn().await.unwrap();
        let zero: Option<String> = conn
            .query_first("SELECT CAST(placed_at AS CHAR) FROM orders WHERE id = 1")
            .await
            .unwrap();
        assert_eq!(zero.as_deref(), Some("0000-00-00 00:00:00"));
        assert!(logs_contain(&format!("orders_sync_{GENERATION}")));
    }

    // Scenario: the shadow table name is already taken in the destination.
    // Expected Outcome: initialize refuses to reuse it and reports the table.
    #[tokio::test]
    #[ignore = "requires the MySQL test databases"]
    async fn tc02() {
        seed(5).await;
        let mut conn = mysql_pool(TEST_MYSQL_URL_DEST).get_conn().await.unwrap();
        conn.query_drop(format!("CREATE TABLE {} (id INT)", shadow("orders")))
            .await
            .unwrap();

        let options = options(&[("orders", ChunkSize::All)]);
        let registry = registry().await;
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SledStateStore::open(dir.path()).unwrap());
        let runner = BatchRunner::new(Synchronizer::new(registry), store, CancellationToken::new());
        let report = runner.run("mysql-collision", options).await.unwrap();

        assert_eq!(report.outcome(), Outcome::SynchronizedWithErrors);
        assert!(report.errors[0].contains(&shadow("orders")));
    }
}
