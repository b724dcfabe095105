use crate::error::SchemaError;
use connectors::sql::base::{adapter::SqlAdapter, error::DbError};
use tracing::info;

const CREATE_TABLE: &str = "CREATE TABLE ";

/// Creates `shadow` in `destination` with the structure `table` has in `source`.
///
/// Never reuses an existing shadow: a name collision fails instead of
/// silently writing into a table that may already hold rows.
pub async fn replicate_table(
    source: &dyn SqlAdapter,
    destination: &dyn SqlAdapter,
    table: &str,
    shadow: &str,
) -> Result<(), SchemaError> {
    let definition = |source: DbError| SchemaError::Definition {
        table: table.to_string(),
        source,
    };

    if !source.table_exists(table).await.map_err(definition)? {
        return Err(SchemaError::SourceMissing(table.to_string()));
    }
    if destination
        .table_exists(shadow)
        .await
        .map_err(|source| SchemaError::Rejected {
            table: shadow.to_string(),
            source,
        })?
    {
        return Err(SchemaError::ShadowExists(shadow.to_string()));
    }

    let ddl = source.create_statement(table).await.map_err(definition)?;
    let shadow_ddl = rename_in_create_statement(&ddl, table, shadow)?;

    destination
        .exec(&shadow_ddl)
        .await
        .map_err(|source| match source {
            DbError::TableExists(name) => SchemaError::ShadowExists(name),
            source => SchemaError::Rejected {
                table: shadow.to_string(),
                source,
            },
        })?;

    info!(table, shadow, "Created shadow table");
    Ok(())
}

/// Points a `SHOW CREATE TABLE` statement for `table` at `shadow`.
///
/// Only the header identifier and constraint names derived from the table
/// name change. Constraint names are unique per schema, so keeping the live
/// table's names would make the shadow collide with it.
pub fn rename_in_create_statement(
    ddl: &str,
    table: &str,
    shadow: &str,
) -> Result<String, SchemaError> {
    let header = format!("{CREATE_TABLE}`{table}`");
    let body = ddl
        .trim_start()
        .strip_prefix(&header)
        .ok_or_else(|| SchemaError::Rewrite(table.to_string()))?;

    let body = body.replace(
        &format!("CONSTRAINT `{table}_"),
        &format!("CONSTRAINT `{shadow}_"),
    );

    Ok(format!("{CREATE_TABLE}`{shadow}`{body}"))
}
