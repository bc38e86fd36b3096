//! Column family commands.

use super::Reply;
use tidesdb_binding::{ColumnFamilyConfig, Database};

/// Creates a column family.
pub fn create(db: &Database, name: &str, config: &ColumnFamilyConfig) -> Reply {
    Reply::from_result(db.create_column_family_with(name, config), |()| None)
}

/// Drops a column family.
pub fn drop_cf(db: &Database, name: &str) -> Reply {
    Reply::from_result(db.drop_column_family(name), |()| None)
}

/// Lists column families, comma separated.
pub fn list(db: &Database) -> Reply {
    Reply::from_result(db.column_families(), |names| Some(names.join(",")))
}
