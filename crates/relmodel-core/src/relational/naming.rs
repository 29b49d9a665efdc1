//! Default constraint and index names.
//!
//! Key and foreign key names order their columns alphabetically (ignoring
//! case) before joining them; index names keep the index's own column
//! order.

/// `PK_<table>`.
pub fn primary_key_name(table: &str) -> String {
    format!("PK_{table}")
}

/// `AK_<table>_<sorted columns>`.
pub fn alternate_key_name<S: AsRef<str>>(table: &str, columns: &[S]) -> String {
    format!("AK_{}_{}", table, join_sorted(columns))
}

/// `FK_<dependent table>_<principal table>_<sorted columns>`.
pub fn foreign_key_name<S: AsRef<str>>(
    dependent_table: &str,
    principal_table: &str,
    columns: &[S],
) -> String {
    format!(
        "FK_{}_{}_{}",
        dependent_table,
        principal_table,
        join_sorted(columns)
    )
}

/// `IX_<table>_<columns>`, columns in index order.
pub fn index_name<S: AsRef<str>>(table: &str, columns: &[S]) -> String {
    let columns: Vec<&str> = columns.iter().map(AsRef::as_ref).collect();
    format!("IX_{}_{}", table, columns.join("_"))
}

fn join_sorted<S: AsRef<str>>(columns: &[S]) -> String {
    let mut columns: Vec<&str> = columns.iter().map(AsRef::as_ref).collect();
    columns.sort_by(|a, b| {
        a.to_lowercase()
            .cmp(&b.to_lowercase())
            .then_with(|| a.cmp(b))
    });
    columns.join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_columns_sorted_case_insensitively() {
        assert_eq!(
            alternate_key_name("Customer", &["name", "Code", "alias"]),
            "AK_Customer_alias_Code_name"
        );
        assert_eq!(
            foreign_key_name("Order", "Customer", &["CustomerId"]),
            "FK_Order_Customer_CustomerId"
        );
    }

    #[test]
    fn test_index_keeps_declared_order() {
        assert_eq!(
            index_name("Customer", &["Name", "Code"]),
            "IX_Customer_Name_Code"
        );
        assert_eq!(primary_key_name("Customer"), "PK_Customer");
    }
}
