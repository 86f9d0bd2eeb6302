//! Drug catalog database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::{DrugForm, DrugRecord};
use crate::service::DrugLookup;

const SELECT_DRUG: &str = "SELECT drug_id, name, form, bottle_size, active FROM drugs";

impl Database {
    /// Insert or update a drug record.
    pub fn upsert_drug(&self, drug: &DrugRecord) -> DbResult<()> {
        if drug.drug_id.trim().is_empty() {
            return Err(DbError::Constraint("drug_id must not be empty".into()));
        }
        if let Some(size) = drug.bottle_size {
            if !(size.is_finite() && size > 0.0) {
                return Err(DbError::Constraint(format!(
                    "bottle_size must be a positive number of ml, got {size}"
                )));
            }
        }

        self.conn.execute(
            r#"
            INSERT INTO drugs (drug_id, name, form, bottle_size, active, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, datetime('now'))
            ON CONFLICT(drug_id) DO UPDATE SET
                name = excluded.name,
                form = excluded.form,
                bottle_size = excluded.bottle_size,
                active = excluded.active,
                updated_at = datetime('now')
            "#,
            params![
                drug.drug_id,
                drug.name,
                drug.form.as_str(),
                drug.bottle_size,
                drug.active,
            ],
        )?;
        Ok(())
    }

    /// Get a drug by id.
    pub fn get_drug(&self, drug_id: &str) -> DbResult<Option<DrugRecord>> {
        let row = self
            .conn
            .query_row(
                &format!("{SELECT_DRUG} WHERE drug_id = ?"),
                [drug_id],
                DrugRow::from_row,
            )
            .optional()?;

        Ok(row.map(DrugRecord::from))
    }

    /// List drugs ordered by name.
    pub fn list_drugs(&self, active_only: bool) -> DbResult<Vec<DrugRecord>> {
        let sql = if active_only {
            format!("{SELECT_DRUG} WHERE active = 1 ORDER BY name")
        } else {
            format!("{SELECT_DRUG} ORDER BY name")
        };

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], DrugRow::from_row)?;

        let mut drugs = Vec::new();
        for row in rows {
            drugs.push(row?.into());
        }
        Ok(drugs)
    }

    /// Delete a drug.
    pub fn delete_drug(&self, drug_id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM drugs WHERE drug_id = ?", [drug_id])?;
        Ok(rows_affected > 0)
    }

    /// Mark a drug as inactive (soft delete).
    pub fn deactivate_drug(&self, drug_id: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE drugs SET active = 0, updated_at = datetime('now') WHERE drug_id = ?",
            [drug_id],
        )?;
        Ok(rows_affected > 0)
    }
}

impl DrugLookup for Database {
    fn find_drug(&self, drug_id: &str) -> DbResult<Option<DrugRecord>> {
        self.get_drug(drug_id)
    }
}

/// Intermediate row struct for database mapping.
struct DrugRow {
    drug_id: String,
    name: String,
    form: String,
    bottle_size: Option<f64>,
    active: bool,
}

impl DrugRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            drug_id: row.get(0)?,
            name: row.get(1)?,
            form: row.get(2)?,
            bottle_size: row.get(3)?,
            active: row.get(4)?,
        })
    }
}

impl From<DrugRow> for DrugRecord {
    fn from(row: DrugRow) -> Self {
        DrugRecord {
            drug_id: row.drug_id,
            name: row.name,
            form: DrugForm::from_label(&row.form),
            bottle_size: row.bottle_size,
            active: row.active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_upsert_and_get() {
        let db = setup_db();

        let drug = DrugRecord::new("D001".into(), "Amoxicillin 125mg/5ml".into(), DrugForm::Syrup)
            .with_bottle_size(100.0);
        db.upsert_drug(&drug).unwrap();

        let retrieved = db.get_drug("D001").unwrap().unwrap();
        assert_eq!(retrieved, drug);
    }

    #[test]
    fn test_get_missing() {
        let db = setup_db();
        assert!(db.get_drug("nope").unwrap().is_none());
    }

    #[test]
    fn test_upsert_updates() {
        let db = setup_db();

        let mut drug = DrugRecord::new("D001".into(), "Original Name".into(), DrugForm::Tablet);
        db.upsert_drug(&drug).unwrap();

        drug.name = "Updated Name".into();
        drug.form = DrugForm::Capsule;
        db.upsert_drug(&drug).unwrap();

        let retrieved = db.get_drug("D001").unwrap().unwrap();
        assert_eq!(retrieved.name, "Updated Name");
        assert_eq!(retrieved.form, DrugForm::Capsule);
        assert_eq!(db.list_drugs(false).unwrap().len(), 1);
    }

    #[test]
    fn test_rejects_bad_records() {
        let db = setup_db();

        let blank = DrugRecord::new("  ".into(), "Blank".into(), DrugForm::Tablet);
        assert!(matches!(db.upsert_drug(&blank), Err(DbError::Constraint(_))));

        let empty_bottle = DrugRecord::new("D1".into(), "Syrup".into(), DrugForm::Syrup)
            .with_bottle_size(0.0);
        assert!(matches!(db.upsert_drug(&empty_bottle), Err(DbError::Constraint(_))));
    }

    #[test]
    fn test_list_drugs() {
        let db = setup_db();

        db.upsert_drug(&DrugRecord::new("D2".into(), "Paracetamol 500mg".into(), DrugForm::Tablet))
            .unwrap();
        db.upsert_drug(&DrugRecord::new("D1".into(), "Ibuprofen 200mg".into(), DrugForm::Tablet))
            .unwrap();
        db.upsert_drug(&DrugRecord::new("D3".into(), "Salbutamol".into(), DrugForm::Inhaler))
            .unwrap();
        db.deactivate_drug("D3").unwrap();

        let active: Vec<String> = db
            .list_drugs(true)
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(active, vec!["Ibuprofen 200mg", "Paracetamol 500mg"]);
        assert_eq!(db.list_drugs(false).unwrap().len(), 3);
    }

    #[test]
    fn test_deactivate() {
        let db = setup_db();

        let drug = DrugRecord::new("D001".into(), "Test Drug".into(), DrugForm::Tablet);
        db.upsert_drug(&drug).unwrap();

        assert!(db.deactivate_drug("D001").unwrap());
        assert!(!db.deactivate_drug("missing").unwrap());

        // Still retrievable directly
        let drug = db.get_drug("D001").unwrap().unwrap();
        assert!(!drug.active);
    }

    #[test]
    fn test_delete() {
        let db = setup_db();

        let drug = DrugRecord::new("D001".into(), "Test Drug".into(), DrugForm::Tablet);
        db.upsert_drug(&drug).unwrap();

        assert!(db.delete_drug("D001").unwrap());
        assert!(!db.delete_drug("D001").unwrap());
        assert!(db.get_drug("D001").unwrap().is_none());
    }

    #[test]
    fn test_lookup_trait() {
        let db = setup_db();
        db.upsert_drug(&DrugRecord::new("D1".into(), "Gaviscon".into(), DrugForm::OtherLiquid))
            .unwrap();

        let lookup: &dyn DrugLookup = &db;
        assert_eq!(lookup.find_drug("D1").unwrap().unwrap().form, DrugForm::OtherLiquid);
        assert!(lookup.find_drug("D2").unwrap().is_none());
    }
}
