//! Bulk loading of reference data from CSV files
//!
//! A data directory may hold `ingredients.csv` (`name,measurement_unit`) and
//! `tags.csv` (`name,slug`), each with a header row. Rows already present
//! (same ingredient name and unit, same tag slug) are skipped, so an import
//! can be repeated safely.

use std::collections::HashSet;
use std::path::Path;

use redb::Database;
use tracing::{info, warn};

use crate::catalog::{create_ingredient, create_tag, list_tags, search_ingredients};
use crate::error::{AppError, Result};
use crate::model::{CreateIngredientRequest, CreateTagRequest};

pub const INGREDIENTS_FILE: &str = "ingredients.csv";
pub const TAGS_FILE: &str = "tags.csv";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub ingredients_created: usize,
    pub ingredients_skipped: usize,
    pub tags_created: usize,
    pub tags_skipped: usize,
}

/// Imports whichever of the two files exist in `dir`.
pub fn import_dir(db: &Database, dir: &Path) -> Result<ImportSummary> {
    if !dir.is_dir() {
        return Err(AppError::validation(format!(
            "{} is not a directory",
            dir.display()
        )));
    }

    let mut summary = ImportSummary::default();

    let path = dir.join(INGREDIENTS_FILE);
    if path.is_file() {
        let (created, skipped) = import_ingredients(db, &path)?;
        summary.ingredients_created = created;
        summary.ingredients_skipped = skipped;
    } else {
        warn!(path = %path.display(), "no ingredients file, skipping");
    }

    let path = dir.join(TAGS_FILE);
    if path.is_file() {
        let (created, skipped) = import_tags(db, &path)?;
        summary.tags_created = created;
        summary.tags_skipped = skipped;
    } else {
        warn!(path = %path.display(), "no tags file, skipping");
    }

    info!(?summary, dir = %dir.display(), "import finished");
    Ok(summary)
}

/// Prefixes validation failures with the file and record they came from.
fn at_row(path: &Path, row: usize, err: AppError) -> AppError {
    match err {
        AppError::Validation(message) => {
            AppError::validation(format!("{} row {}: {}", path.display(), row, message))
        }
        other => other,
    }
}

fn import_ingredients(db: &Database, path: &Path) -> Result<(usize, usize)> {
    let mut known: HashSet<(String, String)> = search_ingredients(db, None)?
        .into_iter()
        .map(|ingredient| (ingredient.name.to_lowercase(), ingredient.measurement_unit))
        .collect();

    let mut reader = csv::Reader::from_path(path)?;
    let (mut created, mut skipped) = (0, 0);
    for (i, record) in reader.deserialize::<CreateIngredientRequest>().enumerate() {
        let request = record?;
        let key = (
            request.name.trim().to_lowercase(),
            request.measurement_unit.trim().to_owned(),
        );
        if known.contains(&key) {
            skipped += 1;
            continue;
        }
        create_ingredient(db, request).map_err(|e| at_row(path, i + 1, e))?;
        known.insert(key);
        created += 1;
    }

    info!(created, skipped, path = %path.display(), "ingredients imported");
    Ok((created, skipped))
}

fn import_tags(db: &Database, path: &Path) -> Result<(usize, usize)> {
    let mut known: HashSet<String> = list_tags(db)?.into_iter().map(|tag| tag.slug).collect();

    let mut reader = csv::Reader::from_path(path)?;
    let (mut created, mut skipped) = (0, 0);
    for (i, record) in reader.deserialize::<CreateTagRequest>().enumerate() {
        let request = record?;
        let slug = request.slug.trim().to_owned();
        if known.contains(&slug) {
            skipped += 1;
            continue;
        }
        create_tag(db, request).map_err(|e| at_row(path, i + 1, e))?;
        known.insert(slug);
        created += 1;
    }

    info!(created, skipped, path = %path.display(), "tags imported");
    Ok((created, skipped))
}
