//! Persistent short link storage on top of redb

use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};

use crate::database::{TABLE_SHORT_LINKS, TABLE_SHORT_LINK_TARGETS};
use crate::shortener::{Binding, LinkError, LinkStore, ShortKey};

/// Stores short links in two tables: key to path and path to key.
///
/// redb allows a single write transaction at a time, so the lookup and the
/// insert in `bind` cannot interleave with another writer.
#[derive(Clone)]
pub struct RedbLinkStore {
    db: Arc<Database>,
}

impl RedbLinkStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

fn storage<E: Into<redb::Error>>(err: E) -> LinkError {
    LinkError::Storage(err.into().to_string())
}

impl LinkStore for RedbLinkStore {
    fn bind(
        &self,
        url: &str,
        candidates: &mut dyn Iterator<Item = ShortKey>,
    ) -> Result<Binding, LinkError> {
        let write_txn = self.db.begin_write().map_err(storage)?;
        let binding = {
            let mut targets = write_txn
                .open_table(TABLE_SHORT_LINK_TARGETS)
                .map_err(storage)?;

            let existing = targets
                .get(url)
                .map_err(storage)?
                .map(|guard| guard.value().to_owned());

            match existing {
                Some(raw) => Binding::Existing(ShortKey::parse(&raw)?),
                None => {
                    let mut links = write_txn.open_table(TABLE_SHORT_LINKS).map_err(storage)?;
                    let mut chosen = None;
                    for key in candidates {
                        if links.get(key.as_str()).map_err(storage)?.is_none() {
                            chosen = Some(key);
                            break;
                        }
                    }
                    let key = chosen.ok_or_else(|| LinkError::KeySpaceExhausted(url.to_owned()))?;

                    links.insert(key.as_str(), url).map_err(storage)?;
                    targets.insert(url, key.as_str()).map_err(storage)?;
                    Binding::Created(key)
                }
            }
        };

        match binding {
            Binding::Existing(_) => write_txn.abort().map_err(storage)?,
            Binding::Created(_) => write_txn.commit().map_err(storage)?,
        }

        Ok(binding)
    }

    fn resolve(&self, key: &ShortKey) -> Result<Option<String>, LinkError> {
        let read_txn = self.db.begin_read().map_err(storage)?;
        let table = read_txn.open_table(TABLE_SHORT_LINKS).map_err(storage)?;

        let url = table
            .get(key.as_str())
            .map_err(storage)?
            .map(|guard| guard.value().to_owned());
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::init_db;
    use crate::shortener::LinkShortener;
    use tempfile::NamedTempFile;

    fn store() -> (RedbLinkStore, NamedTempFile) {
        let temp_db = NamedTempFile::new().unwrap();
        let db = init_db(temp_db.path().to_str().unwrap()).unwrap();
        (RedbLinkStore::new(Arc::new(db)), temp_db)
    }

    #[test]
    fn shorten_and_restore() {
        let (store, _temp_db) = store();
        let shortener = LinkShortener::new(store);

        let key = shortener.shorten("/recipes/42/").unwrap();
        assert_eq!(
            shortener.restore(key.as_str()).unwrap().as_deref(),
            Some("/recipes/42/")
        );
        assert_eq!(shortener.restore("zzzzzz").unwrap(), None);
    }

    #[test]
    fn stored_key_survives_key_length_change() {
        let (store, _temp_db) = store();

        let long = LinkShortener::with_key_len(store.clone(), 10)
            .shorten("/recipes/5/")
            .unwrap();
        let again = LinkShortener::new(store).shorten("/recipes/5/").unwrap();

        assert_eq!(long.as_str().len(), 10);
        assert_eq!(again, long);
    }

    #[test]
    fn data_persists_across_reopen() {
        let temp_db = NamedTempFile::new().unwrap();
        let path = temp_db.path().to_str().unwrap().to_owned();

        let key = {
            let db = init_db(&path).unwrap();
            LinkShortener::new(RedbLinkStore::new(Arc::new(db)))
                .shorten("/recipes/8/")
                .unwrap()
        };

        let db = init_db(&path).unwrap();
        let shortener = LinkShortener::new(RedbLinkStore::new(Arc::new(db)));
        assert_eq!(
            shortener.restore(key.as_str()).unwrap().as_deref(),
            Some("/recipes/8/")
        );
    }

    #[test]
    fn collisions_resolve_to_longer_keys() {
        let (store, _temp_db) = store();
        let shortener = LinkShortener::with_key_len(store, 1);

        let keys: Vec<_> = (0..40)
            .map(|i| shortener.shorten(&format!("/recipes/{}/", i)).unwrap())
            .collect();

        assert!(keys.iter().any(|k| k.as_str().len() > 1));
        for (i, key) in keys.iter().enumerate() {
            assert_eq!(
                shortener.restore(key.as_str()).unwrap(),
                Some(format!("/recipes/{}/", i))
            );
        }
    }
}
