use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use zatiaras_common::{Branch, CART_SCHEMA_VERSION, CART_STORAGE_KEY, StorageError};
use zatiaras_storage::Storage;

use crate::{Cart, LineKey, Product};

#[derive(Serialize)]
struct CartEnvelopeRef<'a> {
    version: u32,
    cart: &'a Cart,
}

#[derive(Deserialize)]
struct CartEnvelope {
    version: u32,
    cart: Cart,
}

/// Resultado da decodificação do carrinho persistido.
enum Decoded {
    Current(Cart),
    /// Formato antigo sem envelope de versão.
    Legacy(Cart),
}

/// Carrinho espelhado no storage: toda mutação grava o carrinho inteiro.
///
/// Falhas de storage são logadas e engolidas; o carrinho em memória segue
/// valendo.
pub struct CartStore<S: Storage> {
    storage: S,
    cart: Cart,
}

impl<S: Storage> CartStore<S> {
    /// Hidrata a partir do storage. Formato legado é migrado; versão
    /// desconhecida ou JSON inválido são descartados.
    pub fn load(storage: S) -> Self {
        let cart = match storage.get_item(CART_STORAGE_KEY) {
            Ok(None) => Cart::new(),
            Ok(Some(json)) => match decode_cart(&json) {
                Ok(Decoded::Current(cart)) => {
                    debug!("carrinho hidratado: {} itens", cart.total_items());
                    cart
                }
                Ok(Decoded::Legacy(cart)) => {
                    info!("carrinho em formato legado migrado para v{CART_SCHEMA_VERSION}");
                    let store = Self { storage, cart };
                    store.persist();
                    return store;
                }
                Err(e) => {
                    warn!("carrinho persistido descartado: {e}");
                    if let Err(e) = storage.remove_item(CART_STORAGE_KEY) {
                        warn!("falha ao remover carrinho inválido: {e}");
                    }
                    Cart::new()
                }
            },
            Err(e) => {
                warn!("falha ao ler carrinho do storage: {e}");
                Cart::new()
            }
        };
        Self { storage, cart }
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn add_to_cart(&mut self, product: Product) {
        self.cart.add_to_cart(product);
        self.persist();
    }

    pub fn update_quantity(&mut self, key: &LineKey, quantity: i64) -> bool {
        let found = self.cart.update_quantity(key, quantity);
        if found {
            self.persist();
        }
        found
    }

    pub fn remove_from_cart(&mut self, key: &LineKey) -> bool {
        let removed = self.cart.remove_from_cart(key);
        if removed {
            self.persist();
        }
        removed
    }

    pub fn remove_product(&mut self, id: &str) -> usize {
        let removed = self.cart.remove_product(id);
        if removed > 0 {
            self.persist();
        }
        removed
    }

    pub fn clear_cart(&mut self) {
        self.cart.clear_cart();
        self.persist();
    }

    pub fn set_branch(&mut self, branch: Branch) {
        self.cart.set_branch(branch);
        self.persist();
    }

    fn persist(&self) {
        if let Err(e) = self.try_persist() {
            warn!("falha ao persistir carrinho: {e}");
        }
    }

    fn try_persist(&self) -> Result<(), StorageError> {
        let envelope = CartEnvelopeRef {
            version: CART_SCHEMA_VERSION,
            cart: &self.cart,
        };
        let json = serde_json::to_string(&envelope)?;
        self.storage.set_item(CART_STORAGE_KEY, &json)
    }
}

fn decode_cart(json: &str) -> Result<Decoded, StorageError> {
    let raw: Value = serde_json::from_str(json)?;
    if raw.get("version").is_none() {
        let cart: Cart = serde_json::from_value(raw)?;
        return Ok(Decoded::Legacy(cart.normalized()));
    }

    let envelope: CartEnvelope = serde_json::from_value(raw)?;
    if envelope.version != CART_SCHEMA_VERSION {
        return Err(StorageError::UnsupportedVersion(envelope.version));
    }
    Ok(Decoded::Current(envelope.cart.normalized()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;
    use zatiaras_storage::{FileStorage, MemoryStorage};

    fn mangga() -> Product {
        Product::new("jus-mangga", "Jus Mangga", 20_000)
    }

    #[test]
    fn every_mutation_is_mirrored() {
        let storage = Arc::new(MemoryStorage::new());
        let mut store = CartStore::load(storage.clone());
        store.add_to_cart(mangga());
        store.set_branch(Branch::Berau);

        let reloaded = CartStore::load(storage.clone());
        assert_eq!(reloaded.cart(), store.cart());
        assert_eq!(reloaded.cart().branch(), Some(Branch::Berau));

        store.clear_cart();
        let reloaded = CartStore::load(storage);
        assert!(reloaded.cart().is_empty());
    }

    #[test]
    fn stored_form_is_versioned() {
        let storage = Arc::new(MemoryStorage::new());
        let mut store = CartStore::load(storage.clone());
        store.add_to_cart(mangga());

        let json = storage.get_item(CART_STORAGE_KEY).unwrap().unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["version"], CART_SCHEMA_VERSION);
        assert_eq!(value["cart"]["totalItems"], 1);
    }

    #[test]
    fn legacy_shape_is_migrated() {
        let storage = Arc::new(MemoryStorage::new());
        let legacy = r#"{
            "items": [{"id": "jus-mangga", "name": "Jus Mangga", "price": 20000, "quantity": 3}],
            "totalItems": 3,
            "totalPrice": 1,
            "branch": "samarinda"
        }"#;
        storage.set_item(CART_STORAGE_KEY, legacy).unwrap();

        let store = CartStore::load(storage.clone());
        assert_eq!(store.cart().total_items(), 3);
        assert_eq!(store.cart().total_price(), 60_000);
        assert_eq!(store.cart().branch(), Some(Branch::Samarinda));

        // Regravado já com envelope
        let json = storage.get_item(CART_STORAGE_KEY).unwrap().unwrap();
        assert!(json.starts_with("{\"version\":1"));
    }

    #[test]
    fn unknown_version_discarded() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .set_item(CART_STORAGE_KEY, r#"{"version":7,"cart":{"items":[]}}"#)
            .unwrap();
        let store = CartStore::load(storage.clone());
        assert!(store.cart().is_empty());
        assert_eq!(storage.get_item(CART_STORAGE_KEY).unwrap(), None);
    }

    #[test]
    fn corrupted_json_discarded() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set_item(CART_STORAGE_KEY, "{\"items\": [").unwrap();
        let store = CartStore::load(storage.clone());
        assert!(store.cart().is_empty());
        assert_eq!(storage.get_item(CART_STORAGE_KEY).unwrap(), None);
    }

    #[test]
    fn quota_failure_keeps_cart_in_memory() {
        let storage = Arc::new(MemoryStorage::with_quota(8));
        let mut store = CartStore::load(storage.clone());
        store.add_to_cart(mangga());
        assert_eq!(store.cart().total_items(), 1);
        assert_eq!(storage.get_item(CART_STORAGE_KEY).unwrap(), None);
    }

    #[test]
    fn unchanged_operations_skip_write() {
        let storage = Arc::new(MemoryStorage::new());
        let mut store = CartStore::load(storage.clone());
        assert!(!store.remove_from_cart(&LineKey::new("x", None)));
        assert!(!store.update_quantity(&LineKey::new("x", None), 2));
        assert_eq!(store.remove_product("x"), 0);
        assert!(storage.is_empty());
    }

    #[test]
    fn file_backed_store() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();
        let mut store = CartStore::load(storage.clone());
        store.add_to_cart(mangga().with_size("Large"));
        store.update_quantity(&LineKey::new("jus-mangga", Some("Large")), 5);

        let reloaded = CartStore::load(storage);
        assert_eq!(reloaded.cart().total_items(), 5);
        assert_eq!(reloaded.cart().total_price(), 100_000);
    }
}
