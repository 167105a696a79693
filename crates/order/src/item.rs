use serde::{Deserialize, Serialize};

/// Chave de uma linha do carrinho: produto + tamanho escolhido.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineKey {
    pub id: String,
    pub size: Option<String>,
}

impl LineKey {
    pub fn new(id: impl Into<String>, size: Option<&str>) -> Self {
        Self {
            id: id.into(),
            size: size.map(str::to_string),
        }
    }
}

/// Produto do catálogo, no formato que o backend entrega.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    /// Preço em Rupiah inteiros.
    pub price: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Product {
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: u64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            size: None,
            category: None,
            image: None,
        }
    }

    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = Some(size.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// Linha do carrinho.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: String,
    pub name: String,
    pub price: u64,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl CartItem {
    pub fn key(&self) -> LineKey {
        LineKey::new(self.id.clone(), self.size.as_deref())
    }

    pub fn matches(&self, key: &LineKey) -> bool {
        self.id == key.id && self.size == key.size
    }

    pub fn subtotal(&self) -> u64 {
        self.price.saturating_mul(self.quantity as u64)
    }
}

impl From<Product> for CartItem {
    fn from(p: Product) -> Self {
        Self {
            id: p.id,
            name: p.name,
            price: p.price,
            quantity: 1,
            size: p.size,
            category: p.category,
            image: p.image,
        }
    }
}
