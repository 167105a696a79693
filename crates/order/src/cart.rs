use serde::{Deserialize, Serialize};
use tracing::debug;

use zatiaras_common::Branch;

use crate::item::{CartItem, LineKey, Product};

/// Carrinho de compras.
///
/// Invariante: `total_items == Σ quantity` e `total_price == Σ price × quantity`,
/// recalculados em toda mutação.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    items: Vec<CartItem>,
    #[serde(default)]
    total_items: u64,
    #[serde(default)]
    total_price: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    branch: Option<Branch>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn total_items(&self) -> u64 {
        self.total_items
    }

    pub fn total_price(&self) -> u64 {
        self.total_price
    }

    pub fn branch(&self) -> Option<Branch> {
        self.branch
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn quantity_of(&self, key: &LineKey) -> Option<u32> {
        self.items.iter().find(|i| i.matches(key)).map(|i| i.quantity)
    }

    /// Mesmo `(id, size)` incrementa a linha existente; senão adiciona com 1.
    pub fn add_to_cart(&mut self, product: Product) {
        let key = LineKey::new(product.id.clone(), product.size.as_deref());
        match self.items.iter_mut().find(|i| i.matches(&key)) {
            Some(line) => line.quantity = line.quantity.saturating_add(1),
            None => self.items.push(CartItem::from(product)),
        }
        self.recompute_totals();
        debug!("carrinho: +1 {:?}, total {} itens", key, self.total_items);
    }

    /// Define a quantidade da linha. Valores menores que 1 viram 1: a linha
    /// nunca é removida por aqui. Retorna `false` se a linha não existe.
    pub fn update_quantity(&mut self, key: &LineKey, quantity: i64) -> bool {
        let Some(line) = self.items.iter_mut().find(|i| i.matches(key)) else {
            return false;
        };
        line.quantity = u32::try_from(quantity.max(1)).unwrap_or(u32::MAX);
        self.recompute_totals();
        true
    }

    /// Remove a linha com exatamente este `(id, size)`.
    pub fn remove_from_cart(&mut self, key: &LineKey) -> bool {
        let before = self.items.len();
        self.items.retain(|i| !i.matches(key));
        self.recompute_totals();
        self.items.len() != before
    }

    /// Remove todas as variantes de tamanho de um produto. Retorna quantas
    /// linhas saíram.
    pub fn remove_product(&mut self, id: &str) -> usize {
        let before = self.items.len();
        self.items.retain(|i| i.id != id);
        self.recompute_totals();
        before - self.items.len()
    }

    pub fn clear_cart(&mut self) {
        self.items.clear();
        self.branch = None;
        self.recompute_totals();
    }

    /// Marca a filial de atendimento. Não valida os itens já adicionados.
    pub fn set_branch(&mut self, branch: Branch) {
        self.branch = Some(branch);
    }

    /// Normaliza um carrinho vindo do storage: quantidades mínimas e totais
    /// recalculados (os totais gravados nunca são confiáveis).
    pub(crate) fn normalized(mut self) -> Self {
        for line in &mut self.items {
            line.quantity = line.quantity.max(1);
        }
        self.recompute_totals();
        self
    }

    fn recompute_totals(&mut self) {
        self.total_items = self
            .items
            .iter()
            .fold(0u64, |acc, i| acc.saturating_add(i.quantity as u64));
        self.total_price = self
            .items
            .iter()
            .fold(0u64, |acc, i| acc.saturating_add(i.subtotal()));
    }
}
