use tracing::{debug, info};
use url::Url;

use zatiaras_common::{Branch, OrderError};
use zatiaras_storage::Storage;

use crate::whatsapp::{format_order_message, whatsapp_url};
use crate::{BranchDirectory, CartStore};

/// Quem abre o link do pedido (nova aba no navegador, terminal na CLI).
pub trait LinkOpener {
    fn open(&mut self, url: &Url);
}

impl<F: FnMut(&Url)> LinkOpener for F {
    fn open(&mut self, url: &Url) {
        self(url)
    }
}

/// Passa o pedido para o chat da filial.
///
/// Carrinho vazio é no-op: retorna `Ok(None)`, não abre nada e não mexe no
/// estado. Caso contrário abre o link e limpa o carrinho. A filial é a do
/// carrinho, ou `page_branch` se o carrinho não tiver uma.
pub fn handle_whatsapp_order<S: Storage>(
    store: &mut CartStore<S>,
    directory: &BranchDirectory,
    page_branch: Branch,
    opener: &mut impl LinkOpener,
) -> Result<Option<Url>, OrderError> {
    if store.cart().is_empty() {
        debug!("pedido ignorado: carrinho vazio");
        return Ok(None);
    }

    let branch = store.cart().branch().unwrap_or(page_branch);
    let number = directory.whatsapp(branch)?;
    let text = format_order_message(store.cart(), branch);
    let url = whatsapp_url(number, &text)?;

    opener.open(&url);
    info!(
        "pedido enviado para {branch}: {} itens, total {}",
        store.cart().total_items(),
        store.cart().total_price()
    );

    store.clear_cart();
    Ok(Some(url))
}
