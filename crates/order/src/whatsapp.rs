use std::fmt;
use std::fmt::Write as _;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use zatiaras_common::{Branch, OrderError};

use crate::Cart;
use crate::rupiah::format_rupiah;

const WA_BASE: &str = "https://wa.me";

/// Número de WhatsApp normalizado: só dígitos, com código do país.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WhatsAppNumber(String);

impl WhatsAppNumber {
    /// Aceita `+62 812-3456-7890`, `0812 3456 7890` etc. Um `0` inicial é
    /// trocado pelo código da Indonésia (62).
    pub fn parse(raw: &str) -> Result<Self, OrderError> {
        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
        let digits = match digits.strip_prefix('0') {
            Some(rest) => format!("62{rest}"),
            None => digits,
        };
        if !(8..=15).contains(&digits.len()) {
            return Err(OrderError::InvalidPhone(raw.to_string()));
        }
        Ok(Self(digits))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WhatsAppNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for WhatsAppNumber {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for WhatsAppNumber {
    type Error = OrderError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<WhatsAppNumber> for String {
    fn from(n: WhatsAppNumber) -> Self {
        n.0
    }
}

/// Monta o texto do pedido enviado ao chat da filial.
pub fn format_order_message(cart: &Cart, branch: Branch) -> String {
    let mut msg = String::new();
    // write! em String não falha
    let _ = writeln!(msg, "Halo Zatiaras Juice {}!", branch.display_name());
    let _ = writeln!(msg, "Saya ingin memesan:");
    let _ = writeln!(msg);

    for (i, item) in cart.items().iter().enumerate() {
        match &item.size {
            Some(size) => {
                let _ = writeln!(msg, "{}. {} ({})", i + 1, item.name, size);
            }
            None => {
                let _ = writeln!(msg, "{}. {}", i + 1, item.name);
            }
        }
        let _ = writeln!(
            msg,
            "   {}x @ {} = {}",
            item.quantity,
            format_rupiah(item.price),
            format_rupiah(item.subtotal())
        );
    }

    let _ = writeln!(msg);
    let _ = writeln!(msg, "Total item: {}", cart.total_items());
    let _ = writeln!(msg, "Total harga: {}", format_rupiah(cart.total_price()));
    let _ = writeln!(msg);
    let _ = write!(msg, "Mohon konfirmasi pesanan saya. Terima kasih!");
    msg
}

/// `https://wa.me/<digits>?text=<texto codificado>`.
pub fn whatsapp_url(number: &WhatsAppNumber, text: &str) -> Result<Url, OrderError> {
    let encoded: String = url::form_urlencoded::byte_serialize(text.as_bytes()).collect();
    // form-urlencoded usa '+' para espaço; o cliente do chat espera %20.
    // Um '+' literal já saiu como %2B, então a troca é segura.
    let encoded = encoded.replace('+', "%20");
    Url::parse(&format!("{WA_BASE}/{number}?text={encoded}"))
        .map_err(|e| OrderError::InvalidUrl(e.to_string()))
}

/// Link de pedido para o carrinho, ou `None` se estiver vazio.
pub fn order_link(cart: &Cart, branch: Branch, number: &WhatsAppNumber) -> Result<Option<Url>, OrderError> {
    if cart.is_empty() {
        return Ok(None);
    }
    let text = format_order_message(cart, branch);
    whatsapp_url(number, &text).map(Some)
}
