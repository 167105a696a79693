#![forbid(unsafe_code)]

mod cart;
mod checkout;
mod directory;
mod item;
mod rupiah;
mod store;
mod whatsapp;

pub use cart::Cart;
pub use checkout::{LinkOpener, handle_whatsapp_order};
pub use directory::{BranchContact, BranchDirectory, DeliveryLink, DeliveryPlatform};
pub use item::{CartItem, LineKey, Product};
pub use rupiah::format_rupiah;
pub use store::CartStore;
pub use whatsapp::{WhatsAppNumber, format_order_message, order_link, whatsapp_url};
