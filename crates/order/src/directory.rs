use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use zatiaras_common::{Branch, OrderError};

use crate::WhatsAppNumber;

/// Plataformas de delivery onde as filiais estão cadastradas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryPlatform {
    GoFood,
    GrabFood,
    ShopeeFood,
}

impl fmt::Display for DeliveryPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeliveryPlatform::GoFood => "GoFood",
            DeliveryPlatform::GrabFood => "GrabFood",
            DeliveryPlatform::ShopeeFood => "ShopeeFood",
        };
        f.write_str(name)
    }
}

/// Link estático do merchant numa plataforma, sem parâmetros.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryLink {
    pub platform: DeliveryPlatform,
    pub url: Url,
}

/// Contatos de uma filial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchContact {
    pub whatsapp: WhatsAppNumber,
    #[serde(default)]
    pub delivery: Vec<DeliveryLink>,
}

/// Diretório filial → contatos. Carregado de JSON no formato
/// `{ "berau": { "whatsapp": "...", "delivery": [...] }, ... }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchDirectory {
    contacts: HashMap<Branch, BranchContact>,
}

impl BranchDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_contact(mut self, branch: Branch, contact: BranchContact) -> Self {
        self.contacts.insert(branch, contact);
        self
    }

    pub fn contact(&self, branch: Branch) -> Result<&BranchContact, OrderError> {
        self.contacts
            .get(&branch)
            .ok_or_else(|| OrderError::MissingContact(branch.to_string()))
    }

    pub fn whatsapp(&self, branch: Branch) -> Result<&WhatsAppNumber, OrderError> {
        self.contact(branch).map(|c| &c.whatsapp)
    }

    pub fn delivery_links(&self, branch: Branch) -> &[DeliveryLink] {
        self.contacts
            .get(&branch)
            .map(|c| c.delivery.as_slice())
            .unwrap_or(&[])
    }
}
