//! Message catalogs for the texts the dispatcher itself produces.
//!
//! The catalog is picked per request from the required `CLIENT_LANGUAGE`
//! configuration key. Only the primary language subtag counts, so `en_GB`,
//! `en-US` and `en_GB.UTF-8` all select English. An unsupported language
//! fails initialization with an assertion.
//!
//! ```rust
//! use mvc_dispatch::messages::{Catalog, Message};
//!
//! let catalog = Catalog::from_locale("fr_FR.UTF-8").unwrap();
//! assert_eq!(catalog.text(Message::InvalidUrl), "L'URL est invalide.");
//! ```

use crate::error::{MSG_INTERNAL_ERROR, MSG_INVALID_URL, MSG_NOT_AUTHORIZED};

/// Text the dispatcher may show or raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Message {
    NotAuthorized,
    InvalidUrl,
    InternalError,
    HeadersSent,
    NoSecurityPolicy,
}

/// Supported catalogs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Catalog {
    #[default]
    English,
    French,
}

impl Catalog {
    /// Catalog for a locale name such as `en_GB` or `fr-FR`.
    #[must_use]
    pub fn from_locale(locale: &str) -> Option<Self> {
        let primary = locale
            .trim()
            .split(['_', '-', '.', '@'])
            .next()
            .unwrap_or_default();
        if primary.eq_ignore_ascii_case("en") {
            Some(Catalog::English)
        } else if primary.eq_ignore_ascii_case("fr") {
            Some(Catalog::French)
        } else {
            None
        }
    }

    /// ISO 639-1 code of the catalog.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Catalog::English => "en",
            Catalog::French => "fr",
        }
    }

    #[must_use]
    pub fn text(self, message: Message) -> &'static str {
        match (self, message) {
            (Catalog::English, Message::NotAuthorized) => MSG_NOT_AUTHORIZED,
            (Catalog::English, Message::InvalidUrl) => MSG_INVALID_URL,
            (Catalog::English, Message::InternalError) => MSG_INTERNAL_ERROR,
            (Catalog::English, Message::HeadersSent) => "HTTP headers have already been sent.",
            (Catalog::English, Message::NoSecurityPolicy) => "No security policy is loaded.",
            (Catalog::French, Message::NotAuthorized) => {
                "Vous n'êtes pas autorisé à accéder à cette page."
            }
            (Catalog::French, Message::InvalidUrl) => "L'URL est invalide.",
            (Catalog::French, Message::InternalError) => {
                "Erreur interne. Veuillez relancer l'application."
            }
            (Catalog::French, Message::HeadersSent) => {
                "Les en-têtes HTTP ont déjà été envoyés."
            }
            (Catalog::French, Message::NoSecurityPolicy) => {
                "Aucune politique de sécurité n'est chargée."
            }
        }
    }
}
