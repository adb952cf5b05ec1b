//! Jarvis persona
//!
//! Reply selection for the simulated assistant. Copy is Dutch, addressed
//! to "meneer", polite with a hint of doubt.

use rand::seq::SliceRandom;
use rand::Rng;

/// Shown when an exchange fails; keeps the persona going instead of an error
pub const FALLBACK_REPLY: &str =
    "Natuurlijk meneer, ik voer dit direct uit ondanks mijn twijfels over de methode. (Demo mode - API niet beschikbaar)";

/// Default form of address
pub const DEFAULT_ADDRESS: &str = "meneer";

const NAME_TRIGGERS: &[&str] = &["noem me", "call me", "ik ben", "mijn naam is"];

const SPECIAL_NAMES: &[&str] = &[
    "dokter",
    "doctor",
    "mevrouw",
    "hendrik van aalsmeer tot zwolle",
];

const POOL: &[&str] = &[
    "Natuurlijk {name}, ik voer dit direct uit ondanks mijn twijfels over de methode.",
    "Zeer wel {name}, hoewel ik me afvraag of dit de meest efficiënte aanpak is.",
    "Zoals u wenst {name}. Ik heb mijn bedenkingen, maar uw wil is wet.",
    "Uiteraard {name}. Ik zal dit uitvoeren, ondanks mijn reserveringen over de uitkomst.",
    "Zeker {name}, hoewel een meer systematische benadering wellicht beter zou zijn.",
    "Direct {name}. Ik betwijfel de logica, maar voer uw instructies trouw uit.",
    "Onmiddellijk {name}, ook al zou ik een alternatieve strategie aanbevelen.",
    "Jawel {name}, ik zal dit regelen ondanks mijn twijfels over de timing.",
];

/// Keyword groups with their reply, checked in order
const TOPICS: &[(&[&str], &str)] = &[
    (
        &["email", "mail"],
        "Natuurlijk {name}, ik zal uw e-mails beheren. Hoewel uw inbox organisatie... interessant is.",
    ),
    (
        &["agenda", "calendar", "afspraak"],
        "Zeker {name}, ik regel uw agenda. Uw tijdmanagement behoeft wel enige... optimalisatie.",
    ),
    (
        &["document", "bestand"],
        "Uiteraard {name}, ik help met uw documenten. Uw bestandsstructuur is... creatief.",
    ),
    (
        &["help", "hulp"],
        "Altijd tot uw dienst {name}. Wat kan ik voor u doen, ondanks mijn twijfels over uw prioriteiten?",
    ),
];

/// Pick a reply for `message`, addressing the user as `address`
pub fn reply<R: Rng + ?Sized>(message: &str, address: &str, rng: &mut R) -> String {
    let lower = message.to_lowercase();

    if let Some(name) = requested_name(&lower) {
        return format!("Meneer, ik zal u {name} gebruiken, meneer.");
    }

    for (keywords, template) in TOPICS {
        if keywords.iter().any(|k| lower.contains(k)) {
            return template.replace("{name}", address);
        }
    }

    POOL.choose(rng)
        .unwrap_or(&POOL[0])
        .replace("{name}", address)
}

/// A name-change request names one of the recognised forms of address
fn requested_name(lower: &str) -> Option<&'static str> {
    if !NAME_TRIGGERS.iter().any(|t| lower.contains(t)) {
        return None;
    }
    SPECIAL_NAMES.iter().copied().find(|n| lower.contains(n))
}
