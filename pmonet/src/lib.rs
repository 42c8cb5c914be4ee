//! # pmonet - Utilitaires réseau
//!
//! Petites fonctions d'inspection des interfaces réseau locales, partagées
//! par les couches de découverte.
//!
//! # Fonctions principales
//!
//! - [`unicast_addresses`] : liste les adresses unicast locales retenues par
//!   un prédicat
//! - [`unicast_addresses_same_family`] : adresses de la même famille qu'une
//!   adresse de référence

mod ip_utils;

pub use ip_utils::{unicast_addresses, unicast_addresses_same_family};
