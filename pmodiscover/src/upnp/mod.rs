//! # Module UPnP - Modèle de description de devices
//!
//! Modèle hiérarchique des devices UPnP tel que décrit par le document
//! `description.xml` : un device porte un sac de propriétés, des
//! sous-devices, des services et des icônes.
//!
//! ## Architecture
//!
//! - [`DeviceTree`] : arène possédant tous les nœuds ; les identifiants
//!   ([`DeviceId`], [`ServiceId`], [`IconId`], [`RootId`]) sont des index
//!   copiables valables uniquement pour l'arène qui les a créés
//! - [`Device`], [`Service`], [`Icon`] : nœuds avec sac de propriétés et
//!   accesseurs typés
//! - [`Root`] : contexte racine, point d'abonnement aux entrées/sorties de
//!   devices sur tout l'arbre
//! - [`HookedCollection`] : conteneur ordonné qui déclenche les hooks
//!   d'attachement, seul mécanisme de câblage des références parent/racine
//! - [`UpnpXml`] / [`read_device`] : codec XML du document de description

mod bag;
mod collection;
pub mod errors;
mod tree;
mod types;
mod xml;

pub use bag::PropertyBag;
pub use collection::{CollectionHooks, HookedCollection};
pub use tree::{
    Device, DeviceId, DeviceIter, DeviceTree, Icon, IconId, Root, RootId, Service, ServiceId,
    TreeEvent, TreeEventKind,
};
pub use types::{UniqueDeviceName, UpnpType, UpnpTypeKind};
pub use xml::{UpnpXml, read_device};
