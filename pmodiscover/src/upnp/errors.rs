//! Erreurs du modèle UPnP.

use thiserror::Error;

/// Erreurs de parsing des valeurs structurées UPnP.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TypeError {
    /// URN de type mal formé
    #[error("Malformed UPnP type URN: '{0}'")]
    InvalidUrn(String),

    /// Version non numérique dans un URN de type
    #[error("Invalid version in UPnP type URN: '{0}'")]
    InvalidVersion(String),

    /// Nom unique de device mal formé
    #[error("Malformed unique device name: '{0}'")]
    InvalidUdn(String),

    /// Propriété absente du sac
    #[error("Device property '{0}' is not set")]
    MissingProperty(&'static str),
}

/// Erreurs structurelles sur l'arbre de devices.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TreeError {
    /// L'entité appartient déjà à un parent
    #[error("Entity is already attached to a parent")]
    AlreadyAttached,

    /// L'entité figure déjà dans cette collection
    #[error("Entity is already present in this collection")]
    AlreadyPresent,

    /// L'attachement créerait un cycle parent/enfant
    #[error("Attachment would create a cycle")]
    WouldCycle,
}

/// Erreurs du codec XML de description de device.
#[derive(Error, Debug)]
pub enum XmlError {
    /// Aucun élément `device` dans le document
    #[error("Document contains no 'device' element")]
    MissingDeviceElement,

    /// Élément inattendu dans une séquence homogène
    #[error("Unexpected element '{0}' in '{1}'")]
    UnexpectedElement(String, &'static str),

    /// Fin de document au milieu d'un élément
    #[error("Document truncated while reading '{0}'")]
    Truncated(String),

    /// Erreur structurelle pendant la construction de l'arbre
    #[error("Tree error while building parsed document: {0}")]
    Tree(#[from] TreeError),

    /// Erreur du lecteur XML sous-jacent
    #[error(transparent)]
    Xml(#[from] quick_xml::Error),

    /// Erreur de décodage du texte
    #[error(transparent)]
    Encoding(#[from] quick_xml::encoding::EncodingError),
}
