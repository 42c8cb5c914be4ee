//! Valeurs structurées UPnP : URN de type et nom unique de device.

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use super::errors::TypeError;

/// Catégorie d'un URN de type UPnP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpnpTypeKind {
    Device,
    Service,
}

impl fmt::Display for UpnpTypeKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            UpnpTypeKind::Device => write!(f, "device"),
            UpnpTypeKind::Service => write!(f, "service"),
        }
    }
}

/// Type UPnP structuré, de la forme `urn:<domaine>:<catégorie>:<nom>:<version>`.
///
/// Exemple : `urn:schemas-upnp-org:device:MediaRenderer:1`.
///
/// L'égalité est structurelle (domaine, catégorie, nom et version), et le
/// couple parse / affichage restitue la chaîne d'origine.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UpnpType {
    domain: String,
    kind: UpnpTypeKind,
    name: String,
    version: u32,
}

impl UpnpType {
    pub fn new(
        domain: impl Into<String>,
        kind: UpnpTypeKind,
        name: impl Into<String>,
        version: u32,
    ) -> Self {
        Self {
            domain: domain.into(),
            kind,
            name: name.into(),
            version,
        }
    }

    /// Type de device du domaine standard `schemas-upnp-org`.
    pub fn device(name: impl Into<String>, version: u32) -> Self {
        Self::new("schemas-upnp-org", UpnpTypeKind::Device, name, version)
    }

    /// Type de service du domaine standard `schemas-upnp-org`.
    pub fn service(name: impl Into<String>, version: u32) -> Self {
        Self::new("schemas-upnp-org", UpnpTypeKind::Service, name, version)
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn kind(&self) -> UpnpTypeKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u32 {
        self.version
    }
}

impl FromStr for UpnpType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, TypeError> {
        let mut parts = s.split(':');

        let (Some("urn"), Some(domain), Some(kind), Some(name), Some(version), None) = (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) else {
            return Err(TypeError::InvalidUrn(s.to_string()));
        };

        if domain.is_empty() || name.is_empty() {
            return Err(TypeError::InvalidUrn(s.to_string()));
        }

        let kind = match kind {
            "device" => UpnpTypeKind::Device,
            "service" => UpnpTypeKind::Service,
            _ => return Err(TypeError::InvalidUrn(s.to_string())),
        };

        let version = version
            .parse::<u32>()
            .map_err(|_| TypeError::InvalidVersion(s.to_string()))?;

        Ok(Self {
            domain: domain.to_string(),
            kind,
            name: name.to_string(),
            version,
        })
    }
}

impl fmt::Display for UpnpType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "urn:{}:{}:{}:{}",
            self.domain, self.kind, self.name, self.version
        )
    }
}

/// Nom unique de device, de la forme `uuid:<valeur>`.
///
/// La valeur est conservée telle quelle : les devices du commerce annoncent
/// des identifiants qui ne sont pas toujours des UUID RFC 4122.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UniqueDeviceName {
    uuid: String,
}

impl UniqueDeviceName {
    pub fn new(uuid: impl Into<String>) -> Self {
        Self { uuid: uuid.into() }
    }

    /// UDN frais, généré à partir d'un UUID v4.
    pub fn random() -> Self {
        Self {
            uuid: Uuid::new_v4().to_string(),
        }
    }

    /// Valeur sans le préfixe `uuid:`.
    pub fn uuid(&self) -> &str {
        &self.uuid
    }
}

impl FromStr for UniqueDeviceName {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, TypeError> {
        let uuid = s
            .strip_prefix("uuid:")
            .ok_or_else(|| TypeError::InvalidUdn(s.to_string()))?;

        if uuid.is_empty() {
            return Err(TypeError::InvalidUdn(s.to_string()));
        }

        Ok(Self {
            uuid: uuid.to_string(),
        })
    }
}

impl fmt::Display for UniqueDeviceName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "uuid:{}", self.uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upnp_type_roundtrip() {
        let raw = "urn:schemas-upnp-org:device:MediaRenderer:1";
        let parsed: UpnpType = raw.parse().unwrap();

        assert_eq!(parsed.domain(), "schemas-upnp-org");
        assert_eq!(parsed.kind(), UpnpTypeKind::Device);
        assert_eq!(parsed.name(), "MediaRenderer");
        assert_eq!(parsed.version(), 1);
        assert_eq!(parsed.to_string(), raw);
    }

    #[test]
    fn test_upnp_type_service_roundtrip() {
        let raw = "urn:schemas-upnp-org:service:AVTransport:2";
        let parsed: UpnpType = raw.parse().unwrap();

        assert_eq!(parsed.kind(), UpnpTypeKind::Service);
        assert_eq!(parsed.to_string(), raw);
    }

    #[test]
    fn test_upnp_type_structural_equality() {
        let a: UpnpType = "urn:schemas-upnp-org:device:Basic:1".parse().unwrap();
        let b = UpnpType::device("Basic", 1);

        assert_eq!(a, b);
        assert_ne!(a, UpnpType::device("Basic", 2));
    }

    #[test]
    fn test_upnp_type_rejects_malformed() {
        assert!("".parse::<UpnpType>().is_err());
        assert!("urn:device:Basic:1".parse::<UpnpType>().is_err());
        assert!("urn:schemas-upnp-org:gadget:Basic:1".parse::<UpnpType>().is_err());
        assert!("urn:schemas-upnp-org:device:Basic:one".parse::<UpnpType>().is_err());
        assert!("urn:schemas-upnp-org:device:Basic:1:extra".parse::<UpnpType>().is_err());
    }

    #[test]
    fn test_udn_roundtrip() {
        let parsed: UniqueDeviceName = "uuid:abc-123".parse().unwrap();

        assert_eq!(parsed.uuid(), "abc-123");
        assert_eq!(parsed.to_string(), "uuid:abc-123");
    }

    #[test]
    fn test_udn_requires_prefix() {
        assert!("abc-123".parse::<UniqueDeviceName>().is_err());
        assert!("uuid:".parse::<UniqueDeviceName>().is_err());
    }

    #[test]
    fn test_random_udn_is_unique() {
        let a = UniqueDeviceName::random();
        let b = UniqueDeviceName::random();

        assert_ne!(a, b);
        assert!(a.to_string().starts_with("uuid:"));
    }
}
