//! Socket UDP multicast pour la découverte SSDP.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, warn};

/// Taille du buffer de réception du socket de découverte.
const RECV_BUFFER_SIZE: usize = 4096;

/// Socket UDP configuré pour le trafic de découverte SSDP.
///
/// Le socket est créé avec `SO_REUSEADDR` pour que plusieurs clients de
/// découverte puissent partager le même port local (les répondeurs SSDP et
/// les control points cohabitent sur des ports bien connus).
///
/// Le modèle d'exécution est mono-thread par socket : l'adhésion multicast
/// est une opération d'initialisation, à ne pas appeler en concurrence avec
/// la réception sans synchronisation externe.
pub struct SsdpSocket {
    socket: UdpSocket,
}

impl SsdpSocket {
    /// Socket lié à `0.0.0.0` sur un port éphémère.
    pub fn new() -> io::Result<Self> {
        Self::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0))
    }

    /// Socket lié à un endpoint local choisi par l'appelant.
    pub fn bind(local: SocketAddr) -> io::Result<Self> {
        let domain = if local.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };

        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.set_recv_buffer_size(RECV_BUFFER_SIZE)?;
        socket.bind(&local.into())?;

        Ok(Self {
            socket: socket.into(),
        })
    }

    /// Rejoint le groupe multicast de `remote` sur toutes les interfaces
    /// locales de la même famille d'adresses.
    ///
    /// Une interface déjà membre du groupe répond `AddrInUse` : l'erreur est
    /// ignorée, les redémarrages de découverte répètent l'adhésion sans
    /// conséquence. Toute autre erreur socket interrompt la boucle et est
    /// propagée.
    pub fn join_multicast_group_all_interfaces(&self, remote: SocketAddr) -> io::Result<()> {
        match remote.ip() {
            IpAddr::V4(group) => {
                for local in pmonet::unicast_addresses_same_family(&remote.ip())? {
                    let IpAddr::V4(local) = local else { continue };
                    self.join_v4(&group, &local)?;
                }
                Ok(())
            }
            IpAddr::V6(group) => {
                // get_if_addrs n'expose pas les index d'interface : adhésion
                // unique via l'interface par défaut.
                match self.socket.join_multicast_v6(&group, 0) {
                    Ok(()) => {
                        debug!("SSDP: joined {} on default interface", group);
                        Ok(())
                    }
                    Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                        debug!("SSDP: already a member of {}", group);
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }

    fn join_v4(&self, group: &Ipv4Addr, local: &Ipv4Addr) -> io::Result<()> {
        match self.socket.join_multicast_v4(group, local) {
            Ok(()) => {
                debug!("SSDP: joined {} on {}", group, local);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                debug!("SSDP: already a member of {} on {}", group, local);
                Ok(())
            }
            Err(e) => {
                warn!("SSDP: failed to join {} on {}: {}", group, local, e);
                Err(e)
            }
        }
    }

    /// Envoie un datagramme vers `target`.
    pub fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize> {
        self.socket.send_to(buf, target)
    }

    /// Reçoit un datagramme (bloquant, borné par le timeout de lecture).
    pub fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf)
    }

    /// Endpoint local effectif du socket.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Timeout appliqué aux réceptions bloquantes.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.socket.set_read_timeout(timeout)
    }

    /// Active ou coupe la boucle locale du trafic multicast IPv4.
    pub fn set_multicast_loop_v4(&self, enabled: bool) -> io::Result<()> {
        self.socket.set_multicast_loop_v4(enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bind_is_ephemeral() {
        let socket = SsdpSocket::new().unwrap();
        let addr = socket.local_addr().unwrap();

        assert!(addr.ip().is_unspecified());
        assert_ne!(addr.port(), 0);
    }

    #[test]
    fn test_bind_chosen_endpoint() {
        let socket = SsdpSocket::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = socket.local_addr().unwrap();

        assert_eq!(addr.ip(), IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn test_reuse_address_allows_shared_port() {
        // Deux sockets de découverte sur le même port local
        let first = SsdpSocket::bind("0.0.0.0:0".parse().unwrap()).unwrap();
        let port = first.local_addr().unwrap().port();

        let second = SsdpSocket::bind(format!("0.0.0.0:{port}").parse().unwrap());
        assert!(second.is_ok());
    }

    #[test]
    fn test_loopback_roundtrip() {
        let receiver = SsdpSocket::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let sender = SsdpSocket::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();

        let target = receiver.local_addr().unwrap();
        sender.send_to(b"ping", target).unwrap();

        let mut buf = [0u8; 64];
        let (n, from) = receiver.recv_from(&mut buf).unwrap();

        assert_eq!(&buf[..n], b"ping");
        assert_eq!(from.port(), sender.local_addr().unwrap().port());
    }
}
