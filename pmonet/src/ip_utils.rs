use std::io;
use std::net::IpAddr;

use get_if_addrs::get_if_addrs;

/// Liste les adresses unicast locales retenues par un prédicat.
///
/// Parcourt toutes les interfaces réseau de la machine et collecte les
/// adresses pour lesquelles `filter` retourne `true`. Les adresses de
/// loopback sont toujours exclues : elles ne portent pas de trafic de
/// découverte.
///
/// # Returns
///
/// Le vecteur des adresses retenues, dans l'ordre de parcours des
/// interfaces. Un vecteur vide est une réponse valide (machine sans
/// interface active correspondante).
///
/// # Errors
///
/// Propage l'erreur d'entrée/sortie de l'énumération des interfaces.
pub fn unicast_addresses<F>(filter: F) -> io::Result<Vec<IpAddr>>
where
    F: Fn(&IpAddr) -> bool,
{
    let mut addresses = Vec::new();

    for iface in get_if_addrs()? {
        let ip = iface.ip();
        if ip.is_loopback() {
            continue;
        }
        if filter(&ip) {
            addresses.push(ip);
        }
    }

    Ok(addresses)
}

/// Adresses unicast locales de la même famille (IPv4/IPv6) qu'une adresse
/// de référence.
///
/// C'est le filtre utilisé pour joindre un groupe multicast sur toutes les
/// interfaces compatibles avec l'endpoint distant.
pub fn unicast_addresses_same_family(reference: &IpAddr) -> io::Result<Vec<IpAddr>> {
    let want_v4 = reference.is_ipv4();
    unicast_addresses(|ip| ip.is_ipv4() == want_v4)
}
