//! Client SSDP : émission de M-SEARCH et classification des datagrammes
//! reçus (annonces NOTIFY, réponses de recherche).
//!
//! Le client est un control point : il ne doit pas se lier au port 1900,
//! réservé au mode device. Il émet depuis un port éphémère et reçoit les
//! réponses unicast ; l'adhésion multicast sert à capter les NOTIFY.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tracing::{debug, info, trace};

use super::{MAX_AGE, SSDP_MULTICAST_ADDR, SSDP_PORT, SsdpSocket};

/// Événements SSDP intéressants pour un control point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SsdpEvent {
    /// Annonce `NOTIFY` avec `NTS: ssdp:alive`
    Alive {
        usn: String,
        nt: String,
        location: String,
        server: String,
        max_age: u32,
        from: SocketAddr,
    },
    /// Annonce `NOTIFY` avec `NTS: ssdp:byebye`
    ByeBye {
        usn: String,
        nt: String,
        from: SocketAddr,
    },
    /// Réponse unicast `HTTP/1.1 200 OK` à un M-SEARCH
    SearchResponse {
        usn: String,
        st: String,
        location: String,
        server: String,
        max_age: u32,
        from: SocketAddr,
    },
}

/// Client SSDP pour envoyer des M-SEARCH et écouter les annonces.
pub struct SsdpClient {
    socket: SsdpSocket,
}

impl SsdpClient {
    /// Crée un client prêt à découvrir : port éphémère, timeout de lecture
    /// d'une seconde, boucle multicast locale active, groupe SSDP standard
    /// rejoint sur toutes les interfaces.
    pub fn new() -> io::Result<Self> {
        Self::with_group(SocketAddr::from((SSDP_MULTICAST_ADDR, SSDP_PORT)))
    }

    /// Variante avec un endpoint multicast fourni par l'appelant.
    pub fn with_group(group: SocketAddr) -> io::Result<Self> {
        let socket = SsdpSocket::new()?;
        socket.set_read_timeout(Some(Duration::from_secs(1)))?;
        socket.set_multicast_loop_v4(true)?;
        socket.join_multicast_group_all_interfaces(group)?;

        info!("SSDP client ready on {}", socket.local_addr()?);

        Ok(Self { socket })
    }

    /// Socket sous-jacent.
    pub fn socket(&self) -> &SsdpSocket {
        &self.socket
    }

    /// Envoie un M-SEARCH multicast pour la cible de recherche `st`.
    pub fn send_msearch(&self, st: &str, mx: u32) -> io::Result<()> {
        let msg = build_msearch(st, mx);
        let target = SocketAddr::from((SSDP_MULTICAST_ADDR, SSDP_PORT));

        self.socket.send_to(msg.as_bytes(), target)?;
        debug!("M-SEARCH sent (ST={}, MX={})", st, mx.max(1));
        Ok(())
    }

    /// Attend le prochain datagramme SSDP exploitable.
    ///
    /// Retourne `Ok(None)` à l'expiration du timeout de lecture, ou si le
    /// datagramme reçu n'est pas un message SSDP reconnu.
    pub fn recv_event(&self) -> io::Result<Option<SsdpEvent>> {
        let mut buf = [0u8; 8192];

        match self.socket.recv_from(&mut buf) {
            Ok((n, from)) => {
                let data = String::from_utf8_lossy(&buf[..n]);
                Ok(parse_message(&data, from))
            }
            Err(e)
                if e.kind() == io::ErrorKind::WouldBlock
                    || e.kind() == io::ErrorKind::TimedOut =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Boucle de réception bloquante ; `on_event` est appelé pour chaque
    /// événement SSDP reçu. Ne retourne que sur erreur socket.
    pub fn run_event_loop<F>(&self, mut on_event: F) -> io::Result<()>
    where
        F: FnMut(SsdpEvent),
    {
        loop {
            if let Some(event) = self.recv_event()? {
                debug!("SSDP event: {:?}", event);
                on_event(event);
            }
        }
    }
}

fn build_msearch(st: &str, mx: u32) -> String {
    // MX doit être >= 1
    let mx = mx.max(1);
    format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: {}:{}\r\n\
         MAN: \"ssdp:discover\"\r\n\
         MX: {}\r\n\
         ST: {}\r\n\
         USER-AGENT: pmodiscover\r\n\
         \r\n",
        SSDP_MULTICAST_ADDR, SSDP_PORT, mx, st
    )
}

fn parse_message(data: &str, from: SocketAddr) -> Option<SsdpEvent> {
    let mut lines = data.lines();
    let start_line = lines.next()?.trim().to_ascii_uppercase();
    let headers = parse_headers(lines);

    if start_line.starts_with("NOTIFY ") {
        parse_notify(&headers, from)
    } else if start_line.starts_with("HTTP/") && start_line.contains(" 200 ") {
        parse_search_response(&headers, from)
    } else {
        // M-SEARCH d'un autre control point, ou datagramme inconnu
        trace!("SSDP datagram from {} ignored: {}", from, start_line);
        None
    }
}

fn parse_notify(headers: &HashMap<String, String>, from: SocketAddr) -> Option<SsdpEvent> {
    // NTS, NT et USN sont obligatoires sur un NOTIFY
    let nts = headers.get("NTS")?.to_ascii_lowercase();
    let nt = headers.get("NT")?.clone();
    let usn = headers.get("USN")?.clone();

    match nts.as_str() {
        "ssdp:alive" => {
            let Some(location) = headers.get("LOCATION") else {
                trace!("ssdp:alive from {} without LOCATION, dropped", from);
                return None;
            };

            Some(SsdpEvent::Alive {
                usn,
                nt,
                location: location.clone(),
                server: server_header(headers, from),
                max_age: parse_max_age(headers.get("CACHE-CONTROL")),
                from,
            })
        }
        "ssdp:byebye" => Some(SsdpEvent::ByeBye { usn, nt, from }),
        other => {
            trace!("unknown NTS value '{}' from {}", other, from);
            None
        }
    }
}

fn parse_search_response(
    headers: &HashMap<String, String>,
    from: SocketAddr,
) -> Option<SsdpEvent> {
    // ST, USN et LOCATION sont obligatoires sur une réponse de recherche
    let st = headers.get("ST")?.clone();
    let usn = headers.get("USN")?.clone();
    let Some(location) = headers.get("LOCATION") else {
        trace!("search response from {} without LOCATION, dropped", from);
        return None;
    };

    Some(SsdpEvent::SearchResponse {
        usn,
        st,
        location: location.clone(),
        server: server_header(headers, from),
        max_age: parse_max_age(headers.get("CACHE-CONTROL")),
        from,
    })
}

fn server_header(headers: &HashMap<String, String>, from: SocketAddr) -> String {
    headers.get("SERVER").cloned().unwrap_or_else(|| {
        trace!("no SERVER header from {}, using 'Unknown'", from);
        "Unknown".to_string()
    })
}

fn parse_headers<'a, I>(lines: I) -> HashMap<String, String>
where
    I: Iterator<Item = &'a str>,
{
    let mut headers = HashMap::new();

    for line in lines {
        let line = line.trim();

        // La ligne vide termine les en-têtes
        if line.is_empty() {
            break;
        }

        // Coupure sur le premier ':' uniquement, les valeurs peuvent en contenir
        let Some((name, value)) = line.split_once(':') else {
            trace!("skipping header line without colon: '{}'", line);
            continue;
        };

        let name = name.trim().to_ascii_uppercase();
        let value = value.trim();

        if name.is_empty() || value.is_empty() {
            trace!("skipping malformed header: '{}'", line);
            continue;
        }

        headers.insert(name, value.to_string());
    }

    headers
}

fn parse_max_age(value: Option<&String>) -> u32 {
    let Some(value) = value else { return MAX_AGE };

    let lower = value.to_ascii_lowercase();
    let Some(idx) = lower.find("max-age") else {
        trace!("no max-age in CACHE-CONTROL '{}', using default {}", value, MAX_AGE);
        return MAX_AGE;
    };

    let after = lower[idx + "max-age".len()..]
        .trim_start()
        .trim_start_matches('=')
        .trim_start();
    let digits: String = after.chars().take_while(|c| c.is_ascii_digit()).collect();

    digits.parse().unwrap_or(MAX_AGE)
}
